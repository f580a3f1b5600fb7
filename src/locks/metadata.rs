//! Diagnostic metadata written into global lock marker files.

use std::net::ToSocketAddrs;

/// Identity of the process holding a global lock.
///
/// Written into the marker file so an operator staring at a stuck lock can
/// see who owns it. The content is informational only — acquisition and
/// release depend solely on the marker file's presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMetadata {
    /// Host name of the lock holder.
    pub host_name: String,

    /// Resolved address of the lock holder, or `unknown`.
    pub host_address: String,

    /// Process ID of the lock holder.
    pub pid: u32,
}

impl MarkerMetadata {
    /// Capture the identity of the current process.
    pub fn capture() -> Self {
        let host_name = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        let host_address = resolve_host_address(&host_name);

        Self {
            host_name,
            host_address,
            pid: std::process::id(),
        }
    }

    /// Serialize as the marker file content: one field per line.
    pub fn to_text(&self) -> String {
        format!("{}\n{}\n{}", self.host_name, self.host_address, self.pid)
    }
}

/// Best-effort lookup of the local host's address. Lock correctness never
/// depends on it.
fn resolve_host_address(host_name: &str) -> String {
    (host_name, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
