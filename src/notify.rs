//! Readiness and stopping notifications for an external process supervisor.

use std::path::PathBuf;

/// Receives lifecycle notifications from the server.
pub trait SupervisorNotifier: Send + Sync {
    /// The listener is bound and accepting connections.
    fn ready(&self);

    /// Shutdown has started.
    fn stopping(&self);
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl SupervisorNotifier for NoopNotifier {
    fn ready(&self) {}
    fn stopping(&self) {}
}

/// systemd `sd_notify` protocol over the datagram socket in `$NOTIFY_SOCKET`.
///
/// Without the variable every notification is a no-op. Delivery failures are
/// logged and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct SystemdNotifier {
    socket: Option<PathBuf>,
}

impl SystemdNotifier {
    pub fn from_env() -> Self {
        Self {
            socket: std::env::var_os("NOTIFY_SOCKET").map(PathBuf::from),
        }
    }

    pub fn with_socket(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: Some(socket.into()),
        }
    }

    fn send(&self, state: &str) {
        let Some(socket) = &self.socket else {
            return;
        };

        match send_datagram(socket, state) {
            Ok(()) => tracing::debug!(socket = %socket.display(), "Sent {} to supervisor", state),
            Err(e) => tracing::warn!(socket = %socket.display(), "Failed to notify supervisor: {}", e),
        }
    }
}

impl SupervisorNotifier for SystemdNotifier {
    fn ready(&self) {
        self.send("READY=1");
    }

    fn stopping(&self) {
        self.send("STOPPING=1");
    }
}

#[cfg(unix)]
fn send_datagram(socket: &std::path::Path, state: &str) -> std::io::Result<()> {
    use std::os::unix::net::UnixDatagram;

    let sender = UnixDatagram::unbound()?;

    match socket.to_str().and_then(|s| s.strip_prefix('@')) {
        Some(name) => send_abstract(&sender, name, state),
        None => sender.send_to(state.as_bytes(), socket).map(|_| ()),
    }
}

/// A leading '@' names a Linux abstract socket.
#[cfg(target_os = "linux")]
fn send_abstract(sender: &std::os::unix::net::UnixDatagram, name: &str, state: &str) -> std::io::Result<()> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    sender.send_to_addr(state.as_bytes(), &addr).map(|_| ())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn send_abstract(_sender: &std::os::unix::net::UnixDatagram, _name: &str, _state: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "abstract sockets are Linux-only",
    ))
}

#[cfg(not(unix))]
fn send_datagram(_socket: &std::path::Path, _state: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "supervisor notification requires unix sockets",
    ))
}
