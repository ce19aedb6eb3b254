//! Readiness and status reporting to systemd via `NOTIFY_SOCKET`.
//!
//! Without the socket every call is a no-op.

#[derive(Debug)]
pub struct ProcessState {
    pub span: tracing::Span,
}

impl ProcessState {
    pub fn set_ready(&self) {
        self.send(&[NotifyState::Ready], "ready");
    }

    pub fn set_mode(&self, mode: crate::modes::ModeName) {
        let status = format!("mode: {mode}");
        self.send(&[NotifyState::Status(&status)], &status);
    }

    pub fn set_stopping(&self) {
        self.send(&[NotifyState::Status("stopping"), NotifyState::Stopping], "stopping");
    }

    fn send(&self, states: &[NotifyState<'_>], status: &str) {
        tracing::debug!(parent: &self.span, status, "Setting service status");
        if let Err(error) = notify(states) {
            tracing::error!(parent: &self.span, ?error, "Failed to notify systemd of state change");
        } else {
            tracing::trace!(parent: &self.span, status, "Notified systemd of service status");
        }
    }
}

/// Daemon notification for the service manager.
#[derive(Clone, Debug)]
enum NotifyState<'a> {
    /// Service startup is finished.
    Ready,

    /// Service is stopping.
    Stopping,

    /// Free-form status message for the service manager.
    Status(&'a str),
}

impl std::fmt::Display for NotifyState<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyState::Ready => write!(f, "READY=1"),
            NotifyState::Stopping => write!(f, "STOPPING=1"),
            NotifyState::Status(msg) => write!(f, "STATUS={msg}"),
        }
    }
}

fn message(states: &[NotifyState<'_>]) -> String {
    use std::fmt::Write;

    let mut msg = String::new();
    for s in states {
        let _ = writeln!(msg, "{s}");
    }
    msg
}

fn connect_notify_socket() -> std::io::Result<Option<std::os::unix::net::UnixDatagram>> {
    let Some(socket_path) = std::env::var_os("NOTIFY_SOCKET") else {
        return Ok(None);
    };

    let sock = std::os::unix::net::UnixDatagram::unbound()?;
    sock.connect(socket_path)?;
    Ok(Some(sock))
}

fn notify(states: &[NotifyState<'_>]) -> std::io::Result<()> {
    let Some(sock) = connect_notify_socket()? else {
        return Ok(());
    };

    let msg = message(states);
    let len = sock.send(msg.as_bytes())?;
    if len != msg.len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "incomplete write",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        let msg = message(&[NotifyState::Status("mode: weather"), NotifyState::Stopping]);
        assert_eq!(msg, "STATUS=mode: weather\nSTOPPING=1\n");
        assert_eq!(message(&[NotifyState::Ready]), "READY=1\n");
    }
}
