//! Outbound ports: readiness signalling to the host and the contact store.

use std::io::Write;
use tokio::sync::mpsc;
use tracing::warn;

/// Channel through which the service tells the host it is ready.
pub trait HostSignal: Send + Sync {
    /// Deliver one message to the host.
    fn send(&self, message: &str);
}

/// Readiness message emitted once after a successful bind.
pub fn listening_message(port: u16) -> String {
    format!("listening on {port}")
}

/// Writes signals to stdout, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSignal;

impl HostSignal for StdoutSignal {
    fn send(&self, message: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{message}").and_then(|_| stdout.flush()) {
            warn!(error = %e, "Failed to signal host");
        }
    }
}

/// Forwards signals into a channel.
#[derive(Debug, Clone)]
pub struct ChannelSignal {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSignal {
    /// Signal plus the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostSignal for ChannelSignal {
    fn send(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            warn!("Host signal receiver dropped");
        }
    }
}

/// Contact of a long-term key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub longid: String,
}

/// Long-term contact lookup.
pub trait ContactStore: Send + Sync {
    /// Contacts matching an email address.
    fn lookup(&self, email: &str) -> Vec<Contact>;
}

/// Store without contacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContacts;

impl ContactStore for NoContacts {
    fn lookup(&self, _email: &str) -> Vec<Contact> {
        Vec::new()
    }
}
