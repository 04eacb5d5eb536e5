//! Ports to the host application.

pub mod outbound;

pub use outbound::{ChannelSignal, Contact, ContactStore, HostSignal, NoContacts, StdoutSignal};
