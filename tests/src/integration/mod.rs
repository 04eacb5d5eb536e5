//! Wire-level integration tests.

pub mod flows;
pub mod transport;
