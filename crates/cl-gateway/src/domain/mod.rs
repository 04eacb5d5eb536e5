//! Domain layer: wire framing, operations, requests, results and errors.

pub mod blocks;
pub mod config;
pub mod error;
pub mod frame;
pub mod operations;
pub mod requests;
pub mod results;

pub use blocks::*;
pub use config::*;
pub use error::*;
pub use frame::*;
pub use operations::*;
pub use requests::*;
pub use results::*;
