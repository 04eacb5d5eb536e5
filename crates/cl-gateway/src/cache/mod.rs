//! Short-lived storage for unlocked private keys.

pub mod key_cache;

pub use key_cache::{ExpiryMode, KeyCache, KeyCacheStats};
