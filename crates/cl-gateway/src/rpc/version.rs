//! `version`: runtime information.

use crate::cache::ExpiryMode;
use crate::domain::error::ApiResult;
use crate::domain::frame::ResponseFrame;
use crate::rpc::{Handled, RpcHandlers};
use serde_json::json;

pub(crate) fn version(handlers: &RpcHandlers) -> ApiResult<Handled> {
    let stats = handlers.cache.stats();
    let expiry = match handlers.cache.mode() {
        ExpiryMode::Sliding(ttl) => json!({"mode": "sliding", "ttlMs": ttl.as_millis() as u64}),
        ExpiryMode::FlushOnly => json!({"mode": "flush_only"}),
    };
    let result = json!({
        "cipherlink": crate::VERSION,
        "crypto": cl_crypto::VERSION,
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "keyCache": {
            "expiry": expiry,
            "unlocked": stats.unlocked_entries,
            "parsed": stats.parsed_entries,
            "hits": stats.hits,
            "misses": stats.misses,
            "wipes": stats.wipes,
        },
        "metrics": handlers.metrics.to_json(),
    });
    Ok(Handled::success(ResponseFrame::json(&result)?))
}
