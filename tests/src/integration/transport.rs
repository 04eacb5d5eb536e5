//! # Transport Tests
//!
//! Listener startup, mutual TLS, shared-secret auth and status mapping,
//! exercised through a real socket.

#[cfg(test)]
mod tests {
    use crate::harness::{start, start_with, SECRET};
    use hyper::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
    use hyper::{Method, StatusCode};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    // =============================================================================
    // STARTUP
    // =============================================================================

    #[tokio::test]
    async fn test_readiness_signal_emitted_once() {
        let mut running = start().await.unwrap();
        let port = running.handle.local_addr().port();
        assert_ne!(port, 0);
        assert!(running.handle.local_addr().ip().is_loopback());

        let message = running.signals.recv().await.unwrap();
        assert_eq!(message, format!("listening on {port}"));
        assert!(running.signals.try_recv().is_err());

        running.handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        assert!(client.call("version", json!({}), b"").await.is_ok());

        running.handle.shutdown().await;
        assert!(client.call("version", json!({}), b"").await.is_err());
    }

    // =============================================================================
    // MUTUAL TLS
    // =============================================================================

    #[tokio::test]
    async fn test_trusted_client_is_served() {
        let running = start().await.unwrap();
        let reply = running
            .client()
            .unwrap()
            .call("version", json!({}), b"")
            .await
            .unwrap();

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers[CONTENT_TYPE], "application/octet-stream");
        let frame = reply.frame().unwrap();
        assert_eq!(frame.result["cipherlink"], cl_gateway::VERSION);
    }

    #[tokio::test]
    async fn test_client_without_certificate_is_refused() {
        let running = start().await.unwrap();
        let client = running.client_with(None, Some(SECRET)).unwrap();
        assert!(client.call("version", json!({}), b"").await.is_err());
        let served = running.service.metrics().requests_total.load(Ordering::Relaxed);
        assert_eq!(served, 0);
    }

    #[tokio::test]
    async fn test_client_from_unknown_ca_is_refused() {
        let running = start().await.unwrap();
        let client = running
            .client_with(Some(&running.pki.rogue_client), Some(SECRET))
            .unwrap();
        assert!(client.call("version", json!({}), b"").await.is_err());
    }

    // =============================================================================
    // SHARED SECRET
    // =============================================================================

    #[tokio::test]
    async fn test_wrong_or_missing_secret_is_401() {
        let running = start().await.unwrap();

        for secret in [None, Some("Basic bm9wZQ=="), Some("")] {
            let client = running
                .client_with(Some(&running.pki.client), secret)
                .unwrap();
            let reply = client.call("version", json!({}), b"").await.unwrap();
            assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
            assert_eq!(reply.headers[WWW_AUTHENTICATE], "Basic realm=\"cipherlink\"");
            assert_eq!(
                reply.frame().unwrap().result,
                json!({"error": {"message": "Wrong Authorization"}})
            );
        }
    }

    // =============================================================================
    // STATUS MAPPING
    // =============================================================================

    #[tokio::test]
    async fn test_framing_errors_are_400() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();

        let bodies: [&[u8]; 4] = [b"version", b"version\n{}", b"\n{}\n", b"version\n\n"];
        for body in bodies {
            let reply = client.send(Method::POST, "/", body.to_vec()).await.unwrap();
            assert_eq!(reply.status, StatusCode::BAD_REQUEST, "body {body:?}");
            assert!(reply.frame().unwrap().payload.is_empty());
        }

        let reply = client.send(Method::POST, "/", b"version\n[1]\n".to_vec()).await.unwrap();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_operation_and_path_are_400() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();

        let reply = client.call("launchMissiles", json!({}), b"").await.unwrap();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            reply.frame().unwrap().result["error"]["message"],
            "unknown endpoint: launchMissiles"
        );

        let reply = client.send(Method::POST, "/rpc", Vec::new()).await.unwrap();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            reply.frame().unwrap().result["error"]["message"],
            "unknown path /rpc"
        );
    }

    #[tokio::test]
    async fn test_oversize_body_is_400() {
        let running = start_with(|config| config.limits.max_request_size = 1024)
            .await
            .unwrap();
        let client = running.client().unwrap();

        let reply = client
            .call("parseKeys", json!({}), &vec![b'a'; 4096])
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let reply = client.call("version", json!({}), b"").await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_page() {
        let running = start().await.unwrap();
        let reply = running
            .client()
            .unwrap()
            .send(Method::GET, "/", Vec::new())
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&reply.body).contains("Cipherlink"));
    }
}
