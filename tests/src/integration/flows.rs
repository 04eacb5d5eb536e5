//! # Operation Flows
//!
//! Full request paths through TLS, auth, framing, dispatch, the key cache
//! and the native engine.

#[cfg(test)]
mod tests {
    use crate::client::TestClient;
    use crate::harness::{start, start_with};
    use cl_crypto::Key;
    use cl_gateway::domain::config::KeyCacheMode;
    use hyper::StatusCode;
    use rand::RngCore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::task::JoinSet;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Keypair {
        key: Key,
        public: String,
        private: String,
        longid: String,
    }

    fn keypair(passphrase: &str) -> Keypair {
        let key = Key::generate(vec!["Host User <host@example.com>".into()]);
        Keypair {
            public: key.to_public().to_armored().unwrap(),
            private: key.protect(passphrase).unwrap().to_armored().unwrap(),
            longid: key.key_id().to_hex(),
            key,
        }
    }

    fn keys_control(keypair: &Keypair, passphrases: &[&str]) -> Value {
        json!({
            "keys": [{"private": keypair.private, "longid": keypair.longid}],
            "passphrases": passphrases,
        })
    }

    async fn encrypt_msg(client: &TestClient, keypair: &Keypair, text: &[u8]) -> Vec<u8> {
        let reply = client
            .call("encryptMsg", json!({"pubKeys": [keypair.public]}), text)
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        reply.frame().unwrap().payload
    }

    fn block_lines(payload: &[u8]) -> Vec<Value> {
        payload
            .split(|b| *b == b'\n')
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect()
    }

    // =============================================================================
    // ROUND TRIPS
    // =============================================================================

    #[tokio::test]
    async fn test_message_with_embedded_key_splits_into_blocks() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let recipient = keypair("pw");
        let attached = keypair("other");

        let public = attached.public.trim_end();
        let text = format!("Here is my key:\n{public}\nThanks <3");
        let ciphertext = encrypt_msg(&client, &recipient, text.as_bytes()).await;

        let reply = client
            .call("decryptMsg", keys_control(&recipient, &["pw"]), &ciphertext)
            .await
            .unwrap();
        let frame = reply.frame().unwrap();
        assert_eq!(frame.result["success"], true);

        let blocks = block_lines(&frame.payload);
        let types: Vec<&str> = blocks.iter().map(|b| b["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["html", "publicKey", "html"]);
        assert_eq!(blocks[1]["content"], public);
        assert_eq!(blocks[2]["content"], "Thanks &lt;3");

        let metas = frame.result["blockMetas"].as_array().unwrap();
        assert_eq!(metas.len(), blocks.len());
        for (meta, block) in metas.iter().zip(&blocks) {
            assert_eq!(meta["type"], block["type"]);
            let units = block["content"].as_str().unwrap().encode_utf16().count();
            assert_eq!(meta["length"], units);
        }
    }

    #[tokio::test]
    async fn test_large_binary_file_roundtrip() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let recipient = keypair("pw");

        let mut data = vec![0u8; 256 * 1024];
        rand::thread_rng().fill_bytes(&mut data);
        data[..4].copy_from_slice(b"\n\n{\n");

        let reply = client
            .call(
                "encryptFile",
                json!({"pubKeys": [recipient.public], "name": "photo.jpg"}),
                &data,
            )
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        let ciphertext = reply.frame().unwrap().payload;

        let reply = client
            .call("decryptFile", keys_control(&recipient, &["pw"]), &ciphertext)
            .await
            .unwrap();
        let frame = reply.frame().unwrap();
        assert_eq!(frame.result, json!({"success": true, "name": "photo.jpg"}));
        assert_eq!(frame.payload, data);
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_a_200_failure() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let recipient = keypair("correct horse");
        let ciphertext = encrypt_msg(&client, &recipient, b"private words").await;

        let reply = client
            .call("decryptMsg", keys_control(&recipient, &["battery staple"]), &ciphertext)
            .await
            .unwrap();
        assert_eq!(reply.status, StatusCode::OK);

        let body = String::from_utf8_lossy(&reply.body);
        assert!(!body.contains("PRIVATE KEY"));
        assert!(!body.contains("private words"));
        assert!(!body.contains("battery staple"));

        let frame = reply.frame().unwrap();
        assert_eq!(frame.result["success"], false);
        assert_eq!(frame.result["errorDetail"]["type"], "need_passphrase");
        assert_eq!(frame.result["longids"]["message"][0], recipient.longid.as_str());
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn test_key_lifecycle() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let plain = Key::generate(vec!["Lifecycle <life@example.com>".into()]);

        let reply = client
            .call(
                "encryptKey",
                json!({"armored": plain.to_armored().unwrap(), "passphrase": "s3cret"}),
                b"",
            )
            .await
            .unwrap();
        let encrypted_key = reply.frame().unwrap().result["encryptedKey"]
            .as_str()
            .unwrap()
            .to_string();

        let reply = client
            .call("parseKeys", json!({}), encrypted_key.as_bytes())
            .await
            .unwrap();
        let details = reply.frame().unwrap().result;
        assert_eq!(details["format"], "armored");
        assert_eq!(details["keyDetails"][0]["isDecrypted"], false);
        assert_eq!(details["keyDetails"][0]["users"][0], "Lifecycle <life@example.com>");

        let reply = client
            .call(
                "decryptKey",
                json!({"armored": encrypted_key, "passphrases": ["s3cret"]}),
                b"",
            )
            .await
            .unwrap();
        let result = reply.frame().unwrap().result;
        assert_eq!(result["success"], true);
        let decrypted = Key::from_armored(result["decryptedKey"].as_str().unwrap()).unwrap();
        assert_eq!(decrypted.fingerprint(), plain.fingerprint());
    }

    // =============================================================================
    // KEY CACHE
    // =============================================================================

    #[tokio::test]
    async fn test_cache_fills_and_wipes() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let recipient = keypair("pw");
        let ciphertext = encrypt_msg(&client, &recipient, b"cache me").await;

        for _ in 0..3 {
            let reply = client
                .call("decryptMsg", keys_control(&recipient, &["pw"]), &ciphertext)
                .await
                .unwrap();
            assert_eq!(reply.frame().unwrap().result["success"], true);
        }
        let stats = running.service.cache().stats();
        assert_eq!(stats.unlocked_entries, 1);
        assert!(stats.hits >= 2);

        let reply = client.call("keyCacheWipe", json!({}), b"").await.unwrap();
        assert_eq!(reply.frame().unwrap().result, json!({}));
        let stats = running.service.cache().stats();
        assert_eq!(stats.unlocked_entries, 0);
        assert_eq!(stats.parsed_entries, 0);

        let reply = client
            .call("decryptMsg", keys_control(&recipient, &["pw"]), &ciphertext)
            .await
            .unwrap();
        assert_eq!(reply.frame().unwrap().result["success"], true);
        assert_eq!(running.service.cache().stats().unlocked_entries, 1);
    }

    #[tokio::test]
    async fn test_cached_key_needs_no_passphrase() {
        let running = start().await.unwrap();
        let client = running.client().unwrap();
        let recipient = keypair("pw");
        let ciphertext = encrypt_msg(&client, &recipient, b"second time").await;

        client
            .call("decryptMsg", keys_control(&recipient, &["pw"]), &ciphertext)
            .await
            .unwrap();
        let reply = client
            .call("decryptMsg", keys_control(&recipient, &[]), &ciphertext)
            .await
            .unwrap();
        let frame = reply.frame().unwrap();
        assert_eq!(frame.result["success"], true);
        assert_eq!(block_lines(&frame.payload)[0]["content"], "second time");
    }

    #[tokio::test]
    async fn test_flush_only_mode_reported() {
        let running = start_with(|config| config.key_cache.mode = KeyCacheMode::FlushOnly)
            .await
            .unwrap();
        let reply = running
            .client()
            .unwrap()
            .call("version", json!({}), b"")
            .await
            .unwrap();
        let result = reply.frame().unwrap().result;
        assert_eq!(result["keyCache"]["expiry"]["mode"], "flush_only");
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_independent() {
        let running = start().await.unwrap();
        let client = Arc::new(running.client().unwrap());
        let recipient = Arc::new(keypair("pw"));
        let ciphertext = Arc::new(encrypt_msg(&client, &recipient, b"in parallel").await);

        let mut tasks = JoinSet::new();
        for i in 0..8 {
            let client = Arc::clone(&client);
            let recipient = Arc::clone(&recipient);
            let ciphertext = Arc::clone(&ciphertext);
            tasks.spawn(async move {
                if i % 2 == 0 {
                    let reply = client
                        .call("decryptMsg", keys_control(&recipient, &["pw"]), &ciphertext)
                        .await
                        .unwrap();
                    reply.frame().unwrap().result["success"] == true
                } else {
                    let reply = client.call("version", json!({}), b"").await.unwrap();
                    reply.status == StatusCode::OK
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap());
        }
        assert_eq!(running.service.cache().stats().unlocked_entries, 1);
        assert!(recipient.key.is_private());
    }
}
