//! Tests for the HTTP surface, served on a loopback port

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::bus::MemoryBus;
    use crate::config::AdminConfig;
    use crate::storage::UserRecord;
    use crate::testing;
    use reqwest::StatusCode;
    use serde_json::Value;

    struct Served {
        base: String,
        admin: Arc<AdminService>,
        db: Database,
        _shutdown: watch::Sender<bool>,
    }

    async fn serve() -> Served {
        let db = testing::memory_db().await;
        let admin = Arc::new(AdminService::new(db.clone(), AdminConfig::default()));
        let state = Arc::new(MonitorState::new(db.clone(), Bus::Memory(MemoryBus::new()), admin.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(async move {
                    let _ = rx.changed().await;
                })
                .await
                .unwrap();
        });

        Served {
            base: format!("http://{}", addr),
            admin,
            db,
            _shutdown: tx,
        }
    }

    #[tokio::test]
    async fn test_healthcheck_reports_components() {
        let s = serve().await;
        let resp = reqwest::get(format!("{}/healthcheck", s.base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let report: HealthReport = resp.json().await.unwrap();
        assert_eq!(report.status, "UP");
        assert_eq!(report.store, "UP");
        assert_eq!(report.bus, "UP");
    }

    #[tokio::test]
    async fn test_users_require_a_valid_key() {
        let s = serve().await;
        let client = reqwest::Client::new();
        let url = format!("{}/admin/users", s.base);

        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = client.get(&url).bearer_auth("not-a-key").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_users_are_masked() {
        let s = serve().await;
        s.db.insert_user(&UserRecord::new("123456789")).await.unwrap();
        let issued = s.admin.create("alice").await.unwrap();

        let resp = reqwest::Client::new()
            .get(format!("{}/admin/users", s.base))
            .bearer_auth(&issued.key)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let users: Vec<MaskedUser> = resp.json().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].telegram_id, "12****89");
        assert_eq!(users[0].current_fiat, "USD");
    }

    /// Push an issued key past its expiry without deactivating it
    async fn age_out(s: &Served, username: &str, key: &str) {
        let hash = s.admin.hash_key(key).unwrap();
        assert!(s.db.update_admin_key(username, &hash, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_key_gets_replaced() {
        let s = serve().await;
        let issued = s.admin.create("bob").await.unwrap();
        age_out(&s, "bob", &issued.key).await;

        let client = reqwest::Client::new();
        let url = format!("{}/admin/users", s.base);
        let resp = client.get(&url).bearer_auth(&issued.key).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "API key expired");
        let new_key = body["newKey"].as_str().unwrap().to_string();
        assert_ne!(new_key, issued.key);

        let resp = client.get(&url).bearer_auth(&new_key).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_deactivated_key_cannot_reissue_itself() {
        let s = serve().await;
        let issued = s.admin.create("bob").await.unwrap();
        assert!(s.admin.deactivate("bob").await.unwrap());
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{}/admin/users", s.base))
            .bearer_auth(&issued.key)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "invalid API key");
        assert!(body.get("newKey").is_none());

        let resp = client
            .post(format!("{}/admin/refresh", s.base))
            .bearer_auth(&issued.key)
            .json(&serde_json::json!({ "username": "bob" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert!(body.get("key").is_none());

        // Still locked out: the stored key was not replaced
        let admin = s.db.find_admin("bob").await.unwrap().unwrap();
        assert!(admin.is_deactivated());
    }

    #[tokio::test]
    async fn test_expired_key_may_refresh_itself() {
        let s = serve().await;
        let issued = s.admin.create("erin").await.unwrap();
        age_out(&s, "erin", &issued.key).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/admin/refresh", s.base))
            .bearer_auth(&issued.key)
            .json(&serde_json::json!({ "username": "erin" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_ne!(body["key"].as_str().unwrap(), issued.key);
    }

    #[tokio::test]
    async fn test_refresh_without_key_does_not_reveal_usernames() {
        let s = serve().await;
        s.admin.create("alice").await.unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/admin/refresh", s.base);

        for username in ["alice", "nobody"] {
            let resp = client
                .post(&url)
                .json(&serde_json::json!({ "username": username }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["error"], "missing API key");

            let resp = client
                .post(&url)
                .bearer_auth("not-a-key")
                .json(&serde_json::json!({ "username": username }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_refresh_rules() {
        let s = serve().await;
        let alice = s.admin.create("alice").await.unwrap();
        s.admin.create("carol").await.unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/admin/refresh", s.base);

        let resp = client
            .post(&url)
            .bearer_auth(&alice.key)
            .json(&serde_json::json!({ "username": "carol" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = client
            .post(&url)
            .bearer_auth(&alice.key)
            .json(&serde_json::json!({ "username": "nobody" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = client
            .post(&url)
            .bearer_auth(&alice.key)
            .json(&serde_json::json!({ "username": "alice" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        let fresh = body["key"].as_str().unwrap();
        assert_ne!(fresh, alice.key);

        // The old key no longer works
        let resp = client
            .get(format!("{}/admin/users", s.base))
            .bearer_auth(&alice.key)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
