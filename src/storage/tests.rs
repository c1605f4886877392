//! Tests for the state store

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::DatabaseConfig;
    use crate::error::BotError;
    use crate::types::{Crypto, Fiat, ThresholdType};
    use rust_decimal_macros::dec;

    fn plan(tracked: bool, unique_tg: bool) -> SchemaPlan {
        SchemaPlan::for_config(&DatabaseConfig {
            tracked_currencies_collection: tracked,
            unique_telegram_id: unique_tg,
            ..DatabaseConfig::default()
        })
    }

    async fn memory_db() -> Database {
        Database::in_memory(plan(true, true)).await.unwrap()
    }

    fn admin(username: &str) -> AdminRecord {
        AdminRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            api_key_hash: uuid::Uuid::new_v4().to_string(),
            api_key_expiry: 2_000_000_000,
            created_at: 1_700_000_000,
            deactivated_at: None,
        }
    }

    fn value_alert(chat: &str, upper: rust_decimal::Decimal, lower: rust_decimal::Decimal) -> Notification {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat.to_string(),
            crypto: Crypto::Btc,
            fiat: Fiat::Usd,
            is_active: true,
            start_price: dec!(50000),
            start_timestamp: 1_700_000_000,
            trigger_timestamp: None,
            last_event_ts: None,
            kind: NotificationKind::Value { upper, lower },
        }
    }

    #[tokio::test]
    async fn test_bootstrap_creates_all_collections() {
        let db = memory_db().await;
        let mut tables = db.collections().await.unwrap();
        tables.sort();

        let mut expected: Vec<String> = db.plan().collection_names().iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(tables, expected);
        assert!(tables.contains(&"TrackedCryptoCurrencies".to_string()));
    }

    #[tokio::test]
    async fn test_bootstrap_base_variant() {
        let db = Database::in_memory(plan(false, false)).await.unwrap();
        let tables = db.collections().await.unwrap();
        assert_eq!(tables.len(), 4);
        assert!(!db.tracks_currencies());
        // Tracking is a silent no-op without the collection
        db.upsert_tracked(Crypto::Btc, dec!(1), 1).await.unwrap();
        assert!(db.list_tracked().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let db = memory_db().await;
        db.bootstrap().await.unwrap();
        db.bootstrap().await.unwrap();
        assert_eq!(db.collections().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_admin_username_rejected() {
        let db = memory_db().await;
        db.insert_admin(&admin("alice")).await.unwrap();

        let err = db.insert_admin(&admin("alice")).await.unwrap_err();
        assert!(matches!(err, BotError::Duplicate(_)), "got {:?}", err);

        db.insert_admin(&admin("bob")).await.unwrap();
        assert_eq!(db.list_admins().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_telegram_id_rejected_with_index() {
        let db = memory_db().await;
        db.insert_user(&UserRecord::new("100200300")).await.unwrap();

        let err = db.insert_user(&UserRecord::new("100200300")).await.unwrap_err();
        assert!(matches!(err, BotError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_duplicate_telegram_id_allowed_without_index() {
        let db = Database::in_memory(plan(true, false)).await.unwrap();
        db.insert_user(&UserRecord::new("100200300")).await.unwrap();
        db.insert_user(&UserRecord::new("100200300")).await.unwrap();
        assert_eq!(db.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bitbot.db");
        let path = path.to_str().unwrap().to_string();

        {
            let db = Database::connect(&path, plan(true, true)).await.unwrap();
            db.start_user("555000111").await.unwrap();
        }

        let db = Database::connect(&path, plan(true, true)).await.unwrap();
        let user = db.find_user("555000111").await.unwrap().unwrap();
        assert!(user.has_started);
    }

    #[tokio::test]
    async fn test_start_user_lifecycle() {
        let db = memory_db().await;
        assert!(!db.start_user("42424242").await.unwrap());
        assert!(db.start_user("42424242").await.unwrap());

        let user = db.find_user("42424242").await.unwrap().unwrap();
        assert_eq!(user.current_crypto, Crypto::Btc);
        assert_eq!(user.current_fiat, Fiat::Usd);

        db.set_user_fiat("42424242", Fiat::Eur).await.unwrap();
        db.set_user_crypto("42424242", Crypto::Sol).await.unwrap();
        let user = db.find_user("42424242").await.unwrap().unwrap();
        assert_eq!(user.current_fiat, Fiat::Eur);
        assert_eq!(user.current_crypto, Crypto::Sol);
    }

    #[tokio::test]
    async fn test_holdings_add_and_remove() {
        let db = memory_db().await;
        let count = db.add_to_holding("c1", Crypto::Eth, dec!(1.5), dec!(3000), 10).await.unwrap();
        assert_eq!(count, dec!(1.5));
        let count = db.add_to_holding("c1", Crypto::Eth, dec!(0.5), dec!(3100), 20).await.unwrap();
        assert_eq!(count, dec!(2.0));

        let holding = db.find_holding("c1", Crypto::Eth).await.unwrap().unwrap();
        assert_eq!(holding.last_price, Some(dec!(3100)));
        assert_eq!(holding.last_price_ts, Some(20));

        let remaining = db.remove_from_holding("c1", Crypto::Eth, dec!(0.75)).await.unwrap();
        assert_eq!(remaining, dec!(1.25));

        let err = db.remove_from_holding("c1", Crypto::Eth, dec!(5)).await.unwrap_err();
        assert!(matches!(err, BotError::InsufficientFunds { .. }));

        let remaining = db.remove_from_holding("c1", Crypto::Eth, dec!(1.25)).await.unwrap();
        assert!(remaining.is_zero());
        assert!(db.find_holding("c1", Crypto::Eth).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_holding_row_for_same_asset_rejected() {
        let db = memory_db().await;
        db.add_to_holding("c1", Crypto::Btc, dec!(1), dec!(50000), 10).await.unwrap();

        let duplicate = sqlx::query(
            "INSERT INTO portfolios (id, chat_id, crypto, count, updated_at) VALUES ('other', 'c1', 'BTC', '2', 0)",
        )
        .execute(db.pool())
        .await;
        assert!(duplicate.is_err());

        // Other chats and other assets are unaffected
        db.add_to_holding("c2", Crypto::Btc, dec!(1), dec!(50000), 10).await.unwrap();
        db.add_to_holding("c1", Crypto::Eth, dec!(1), dec!(3000), 10).await.unwrap();
        assert_eq!(db.find_holding("c1", Crypto::Btc).await.unwrap().unwrap().count, dec!(1));
    }

    #[tokio::test]
    async fn test_holdings_reject_non_positive_and_missing() {
        let db = memory_db().await;
        assert!(db.add_to_holding("c1", Crypto::Btc, dec!(0), dec!(1), 1).await.is_err());
        let err = db.remove_from_holding("c1", Crypto::Btc, dec!(1)).await.unwrap_err();
        assert!(matches!(err, BotError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_held_cryptos_and_delete_all() {
        let db = memory_db().await;
        db.add_to_holding("c1", Crypto::Btc, dec!(1), dec!(1), 1).await.unwrap();
        db.add_to_holding("c2", Crypto::Ada, dec!(1), dec!(1), 1).await.unwrap();
        db.add_to_holding("c2", Crypto::Btc, dec!(1), dec!(1), 1).await.unwrap();

        assert_eq!(db.held_cryptos().await.unwrap(), vec![Crypto::Ada, Crypto::Btc]);
        assert_eq!(db.delete_all_holdings("c2").await.unwrap(), 2);
        assert!(db.delete_holding("c1", Crypto::Btc).await.unwrap());
        assert!(!db.delete_holding("c1", Crypto::Btc).await.unwrap());
    }

    #[tokio::test]
    async fn test_notification_round_trip_by_kind() {
        let db = memory_db().await;
        let value = value_alert("c1", dec!(60000), dec!(40000));
        let mut ema = value_alert("c1", dec!(0), dec!(0));
        ema.id = uuid::Uuid::new_v4().to_string();
        ema.kind = NotificationKind::Ema {
            start_ema: dec!(51000.12),
            current_ema: dec!(51000.12),
            is_above: true,
        };

        db.insert_notification(&value).await.unwrap();
        db.insert_notification(&ema).await.unwrap();

        let loaded = db.notifications_for_chat("c1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&value));
        assert!(loaded.contains(&ema));
        assert_eq!(db.watched_cryptos().await.unwrap(), vec![Crypto::Btc]);
    }

    #[tokio::test]
    async fn test_mark_triggered_fires_once() {
        let db = memory_db().await;
        let alert = value_alert("c1", dec!(60000), dec!(40000));
        db.insert_notification(&alert).await.unwrap();

        assert!(db.mark_triggered(&alert.id, 1_700_000_500, 1_700_000_400).await.unwrap());
        assert!(!db.mark_triggered(&alert.id, 1_700_000_600, 1_700_000_400).await.unwrap());

        let stored = db.find_notification(&alert.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.trigger_timestamp, Some(1_700_000_500));
        assert!(db.active_notifications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_advance_ema_ignores_stale_events() {
        let db = memory_db().await;
        let mut alert = value_alert("c1", dec!(0), dec!(0));
        alert.kind = NotificationKind::Ema {
            start_ema: dec!(100),
            current_ema: dec!(100),
            is_above: false,
        };
        db.insert_notification(&alert).await.unwrap();

        assert!(db.advance_ema(&alert.id, dec!(101), true, 200).await.unwrap());
        // Same event redelivered
        assert!(!db.advance_ema(&alert.id, dec!(102), true, 200).await.unwrap());
        // Older event arriving late
        assert!(!db.advance_ema(&alert.id, dec!(99), false, 100).await.unwrap());

        let stored = db.find_notification(&alert.id).await.unwrap().unwrap();
        assert_eq!(
            stored.kind,
            NotificationKind::Ema { start_ema: dec!(100), current_ema: dec!(101), is_above: true }
        );
        assert_eq!(stored.last_event_ts, Some(200));
    }

    #[tokio::test]
    async fn test_delete_notifications_by_type() {
        let db = memory_db().await;
        db.insert_notification(&value_alert("c1", dec!(2), dec!(1))).await.unwrap();
        db.insert_notification(&value_alert("c1", dec!(3), dec!(1))).await.unwrap();
        db.insert_notification(&value_alert("c2", dec!(3), dec!(1))).await.unwrap();

        assert_eq!(db.delete_notifications("c1", ThresholdType::Ema, Crypto::Btc).await.unwrap(), 0);
        assert_eq!(db.delete_notifications("c1", ThresholdType::Value, Crypto::Btc).await.unwrap(), 2);
        assert_eq!(db.delete_all_notifications("c2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tracked_currency_keeps_newest() {
        let db = memory_db().await;
        db.upsert_tracked(Crypto::Sol, dec!(150), 200).await.unwrap();
        db.upsert_tracked(Crypto::Sol, dec!(140), 100).await.unwrap();

        let tracked = db.list_tracked().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].last_price, dec!(150));
        assert_eq!(tracked[0].updated_at, 200);
    }

    #[tokio::test]
    async fn test_admin_key_updates() {
        let db = memory_db().await;
        db.insert_admin(&admin("carol")).await.unwrap();
        assert!(db.update_admin_key("carol", "newhash", 123).await.unwrap());
        let stored = db.find_admin_by_key_hash("newhash").await.unwrap().unwrap();
        assert_eq!(stored.username, "carol");
        assert!(stored.is_expired(123));
        assert!(!db.deactivate_admin("nobody", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_deactivation_is_cleared_by_new_key() {
        let db = memory_db().await;
        db.insert_admin(&admin("dave")).await.unwrap();
        assert!(db.deactivate_admin("dave", 500).await.unwrap());

        let stored = db.find_admin("dave").await.unwrap().unwrap();
        assert!(stored.is_deactivated());
        assert_eq!(stored.deactivated_at, Some(500));
        assert!(stored.is_expired(500));

        db.update_admin_key("dave", "fresh", 2_000_000_000).await.unwrap();
        assert!(!db.find_admin("dave").await.unwrap().unwrap().is_deactivated());
    }
}
