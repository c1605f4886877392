//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_kafka_config_defaults() {
        let config: KafkaConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend, BusBackend::Kafka);
        assert_eq!(config.bootstrap_servers, vec!["localhost:29092".to_string()]);
        assert_eq!(config.incoming_topic, "telegram-incoming-messages");
        assert_eq!(config.outgoing_topic, "telegram-outgoing-messages");
        assert_eq!(config.price_topic, "crypto-price-events");
        assert_eq!(config.workers, 4);
        assert_eq!(config.send_retries, 3);
    }

    #[test]
    fn test_consumer_group_suffix() {
        let config = KafkaConfig::default();
        assert_eq!(config.group_for("incoming"), "telegram-bot-group-incoming");
        assert_eq!(config.group_for("outgoing"), "telegram-bot-group-outgoing");
    }

    #[test]
    fn test_database_config_defaults() {
        let config: DatabaseConfig = toml::from_str("").unwrap();
        assert_eq!(config.name, "BitBotDB");
        assert!(config.tracked_currencies_collection);
        assert!(config.unique_telegram_id);
        assert!(config.app_password.is_empty());
    }

    #[test]
    fn test_database_variant_flags() {
        let toml_str = r#"
name = "BitBotDB"
app_user = "svc"
app_password = "secret"
tracked_currencies_collection = false
unique_telegram_id = false
"#;
        let config: DatabaseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_user, "svc");
        assert!(!config.tracked_currencies_collection);
        assert!(!config.unique_telegram_id);
    }

    #[test]
    fn test_alert_config_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.check_interval_secs, 300);
        assert_eq!(config.ema_period, 20);
        assert_eq!(config.ema_smoothing, dec!(0.05));
        assert_eq!(config.history_retries, 2);
    }

    #[test]
    fn test_admin_config_defaults() {
        let toml_str = r#"
key_secret = "k"
telegram_chat_ids = ["1001", "1002"]
"#;
        let config: AdminConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.key_ttl_days, 30);
        assert_eq!(config.telegram_chat_ids.len(), 2);
    }

    #[test]
    fn test_telegram_config_defaults() {
        let config: TelegramConfig = toml::from_str(r#"bot_token = "123:abc""#).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.poll_timeout_secs, 30);
        assert_eq!(config.api_url, "https://api.telegram.org");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[telegram]
bot_token = "42:token"

[kafka]
backend = "memory"
workers = 2

[database]
path = "sqlite::memory:"

[admin]
key_secret = "k"
"#
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.telegram.bot_token, "42:token");
        assert_eq!(config.kafka.backend, BusBackend::Memory);
        assert_eq!(config.kafka.workers, 2);
        assert_eq!(config.database_path(), "sqlite::memory:");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[telegram]\nbot_token = \"x\"\n[kafka]\nworkers = 0\n",
        )
        .unwrap();

        assert!(Config::load(&path).is_err());
    }

    fn load_str(body: &str) -> crate::error::Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        Config::load(&path)
    }

    #[test]
    fn test_zero_check_interval_rejected() {
        let err = load_str(
            "[telegram]\nbot_token = \"x\"\n[admin]\nkey_secret = \"k\"\n[alerts]\ncheck_interval_secs = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("check_interval_secs"));

        let config = load_str(
            "[telegram]\nbot_token = \"x\"\n[admin]\nkey_secret = \"k\"\n[alerts]\ncheck_interval_secs = 1\n",
        )
        .unwrap();
        assert_eq!(config.alerts.check_interval_secs, 1);
    }

    #[test]
    fn test_empty_key_secret_rejected_while_serving() {
        let err = load_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("key_secret"));

        assert!(load_str("[telegram]\nbot_token = \"x\"\n[admin]\nkey_secret = \"  \"\n").is_err());

        // No HTTP surface, no secret needed
        let config = load_str("[telegram]\nbot_token = \"x\"\n[server]\nenabled = false\n").unwrap();
        assert!(!config.server.enabled);
    }
}
