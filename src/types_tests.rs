//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_crypto_serialization() {
        assert_eq!(serde_json::to_string(&Crypto::Btc).unwrap(), "\"BTC\"");
        assert_eq!(serde_json::to_string(&Crypto::Doge).unwrap(), "\"DOGE\"");
        let avax: Crypto = serde_json::from_str("\"AVAX\"").unwrap();
        assert_eq!(avax, Crypto::Avax);
    }

    #[test]
    fn test_crypto_from_pair_symbol() {
        assert_eq!(Crypto::from_symbol("BTC-USDT").unwrap(), Crypto::Btc);
        assert_eq!(Crypto::from_symbol("sol").unwrap(), Crypto::Sol);
        assert!(Crypto::from_symbol("FOO-USDT").is_err());
    }

    #[test]
    fn test_crypto_names_and_pairs() {
        assert_eq!(Crypto::Xrp.name(), "Ripple");
        assert_eq!(Crypto::Ltc.usdt_pair(), "LTC-USDT");
        assert_eq!(
            Crypto::codes_hint(),
            "BTC, ETH, SOL, XRP, ADA, DOGE, AVAX, NEAR, LTC"
        );
    }

    #[test]
    fn test_fiat_parse_case_insensitive() {
        assert_eq!("eur".parse::<Fiat>().unwrap(), Fiat::Eur);
        assert_eq!(" RUB ".parse::<Fiat>().unwrap(), Fiat::Rub);
        assert!("CHF".parse::<Fiat>().is_err());
        assert_eq!(Fiat::default(), Fiat::Usd);
    }

    #[test]
    fn test_threshold_type_short_forms() {
        assert_eq!("VAL".parse::<ThresholdType>().unwrap(), ThresholdType::Value);
        assert_eq!("perc".parse::<ThresholdType>().unwrap(), ThresholdType::Percent);
        assert_eq!("EMA".parse::<ThresholdType>().unwrap(), ThresholdType::Ema);
        assert!("RSI".parse::<ThresholdType>().is_err());
        assert_eq!(serde_json::to_string(&ThresholdType::Percent).unwrap(), "\"PERCENT\"");
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("3h".parse::<Period>().unwrap(), Period::Hours(3));
        assert_eq!("1M".parse::<Period>().unwrap(), Period::Months(1));
        assert!("1m".parse::<Period>().is_err());
        assert!("5d".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_sampling() {
        assert_eq!(Period::Hours(12).sampling(), (3600, 12));
        assert_eq!(Period::Days(7).sampling(), (86_400, 7));
        assert_eq!(Period::Months(1).sampling(), (86_400, 30));
        assert_eq!(Period::Months(1).seconds(), 30 * 86_400);
        assert_eq!(Period::Hours(24).to_string(), "24h");
    }

    #[test]
    fn test_chat_message_wire_format() {
        let msg = ChatMessage::new("123456", "/start");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["chatId"], "123456");
        assert_eq!(json["message"], "/start");
        assert!(json["messageId"].is_string());
    }

    #[test]
    fn test_price_event_wire_format() {
        let raw = r#"{"eventId":"7f2c5a0e-3f4b-4a39-9d0f-8c4d7c1c2b11","symbol":"ETH","price":"3150.25","timestamp":1700000000}"#;
        let event: PriceEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.symbol, Crypto::Eth);
        assert_eq!(event.price, dec!(3150.25));
        assert_eq!(event.timestamp, 1_700_000_000);
    }
}
