//! Tests for portfolio management

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::storage::UserRecord;
    use crate::testing::{self, StaticPrices};
    use rust_decimal_macros::dec;

    async fn manager(prices: Arc<StaticPrices>) -> (PortfolioManager, Database) {
        let db = testing::memory_db().await;
        (PortfolioManager::new(db.clone(), testing::info(prices)), db)
    }

    #[test]
    fn test_display_count_floors() {
        assert_eq!(display_count(dec!(1.23456789)).to_string(), "1.234567");
        assert_eq!(display_count(dec!(2)).to_string(), "2.000000");
    }

    #[tokio::test]
    async fn test_add_accumulates_and_records_price() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Btc, dec!(100))]));
        let (pm, db) = manager(prices).await;

        let reply = pm.add("c1", dec!(1.5), Crypto::Btc).await.unwrap();
        assert!(reply.contains("Added 1.5 BTC"));
        pm.add("c1", dec!(0.5), Crypto::Btc).await.unwrap();

        let holding = db.find_holding("c1", Crypto::Btc).await.unwrap().unwrap();
        assert_eq!(holding.count, dec!(2));
        assert_eq!(holding.last_price, Some(dec!(100)));

        assert!(matches!(
            pm.add("c1", dec!(0), Crypto::Btc).await,
            Err(BotError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_enforces_balance() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Eth, dec!(10))]));
        let (pm, db) = manager(prices).await;

        assert!(pm.remove("c1", dec!(1), Crypto::Eth).await.unwrap().contains("not found"));

        pm.add("c1", dec!(2), Crypto::Eth).await.unwrap();
        let reply = pm.remove("c1", dec!(3), Crypto::Eth).await.unwrap();
        assert!(reply.contains("Insufficient funds"));
        assert!(reply.contains("2.000000 ETH"));

        pm.remove("c1", dec!(0.5), Crypto::Eth).await.unwrap();
        assert_eq!(db.find_holding("c1", Crypto::Eth).await.unwrap().unwrap().count, dec!(1.5));

        pm.remove("c1", dec!(1.5), Crypto::Eth).await.unwrap();
        assert!(db.find_holding("c1", Crypto::Eth).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_info_uses_user_fiat() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Btc, dec!(100)), (Crypto::Sol, dec!(20))]));
        let (pm, db) = manager(prices).await;
        db.insert_user(&UserRecord::new("c1")).await.unwrap();
        db.set_user_fiat("c1", Fiat::Eur).await.unwrap();

        assert!(pm.info("c1").await.unwrap().contains("empty"));

        pm.add("c1", dec!(2), Crypto::Btc).await.unwrap();
        pm.add("c1", dec!(5), Crypto::Sol).await.unwrap();

        let info = pm.info("c1").await.unwrap();
        assert!(info.contains("2.000000 BTC (180.00 EUR)"));
        assert!(info.contains("5.000000 SOL (90.00 EUR)"));
        assert!(info.contains("Total: 270.00 EUR"));

        assert_eq!(pm.balance("c1").await.unwrap(), "💰 Balance: 270.00 EUR");
    }

    #[tokio::test]
    async fn test_price_info_reports_change_and_resets_baseline() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Btc, dec!(100))]));
        let (pm, db) = manager(prices.clone()).await;
        pm.add("c1", dec!(2), Crypto::Btc).await.unwrap();

        prices.set(Crypto::Btc, dec!(110));
        let report = pm.price_info("c1").await.unwrap();
        assert!(report.contains("Portfolio value: 220.00 USD"));
        assert!(report.contains("Before: 200.00 USD"));
        assert!(report.contains("📈 Change: +10.0000% (20.00 USD)"));

        let holding = db.find_holding("c1", Crypto::Btc).await.unwrap().unwrap();
        assert_eq!(holding.last_price, Some(dec!(110)));

        prices.set(Crypto::Btc, dec!(99));
        let report = pm.price_info("c1").await.unwrap();
        assert!(report.contains("📉 Change: -10.0000% (-22.00 USD)"));
    }

    #[tokio::test]
    async fn test_assets_price_lists_each_asset() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Near, dec!(5))]));
        let (pm, _db) = manager(prices).await;
        assert!(pm.assets_price("c1").await.unwrap().contains("no assets"));

        pm.add("c1", dec!(10), Crypto::Near).await.unwrap();
        let listing = pm.assets_price("c1").await.unwrap();
        assert!(listing.contains("NEAR"));
        assert!(listing.contains("Price: 5.00 USD"));
        assert!(listing.contains("Now: 50.00 USD"));
        assert!(listing.contains("+0.0000%"));
    }

    #[tokio::test]
    async fn test_delete_asset_and_all() {
        let prices = Arc::new(StaticPrices::new([(Crypto::Btc, dec!(1)), (Crypto::Eth, dec!(1))]));
        let (pm, _db) = manager(prices).await;
        pm.add("c1", dec!(1), Crypto::Btc).await.unwrap();
        pm.add("c1", dec!(1), Crypto::Eth).await.unwrap();

        assert!(pm.delete_asset("c1", Crypto::Btc).await.unwrap().contains("removed"));
        assert!(pm.delete_asset("c1", Crypto::Btc).await.unwrap().contains("not in your portfolio"));
        assert_eq!(pm.delete_all("c1").await.unwrap(), "✅ Removed 1 assets");
        assert!(pm.delete_all("c1").await.unwrap().contains("already empty"));
    }
}
