//! Collection layout for the state store
//!
//! One plan drives both the SQLite tables used at runtime and the MongoDB
//! bootstrap script for deployments backed by a document store.

use crate::config::DatabaseConfig;

pub const NOTIFICATIONS: &str = "notifications";
pub const PORTFOLIOS: &str = "portfolios";
pub const USERS: &str = "users";
pub const ADMINS: &str = "admins";
pub const TRACKED_CURRENCIES: &str = "TrackedCryptoCurrencies";

/// Roles granted to the application user on its own database
pub const APP_ROLES: [&str; 2] = ["readWrite", "dbAdmin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    ddl: &'static str,
}

/// Unique index on a single document field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: &'static str,
    /// Field name as stored in the document
    pub field: &'static str,
    /// Backing SQLite column
    pub column: &'static str,
}

impl IndexSpec {
    pub fn name(&self) -> String {
        format!("{}_{}_unique", self.collection, self.field)
    }
}

#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub database: String,
    pub app_user: String,
    app_password: String,
    pub collections: Vec<CollectionSpec>,
    pub indexes: Vec<IndexSpec>,
}

const NOTIFICATIONS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    crypto TEXT NOT NULL,
    fiat TEXT NOT NULL,
    threshold_type TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    upper_boundary TEXT,
    lower_boundary TEXT,
    start_price TEXT NOT NULL,
    start_timestamp INTEGER NOT NULL,
    trigger_timestamp INTEGER,
    up_percent TEXT,
    down_percent TEXT,
    start_ema TEXT,
    current_ema TEXT,
    is_above INTEGER,
    last_event_ts INTEGER
)"#;

const PORTFOLIOS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS portfolios (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    crypto TEXT NOT NULL,
    count TEXT NOT NULL,
    last_price TEXT,
    last_price_ts INTEGER,
    updated_at INTEGER NOT NULL
)"#;

/// One holding per asset per chat. SQLite only, the Mongo script keeps its
/// single-field indexes.
const PORTFOLIO_HOLDING_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS portfolios_chat_crypto_unique ON portfolios (chat_id, crypto)";

const USERS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    telegram_id TEXT NOT NULL,
    has_started INTEGER NOT NULL DEFAULT 0,
    current_crypto TEXT NOT NULL DEFAULT 'BTC',
    current_fiat TEXT NOT NULL DEFAULT 'USD',
    created_at INTEGER NOT NULL
)"#;

const ADMINS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    api_key_hash TEXT NOT NULL,
    api_key_expiry INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    deactivated_at INTEGER
)"#;

const TRACKED_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS TrackedCryptoCurrencies (
    symbol TEXT PRIMARY KEY,
    last_price TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)"#;

impl SchemaPlan {
    pub fn for_config(config: &DatabaseConfig) -> Self {
        let mut collections = vec![
            CollectionSpec { name: NOTIFICATIONS, ddl: NOTIFICATIONS_DDL },
            CollectionSpec { name: PORTFOLIOS, ddl: PORTFOLIOS_DDL },
            CollectionSpec { name: USERS, ddl: USERS_DDL },
            CollectionSpec { name: ADMINS, ddl: ADMINS_DDL },
        ];
        if config.tracked_currencies_collection {
            collections.push(CollectionSpec { name: TRACKED_CURRENCIES, ddl: TRACKED_DDL });
        }

        let mut indexes = vec![IndexSpec {
            collection: ADMINS,
            field: "username",
            column: "username",
        }];
        if config.unique_telegram_id {
            indexes.push(IndexSpec {
                collection: USERS,
                field: "telegramId",
                column: "telegram_id",
            });
        }

        Self {
            database: config.name.clone(),
            app_user: config.app_user.clone(),
            app_password: config.app_password.clone(),
            collections,
            indexes,
        }
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.iter().any(|c| c.name == name)
    }

    pub fn collection_names(&self) -> Vec<&'static str> {
        self.collections.iter().map(|c| c.name).collect()
    }

    /// Idempotent statements that materialize the plan in SQLite
    pub fn sqlite_statements(&self) -> Vec<String> {
        let mut statements: Vec<String> =
            self.collections.iter().map(|c| c.ddl.trim().to_string()).collect();
        for index in &self.indexes {
            statements.push(format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                index.name(),
                index.collection,
                index.column
            ));
        }
        if self.has_collection(PORTFOLIOS) {
            statements.push(PORTFOLIO_HOLDING_INDEX.to_string());
        }
        statements
    }

    /// MongoDB shell script creating the database, app user, collections
    /// and unique indexes
    pub fn mongo_script(&self) -> String {
        let db = js_string(&self.database);
        let mut script = format!("db = db.getSiblingDB({});\n\n", db);

        let roles = APP_ROLES
            .iter()
            .map(|role| format!("    {{ role: {}, db: {} }}", js_string(role), db))
            .collect::<Vec<_>>()
            .join(",\n");
        script.push_str(&format!(
            "db.createUser({{\n  user: {},\n  pwd: {},\n  roles: [\n{}\n  ]\n}});\n\n",
            js_string(&self.app_user),
            js_string(&self.app_password),
            roles
        ));

        for collection in &self.collections {
            script.push_str(&format!("db.createCollection({});\n", js_string(collection.name)));
        }
        script.push('\n');

        for index in &self.indexes {
            script.push_str(&format!(
                "db.getCollection({}).createIndex({{ {}: 1 }}, {{ unique: true }});\n",
                js_string(index.collection),
                js_string(index.field)
            ));
        }
        script
    }
}

/// Quote a value as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
