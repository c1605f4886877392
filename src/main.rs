//! BitBotX
//!
//! Telegram crypto price bot: alerts, portfolios and prices over a Kafka
//! pipeline.

use bitbot::{
    admin::AdminService,
    alerts::AlertService,
    bus::Bus,
    config::{Config, DatabaseConfig},
    evaluator::Evaluator,
    ingester::{ChatCommandHandler, IngestConsumer, OutgoingHandler, PriceEventHandler, PriceTicker, RecordHandler},
    market::{BingxClient, CryptoInformation, HttpRateSource, PriceSource, RateSource},
    monitor::{start_server, MonitorState},
    notify::{BusMessenger, Dispatcher, Messenger, RecentMessages},
    portfolio::PortfolioManager,
    storage::{Database, SchemaPlan},
    telegram::{CommandProcessor, TelegramClient, UpdatePoller},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const RATE_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEDUP_CAPACITY: usize = 10_000;

#[derive(Parser)]
#[command(name = "bitbot")]
#[command(about = "Telegram crypto price bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every consumer, the update poller, the price ticker and the HTTP server
    Run,
    /// Print the MongoDB bootstrap script for BitBotDB
    InitScript,
    /// Create the schema in the configured store
    Bootstrap,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitScript => {
            // Only the database section matters here; a missing bot token is fine
            let database = match Config::load(&cli.config) {
                Ok(config) => config.database,
                Err(_) => DatabaseConfig::default(),
            };
            println!("{}", SchemaPlan::for_config(&database).mongo_script());
            Ok(())
        }
        Commands::Bootstrap => {
            let config = Config::load(&cli.config)?;
            init_logging(&config.logging.level);
            bootstrap(config).await
        }
        Commands::Run => {
            let config = Config::load(&cli.config)?;
            init_logging(&config.logging.level);
            run_bot(config).await
        }
    }
}

async fn bootstrap(config: Config) -> anyhow::Result<()> {
    let plan = SchemaPlan::for_config(&config.database);
    let db = Database::connect(&config.database_path(), plan).await?;
    let collections = db.collections().await?;
    tracing::info!("✅ {} ready: {}", config.database.name, collections.join(", "));
    Ok(())
}

fn spawn_consumer(
    consumer: Arc<IngestConsumer>,
    bus: Bus,
    topic: String,
    group: String,
    handler: Arc<dyn RecordHandler>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match bus.source(&topic, &group).await {
            Ok(source) => consumer.run(source, handler, shutdown).await,
            Err(e) => tracing::error!("❌ Cannot subscribe to {} as {}: {}", topic, group, e),
        }
    })
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting BitBotX");

    let db = Database::connect(&config.database_path(), SchemaPlan::for_config(&config.database)).await?;
    let bus = Bus::from_config(&config.kafka);
    let sink = bus.sink().await?;
    tracing::info!("📨 Message bus: {}", bus.name());

    let prices: Arc<dyn PriceSource> = Arc::new(BingxClient::new(&config.bingx)?);
    let rates: Arc<dyn RateSource> = Arc::new(HttpRateSource::new(&config.currency_api.url, RATE_CACHE_TTL));
    let info = Arc::new(CryptoInformation::new(prices.clone(), rates.clone()));

    let admin = Arc::new(AdminService::new(db.clone(), config.admin.clone()));
    let telegram = TelegramClient::new(&config.telegram)?;
    let replies: Arc<dyn Messenger> = Arc::new(BusMessenger::new(sink.clone(), config.kafka.outgoing_topic.clone()));

    let processor = Arc::new(CommandProcessor::new(
        db.clone(),
        info.clone(),
        AlertService::new(db.clone(), info.clone(), config.alerts.clone()),
        PortfolioManager::new(db.clone(), info.clone()),
        admin.clone(),
    ));
    let chat_handler: Arc<dyn RecordHandler> = Arc::new(ChatCommandHandler::new(processor, replies.clone()));
    let price_handler: Arc<dyn RecordHandler> = Arc::new(PriceEventHandler::new(
        Evaluator::new(db.clone(), rates, config.alerts.ema_smoothing),
        Dispatcher::new(db.clone(), replies),
    ));
    let outgoing_handler: Arc<dyn RecordHandler> = Arc::new(OutgoingHandler::new(
        Arc::new(telegram.clone()),
        RecentMessages::new(Duration::from_secs(config.alerts.dedup_ttl_secs), DEDUP_CAPACITY),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = Arc::new(IngestConsumer::new(
        config.kafka.workers,
        Duration::from_millis(config.kafka.idle_backoff_ms),
    ));

    let mut tasks = vec![
        spawn_consumer(
            consumer.clone(),
            bus.clone(),
            config.kafka.incoming_topic.clone(),
            config.kafka.group_for("incoming"),
            chat_handler,
            shutdown_rx.clone(),
        ),
        spawn_consumer(
            consumer.clone(),
            bus.clone(),
            config.kafka.price_topic.clone(),
            config.kafka.group_for("prices"),
            price_handler,
            shutdown_rx.clone(),
        ),
        spawn_consumer(
            consumer,
            bus.clone(),
            config.kafka.outgoing_topic.clone(),
            config.kafka.group_for("outgoing"),
            outgoing_handler,
            shutdown_rx.clone(),
        ),
    ];

    let poller = UpdatePoller::new(telegram, sink.clone(), config.kafka.incoming_topic.clone());
    tasks.push(tokio::spawn(poller.run(shutdown_rx.clone())));

    let ticker = PriceTicker::new(
        db.clone(),
        prices,
        sink,
        config.kafka.price_topic.clone(),
        Duration::from_secs(config.alerts.check_interval_secs),
    );
    tasks.push(tokio::spawn(ticker.run(shutdown_rx.clone())));

    if config.server.enabled {
        let state = Arc::new(MonitorState::new(db.clone(), bus.clone(), admin));
        let server_config = config.server.clone();
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = start_server(&server_config, state, rx).await {
                tracing::error!("❌ HTTP server failed: {}", e);
            }
        }));
    }

    tracing::info!("✅ BitBotX running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutdown requested");
    let _ = shutdown_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("❌ Task ended abnormally: {}", e);
        }
    }
    tracing::info!("👋 BitBotX stopped");
    Ok(())
}
