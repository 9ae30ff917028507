//! Process-wide service graph
//!
//! Built in dependency order (persistence, cache, broker, scheduler) and
//! torn down in reverse by `main`.

use crate::datafeed::collectors::{BinanceCollector, UpstreamFetcher};
use crate::datafeed::{EngineMarketData, KlineStore, MarketCache, TtlTable};
use crate::scheduler::StrategyScheduler;
use crate::services::{AdminService, AdvisoryClient, Notifier, PaperBroker, PaperRoute};
use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use shared::Config;
use std::sync::Arc;
use std::time::Duration;
use tidetrader_core::strategy::Advisor;

pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub market: Arc<EngineMarketData>,
    pub broker: Arc<PaperBroker>,
    pub scheduler: Arc<StrategyScheduler>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let db = shared::get_db_connection(&config.database_url).await?;
        Migrator::up(&db, None).await?;
        tracing::info!("database migrated");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_s))
            .user_agent("tidetrader/0.3")
            .build()?;

        let fetcher = Arc::new(UpstreamFetcher::new(http.clone(), config.fred_api_key.clone()));
        let cache = Arc::new(MarketCache::new(
            fetcher,
            TtlTable::default(),
            Duration::from_secs(config.upstream_timeout_s),
        ));
        let klines = Arc::new(KlineStore::new(db.clone(), BinanceCollector::new(http)));
        let market = Arc::new(EngineMarketData::new(cache, klines.clone()));

        let broker = Arc::new(
            PaperBroker::load(
                db.clone(),
                market.clone(),
                config.fee_schedule(),
                Arc::new(PaperRoute),
                config.initial_cash,
            )
            .await?,
        );

        let notifier = Arc::new(Notifier::from_config(
            config.telegram_bot_token.clone(),
            config.telegram_chat_id,
        ));

        let advisor: Option<Arc<dyn Advisor>> = match (&config.llm_api_key, config.llm_enabled) {
            (Some(api_key), true) => Some(Arc::new(AdvisoryClient::new(
                api_key.clone(),
                config.llm_model.clone(),
                config.llm_base_url.clone(),
                config.llm_timeout_s,
            )?)),
            _ => {
                tracing::info!("advisory model disabled");
                None
            }
        };

        let scheduler = Arc::new(StrategyScheduler::new(
            db.clone(),
            market.clone(),
            klines,
            broker.clone(),
            config.risk_config(),
            notifier,
            advisor,
            Duration::from_secs(config.shutdown_grace_s),
        ));

        let admin = Arc::new(AdminService::new(
            db.clone(),
            broker.clone(),
            scheduler.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            market,
            broker,
            scheduler,
            admin,
        })
    }
}
