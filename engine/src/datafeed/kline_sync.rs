//! Kline history store with incremental sync
//!
//! Bars are persisted in `price_bars`. The first request for a
//! (symbol, timeframe) backfills provider history up to a per-timeframe
//! cap; afterwards only bars newer than the highest stored open_time are
//! fetched, at most once per sync interval. Reads always serve from the
//! local store; a direct provider fetch is only used when the store is
//! empty and marked as such in the response.

use super::collectors::binance::{BinanceCollector, MAX_KLINE_LIMIT};
use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use shared::entity::price_bars;
use shared::models::{price_bar, price_bar_model};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tidetrader_core::data::{BarSeries, Timeframe};
use tidetrader_core::strategy::{KlineSource, KlineWindow};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Incremental syncs run at most this often per (symbol, timeframe)
const SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Pause between backfill pages, for provider rate limits
const BACKFILL_PAUSE: Duration = Duration::from_millis(300);

/// First-sync history caps per timeframe
fn initial_lookback(timeframe: Timeframe) -> usize {
    match timeframe {
        Timeframe::M1 => 1_440,
        Timeframe::M5 => 2_016,
        Timeframe::M15 => 2_016,
        Timeframe::H1 => 2_000,
        Timeframe::H4 => 2_000,
        Timeframe::D1 => 1_095,
    }
}

pub struct KlineStore {
    db: DatabaseConnection,
    binance: BinanceCollector,
    last_sync: Mutex<HashMap<(String, Timeframe), Instant>>,
}

impl KlineStore {
    pub fn new(db: DatabaseConnection, binance: BinanceCollector) -> Self {
        Self {
            db,
            binance,
            last_sync: Mutex::new(HashMap::new()),
        }
    }

    /// Newest `limit` bars, oldest first
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<KlineWindow> {
        if let Err(err) = self.sync_if_due(symbol, timeframe).await {
            warn!(symbol, timeframe = %timeframe, error = %err, "kline sync failed, serving local bars");
        }

        let stored = price_bars::Entity::find()
            .filter(price_bars::Column::Symbol.eq(symbol))
            .filter(price_bars::Column::Timeframe.eq(timeframe.as_str()))
            .order_by_desc(price_bars::Column::OpenTime)
            .limit(limit as u64)
            .all(&self.db)
            .await?;

        if !stored.is_empty() {
            let mut bars: Vec<_> = stored.iter().map(price_bar).collect();
            bars.reverse();
            return Ok(KlineWindow {
                series: BarSeries::from_vec(bars),
                source: KlineSource::Local,
            });
        }

        // Empty store and a failed sync: last resort is a live fetch
        let live = self.binance.klines(symbol, timeframe, None, limit).await?;
        Ok(KlineWindow {
            series: BarSeries::from_vec(live),
            source: KlineSource::ProviderLive,
        })
    }

    /// Incrementally sync every (symbol, timeframe) pair, strictly serial
    /// to stay inside provider rate limits
    pub async fn sync_all(&self, symbols: &[String], timeframes: &[Timeframe]) {
        let mut new_bars = 0;
        for symbol in symbols {
            for &timeframe in timeframes {
                match self.sync_if_due(symbol, timeframe).await {
                    Ok(n) => new_bars += n,
                    Err(err) => {
                        warn!(symbol, timeframe = %timeframe, error = %err, "kline sync failed")
                    }
                }
            }
        }
        if new_bars > 0 {
            info!(new_bars, "kline incremental sync complete");
        }
    }

    async fn sync_if_due(&self, symbol: &str, timeframe: Timeframe) -> Result<usize> {
        {
            let mut last = self.last_sync.lock().await;
            let key = (symbol.to_string(), timeframe);
            if let Some(at) = last.get(&key) {
                if at.elapsed() < SYNC_INTERVAL {
                    return Ok(0);
                }
            }
            last.insert(key, Instant::now());
        }
        self.sync(symbol, timeframe).await
    }

    async fn sync(&self, symbol: &str, timeframe: Timeframe) -> Result<usize> {
        let newest = price_bars::Entity::find()
            .filter(price_bars::Column::Symbol.eq(symbol))
            .filter(price_bars::Column::Timeframe.eq(timeframe.as_str()))
            .order_by_desc(price_bars::Column::OpenTime)
            .one(&self.db)
            .await?;

        let mut start_ms = match &newest {
            // Re-request the newest stored bar: it may have been open when
            // written and the upsert finalizes it
            Some(bar) => bar.open_time.timestamp_millis(),
            None => {
                let lookback = initial_lookback(timeframe) as i64;
                Utc::now().timestamp_millis() - lookback * timeframe.millis()
            }
        };
        if newest.is_none() {
            debug!(symbol, timeframe = %timeframe, "first sync, backfilling history");
        }

        let mut inserted = 0;
        loop {
            let batch = self
                .binance
                .klines(symbol, timeframe, Some(start_ms), MAX_KLINE_LIMIT)
                .await?;
            if batch.is_empty() {
                break;
            }

            let models: Vec<price_bars::ActiveModel> = batch
                .iter()
                .map(|bar| price_bar_model(symbol, timeframe, bar))
                .collect();
            price_bars::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        price_bars::Column::Symbol,
                        price_bars::Column::Timeframe,
                        price_bars::Column::OpenTime,
                    ])
                    .update_columns([
                        price_bars::Column::Open,
                        price_bars::Column::High,
                        price_bars::Column::Low,
                        price_bars::Column::Close,
                        price_bars::Column::Volume,
                    ])
                    .to_owned(),
                )
                .exec(&self.db)
                .await?;
            inserted += batch.len();

            let last_open = batch.last().expect("non-empty batch").open_time;
            if batch.len() < MAX_KLINE_LIMIT {
                break;
            }
            start_ms = last_open.timestamp_millis() + timeframe.millis();
            tokio::time::sleep(BACKFILL_PAUSE).await;
        }

        Ok(inserted)
    }
}
