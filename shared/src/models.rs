//! Conversions between entities and the core domain types

use crate::entity::{positions, price_bars, strategies};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tidetrader_core::broker::PositionLot;
use tidetrader_core::data::{PriceBar, Timeframe};
use tidetrader_core::strategy::{StrategyKind, StrategySpec, StrategyStatus};

/// Parse the stored strategy row into the evaluator-facing spec
pub fn strategy_spec(model: &strategies::Model) -> Result<StrategySpec> {
    Ok(StrategySpec {
        id: model.id,
        name: model.name.clone(),
        kind: strategy_kind(model)?,
        symbol: model.symbol.clone(),
        parameters: model.parameters.clone(),
    })
}

pub fn strategy_kind(model: &strategies::Model) -> Result<StrategyKind> {
    model.kind.parse().map_err(|e: String| anyhow!(e))
}

pub fn strategy_status(model: &strategies::Model) -> Result<StrategyStatus> {
    model.status.parse().map_err(|e: String| anyhow!(e))
}

pub fn position_lot(model: &positions::Model) -> PositionLot {
    PositionLot {
        amount: model.amount,
        average_cost: model.average_cost,
        opened_at: model.opened_at,
        last_updated_at: model.last_updated_at,
    }
}

pub fn price_bar(model: &price_bars::Model) -> PriceBar {
    PriceBar {
        open_time: model.open_time,
        open: model.open,
        high: model.high,
        low: model.low,
        close: model.close,
        volume: model.volume,
    }
}

pub fn price_bar_model(
    symbol: &str,
    timeframe: Timeframe,
    bar: &PriceBar,
) -> price_bars::ActiveModel {
    use sea_orm::ActiveValue::Set;
    price_bars::ActiveModel {
        id: sea_orm::ActiveValue::NotSet,
        symbol: Set(symbol.to_string()),
        timeframe: Set(timeframe.as_str().to_string()),
        open_time: Set(bar.open_time),
        open: Set(bar.open),
        high: Set(bar.high),
        low: Set(bar.low),
        close: Set(bar.close),
        volume: Set(bar.volume),
    }
}

/// Millisecond epoch to UTC timestamp, for provider kline payloads
pub fn from_epoch_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}
