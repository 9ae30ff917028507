//! `SeaORM` entities for the embedded store

pub mod account;
pub mod positions;
pub mod price_bars;
pub mod run_logs;
pub mod signals;
pub mod strategies;
pub mod trace_steps;
pub mod trades;
pub mod watched_instruments;
