pub mod run_repository;
pub mod strategy_repository;

pub use run_repository::RunRepository;
pub use strategy_repository::StrategyRepository;
