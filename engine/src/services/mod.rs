//! Engine services: broker, advisory model, notifications, admin surface

pub mod admin;
pub mod broker;
pub mod llm;
pub mod notifier;

pub use admin::AdminService;
pub use broker::{ExecutionRoute, LiveRoute, PaperBroker, PaperRoute, PriceFeed};
pub use llm::AdvisoryClient;
pub use notifier::Notifier;
