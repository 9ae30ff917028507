use dotenv::dotenv;
use tidetrader_core::broker::FeeSchedule;
use tidetrader_core::risk::RiskConfig;

pub struct Config {
    pub database_url: String,
    pub initial_cash: f64,
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub max_trade_notional_pct: f64,
    pub max_symbol_exposure_pct: f64,
    pub soft_drawdown_pct: f64,
    pub hard_drawdown_pct: f64,
    pub upstream_timeout_s: u64,
    pub llm_timeout_s: u64,
    pub shutdown_grace_s: u64,
    pub llm_enabled: bool,
    pub llm_model: String,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/tidetrader.db?mode=rwc".to_string()),
            initial_cash: env_parse("INITIAL_CASH", 10_000.0),
            fee_bps: env_parse("FEE_BPS", 10.0),
            slippage_bps: env_parse("SLIPPAGE_BPS", 5.0),
            max_trade_notional_pct: env_parse("MAX_TRADE_NOTIONAL_PCT", 5.0),
            max_symbol_exposure_pct: env_parse("MAX_SYMBOL_EXPOSURE_PCT", 25.0),
            soft_drawdown_pct: env_parse("SOFT_DRAWDOWN_PCT", 10.0),
            hard_drawdown_pct: env_parse("HARD_DRAWDOWN_PCT", 20.0),
            upstream_timeout_s: env_parse("UPSTREAM_TIMEOUT_S", 10),
            llm_timeout_s: env_parse("LLM_TIMEOUT_S", 15),
            shutdown_grace_s: env_parse("SHUTDOWN_GRACE_S", 30),
            llm_enabled: env_parse("LLM_ENABLED", false),
            llm_model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
            llm_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            llm_api_key: std::env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            fred_api_key: std::env::var("FRED_API_KEY").ok().filter(|k| !k.is_empty()),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            fee_bps: self.fee_bps,
            slippage_bps: self.slippage_bps,
        }
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            max_trade_notional_pct: self.max_trade_notional_pct,
            max_symbol_exposure_pct: self.max_symbol_exposure_pct,
            soft_drawdown_pct: self.soft_drawdown_pct,
            hard_drawdown_pct: self.hard_drawdown_pct,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
