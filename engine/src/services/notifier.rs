//! Telegram notifications
//!
//! Write-only sink: trade executions, risk vetoes and run failures are
//! pushed to a configured chat. Send failures are logged and swallowed;
//! notifications never affect a run's outcome.

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tidetrader_core::broker::TradeFill;
use tidetrader_core::risk::VetoReason;
use tidetrader_core::strategy::{Decision, SignalAction};
use tracing::{info, warn};

pub struct Notifier {
    telegram: Option<(Bot, ChatId)>,
}

impl Notifier {
    pub fn from_config(bot_token: Option<String>, chat_id: Option<i64>) -> Self {
        let telegram = match (bot_token, chat_id) {
            (Some(token), Some(chat)) => {
                info!("telegram notifier enabled");
                Some((Bot::new(token), ChatId(chat)))
            }
            _ => {
                info!("telegram notifier disabled (no token/chat id)");
                None
            }
        };
        Self { telegram }
    }

    pub fn is_enabled(&self) -> bool {
        self.telegram.is_some()
    }

    pub async fn notify_trade(&self, strategy_name: &str, fill: &TradeFill, decision: &Decision) {
        let mut text = format!(
            "<b>{} {}</b>\nStrategy: {}\nAmount: {:.6} @ ${:.2}\nValue: ${:.2} (fee ${:.2})\nConviction: {:.0}\n{}",
            fill.side,
            fill.symbol,
            strategy_name,
            fill.amount,
            fill.price,
            fill.value,
            fill.fee,
            decision.conviction,
            decision.reason,
        );
        if let Some(stop) = decision.stop_loss {
            text.push_str(&format!("\nStop: ${:.2}", stop));
        }
        if let Some(target) = decision.take_profit {
            text.push_str(&format!("\nTarget: ${:.2}", target));
        }
        text.push_str("\n<i>paper</i>");
        self.send(text).await;
    }

    pub async fn notify_veto(&self, strategy_name: &str, action: SignalAction, reason: VetoReason) {
        self.send(format!(
            "<b>Risk veto</b>\nStrategy: {}\nProposed: {}\nReason: {}",
            strategy_name, action, reason,
        ))
        .await;
    }

    pub async fn notify_failure(&self, strategy_name: &str, detail: &str) {
        self.send(format!(
            "<b>Run failed</b>\nStrategy: {}\n{}",
            strategy_name, detail,
        ))
        .await;
    }

    async fn send(&self, text: String) {
        let Some((bot, chat_id)) = &self.telegram else {
            return;
        };
        if let Err(err) = bot
            .send_message(*chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(error = %err, "telegram send failed");
        }
    }
}
