//! Advisory model client (OpenRouter-compatible chat API)
//!
//! Best-effort enrichment for the macro evaluator: the scored indicator
//! table plus a market snapshot go in, a short qualitative summary comes
//! back. The reply is never allowed to change a decision; failures and
//! timeouts degrade to no enrichment.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidetrader_core::strategy::{Advisor, AdvisoryRequest};

const SYSTEM_PROMPT: &str = "You are a macroeconomic analyst covering cryptocurrency markets. \
You receive a table of scored macro indicators and a market snapshot. \
Reply with a single short paragraph of plain text summarizing the macro backdrop. \
No markdown, no headings, no trading instructions.";

/// Replies are clipped before landing in the decision reason
const MAX_SUMMARY_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl AdvisoryClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            api_key,
            model,
            base_url,
            client,
        })
    }

    fn build_prompt(request: &AdvisoryRequest) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Asset: {}", request.symbol));
        if let Some(price) = request.price {
            lines.push(format!("Spot price: ${:.2}", price));
        }
        if let Some(change) = request.change_24h_pct {
            lines.push(format!("24h change: {:+.2}%", change));
        }
        if let Some(fg) = request.fear_greed {
            lines.push(format!("Fear & Greed: {}/100", fg));
        }
        lines.push("Scored indicators (score x weight):".to_string());
        for row in &request.scored {
            lines.push(format!(
                "- {}: {} (score {:+}, weight {}{})",
                row.name,
                row.display,
                row.score,
                row.weight,
                if row.available { "" } else { ", unavailable" },
            ));
        }
        lines.push("Summarize the macro backdrop in one short paragraph.".to_string());
        lines.join("\n")
    }
}

#[async_trait]
impl Advisor for AdvisoryClient {
    async fn advise(&self, request: &AdvisoryRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(request),
                },
            ],
            temperature: 0.7,
            max_tokens: 512,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response: ChatResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("advisory reply has no choices"))?;

        Ok(clean_summary(&content))
    }
}

/// Strip code fences and clip; models occasionally ignore the plain-text
/// instruction
fn clean_summary(content: &str) -> String {
    let trimmed = content
        .trim()
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let mut summary: String = trimmed.chars().take(MAX_SUMMARY_CHARS).collect();
    if trimmed.chars().count() > MAX_SUMMARY_CHARS {
        summary.push('…');
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidetrader_core::strategy::ScoredIndicator;

    #[test]
    fn test_prompt_lists_rows() {
        let request = AdvisoryRequest {
            symbol: "BTC".into(),
            price: Some(95_000.0),
            change_24h_pct: Some(-1.3),
            fear_greed: Some(22),
            scored: vec![ScoredIndicator {
                name: "dxy".into(),
                display: "DXY 96.1".into(),
                score: 1,
                weight: 1,
                available: true,
            }],
        };
        let prompt = AdvisoryClient::build_prompt(&request);
        assert!(prompt.contains("Asset: BTC"));
        assert!(prompt.contains("DXY 96.1"));
        assert!(prompt.contains("Fear & Greed: 22/100"));
    }

    #[test]
    fn test_clean_summary_strips_fences() {
        assert_eq!(clean_summary("```\nrisk-on\n```"), "risk-on");
        let long = "a".repeat(500);
        assert_eq!(clean_summary(&long).chars().count(), MAX_SUMMARY_CHARS + 1);
    }
}
