//! FRED macroeconomic series
//!
//! Latest values for the fed funds rate (DFF), the 10-year treasury yield
//! (DGS10) and the broad dollar index (DTWEXBGS), plus M2 (M2SL) year-over
//! -year growth computed from thirteen monthly observations.

use anyhow::{anyhow, Result};
use serde_json::Value;
use tidetrader_core::data::MacroRates;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

#[derive(Clone)]
pub struct FredCollector {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl FredCollector {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub async fn macro_rates(&self) -> Result<MacroRates> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FRED_API_KEY not configured"))?;

        let (fed_rate, treasury_10y, dxy, m2) = tokio::join!(
            self.latest_value(api_key, "DFF"),
            self.latest_value(api_key, "DGS10"),
            self.latest_value(api_key, "DTWEXBGS"),
            self.monthly_values(api_key, "M2SL", 13),
        );

        let m2_growth_yoy = m2.ok().and_then(|values| {
            let latest = *values.first()?;
            let year_ago = *values.last()?;
            if values.len() >= 13 && year_ago > 0.0 {
                Some((latest / year_ago - 1.0) * 100.0)
            } else {
                None
            }
        });

        let rates = MacroRates {
            fed_rate: fed_rate.ok(),
            treasury_10y: treasury_10y.ok(),
            dxy: dxy.ok(),
            m2_growth_yoy,
        };
        if rates.fed_rate.is_none()
            && rates.treasury_10y.is_none()
            && rates.dxy.is_none()
            && rates.m2_growth_yoy.is_none()
        {
            return Err(anyhow!("no FRED series resolved"));
        }
        Ok(rates)
    }

    async fn latest_value(&self, api_key: &str, series_id: &str) -> Result<f64> {
        // Daily series can carry "." placeholders; take a few and scan
        let values = self.observations(api_key, series_id, 7, "d").await?;
        values
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("series {} has no usable observation", series_id))
    }

    async fn monthly_values(
        &self,
        api_key: &str,
        series_id: &str,
        count: usize,
    ) -> Result<Vec<f64>> {
        self.observations(api_key, series_id, count, "m").await
    }

    /// Newest-first numeric observations, placeholders skipped
    async fn observations(
        &self,
        api_key: &str,
        series_id: &str,
        limit: usize,
        frequency: &str,
    ) -> Result<Vec<f64>> {
        let body: Value = self
            .client
            .get(BASE_URL)
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", &limit.to_string()),
                ("frequency", frequency),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let observations = body
            .get("observations")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow!("malformed FRED response for {}", series_id))?;

        Ok(observations
            .iter()
            .filter_map(|obs| obs.get("value")?.as_str()?.parse::<f64>().ok())
            .collect())
    }
}
