//! Jupiter price API source

use crate::{
    config::JupiterSourceConfig,
    constants::{REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::PriceSource,
    types::PriceObservation,
};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Jupiter price v3 response: mint -> quote (null for unpriced mints)
#[derive(Debug, Deserialize)]
struct JupiterResponse(HashMap<String, Option<JupiterQuote>>);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterQuote {
    usd_price: f64,
    #[serde(default)]
    decimals: Option<u32>,
    #[serde(default)]
    block_id: Option<u64>,
    #[serde(default)]
    price_change_24h: Option<f64>,
}

/// Jupiter price source
pub struct JupiterSource {
    client: Client,
    config: JupiterSourceConfig,
}

impl JupiterSource {
    /// Creates a new Jupiter source
    pub fn new(config: JupiterSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        Ok(Self { client, config })
    }

    fn parse_response(&self, response_text: &str) -> Result<PriceObservation, SourceError> {
        let mut response: JupiterResponse = serde_json::from_str(response_text).map_err(|e| {
            SourceError::InvalidResponse(format!("Failed to parse Jupiter response: {}", e))
        })?;

        let quote = response
            .0
            .remove(&self.config.mint)
            .flatten()
            .ok_or_else(|| SourceError::unavailable("price not available"))?;

        let mut observation =
            PriceObservation::new(quote.usd_price).with_change(quote.price_change_24h);
        if let Some(decimals) = quote.decimals {
            observation = observation.with_decimals(decimals);
        }
        if let Some(block_id) = quote.block_id {
            observation = observation.with_block_id(block_id);
        }
        Ok(observation)
    }
}

#[async_trait]
impl PriceSource for JupiterSource {
    async fn fetch(&self) -> Result<PriceObservation, SourceError> {
        tracing::debug!(url = %self.config.endpoint, mint = %self.config.mint, "Fetching price from Jupiter");

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("ids", self.config.mint.as_str())])
            .header(ACCEPT, "application/json")
            .header("x-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(SourceError::NetworkError)?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status()));
        }

        let response_text = response.text().await.map_err(SourceError::NetworkError)?;
        self.parse_response(&response_text)
    }

    fn source_name(&self) -> &'static str {
        "jupiter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::SOL_MINT, error::ErrorKind};

    fn source() -> JupiterSource {
        JupiterSource::new(JupiterSourceConfig {
            endpoint: "http://localhost/price/v3".to_string(),
            mint: SOL_MINT.to_string(),
            api_key: "test-key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_exposes_all_fields() {
        let body = serde_json::json!({
            SOL_MINT: {
                "usdPrice": 142.371234,
                "blockId": 348_004_023u64,
                "decimals": 9,
                "priceChange24h": -1.25
            }
        })
        .to_string();

        let obs = source().parse_response(&body).unwrap();
        assert_eq!(obs.price, 142.371234);
        assert_eq!(obs.decimals, Some(9));
        assert_eq!(obs.block_id, Some(348_004_023));
        assert_eq!(obs.price_change_24h, Some(-1.25));
        assert_eq!(obs.display_price(), "142.371234000");
    }

    #[test]
    fn test_missing_mint_is_unavailable() {
        let err = source().parse_response("{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.to_string(), "price not available");
    }

    #[test]
    fn test_null_quote_is_unavailable() {
        let body = serde_json::json!({ SOL_MINT: null }).to_string();
        let err = source().parse_response(&body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = source().parse_response("<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
