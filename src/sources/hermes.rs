//! Pyth Hermes price service source

use crate::{
    config::HermesSourceConfig,
    constants::{HERMES_LATEST_PRICE_ENDPOINT, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::PriceSource,
    types::{scale, PriceObservation},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct HermesPriceUpdate {
    id: String,
    price: HermesPrice,
}

#[derive(Debug, Deserialize)]
struct HermesPrice {
    price: String,
    conf: String,
    expo: i32,
    publish_time: i64,
}

#[derive(Debug, Deserialize)]
struct HermesMessage {
    #[serde(default)]
    parsed: Vec<HermesPriceUpdate>,
}

/// Polls the latest price update for one feed from Hermes
pub struct HermesSource {
    client: Client,
    config: HermesSourceConfig,
}

impl HermesSource {
    /// Creates a new Hermes source
    pub fn new(config: HermesSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        Ok(Self { client, config })
    }

    fn build_url(&self) -> String {
        format!(
            "{}{}",
            self.config.endpoint.trim_end_matches('/'),
            HERMES_LATEST_PRICE_ENDPOINT
        )
    }

    /// Picks our feed out of a Hermes message and applies the age check
    fn evaluate(
        &self,
        message: HermesMessage,
        now: DateTime<Utc>,
    ) -> Result<PriceObservation, SourceError> {
        let wanted = normalize_feed_id(&self.config.feed_id);
        let update = message
            .parsed
            .into_iter()
            .find(|u| normalize_feed_id(&u.id) == wanted)
            .ok_or_else(|| SourceError::unavailable("no price data"))?;

        let age_secs = (now.timestamp() - update.price.publish_time).unsigned_abs();
        let max_age_secs = self.config.max_age.as_secs();
        if age_secs > max_age_secs {
            return Err(SourceError::Stale {
                age_secs,
                max_age_secs,
            });
        }

        let mantissa = update.price.price.parse::<i64>().map_err(|e| {
            SourceError::InvalidResponse(format!(
                "bad price mantissa {:?}: {}",
                update.price.price, e
            ))
        })?;
        let conf = update.price.conf.parse::<u64>().map_err(|e| {
            SourceError::InvalidResponse(format!("bad confidence {:?}: {}", update.price.conf, e))
        })?;

        Ok(PriceObservation::from_mantissa(mantissa, update.price.expo)
            .with_confidence(scale(conf as i64, update.price.expo))
            .with_published_at(DateTime::from_timestamp(update.price.publish_time, 0)))
    }
}

/// Hermes answers with bare lowercase hex ids
fn normalize_feed_id(id: &str) -> String {
    id.trim_start_matches("0x").to_ascii_lowercase()
}

#[async_trait]
impl PriceSource for HermesSource {
    async fn fetch(&self) -> Result<PriceObservation, SourceError> {
        let url = self.build_url();
        tracing::debug!(url = %url, feed_id = %self.config.feed_id, "Fetching price from Hermes");

        let response = self
            .client
            .get(&url)
            .query(&[("ids[]", self.config.feed_id.as_str()), ("parsed", "true")])
            .send()
            .await
            .map_err(SourceError::NetworkError)?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status()));
        }

        let response_text = response.text().await.map_err(SourceError::NetworkError)?;
        let message: HermesMessage = serde_json::from_str(&response_text).map_err(|e| {
            SourceError::InvalidResponse(format!("Failed to parse Hermes response: {}", e))
        })?;

        self.evaluate(message, Utc::now())
    }

    fn source_name(&self) -> &'static str {
        "hermes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const FEED: &str = "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";

    fn source() -> HermesSource {
        HermesSource::new(HermesSourceConfig {
            endpoint: "http://localhost".to_string(),
            feed_id: FEED.to_string(),
            max_age: Duration::from_secs(60),
        })
        .unwrap()
    }

    fn message(publish_time: i64) -> HermesMessage {
        let body = serde_json::json!({
            "binary": { "encoding": "hex", "data": [] },
            "parsed": [{
                "id": FEED,
                "price": {
                    "price": "14237000000",
                    "conf": "1500000",
                    "expo": -8,
                    "publish_time": publish_time
                },
                "ema_price": {
                    "price": "14200000000",
                    "conf": "1400000",
                    "expo": -8,
                    "publish_time": publish_time
                }
            }]
        });
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_fresh_price_is_scaled() {
        let now = Utc::now();
        let obs = source()
            .evaluate(message(now.timestamp() - 10), now)
            .unwrap();
        assert!((obs.price - 142.37).abs() < 1e-9);
        assert!((obs.confidence.unwrap() - 0.015).abs() < 1e-12);
        assert_eq!(obs.expo, Some(-8));
    }

    #[test]
    fn test_old_price_is_stale() {
        let now = Utc::now();
        let err = source()
            .evaluate(message(now.timestamp() - 90), now)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Stale);
        assert!(err.to_string().starts_with("price too old"));
    }

    #[test]
    fn test_age_bound_is_inclusive() {
        let now = Utc::now();
        assert!(source().evaluate(message(now.timestamp() - 60), now).is_ok());
    }

    #[test]
    fn test_empty_feed_list_is_unavailable() {
        let err = source()
            .evaluate(HermesMessage { parsed: vec![] }, Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.to_string(), "no price data");
    }

    #[test]
    fn test_feed_id_prefix_is_ignored() {
        assert_eq!(normalize_feed_id(&format!("0x{}", FEED.to_uppercase())), FEED);
    }
}
