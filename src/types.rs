//! Types for the SOL/USD price pollers

use crate::constants::MAX_DISPLAY_DECIMALS;
use crate::error::{ErrorKind, SourceError};
use crate::movement::PriceMovement;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate status of an on-chain Pyth price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingStatus {
    /// Status not known (or not a recognised value)
    Unknown,
    /// Price is valid and tradable
    Trading,
    /// Trading halted
    Halted,
    /// Auction in progress
    Auction,
    /// Price ignored by the aggregator
    Ignored,
}

impl TradingStatus {
    /// Maps the on-chain status word
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => TradingStatus::Trading,
            2 => TradingStatus::Halted,
            3 => TradingStatus::Auction,
            4 => TradingStatus::Ignored,
            _ => TradingStatus::Unknown,
        }
    }

    /// Get the status name
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingStatus::Unknown => "unknown",
            TradingStatus::Trading => "trading",
            TradingStatus::Halted => "halted",
            TradingStatus::Auction => "auction",
            TradingStatus::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for TradingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single price observed from a source
///
/// Only the fields the source actually provides are set; the formatter
/// decides what to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Price in USD
    pub price: f64,

    /// Integer mantissa, for sources using mantissa/exponent encoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mantissa: Option<i64>,

    /// Base-10 exponent applied to the mantissa
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expo: Option<i32>,

    /// Display precision suggested by the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,

    /// Confidence interval in USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Slot or block id the price was published at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<u64>,

    /// 24h price change percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_24h: Option<f64>,

    /// Publisher timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// When this process observed the price
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Create an observation from an already scaled price
    pub fn new(price: f64) -> Self {
        Self {
            price,
            mantissa: None,
            expo: None,
            decimals: None,
            confidence: None,
            block_id: None,
            price_change_24h: None,
            published_at: None,
            observed_at: Utc::now(),
        }
    }

    /// Create an observation from a mantissa and base-10 exponent
    pub fn from_mantissa(mantissa: i64, expo: i32) -> Self {
        Self {
            mantissa: Some(mantissa),
            expo: Some(expo),
            ..Self::new(scale(mantissa, expo))
        }
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_block_id(mut self, block_id: u64) -> Self {
        self.block_id = Some(block_id);
        self
    }

    pub fn with_change(mut self, price_change_24h: Option<f64>) -> Self {
        self.price_change_24h = price_change_24h;
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Price formatted with the source's precision, if it gave one
    ///
    /// The precision is capped at [`MAX_DISPLAY_DECIMALS`].
    pub fn display_price(&self) -> String {
        match self.decimals {
            Some(decimals) => format!(
                "{:.*}",
                decimals.min(MAX_DISPLAY_DECIMALS) as usize,
                self.price
            ),
            None => self.price.to_string(),
        }
    }
}

/// Scales a mantissa by a power of ten
pub fn scale(value: i64, expo: i32) -> f64 {
    value as f64 * 10f64.powi(expo)
}

/// Outcome of a poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Fresh, tradable price
    Ok,
    /// Account, feed or quote missing or not tradable
    Unavailable,
    /// Price outside the freshness bound
    Stale,
    /// Transport, decode or internal failure
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Ok => "ok",
            ReportStatus::Unavailable => "unavailable",
            ReportStatus::Stale => "stale",
            ReportStatus::Error => "error",
        }
    }
}

impl From<ErrorKind> for ReportStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unavailable => ReportStatus::Unavailable,
            ErrorKind::Stale => ReportStatus::Stale,
            ErrorKind::Transport | ErrorKind::Decode | ErrorKind::Internal => ReportStatus::Error,
        }
    }
}

/// Structured record emitted once per poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    /// Name of the source that was polled
    pub source: String,

    /// Price in USD, only set when `status` is `ok`
    pub price: Option<f64>,

    pub status: ReportStatus,

    pub timestamp: DateTime<Utc>,

    /// Diagnostic for non-ok cycles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Every field the source returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PriceObservation>,

    /// Step movement since the previous ok cycle, when step tracking is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<PriceMovement>,
}

impl PriceReport {
    /// Create a report for a successful fetch
    pub fn ok(source: &str, observation: PriceObservation) -> Self {
        Self {
            source: source.to_string(),
            price: Some(observation.price),
            status: ReportStatus::Ok,
            timestamp: observation.observed_at,
            detail: None,
            quote: Some(observation),
            movement: None,
        }
    }

    /// Create a diagnostic report; never carries a price
    pub fn failed(source: &str, error: &SourceError) -> Self {
        Self {
            source: source.to_string(),
            price: None,
            status: error.kind().into(),
            timestamp: Utc::now(),
            detail: Some(error.to_string()),
            quote: None,
            movement: None,
        }
    }

    pub fn with_movement(mut self, movement: Option<PriceMovement>) -> Self {
        self.movement = movement;
        self
    }

    pub fn from_result(source: &str, result: &Result<PriceObservation, SourceError>) -> Self {
        match result {
            Ok(observation) => Self::ok(source, observation.clone()),
            Err(e) => Self::failed(source, e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReportStatus::Ok
    }
}
