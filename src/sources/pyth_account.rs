//! On-chain Pyth price account source
//!
//! Reads the raw price account through Solana JSON-RPC `getAccountInfo` and
//! decodes the fixed-size header of a Pyth v2 price account.

use crate::{
    config::AccountSourceConfig,
    constants::{REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::SourceError,
    source::PriceSource,
    types::{scale, PriceObservation, TradingStatus},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use borsh::{BorshDeserialize, BorshSerialize};
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub(crate) const PYTH_MAGIC: u32 = 0xa1b2_c3d4;
pub(crate) const PYTH_VERSION: u32 = 2;
pub(crate) const PYTH_ACCOUNT_TYPE_PRICE: u32 = 3;

/// Size of the price account header up to and including the aggregate
pub const PRICE_ACCOUNT_HEADER_LEN: usize = 240;

#[allow(dead_code)]
#[derive(Debug, Clone, Default, BorshSerialize, BorshDeserialize)]
pub(crate) struct Rational {
    pub val: i64,
    pub numer: i64,
    pub denom: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, BorshSerialize, BorshDeserialize)]
pub(crate) struct PriceInfo {
    pub price: i64,
    pub conf: u64,
    pub status: u32,
    pub corp_act: u32,
    pub pub_slot: u64,
}

/// Leading 240 bytes of a Pyth v2 price account (little endian)
#[allow(dead_code)]
#[derive(Debug, Clone, Default, BorshSerialize, BorshDeserialize)]
pub(crate) struct PriceAccountHeader {
    pub magic: u32,
    pub ver: u32,
    pub atype: u32,
    pub size: u32,
    pub ptype: u32,
    pub expo: i32,
    pub num: u32,
    pub num_qt: u32,
    pub last_slot: u64,
    pub valid_slot: u64,
    pub ema_price: Rational,
    pub ema_conf: Rational,
    pub timestamp: i64,
    pub min_pub: u8,
    pub drv2: u8,
    pub drv3: u16,
    pub drv4: u32,
    pub prod: [u8; 32],
    pub next: [u8; 32],
    pub prev_slot: u64,
    pub prev_price: i64,
    pub prev_conf: u64,
    pub prev_timestamp: i64,
    pub agg: PriceInfo,
}

impl PriceAccountHeader {
    /// Decodes and validates the header from raw account data
    pub(crate) fn decode(data: &[u8]) -> Result<Self, SourceError> {
        if data.len() < PRICE_ACCOUNT_HEADER_LEN {
            return Err(SourceError::decode(format!(
                "account data too short: {} bytes, need {}",
                data.len(),
                PRICE_ACCOUNT_HEADER_LEN
            )));
        }

        let mut slice = data;
        let header = Self::deserialize(&mut slice)
            .map_err(|e| SourceError::decode(format!("bad price account: {}", e)))?;

        if header.magic != PYTH_MAGIC {
            return Err(SourceError::decode(format!(
                "not a Pyth account (magic {:#010x})",
                header.magic
            )));
        }
        if header.ver != PYTH_VERSION {
            return Err(SourceError::decode(format!(
                "unsupported Pyth account version {}",
                header.ver
            )));
        }
        if header.atype != PYTH_ACCOUNT_TYPE_PRICE {
            return Err(SourceError::decode(format!(
                "not a price account (type {})",
                header.atype
            )));
        }

        Ok(header)
    }

    pub(crate) fn status(&self) -> TradingStatus {
        TradingStatus::from_u32(self.agg.status)
    }

    /// Converts the aggregate into an observation, refusing non-trading prices
    pub(crate) fn into_observation(self) -> Result<PriceObservation, SourceError> {
        let status = self.status();
        if status != TradingStatus::Trading {
            return Err(SourceError::NotTrading(status));
        }

        Ok(PriceObservation::from_mantissa(self.agg.price, self.expo)
            .with_confidence(scale(self.agg.conf as i64, self.expo))
            .with_block_id(self.agg.pub_slot)
            .with_published_at(DateTime::from_timestamp(self.timestamp, 0)))
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<RpcAccount>,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    /// `[payload, encoding]`
    data: (String, String),
}

/// Pyth price account source
pub struct PythAccountSource {
    client: Client,
    config: AccountSourceConfig,
}

impl PythAccountSource {
    /// Creates a new on-chain account source
    pub fn new(config: AccountSourceConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::NetworkError)?;

        Ok(Self { client, config })
    }

    /// Fetches the raw account bytes; `None` when the account does not exist
    async fn get_account_data(&self) -> Result<Option<Vec<u8>>, SourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [
                self.config.price_account.to_string(),
                { "encoding": "base64", "commitment": "confirmed" }
            ]
        });

        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(SourceError::NetworkError)?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status()));
        }

        let response_text = response.text().await.map_err(SourceError::NetworkError)?;
        let rpc: RpcResponse<AccountInfoResult> =
            serde_json::from_str(&response_text).map_err(|e| {
                SourceError::InvalidResponse(format!("Failed to parse RPC response: {}", e))
            })?;

        if let Some(err) = rpc.error {
            return Err(SourceError::ApiError(format!(
                "RPC error {}: {}",
                err.code, err.message
            )));
        }

        let account = match rpc.result.and_then(|r| r.value) {
            Some(account) => account,
            None => return Ok(None),
        };

        let (payload, encoding) = account.data;
        if encoding != "base64" {
            return Err(SourceError::InvalidResponse(format!(
                "unexpected account encoding {}",
                encoding
            )));
        }

        BASE64
            .decode(payload)
            .map(Some)
            .map_err(|e| SourceError::decode(format!("bad base64 account data: {}", e)))
    }
}

#[async_trait]
impl PriceSource for PythAccountSource {
    async fn fetch(&self) -> Result<PriceObservation, SourceError> {
        tracing::debug!(
            rpc_url = %self.config.rpc_url,
            account = %self.config.price_account,
            "Fetching Pyth price account"
        );

        let data = self
            .get_account_data()
            .await?
            .ok_or_else(|| SourceError::unavailable("price account not found"))?;

        PriceAccountHeader::decode(&data)?.into_observation()
    }

    fn source_name(&self) -> &'static str {
        "pyth-account"
    }
}
