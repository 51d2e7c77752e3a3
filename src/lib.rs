//! # SOL/USD Price Feed
//!
//! Polls a single SOL/USD price source at a fixed interval and reports every
//! cycle as a structured [`PriceReport`].
//!
//! Three sources are available:
//!
//! - [`sources::PythAccountSource`]: the on-chain Pyth price account, read via
//!   Solana JSON-RPC
//! - [`sources::HermesSource`]: the Pyth Hermes price service, with a max-age
//!   check
//! - [`sources::JupiterSource`]: the Jupiter price API (requires `JUP_API_KEY`)
//!
//! ## Usage
//!
//! ```no_run
//! use sol_price_feed::{
//!     config::{AccountSourceConfig, PollerConfig},
//!     sink::MemorySink,
//!     sources::PythAccountSource,
//!     Poller,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = PythAccountSource::new(AccountSourceConfig::from_env()?)?;
//! let poller = Poller::new(
//!     Arc::new(source),
//!     Arc::new(MemorySink::new()),
//!     PollerConfig::default(),
//! );
//!
//! let report = poller.poll_once().await;
//! match report.price {
//!     Some(price) => println!("SOL: ${:.2}", price),
//!     None => println!("{}: {:?}", report.status.as_str(), report.detail),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Poller (tokio interval, skip-if-busy)
//!     ↓
//! PriceSource::fetch (bounded by fetch_timeout)
//!     ↓
//! PriceReport (ok | unavailable | stale | error)
//!     ↓
//! ReportSink (console, pretty or JSON)
//! ```
//!
//! Optionally, each ok report also carries the whole-step movement of the
//! price since the previous ok cycle (see [`movement`]).
//!
//! A price is only reported as `ok` when the source says it is current and
//! tradable; every other outcome carries a diagnostic and no price.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod movement;
pub mod poller;
pub mod sink;
pub mod source;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use error::{ConfigError, ErrorKind, SourceError};
pub use metrics::PollerMetrics;
pub use movement::{PriceMovement, StepConfig, StepMode};
pub use poller::{Poller, PollerHandle};
pub use sink::{ReportFormat, ReportSink};
pub use source::PriceSource;
pub use types::{PriceObservation, PriceReport, ReportStatus, TradingStatus};
