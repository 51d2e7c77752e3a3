//! Source abstraction for fetching the SOL/USD price

use crate::{error::SourceError, types::PriceObservation};
use async_trait::async_trait;

/// Trait for price sources
///
/// Implementations fetch and validate one price per call. A source only
/// returns `Ok` for a current, tradable price; everything else is an error
/// classified by [`SourceError::kind`].
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches the current price
    async fn fetch(&self) -> Result<PriceObservation, SourceError>;

    /// Returns the name of this source
    fn source_name(&self) -> &'static str;
}
