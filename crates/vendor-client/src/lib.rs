pub mod birdeye;
mod credit_session;
pub mod moralis;

pub use birdeye::BirdeyeClient;
pub use credit_session::CreditSession;
pub use moralis::MoralisClient;

use async_trait::async_trait;
use candle_store::Db;
use trading_core::{IngestResult, OHLCVCandle, Timeframe};

/// Result of one complete fetch session (possibly many paginated calls)
/// against a single vendor backend (§4.1).
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub candles: Vec<OHLCVCandle>,
    pub credits_used: i64,
    pub latest_time: i64,
}

/// The shared C1 contract both vendor backends satisfy: paginate until
/// `toTime` is reached or the backend runs out of data, deduplicate,
/// drop incomplete bars, and settle credits once.
#[async_trait]
pub trait VendorClient: Send + Sync {
    fn service_name(&self) -> &str;
    fn credits_per_call(&self) -> i64;
    fn supports_timeframe(&self, timeframe: Timeframe) -> bool;

    async fn fetch_candles(
        &self,
        db: &Db,
        token_address: &str,
        pair_address: &str,
        from_time: i64,
        to_time: i64,
        timeframe: Timeframe,
        now: i64,
    ) -> IngestResult<FetchOutcome>;
}
