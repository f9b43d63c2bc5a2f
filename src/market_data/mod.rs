// =============================================================================
// Market Data — immutable observation records supplied by collectors
// =============================================================================

pub mod candle;
pub mod derivatives;
pub mod news;
pub mod onchain;
pub mod orderbook;

pub use candle::Candle;
pub use derivatives::{FundingReading, FuturesReading};
pub use news::{BucketPolicy, NewsDocument, RecencyWindows};
pub use onchain::OnChainReading;
pub use orderbook::{OrderBookSnapshot, Trade, TradeSide};
