// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the
// technical-analysis feature engine.  Functions return `Option<T>` or an
// empty `Vec` so callers are forced to handle insufficient-data and
// numerical-edge-case scenarios.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod stats;
pub mod stochastic;
