// =============================================================================
// alpha-fusion — multi-modality crypto signal fusion
// =============================================================================
//
// Observations from five independent modalities (technical analysis, news
// sentiment, derivatives, on-chain, order book) are turned into fixed-shape
// feature sets, scored by per-modality rule tables, fused under a
// disagreement/agreement policy and vetoed by a minimum-confidence guardrail.
// Every run yields exactly one `FinalSignal`.
// =============================================================================

pub mod aggregator;
pub mod error;
pub mod features;
pub mod fusion;
pub mod guardrail;
pub mod history;
pub mod indicators;
pub mod market_data;
pub mod pipeline;
pub mod report;
pub mod run_guard;
pub mod runtime_config;
pub mod scoring;
pub mod sentiment;
pub mod signal_record;
pub mod types;

pub use error::{ConfigError, FeatureError, PipelineError};
pub use pipeline::{ObservationBundle, SignalPipeline};
pub use runtime_config::PipelineConfig;
pub use signal_record::FinalSignal;
