// =============================================================================
// Error taxonomy
// =============================================================================
//
//   ConfigError    invalid configuration, fatal at pipeline construction.
//   FeatureError   structurally invalid observations, fatal to one modality
//                  for one run (never retried here).
//   PipelineError  anything that stops a run from starting.
//
// Missing data is not an error: a modality with nothing to read reports
// `ModalityStatus::Absent` and its neutral defaults.

use thiserror::Error;

use crate::types::Modality;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("active fusion weights sum to {sum:.6}, expected 1.0")]
    WeightsDoNotSumToOne { sum: f64 },

    #[error("fusion weight for {modality} is negative or non-finite: {weight}")]
    InvalidWeight { modality: Modality, weight: f64 },

    #[error("no modality has a positive fusion weight")]
    NoActiveModality,

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("recency weights sum to {sum:.6}, expected 1.0")]
    RecencyWeightsDoNotSumToOne { sum: f64 },

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("min_confidence {min} exceeds max_confidence {max}")]
    InvertedConfidenceBand { min: f64, max: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("timestamps not strictly increasing at index {index}")]
    NonMonotonicTimestamps { index: usize },

    #[error("negative price {value} at index {index}")]
    NegativePrice { index: usize, value: f64 },

    #[error("high {high} below low {low} at index {index}")]
    InvertedRange { index: usize, high: f64, low: f64 },

    #[error("negative {field} {value} at index {index}")]
    NegativeQuantity {
        field: &'static str,
        index: usize,
        value: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a run for {key} is still in flight")]
    RunInFlight { key: String },
}

pub type FeatureResult<T> = std::result::Result<T, FeatureError>;
