//! Timeline normalization, current-snapshot ratios and predictive insights.

pub mod normalizer;
pub mod prediction;
pub mod ratios;

pub use normalizer::{derive_ratios, TimelineNormalizer, DEFAULT_MAX_PERIODS};
pub use prediction::PredictiveInsightEstimator;
pub use ratios::{compute_ratios, ratio_value, summarize_trends, CurrentRatio};
