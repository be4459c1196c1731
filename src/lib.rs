//! evalset-harness: convert heterogeneous evaluation datasets into one
//! canonical row format and dispatch the rows to scoring functions.
//!
//! Compose an input shape ([`EvalDataset`]), scorers (built-in or custom via
//! [`FnScorer`]), and an optional [`Predictor`]; run them with the
//! [`Harness`] to get an [`EvalReport`].

pub mod builtin;
pub mod config;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod models;
pub mod output;
pub mod predict;
pub mod scorers;

pub use config::{Config, PredictorConfig, RunConfig};
pub use dataset::{EvalDataset, PartitionedFrame, RowTable};
pub use error::{EvalError, EvalResult};
pub use harness::{Harness, Predictor, evaluate};
pub use models::{
    Assessment, AssessmentSource, EvalReport, EvalRow, JsonMap, MetricResult, RowResult, Span,
    Statistics, Trace,
};
pub use predict::LlmPredictor;
pub use scorers::{Field, FnScorer, Metric, Scorer, ScorerArgs, ScorerOutput};
