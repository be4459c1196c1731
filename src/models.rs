use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// JSON object used for requests, expectations, and row metadata.
pub type JsonMap = serde_json::Map<String, Value>;

/// Origin of an assessment (human annotator, scorer, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentSource {
    /// Identifier of the annotator or system that produced the assessment
    pub source_id: String,
    /// Kind of source, e.g. "HUMAN" or "CODE"
    pub source_type: String,
}

/// A judgment attached to a trace.
///
/// Only `Expectation` assessments contribute to a row's merged expectations;
/// `Feedback` assessments are scorer output and never surface as a row field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assessment {
    /// Ground-truth judgment keyed by expectation name
    Expectation {
        name: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<AssessmentSource>,
    },
    /// Scorer judgment, excluded from expectation merging
    Feedback {
        name: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<AssessmentSource>,
    },
}

impl Assessment {
    /// Name of the assessment regardless of kind
    pub fn name(&self) -> &str {
        match self {
            Self::Expectation { name, .. } | Self::Feedback { name, .. } => name,
        }
    }
}

/// One recorded span within a trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Span name
    pub name: String,
    /// Span kind, e.g. "AGENT" or "LLM"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_type: Option<String>,
    /// Structured inputs recorded on the span
    #[serde(default)]
    pub inputs: JsonMap,
    /// Output recorded on the span
    #[serde(default)]
    pub outputs: Value,
}

/// Immutable record of a traced execution: spans plus attached assessments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    /// Recorded spans in execution order; the first is the root span
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
}

impl Trace {
    /// The root span, when the trace recorded any spans at all
    pub fn root_span(&self) -> Option<&Span> {
        self.spans.first()
    }
}

/// One normalized evaluation row, the unit the harness dispatches to scorers.
///
/// For trace-bearing records `request` and `response` come from the trace's
/// root span rather than the record's own `inputs`/`outputs` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRow {
    /// Structured inputs for the example
    pub request: JsonMap,
    /// Model response for the example
    pub response: Value,
    /// Merged expectation name/value mapping, possibly empty
    pub expectations: JsonMap,
    /// Execution trace, when the record carried or the harness generated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
    /// Extra record columns that are not part of the canonical shape
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub metadata: JsonMap,
}

/// Normalized result of one metric applied to one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    /// Name of the metric that produced the score
    pub name: String,
    /// Score value (number, boolean, or string)
    pub score: Value,
    /// Optional rationale accompanying the score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// One evaluated row together with every metric result for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    /// The canonical row that was scored
    pub row: EvalRow,
    /// One result per registered metric
    pub scores: Vec<MetricResult>,
}

/// Statistics calculated across rows for each metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    /// Mean scores for each metric
    pub mean: HashMap<String, f64>,
    /// Median scores for each metric
    pub median: HashMap<String, f64>,
    /// Mode scores for each metric (most frequent score)
    pub mode: HashMap<String, f64>,
}

/// Final report for one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// Aggregated statistics
    pub statistics: Statistics,
    /// Individual row results
    pub rows: Vec<RowResult>,
}
