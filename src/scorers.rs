use crate::models::{EvalRow, JsonMap, MetricResult, Trace};
use serde_json::Value;
use std::sync::Arc;

/// Canonical row fields a scorer can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Inputs,
    Outputs,
    Expectations,
    Trace,
    Metadata,
}

impl Field {
    /// Bit for this field in a metric's projection mask
    fn mask(self) -> u8 {
        match self {
            Self::Inputs => 1,
            Self::Outputs => 1 << 1,
            Self::Expectations => 1 << 2,
            Self::Trace => 1 << 3,
            Self::Metadata => 1 << 4,
        }
    }
}

/// Borrowed projection of a canonical row, restricted to the fields the
/// scorer declared. Undeclared fields are `None` and never forwarded.
#[derive(Debug, Clone, Copy)]
pub struct ScorerArgs<'a> {
    pub inputs: Option<&'a JsonMap>,
    pub outputs: Option<&'a Value>,
    pub expectations: Option<&'a JsonMap>,
    pub trace: Option<&'a Trace>,
    pub metadata: Option<&'a JsonMap>,
}

/// What a scorer returns: a bare score value, or a score with rationale
#[derive(Debug, Clone)]
pub enum ScorerOutput {
    /// Bare numeric/boolean/string score
    Score(Value),
    /// Structured result carrying a score plus rationale
    Detailed { score: Value, rationale: String },
}

/// A scoring callable over canonical rows
pub trait Scorer: Send + Sync {
    /// Name reported on every result this scorer produces
    fn name(&self) -> &str;

    /// Row fields this scorer declares; only these are forwarded at call time
    fn fields(&self) -> &[Field];

    /// Whether this scorer belongs to the crate's predefined library
    fn is_builtin(&self) -> bool {
        false
    }

    /// Score one projected row
    fn score(&self, args: ScorerArgs<'_>) -> ScorerOutput;
}

/// Custom scorer built from a plain function plus its declared fields
pub struct FnScorer {
    name: String,
    fields: Vec<Field>,
    func: Box<dyn for<'a> Fn(ScorerArgs<'a>) -> ScorerOutput + Send + Sync>,
}

impl FnScorer {
    /// Wrap a scoring function under the given name
    pub fn new<F>(name: impl Into<String>, fields: &[Field], func: F) -> Self
    where
        F: for<'a> Fn(ScorerArgs<'a>) -> ScorerOutput + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            fields: fields.to_vec(),
            func: Box::new(func),
        }
    }
}

impl Scorer for FnScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn score(&self, args: ScorerArgs<'_>) -> ScorerOutput {
        (self.func)(args)
    }
}

/// Harness-facing metric wrapping a scorer.
///
/// The field projection and the built-in tag are fixed once at registration;
/// call time only applies the stored mask.
pub struct Metric {
    name: String,
    builtin: bool,
    wants: u8,
    scorer: Arc<dyn Scorer>,
}

impl Metric {
    /// Wrap a scorer into the metric envelope the harness invokes per row
    pub fn from_scorer(scorer: Arc<dyn Scorer>) -> Self {
        let wants = scorer
            .fields()
            .iter()
            .fold(0u8, |mask, field| mask | field.mask());

        Self {
            name: scorer.name().to_string(),
            builtin: scorer.is_builtin(),
            wants,
            scorer,
        }
    }

    /// Name copied from the wrapped scorer
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Informational tag for reporting: true when the wrapped scorer comes
    /// from the predefined library
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Project the row to the declared fields and invoke the scorer
    pub fn evaluate(&self, row: &EvalRow) -> MetricResult {
        match self.scorer.score(self.project(row)) {
            ScorerOutput::Score(score) => MetricResult {
                name: self.name.clone(),
                score,
                rationale: None,
            },
            ScorerOutput::Detailed { score, rationale } => MetricResult {
                name: self.name.clone(),
                score,
                rationale: Some(rationale),
            },
        }
    }

    fn project<'a>(&self, row: &'a EvalRow) -> ScorerArgs<'a> {
        ScorerArgs {
            inputs: self.wanted(Field::Inputs).then_some(&row.request),
            outputs: self.wanted(Field::Outputs).then_some(&row.response),
            expectations: self.wanted(Field::Expectations).then_some(&row.expectations),
            trace: if self.wanted(Field::Trace) {
                row.trace.as_ref()
            } else {
                None
            },
            metadata: self.wanted(Field::Metadata).then_some(&row.metadata),
        }
    }

    fn wanted(&self, field: Field) -> bool {
        self.wants & field.mask() != 0
    }
}
