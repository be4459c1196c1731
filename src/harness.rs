use crate::dataset::EvalDataset;
use crate::error::{EvalError, EvalResult};
use crate::models::{EvalReport, EvalRow, JsonMap, RowResult, Span, Statistics, Trace};
use crate::scorers::{Metric, Scorer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Environment toggle disabling trace emission during evaluation runs
const LOG_TRACES_ENV: &str = "EVAL_HARNESS_LOG_TRACES";

/// Default prediction fan-out width
const DEFAULT_CONCURRENCY: usize = 4;

/// Produces a response for one row's structured request.
///
/// Implementations must tolerate concurrent calls; the harness fans rows out
/// in arbitrary order.
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, request: &JsonMap) -> anyhow::Result<Value>;
}

/// Evaluation entry point dispatching canonical rows to metrics
pub struct Harness {
    concurrency: usize,
}

impl Harness {
    /// Create a harness with the given prediction fan-out width
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Normalize the dataset, run the predictor per row when one is given,
    /// then invoke every metric on every row.
    ///
    /// Metric output is invariant to row-processing order: predictions land
    /// back on their rows by index regardless of completion order.
    pub async fn evaluate(
        &self,
        data: &EvalDataset,
        scorers: Vec<Arc<dyn Scorer>>,
        predictor: Option<Arc<dyn Predictor>>,
    ) -> EvalResult<EvalReport> {
        let mut rows = data.to_eval_rows()?;
        let metrics: Vec<Metric> = scorers.into_iter().map(Metric::from_scorer).collect();

        if let Some(predictor) = predictor {
            self.run_predictions(&mut rows, predictor).await?;
        }

        let row_results = score_rows(rows, &metrics);
        let statistics = calculate_statistics(&row_results, &metrics);

        Ok(EvalReport {
            statistics,
            rows: row_results,
        })
    }

    /// Run the predictor across rows with bounded concurrency.
    ///
    /// One warm-up call on the first request runs outside the measured set
    /// to establish an execution trace before the parallel fan-out.
    async fn run_predictions(
        &self,
        rows: &mut [EvalRow],
        predictor: Arc<dyn Predictor>,
    ) -> EvalResult<()> {
        let first_request = match rows.first() {
            Some(row) => row.request.clone(),
            None => return Ok(()),
        };
        predictor
            .predict(&first_request)
            .await
            .map_err(predict_error)?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, row) in rows.iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| EvalError::Predict {
                    reason: err.to_string(),
                })?;
            let predictor = predictor.clone();
            let request = row.request.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let response = predictor.predict(&request).await;
                (index, response)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (index, response) = joined.map_err(|err| EvalError::Predict {
                reason: err.to_string(),
            })?;
            let response = response.map_err(predict_error)?;
            apply_prediction(&mut rows[index], index, response);
        }

        Ok(())
    }
}

/// Evaluate with the default harness options
pub async fn evaluate(
    data: &EvalDataset,
    scorers: Vec<Arc<dyn Scorer>>,
    predictor: Option<Arc<dyn Predictor>>,
) -> EvalResult<EvalReport> {
    Harness::new(DEFAULT_CONCURRENCY)
        .evaluate(data, scorers, predictor)
        .await
}

fn predict_error(err: anyhow::Error) -> EvalError {
    EvalError::Predict {
        reason: format!("{err:#}"),
    }
}

/// Whether generated traces are emitted to the log during runs
fn trace_logging_enabled() -> bool {
    match std::env::var(LOG_TRACES_ENV) {
        Ok(value) => !matches!(value.as_str(), "false" | "0"),
        Err(_) => true,
    }
}

/// Record the prediction on its row, attaching a synthesized single-span
/// trace when the row did not already carry one.
fn apply_prediction(row: &mut EvalRow, index: usize, response: Value) {
    if row.trace.is_none() {
        let trace = Trace {
            trace_id: format!("eval-{index}"),
            spans: vec![Span {
                name: "predict".to_string(),
                span_type: Some("AGENT".to_string()),
                inputs: row.request.clone(),
                outputs: response.clone(),
            }],
            assessments: vec![],
        };

        if trace_logging_enabled() {
            tracing::debug!(trace_id = %trace.trace_id, "recorded prediction trace");
        }
        row.trace = Some(trace);
    }

    row.response = response;
}

/// Invoke every metric on every row
fn score_rows(rows: Vec<EvalRow>, metrics: &[Metric]) -> Vec<RowResult> {
    rows.into_iter()
        .map(|row| {
            let scores = metrics.iter().map(|metric| metric.evaluate(&row)).collect();
            RowResult { row, scores }
        })
        .collect()
}

/// Aggregate numeric scores per metric across all rows
fn calculate_statistics(row_results: &[RowResult], metrics: &[Metric]) -> Statistics {
    let mut mean = HashMap::new();
    let mut median = HashMap::new();
    let mut mode = HashMap::new();

    for metric in metrics {
        let scores = collect_metric_scores(row_results, metric.name());

        if scores.is_empty() {
            mean.insert(metric.name().to_string(), 0.0);
            median.insert(metric.name().to_string(), 0.0);
            mode.insert(metric.name().to_string(), 0.0);
            continue;
        }

        mean.insert(metric.name().to_string(), calculate_mean(&scores));
        median.insert(metric.name().to_string(), calculate_median(&scores));
        mode.insert(metric.name().to_string(), calculate_mode(&scores));
    }

    Statistics { mean, median, mode }
}

/// Collect the numeric scores one metric produced across rows
fn collect_metric_scores(row_results: &[RowResult], name: &str) -> Vec<f64> {
    row_results
        .iter()
        .flat_map(|row_result| row_result.scores.iter())
        .filter(|result| result.name == name)
        .filter_map(|result| numeric_score(&result.score))
        .collect()
}

/// Numeric view of a score; booleans count as 0/1, strings are skipped
fn numeric_score(score: &Value) -> Option<f64> {
    match score {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Calculate mean of scores
fn calculate_mean(scores: &[f64]) -> f64 {
    let sum: f64 = scores.iter().sum();
    sum / scores.len() as f64
}

/// Calculate median of scores
fn calculate_median(scores: &[f64]) -> f64 {
    let mut sorted_scores = scores.to_vec();
    sorted_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted_scores.len() / 2;
    if sorted_scores.len() % 2 == 0 {
        (sorted_scores[mid - 1] + sorted_scores[mid]) / 2.0
    } else {
        sorted_scores[mid]
    }
}

/// Calculate mode of scores (most frequent value, rounded to 1 decimal place)
fn calculate_mode(scores: &[f64]) -> f64 {
    let mut frequency = HashMap::new();

    for &score in scores {
        let rounded = ((score * 10.0).round() as i32) as f64 / 10.0;
        *frequency.entry(rounded.to_bits()).or_insert(0) += 1;
    }

    match frequency.iter().max_by_key(|&(_, count)| count) {
        Some((&bits, _)) => f64::from_bits(bits),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricResult;
    use crate::scorers::{Field, FnScorer, ScorerOutput};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn record(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("record fixtures must be JSON objects"),
        }
    }

    fn spark_dataset() -> EvalDataset {
        EvalDataset::Records(vec![
            record(json!({
                "inputs": {"q": "What is Spark?"},
                "outputs": "r1",
                "expectations": {"expected_response": "e1"},
            })),
            record(json!({
                "inputs": {"q": "How can you minimize data shuffling in Spark?"},
                "outputs": "r2",
                "expectations": {},
            })),
        ])
    }

    /// Predictor that records every request it sees and echoes the question
    struct EchoPredictor {
        requests: Mutex<Vec<String>>,
    }

    impl EchoPredictor {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl Predictor for EchoPredictor {
        async fn predict(&self, request: &JsonMap) -> anyhow::Result<Value> {
            let question = request
                .get("q")
                .and_then(|q| q.as_str())
                .unwrap_or_default()
                .to_string();
            self.requests.lock().expect("requests lock").push(question.clone());
            Ok(Value::String(format!("echo: {question}")))
        }
    }

    /// Predictor that always fails
    struct FailingPredictor;

    #[async_trait::async_trait]
    impl Predictor for FailingPredictor {
        async fn predict(&self, _request: &JsonMap) -> anyhow::Result<Value> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn test_scorer_receives_correct_data() {
        let observed: Arc<Mutex<Vec<(Value, Value, Option<Value>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();

        let scorer = FnScorer::new(
            "dummy_scorer",
            &[Field::Inputs, Field::Outputs, Field::Expectations],
            move |args| {
                sink.lock().expect("sink lock").push((
                    args.inputs
                        .and_then(|inputs| inputs.get("q"))
                        .cloned()
                        .unwrap_or(Value::Null),
                    args.outputs.cloned().unwrap_or(Value::Null),
                    args.expectations
                        .and_then(|expectations| expectations.get("expected_response"))
                        .cloned(),
                ));
                ScorerOutput::Score(json!(0))
            },
        );

        let report = evaluate(&spark_dataset(), vec![Arc::new(scorer)], None)
            .await
            .unwrap();
        assert_eq!(report.rows.len(), 2);

        let observed = observed.lock().expect("sink lock");
        assert_eq!(observed.len(), 2);
        assert_eq!(observed[0].0, json!("What is Spark?"));
        assert_eq!(observed[0].1, json!("r1"));
        assert_eq!(observed[0].2, Some(json!("e1")));
        assert_eq!(
            observed[1].0,
            json!("How can you minimize data shuffling in Spark?")
        );
        assert_eq!(observed[1].1, json!("r2"));
        assert_eq!(observed[1].2, None);
    }

    #[tokio::test]
    async fn test_predictor_receives_each_request_plus_warmup() {
        let predictor = Arc::new(EchoPredictor::new());
        let report = evaluate(
            &spark_dataset(),
            vec![],
            Some(predictor.clone() as Arc<dyn Predictor>),
        )
        .await
        .unwrap();

        let mut seen = predictor.seen();
        assert_eq!(seen.len(), 3);
        // The warm-up call targets the first row before the measured set
        assert_eq!(seen.remove(0), "What is Spark?");

        // The fan-out completes in arbitrary order, so compare as a set
        let seen: HashSet<String> = seen.into_iter().collect();
        let expected: HashSet<String> = [
            "What is Spark?".to_string(),
            "How can you minimize data shuffling in Spark?".to_string(),
        ]
        .into_iter()
        .collect();
        assert_eq!(seen, expected);

        assert_eq!(report.rows[0].row.response, json!("echo: What is Spark?"));
        assert_eq!(
            report.rows[1].row.response,
            json!("echo: How can you minimize data shuffling in Spark?")
        );
    }

    #[tokio::test]
    async fn test_predictions_attach_traces() {
        let predictor = Arc::new(EchoPredictor::new());
        let report = evaluate(
            &spark_dataset(),
            vec![],
            Some(predictor as Arc<dyn Predictor>),
        )
        .await
        .unwrap();

        for row_result in &report.rows {
            let trace = row_result.row.trace.as_ref().unwrap();
            let root = trace.root_span().unwrap();
            assert_eq!(root.inputs, row_result.row.request);
            assert_eq!(root.outputs, row_result.row.response);
        }
    }

    #[tokio::test]
    async fn test_prediction_failure_aborts_run() {
        let result = evaluate(
            &spark_dataset(),
            vec![],
            Some(Arc::new(FailingPredictor) as Arc<dyn Predictor>),
        )
        .await;

        match result {
            Err(EvalError::Predict { reason }) => assert!(reason.contains("model unavailable")),
            other => panic!("expected Predict error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_evaluate_propagates_normalization_errors() {
        let dataset = EvalDataset::Records(vec![record(json!({"outputs": "Paris"}))]);
        let result = evaluate(&dataset, vec![], None).await;
        assert!(matches!(result, Err(EvalError::MissingInput)));
    }

    #[tokio::test]
    async fn test_report_statistics_over_boolean_scores() {
        let scorer = FnScorer::new("match", &[Field::Outputs], |args| {
            ScorerOutput::Score(json!(args.outputs == Some(&json!("r1"))))
        });

        let report = evaluate(&spark_dataset(), vec![Arc::new(scorer)], None)
            .await
            .unwrap();

        // One true, one false over two rows
        assert_eq!(report.statistics.mean.get("match"), Some(&0.5));
        assert_eq!(report.statistics.median.get("match"), Some(&0.5));
    }

    #[test]
    fn test_calculate_statistics_normal_case() {
        let row_results: Vec<RowResult> = [0.8, 0.6, 0.8]
            .iter()
            .map(|score| RowResult {
                row: EvalRow {
                    request: JsonMap::new(),
                    response: Value::Null,
                    expectations: JsonMap::new(),
                    trace: None,
                    metadata: JsonMap::new(),
                },
                scores: vec![MetricResult {
                    name: "correctness".to_string(),
                    score: json!(score),
                    rationale: None,
                }],
            })
            .collect();

        let metric = Metric::from_scorer(Arc::new(FnScorer::new(
            "correctness",
            &[Field::Outputs],
            |_| ScorerOutput::Score(json!(0)),
        )));
        let stats = calculate_statistics(&row_results, &[metric]);

        assert!((stats.mean.get("correctness").unwrap() - 0.7333333333333333).abs() < 0.0001);
        // Median: middle value when sorted: 0.6, 0.8, 0.8
        assert_eq!(stats.median.get("correctness"), Some(&0.8));
        assert_eq!(stats.mode.get("correctness"), Some(&0.8));
    }

    #[test]
    fn test_calculate_statistics_no_numeric_scores() {
        let row_results = vec![RowResult {
            row: EvalRow {
                request: JsonMap::new(),
                response: Value::Null,
                expectations: JsonMap::new(),
                trace: None,
                metadata: JsonMap::new(),
            },
            scores: vec![MetricResult {
                name: "grade".to_string(),
                score: json!("pass"),
                rationale: None,
            }],
        }];

        let metric = Metric::from_scorer(Arc::new(FnScorer::new("grade", &[Field::Outputs], |_| {
            ScorerOutput::Score(json!("pass"))
        })));
        let stats = calculate_statistics(&row_results, &[metric]);

        assert_eq!(stats.mean.get("grade"), Some(&0.0));
        assert_eq!(stats.median.get("grade"), Some(&0.0));
    }

    #[test]
    fn test_calculate_median_even_count() {
        assert!((calculate_median(&[0.6, 0.7, 0.8, 0.9]) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_calculate_mode_most_frequent() {
        assert_eq!(calculate_mode(&[0.75, 0.8, 0.8, 0.8, 0.9]), 0.8);
    }

    #[test]
    fn test_trace_logging_toggle() {
        // Default on when the variable is unset
        unsafe {
            std::env::remove_var(LOG_TRACES_ENV);
        }
        assert!(trace_logging_enabled());

        unsafe {
            std::env::set_var(LOG_TRACES_ENV, "false");
        }
        assert!(!trace_logging_enabled());

        unsafe {
            std::env::remove_var(LOG_TRACES_ENV);
        }
    }
}
