use crate::error::{EvalError, EvalResult};
use crate::models::{Assessment, EvalRow, JsonMap, Trace};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Record columns with canonical meaning; everything else is row metadata.
const RESERVED_COLUMNS: [&str; 4] = ["inputs", "outputs", "expectations", "trace"];

/// Row-oriented table: named columns plus one cell vector per row.
#[derive(Debug, Clone)]
pub struct RowTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowTable {
    /// Create a table from column names and row cells
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Number of rows in the table
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// View one row as a record, dropping null cells
    fn row_map(&self, row: &[Value]) -> JsonMap {
        self.columns
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_null())
            .map(|(column, cell)| (column.clone(), cell.clone()))
            .collect()
    }
}

/// Partitioned frame: rows split across partitions, the shape a distributed
/// dataframe arrives in. Structured columns may be JSON-encoded strings.
#[derive(Debug, Clone)]
pub struct PartitionedFrame {
    partitions: Vec<Vec<JsonMap>>,
}

impl PartitionedFrame {
    /// Create a frame from per-partition record lists
    pub fn new(partitions: Vec<Vec<JsonMap>>) -> Self {
        Self { partitions }
    }

    /// Total number of rows across all partitions
    pub fn row_count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// Iterate rows partition by partition without flattening up front
    fn iter_rows(&self) -> impl Iterator<Item = &JsonMap> {
        self.partitions.iter().flat_map(|partition| partition.iter())
    }
}

/// An evaluation dataset in one of the supported input shapes.
///
/// The normalizer dispatches on the variant rather than probing attributes;
/// every shape converts to the same canonical rows.
#[derive(Debug, Clone)]
pub enum EvalDataset {
    /// Sequence of record mappings
    Records(Vec<JsonMap>),
    /// Row-oriented table
    Table(RowTable),
    /// Partitioned frame, possibly with JSON-string structured columns
    Partitioned(PartitionedFrame),
}

impl EvalDataset {
    /// Load a `Records` dataset from a JSON file holding an array of records
    pub fn records_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;

        let records: Vec<JsonMap> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset file: {}", path.display()))?;

        Ok(Self::Records(records))
    }

    /// Number of records in the dataset
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Table(table) => table.row_count(),
            Self::Partitioned(frame) => frame.row_count(),
        }
    }

    /// Whether the dataset holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert every record into the canonical row shape.
    ///
    /// Fails before touching any row when the dataset supplies neither an
    /// `inputs` nor a `trace` column. There is no partial success: the first
    /// malformed record aborts the whole conversion.
    pub fn to_eval_rows(&self) -> EvalResult<Vec<EvalRow>> {
        self.check_request_source()?;

        match self {
            Self::Records(records) => records.iter().map(normalize_record).collect(),
            Self::Table(table) => table
                .rows
                .iter()
                .map(|row| normalize_record(&table.row_map(row)))
                .collect(),
            Self::Partitioned(frame) => frame.iter_rows().map(normalize_record).collect(),
        }
    }

    /// Early dataset-wide check that some source of request data exists
    fn check_request_source(&self) -> EvalResult<()> {
        let columns = self.column_names();
        if columns.contains("inputs") || columns.contains("trace") {
            Ok(())
        } else {
            Err(EvalError::MissingInput)
        }
    }

    /// Column names available anywhere in the dataset
    fn column_names(&self) -> BTreeSet<String> {
        match self {
            Self::Records(records) => records
                .iter()
                .flat_map(|record| record.keys().cloned())
                .collect(),
            Self::Table(table) => table.columns.iter().cloned().collect(),
            Self::Partitioned(frame) => frame
                .iter_rows()
                .flat_map(|record| record.keys().cloned())
                .collect(),
        }
    }
}

/// Normalize one record into the canonical row shape
fn normalize_record(record: &JsonMap) -> EvalResult<EvalRow> {
    match record.get("trace") {
        Some(value) if !value.is_null() => normalize_traced_record(record, value),
        _ => normalize_plain_record(record),
    }
}

/// Trace-bearing record: request and response come from the trace's root
/// span, overriding any separately supplied `inputs`/`outputs` fields.
fn normalize_traced_record(record: &JsonMap, trace_value: &Value) -> EvalResult<EvalRow> {
    let trace = decode_trace(trace_value)?;

    let (request, response) = {
        let root = trace.root_span().ok_or_else(|| EvalError::DataFormat {
            column: "trace".to_string(),
        })?;
        (root.inputs.clone(), root.outputs.clone())
    };

    Ok(EvalRow {
        request,
        response,
        expectations: merge_expectations(&trace.assessments),
        trace: Some(trace),
        metadata: collect_metadata(record),
    })
}

/// Record without a trace: `inputs`/`outputs`/`expectations` map directly
fn normalize_plain_record(record: &JsonMap) -> EvalResult<EvalRow> {
    let request = match record.get("inputs") {
        Some(value) if !value.is_null() => structured_column(value, "inputs")?,
        _ => return Err(EvalError::MissingInput),
    };

    let expectations = match record.get("expectations") {
        Some(value) if !value.is_null() => structured_column(value, "expectations")?,
        _ => JsonMap::new(),
    };

    Ok(EvalRow {
        request,
        response: record.get("outputs").cloned().unwrap_or(Value::Null),
        expectations,
        trace: None,
        metadata: collect_metadata(record),
    })
}

/// Decode a structured column that may arrive as a JSON-encoded string
fn structured_column(value: &Value, column: &str) -> EvalResult<JsonMap> {
    let decoded = match value {
        Value::String(raw) => serde_json::from_str(raw).map_err(|_| EvalError::DataFormat {
            column: column.to_string(),
        })?,
        other => other.clone(),
    };

    match decoded {
        Value::Object(map) => Ok(map),
        _ => Err(EvalError::DataFormat {
            column: column.to_string(),
        }),
    }
}

/// A trace arrives either as a structured object or as its JSON-string
/// serialization; both converge on the same decoding path.
fn decode_trace(value: &Value) -> EvalResult<Trace> {
    let malformed = || EvalError::DataFormat {
        column: "trace".to_string(),
    };

    match value {
        Value::String(raw) => serde_json::from_str(raw).map_err(|_| malformed()),
        Value::Object(_) => serde_json::from_value(value.clone()).map_err(|_| malformed()),
        _ => Err(malformed()),
    }
}

/// Fold `Expectation` assessments into one mapping, skipping `Feedback`.
/// A later assessment with an already-seen name overwrites the earlier one.
fn merge_expectations(assessments: &[Assessment]) -> JsonMap {
    let mut merged = JsonMap::new();
    for assessment in assessments {
        if let Assessment::Expectation { name, value, .. } = assessment {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Collect non-canonical record columns as row metadata
fn collect_metadata(record: &JsonMap) -> JsonMap {
    record
        .iter()
        .filter(|(key, _)| !RESERVED_COLUMNS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
