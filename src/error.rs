//! Error types for dataset conversion and evaluation runs.

/// Errors produced by the normalizer and the evaluation harness.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A structured column could not be decoded as JSON.
    #[error("Failed to parse `{column}` column.")]
    DataFormat { column: String },

    /// The dataset supplies neither an `inputs` column nor a `trace` column.
    #[error("The `inputs` column is required when no `trace` column is provided.")]
    MissingInput,

    /// A prediction call failed; the run is aborted.
    #[error("prediction failed: {reason}")]
    Predict { reason: String },

    /// A configured scorer name is not in the predefined library.
    #[error("unknown scorer: {name}")]
    UnknownScorer { name: String },
}

/// Result type for normalizer and harness operations.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_format_message_names_column() {
        let err = EvalError::DataFormat {
            column: "inputs".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to parse `inputs` column.");
    }

    #[test]
    fn test_missing_input_message_mentions_inputs_required() {
        let message = EvalError::MissingInput.to_string();
        assert!(message.contains("`inputs`"));
        assert!(message.contains("required"));
    }
}
