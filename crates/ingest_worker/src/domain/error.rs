use thiserror::Error;

/// Per-record normalization failure. These are ordinary data-quality issues:
/// the caller drops the offending record and continues with its siblings.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp is not a string")]
    TimestampNotText,

    #[error("non-numeric metric value: {0}")]
    Value(String),

    #[error("non-finite metric value: {0}")]
    NonFinite(f64),
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;
