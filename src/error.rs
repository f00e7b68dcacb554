use thiserror::Error;

/// Boxed cause carried by [`PrepError::DataUnavailable`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal failures of the load → partition → rescale pipeline.
///
/// Every variant aborts the whole preparation step; no partial
/// [`DatasetBundle`](crate::data::model::DatasetBundle) is ever returned.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Split ratios outside `(0, 1)` or summing to `>= 1`.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A category's backing store is missing or unreadable.
    #[error("data unavailable for category '{category}': {source}")]
    DataUnavailable {
        category: String,
        #[source]
        source: BoxedCause,
    },

    /// A configured category produced no matching records.
    #[error("category '{category}' yielded no records for class codes {codes:?}")]
    EmptyCategory { category: String, codes: Vec<String> },

    /// Parallel arrays of a partition disagree in length.
    #[error(
        "shape mismatch in {partition}: waveforms={waveforms}, labels={labels}, weights={weights}, ids={ids}"
    )]
    ShapeMismatch {
        partition: String,
        waveforms: usize,
        labels: usize,
        weights: usize,
        ids: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PrepError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn data_unavailable(category: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        Self::DataUnavailable {
            category: category.into(),
            source: source.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PrepError>;
