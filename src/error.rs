use thiserror::Error;

/// Failure reported by an external capability provider.
///
/// These never escape the crate's fail-soft boundaries: a fallback chain moves
/// on to its next link, and the language ensemble treats the strategy as
/// abstaining.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("provider returned no usable result")]
    Empty,

    #[error("unsupported output: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(
        "predictions and ground truth must have the same length ({predictions} != {ground_truth})"
    )]
    LengthMismatch {
        predictions: usize,
        ground_truth: usize,
    },
}
