use thiserror::Error;

/// Domain errors raised by the pipeline stages.
///
/// I/O and parsing failures travel as `anyhow` errors with context attached;
/// these variants cover the checks the pipeline performs itself.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("shape mismatch: {what} (expected {expected:?}, got {actual:?})")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("array '{name}' not found (available: {available:?})")]
    MissingArray { name: String, available: Vec<String> },

    #[error("array '{name}' has unsupported element type: {detail}")]
    UnsupportedElement { name: String, detail: String },

    #[error("invalid label value {value} at index {index}")]
    InvalidLabel { value: f64, index: usize },

    #[error("band {band} out of range for a cube with {bands} bands")]
    BandOutOfRange { band: usize, bands: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no labeled pixels in ground truth")]
    NoLabeledPixels,

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}
