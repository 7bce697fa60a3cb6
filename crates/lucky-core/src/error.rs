use thiserror::Error;

#[derive(Error, Debug)]
pub enum LuckyError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("dimension mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("no star detections for frame {0}")]
    DetectionMissing(usize),

    #[error("operation aborted")]
    Abort,

    #[error("resource error: {0}")]
    Resource(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LuckyError>;
