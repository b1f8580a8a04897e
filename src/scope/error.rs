use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("time scale must be between {min} and {max} seconds, got {actual}")]
    TimeScaleOutOfRange { min: f32, max: f32, actual: f32 },
    #[error("block length mismatch: expected {expected}, got {actual}")]
    BlockLengthMismatch { expected: usize, actual: usize },
    #[error("sample rate must be finite and greater than zero")]
    InvalidSampleRate,
    #[error("fifo capacity {capacity} cannot hold blocks of {block_size} samples")]
    InvalidFifoGeometry { capacity: usize, block_size: usize },
    #[error("spectral window size must be even and non-zero, got {0}")]
    InvalidWindowSize(usize),
    #[error("pulse bounds must satisfy 1 <= min < max, got {min_ms}..{max_ms} ms")]
    InvalidPulseBounds { min_ms: f64, max_ms: f64 },
    #[error("slope threshold and sample interval must be positive, got {threshold} and {interval}")]
    InvalidSlope { threshold: f32, interval: f32 },
    #[error("amplitude scale must be positive, got {0}")]
    InvalidAmplitudeScale(f32),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}
