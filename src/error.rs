//! Error taxonomy for the conditioning core.
//!
//! Every stage reports failures synchronously through [`ConditionError`].
//! Zero-variance channels are *not* errors; they surface through
//! [`crate::ChannelStats::degraded`] and a `warn!` log line.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    /// Filter parameters violate `0 < low < high < fs / 2` or `order >= 1`.
    #[error("invalid filter config: {0}")]
    InvalidFilterConfig(String),

    /// Any other rejected setting of [`crate::ConditionerConfig`].
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Time axis is too short for the edge padding of the zero-phase filter.
    #[error("signal too short: {len} samples, zero-phase filter needs more than {required}")]
    SignalTooShort { len: usize, required: usize },

    /// A pruned channel index does not exist in the input.
    #[error("channel index {index} out of range for {n_channels} channels")]
    ChannelIndexOutOfRange { index: usize, n_channels: usize },

    /// The layout was declared for a different montage size.
    #[error("layout expects {expected} channels, signal has {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    /// Nothing left to process (no samples, or every channel pruned).
    #[error("empty signal: {0}")]
    EmptySignal(&'static str),

    /// Labels/scores handed to the metrics helper are unusable.
    #[error("invalid metrics input: {0}")]
    MetricsInput(String),

    /// An inference session was fed, or produced, the wrong shape.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },
}

pub type Result<T> = std::result::Result<T, ConditionError>;
