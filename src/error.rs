pub type EffectResult<T> = Result<T, EffectError>;

/// Failures raised by the pixel layer and the effect manager.
///
/// Every variant is local to the effect: the host keeps presenting frames and
/// the effect latches itself off until the next valid configuration arrives.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("frame dimensions overflowed usize")]
    DimensionsOverflow,

    #[error("RGBA buffer length mismatch: expected {expected} bytes, got {actual} bytes")]
    BufferLengthMismatch { expected: usize, actual: usize },

    #[error("invalid effect configuration: {0}")]
    InvalidConfig(String),

    #[error("effect faulted: {0}")]
    Faulted(String),
}

impl EffectError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn faulted(msg: impl Into<String>) -> Self {
        Self::Faulted(msg.into())
    }
}
