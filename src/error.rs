use thiserror::Error;

pub type HeResult<T> = Result<T, HeError>;

/// Errors surfaced by the tile layer.
///
/// Precondition violations and serialization problems are always hard errors;
/// approximation-accuracy loss (polynomial evaluation outside its declared
/// range, noisy bootstrap output) is *not* represented here because it cannot
/// be detected at the ciphertext level without decryption.
#[derive(Error, Debug)]
pub enum HeError {
    #[error("operands belong to different contexts: {expected} vs {actual}")]
    ContextMismatch { expected: i32, actual: i32 },

    #[error("context is not initialized")]
    NotInitialized,

    #[error("context is already initialized")]
    AlreadyInitialized,

    #[error("chain index is already at the bottom of the modulus chain")]
    ChainIndexExhausted,

    #[error("chain index can only decrease: current {current}, requested {requested}")]
    ChainIndexIncrease { current: i32, requested: i32 },

    #[error("scheme does not support scale manipulation")]
    ScaleUnsupported,

    #[error("not supported by this backend: {what}")]
    NotSupported { what: String },

    #[error("context was not configured bootstrappable")]
    NotBootstrappable,

    #[error("configuration requirement is not feasible: {reason}")]
    Infeasible { reason: String },

    #[error("operation `{op}` on an empty tile")]
    EmptyTile { op: &'static str },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("rotation by {target} is not composable from the supported rotation steps")]
    RotationUnreachable { target: i32 },

    #[error("no secret key material available")]
    MissingSecretKey,

    #[error("bad magic number in stored header")]
    BadMagic,

    #[error("stored version {stored:#010x} is not supported")]
    UnsupportedVersion { stored: u32 },

    #[error("stored class name mismatch: expected `{expected}`, found `{actual}`")]
    ClassNameMismatch { expected: String, actual: String },

    #[error("stored context id {stored} does not match context {expected}")]
    ContextIdMismatch { expected: i32, stored: i32 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {message}")]
    Encoding { message: String },
}

impl HeError {
    pub fn not_supported(what: impl Into<String>) -> Self {
        HeError::NotSupported { what: what.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HeError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn infeasible(reason: impl Into<String>) -> Self {
        HeError::Infeasible {
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for HeError {
    fn from(e: bincode::Error) -> Self {
        HeError::Encoding {
            message: e.to_string(),
        }
    }
}
