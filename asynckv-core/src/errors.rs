use std::fmt;
use std::io;
use std::sync::Arc;

/// Which codec hook was running when a [`CodecError`] happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EncodeKey,
    DecodeKey,
    EncodeValue,
    DecodeValue,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::EncodeKey => "encode key",
            Phase::DecodeKey => "decode key",
            Phase::EncodeValue => "encode value",
            Phase::DecodeValue => "decode value",
        };
        f.write_str(s)
    }
}

/// Failure raised by a [`crate::Codec`] hook.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Error reported by a storage engine binding.
///
/// Engines report failures as messages. A message starting with `NotFound`
/// marks the absence of a key.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn not_found(detail: impl fmt::Display) -> Self {
        Self::new(format!("NotFound: {detail}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.message
            .get(..8)
            .is_some_and(|p| p.eq_ignore_ascii_case("notfound"))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{phase} failed: {cause}")]
    Encoding { phase: Phase, cause: CodecError },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cursor already has a call in flight")]
    ConcurrentAccess,
    #[error("cursor is finished")]
    CursorFinished,
    #[error("engine error: {0}")]
    Engine(EngineError),
    #[error("batch of {len} failed at {index}: {source}")]
    Batch {
        len: usize,
        index: usize,
        source: Box<Error>,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    IO(Arc<io::Error>),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::IO(Arc::new(value))
    }
}

impl From<EngineError> for Error {
    fn from(value: EngineError) -> Self {
        Error::Engine(value)
    }
}

impl Error {
    pub(crate) fn encoding(phase: Phase, cause: CodecError) -> Self {
        Self::Encoding { phase, cause }
    }

    pub(crate) fn batch(len: usize, index: usize, source: Error) -> Self {
        Self::Batch {
            len,
            index,
            source: Box::new(source),
        }
    }

    /// `true` when the engine reported the key as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
