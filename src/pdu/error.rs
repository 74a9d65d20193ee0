use thiserror::Error;

/// Failures the codec can report, per the wire contract in spec.md §4.1 / §7.
#[derive(Debug, Error)]
pub enum CodecError {
    /// `decode` could not make sense of the bytes on the wire.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// `encode` was asked to serialize a PDU with a field that does not fit
    /// its SMPP-defined maximum.
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        CodecError::MalformedFrame(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        CodecError::EncodingError(msg.into())
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, CodecError::MalformedFrame(_))
    }

    pub fn is_encoding(&self) -> bool {
        matches!(self, CodecError::EncodingError(_))
    }
}
