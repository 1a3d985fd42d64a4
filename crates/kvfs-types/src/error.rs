use thiserror::Error;

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("directory blob length {0} is not a multiple of the entry width")]
    MisalignedBlob(usize),

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("entry name field is not NUL-terminated")]
    UnterminatedName,

    #[error("serialization error: {0}")]
    Serialization(String),
}
