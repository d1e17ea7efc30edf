use thiserror::Error;
use uplink_remote::RemoteError;

#[derive(Error, Debug)]
pub enum BatchError {
    /// One serialized chunk payload is bigger than the remote accepts.
    /// The owning document is skipped; the run continues.
    #[error(
        "chunk {chunk_index} of {path} is {size} bytes, over the per-file limit of {limit} bytes"
    )]
    ChunkTooLarge {
        path: String,
        chunk_index: usize,
        size: u64,
        limit: u64,
    },

    /// The mapping log could not be read or written.
    #[error("mapping store: {0}")]
    Mapping(#[from] std::io::Error),

    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    /// Credential or unreachable-store class failures. These abort the
    /// run; the mapping already reflects true state.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl BatchError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
