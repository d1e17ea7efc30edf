use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("scanning {path}: {message}")]
    Scan { path: String, message: String },

    #[error(transparent)]
    Chunker(#[from] uplink_chunker::ChunkerError),

    #[error(transparent)]
    Batch(#[from] uplink_batch::BatchError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
