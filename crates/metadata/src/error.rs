use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Structural information unavailable for {path}: {reason}")]
    StructureUnavailable { path: String, reason: String },
}

impl MetadataError {
    pub fn structure_unavailable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StructureUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
