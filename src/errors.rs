use crate::store::Variant;

#[derive(thiserror::Error, Debug)]
pub enum ExplorerError {
    #[error("unknown model variant '{0}', expected one of: tfidf, cbow, skipgram")]
    UnknownVariant(String),

    #[error("artifact for model '{0}' not found")]
    ArtifactNotFound(Variant),

    #[error("artifact for model '{variant}' is corrupt: {reason}")]
    ArtifactCorrupt { variant: Variant, reason: String },

    #[error("word '{word}' not found in {variant} vocabulary")]
    WordNotFound { word: String, variant: Variant },

    #[error("projection requires at least 2 points, selected {0}")]
    InsufficientPoints(usize),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl ExplorerError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
