//! Model store for pre-trained word-embedding artifacts.
//!
//! Artifacts are produced offline and deserialized once per process:
//!
//! - `artifact`: binary file I/O for `<variant>.vec` and `word_frequencies.bin`
//! - `table`: immutable in-memory embedding table with cosine similarity scan
//! - `store`: per-variant memoized loading with failure isolation

pub mod artifact;
mod store;
mod table;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use store::{ModelInfo, ModelStore};
pub use table::{EmbeddingTable, SimilarWord};

use crate::errors::ExplorerError;

/// File name of the shared word frequency artifact
pub const FREQUENCIES_FILE: &str = "word_frequencies.bin";

/// The three embedding model variants served by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Tfidf,
    Cbow,
    Skipgram,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Tfidf, Variant::Cbow, Variant::Skipgram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Tfidf => "tfidf",
            Variant::Cbow => "cbow",
            Variant::Skipgram => "skipgram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Variant::Tfidf => "TF-IDF (LSA)",
            Variant::Cbow => "Word2Vec (CBOW)",
            Variant::Skipgram => "Word2Vec (Skip-Gram)",
        }
    }

    /// File name of this variant's vector artifact.
    pub fn artifact_file(&self) -> String {
        format!("{}.vec", self.as_str())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tfidf" => Ok(Variant::Tfidf),
            "cbow" => Ok(Variant::Cbow),
            "skipgram" => Ok(Variant::Skipgram),
            other => Err(ExplorerError::UnknownVariant(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trip() {
        for variant in Variant::ALL {
            assert_eq!(variant.as_str().parse::<Variant>().unwrap(), variant);
        }
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let result = "word2vec".parse::<Variant>();
        assert!(matches!(result, Err(ExplorerError::UnknownVariant(_))));
    }
}
