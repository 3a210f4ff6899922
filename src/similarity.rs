//! Similarity lookups over the model store.
//!
//! All operations are pure reads over the immutable loaded tables; the
//! comparison endpoint deliberately degrades per variant instead of
//! failing outright when a word is missing from one vocabulary.

use std::sync::Arc;

use serde::Serialize;

use crate::errors::ExplorerError;
use crate::store::{ModelStore, SimilarWord, Variant};

/// One variant's entry in a cross-model comparison.
///
/// `in_vocabulary: false` with a message marks a variant where the word
/// was absent (or the variant itself was unavailable); the other
/// variants' results are unaffected.
#[derive(Debug, Clone, Serialize)]
pub struct ModelComparison {
    pub variant: Variant,
    pub similar_words: Vec<SimilarWord>,
    pub in_vocabulary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct SimilarityEngine {
    store: Arc<ModelStore>,
}

impl SimilarityEngine {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self { store }
    }

    /// Queries are matched case-insensitively against the lowercased
    /// training vocabulary.
    pub fn normalize(word: &str) -> String {
        word.trim().to_lowercase()
    }

    /// Top-k most similar words for a query word in one variant.
    pub fn top_similar(
        &self,
        variant: Variant,
        word: &str,
        k: usize,
    ) -> Result<Vec<SimilarWord>, ExplorerError> {
        if k == 0 {
            return Err(ExplorerError::invalid_parameter(
                "k",
                "must be a positive integer",
            ));
        }

        let word = Self::normalize(word);
        let table = self.store.get(variant)?;

        table
            .top_similar(&word, k)
            .ok_or(ExplorerError::WordNotFound { word, variant })
    }

    /// Run `top_similar` against every variant, producing per-variant
    /// partial results instead of failing the whole comparison.
    pub fn compare(&self, word: &str, k: usize) -> Result<Vec<ModelComparison>, ExplorerError> {
        if k == 0 {
            return Err(ExplorerError::invalid_parameter(
                "k",
                "must be a positive integer",
            ));
        }

        Ok(Variant::ALL
            .into_iter()
            .map(|variant| match self.top_similar(variant, word, k) {
                Ok(similar_words) => ModelComparison {
                    variant,
                    similar_words,
                    in_vocabulary: true,
                    message: None,
                },
                Err(err) => ModelComparison {
                    variant,
                    similar_words: Vec::new(),
                    in_vocabulary: false,
                    message: Some(err.to_string()),
                },
            })
            .collect())
    }

    /// Whether a word exists in a variant's vocabulary.
    pub fn check_word(&self, variant: Variant, word: &str) -> Result<bool, ExplorerError> {
        let word = Self::normalize(word);
        let table = self.store.get(variant)?;
        Ok(table.contains(&word))
    }

    /// The `n` most frequent words of a variant's vocabulary.
    pub fn vocabulary_sample(
        &self,
        variant: Variant,
        n: usize,
    ) -> Result<Vec<String>, ExplorerError> {
        let table = self.store.get(variant)?;
        let frequencies = self.store.frequencies();
        Ok(table.select_by_frequency(&frequencies, n))
    }
}
