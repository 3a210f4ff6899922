//! Immutable in-memory embedding table with cosine similarity scan.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// A word with its cosine similarity score.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarWord {
    pub word: String,
    pub score: f32,
}

/// One model variant's vocabulary and vectors.
///
/// The vocabulary is sorted lexicographically at construction; positional
/// index order is therefore the documented deterministic tie-break order
/// for equal similarity scores and equal frequencies. Never mutated after
/// load.
pub struct EmbeddingTable {
    /// Words in ascending lexicographic order
    words: Vec<String>,
    /// Word -> position in `words` and `vectors`
    vocab: HashMap<String, usize>,
    /// One dense row per word, all rows `dimensions` long
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl EmbeddingTable {
    /// Build a table from deserialized artifact entries.
    ///
    /// Entries are sorted by word; duplicate words keep the first vector.
    pub fn new(dimensions: usize, entries: Vec<(String, Vec<f32>)>) -> Self {
        let mut entries = entries;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);

        let mut words = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        let mut vocab = HashMap::with_capacity(entries.len());

        for (word, vector) in entries {
            debug_assert_eq!(vector.len(), dimensions);
            vocab.insert(word.clone(), words.len());
            words.push(word);
            vectors.push(vector);
        }

        Self {
            words,
            vocab,
            vectors,
            dimensions,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn contains(&self, word: &str) -> bool {
        self.vocab.contains_key(word)
    }

    /// Words in ascending lexicographic order.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// The embedding vector for a word, if present.
    pub fn vector(&self, word: &str) -> Option<&[f32]> {
        self.vocab.get(word).map(|&idx| self.vectors[idx].as_slice())
    }

    /// Top-k most similar words by cosine similarity.
    ///
    /// Excludes the query word itself. Sorted by descending score; equal
    /// scores break by ascending word order. Returns `None` when the query
    /// word is not in the vocabulary. `k` larger than vocabulary size minus
    /// one returns all available words.
    pub fn top_similar(&self, word: &str, k: usize) -> Option<Vec<SimilarWord>> {
        let &query_idx = self.vocab.get(word)?;
        let query = &self.vectors[query_idx];
        let query_norm = l2_norm(query);

        let mut results: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .enumerate()
            .filter(|(idx, _)| *idx != query_idx)
            .map(|(idx, vector)| (idx, cosine_similarity(query, vector, query_norm)))
            .collect();

        // Descending score, ties by ascending vocabulary (word) order
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);

        Some(
            results
                .into_iter()
                .map(|(idx, score)| SimilarWord {
                    word: self.words[idx].clone(),
                    score,
                })
                .collect(),
        )
    }

    /// Select up to `max_points` words ranked by descending frequency,
    /// frequency ties broken by ascending word order. Words missing from
    /// the frequency table count as zero.
    pub fn select_by_frequency(
        &self,
        frequencies: &HashMap<String, u64>,
        max_points: usize,
    ) -> Vec<String> {
        // Walking in vocabulary order keeps the sort's tie-break stable
        let mut ranked: Vec<(&String, u64)> = self
            .words
            .iter()
            .map(|word| (word, frequencies.get(word).copied().unwrap_or(0)))
            .collect();

        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_points);

        ranked.into_iter().map(|(word, _)| word.clone()).collect()
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors; zero when either norm is zero.
/// Assumes query_norm is precomputed for efficiency.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    if query_norm < f32::EPSILON {
        return 0.0;
    }

    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat_dog_car() -> EmbeddingTable {
        EmbeddingTable::new(
            2,
            vec![
                ("cat".to_string(), vec![1.0, 0.0]),
                ("dog".to_string(), vec![0.9, 0.1]),
                ("car".to_string(), vec![0.0, 1.0]),
            ],
        )
    }

    #[test]
    fn test_vocabulary_sorted() {
        let table = cat_dog_car();
        assert_eq!(table.words(), &["car", "cat", "dog"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.dimensions(), 2);
    }

    #[test]
    fn test_top_similar_basic() {
        let table = cat_dog_car();

        let results = table.top_similar("cat", 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].word, "dog");
        assert!((results[0].score - 0.994).abs() < 0.001);
    }

    #[test]
    fn test_top_similar_excludes_query_word() {
        let table = cat_dog_car();

        let results = table.top_similar("cat", 10).unwrap();
        assert!(results.iter().all(|r| r.word != "cat"));
        // k above vocab size - 1 returns all available
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_top_similar_sorted_descending() {
        let table = cat_dog_car();

        let results = table.top_similar("cat", 10).unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_top_similar_missing_word() {
        let table = cat_dog_car();
        assert!(table.top_similar("plane", 5).is_none());
    }

    #[test]
    fn test_top_similar_deterministic() {
        let table = cat_dog_car();

        let first = table.top_similar("dog", 2).unwrap();
        let second = table.top_similar("dog", 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tie_broken_by_word_order() {
        // "b" and "c" are identical vectors, both equally similar to "a"
        let table = EmbeddingTable::new(
            2,
            vec![
                ("c".to_string(), vec![1.0, 1.0]),
                ("a".to_string(), vec![1.0, 0.0]),
                ("b".to_string(), vec![1.0, 1.0]),
            ],
        );

        let results = table.top_similar("a", 2).unwrap();
        assert_eq!(results[0].word, "b");
        assert_eq!(results[1].word, "c");
    }

    #[test]
    fn test_zero_norm_scores_zero() {
        let table = EmbeddingTable::new(
            2,
            vec![
                ("null".to_string(), vec![0.0, 0.0]),
                ("cat".to_string(), vec![1.0, 0.0]),
                ("dog".to_string(), vec![0.9, 0.1]),
            ],
        );

        // Zero-norm query: every score is 0
        let results = table.top_similar("null", 2).unwrap();
        assert!(results.iter().all(|r| r.score == 0.0));

        // Zero-norm target scores 0, ranks last
        let results = table.top_similar("cat", 2).unwrap();
        assert_eq!(results.last().unwrap().word, "null");
        assert_eq!(results.last().unwrap().score, 0.0);
    }

    #[test]
    fn test_select_by_frequency() {
        let table = cat_dog_car();

        let mut frequencies = HashMap::new();
        frequencies.insert("cat".to_string(), 10u64);
        frequencies.insert("dog".to_string(), 5u64);
        frequencies.insert("car".to_string(), 1u64);

        let selected = table.select_by_frequency(&frequencies, 2);
        assert_eq!(selected, vec!["cat".to_string(), "dog".to_string()]);
    }

    #[test]
    fn test_select_by_frequency_ties_by_word_order() {
        let table = cat_dog_car();

        // No frequency data: everything ties at zero, word order decides
        let selected = table.select_by_frequency(&HashMap::new(), 2);
        assert_eq!(selected, vec!["car".to_string(), "cat".to_string()]);
    }

    #[test]
    fn test_select_caps_at_vocab_size() {
        let table = cat_dog_car();
        let selected = table.select_by_frequency(&HashMap::new(), 100);
        assert_eq!(selected.len(), 3);
    }
}
