//! 2D projection of embedding tables for visualization.
//!
//! - `pca`: variance-maximizing linear projection (power iteration)
//! - `tsne`: exact neighbor-embedding for small point sets
//!
//! Both reducers run with a fixed seed from the configuration, so a
//! repeated request yields byte-identical coordinates.

mod pca;
mod tsne;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ProjectionConfig;
use crate::errors::ExplorerError;
use crate::similarity::SimilarityEngine;
use crate::store::{ModelStore, Variant};

/// Dimensionality reduction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Pca,
    Tsne,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Pca => "pca",
            Method::Tsne => "tsne",
        }
    }
}

impl FromStr for Method {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "linear"/"nonlinear" kept as aliases for callers that name
            // the projection family rather than the algorithm
            "pca" | "linear" => Ok(Method::Pca),
            "tsne" | "nonlinear" => Ok(Method::Tsne),
            other => Err(ExplorerError::invalid_parameter(
                "method",
                format!("'{other}' is not one of: pca, tsne"),
            )),
        }
    }
}

/// A word plotted at its reduced 2D position.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectedPoint {
    pub word: String,
    pub x: f32,
    pub y: f32,
    pub frequency: u64,
}

/// A point in a word-neighborhood plot.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborhoodPoint {
    pub word: String,
    pub x: f32,
    pub y: f32,
    pub similarity: f32,
    pub is_query: bool,
}

pub struct ProjectionEngine {
    store: Arc<ModelStore>,
    config: ProjectionConfig,
}

impl ProjectionEngine {
    pub fn new(store: Arc<ModelStore>, config: ProjectionConfig) -> Self {
        Self { store, config }
    }

    /// Reduce the `max_points` most frequent words of a variant to 2D.
    ///
    /// `max_points` is clamped to the configured cap; frequency ties
    /// break by ascending word order.
    pub fn project(
        &self,
        variant: Variant,
        method: Method,
        max_points: usize,
    ) -> Result<Vec<ProjectedPoint>, ExplorerError> {
        if max_points < 2 {
            return Err(ExplorerError::invalid_parameter(
                "max_points",
                "must be at least 2",
            ));
        }
        let max_points = max_points.min(self.config.max_points);

        let table = self.store.get(variant)?;
        let frequencies = self.store.frequencies();

        let words = table.select_by_frequency(&frequencies, max_points);
        if words.len() < 2 {
            return Err(ExplorerError::InsufficientPoints(words.len()));
        }

        let vectors: Vec<Vec<f32>> = words
            .iter()
            .map(|word| {
                table
                    .vector(word)
                    .map(|v| v.to_vec())
                    .ok_or_else(|| anyhow::anyhow!("selected word '{word}' missing from table"))
            })
            .collect::<Result<_, _>>()?;

        log::info!(
            "projecting {} {} words with {}",
            words.len(),
            variant,
            method.as_str()
        );
        let reduced = self.reduce(&vectors, method);

        Ok(words
            .into_iter()
            .zip(reduced)
            .map(|(word, [x, y])| {
                let frequency = frequencies.get(&word).copied().unwrap_or(0);
                ProjectedPoint {
                    word,
                    x,
                    y,
                    frequency,
                }
            })
            .collect())
    }

    /// Reduce a query word and its top-`neighbors` similar words to 2D.
    pub fn neighborhood(
        &self,
        similarity: &SimilarityEngine,
        variant: Variant,
        word: &str,
        method: Method,
        neighbors: usize,
    ) -> Result<Vec<NeighborhoodPoint>, ExplorerError> {
        let query = SimilarityEngine::normalize(word);
        let similar = similarity.top_similar(variant, &query, neighbors)?;

        let table = self.store.get(variant)?;

        let mut words = Vec::with_capacity(similar.len() + 1);
        let mut scores = Vec::with_capacity(similar.len() + 1);
        words.push(query.clone());
        scores.push(1.0f32);
        for entry in similar {
            words.push(entry.word);
            scores.push(entry.score);
        }

        if words.len() < 2 {
            return Err(ExplorerError::InsufficientPoints(words.len()));
        }

        let vectors: Vec<Vec<f32>> = words
            .iter()
            .map(|w| {
                table
                    .vector(w)
                    .map(|v| v.to_vec())
                    .ok_or_else(|| anyhow::anyhow!("neighbor '{w}' missing from table"))
            })
            .collect::<Result<_, _>>()?;

        let reduced = self.reduce(&vectors, method);

        Ok(words
            .into_iter()
            .zip(scores)
            .zip(reduced)
            .map(|((w, similarity), [x, y])| NeighborhoodPoint {
                is_query: w == query,
                word: w,
                x,
                y,
                similarity,
            })
            .collect())
    }

    fn reduce(&self, vectors: &[Vec<f32>], method: Method) -> Vec<[f32; 2]> {
        match method {
            Method::Pca => pca::reduce(vectors, self.config.seed),
            Method::Tsne => tsne::reduce(
                vectors,
                self.config.perplexity,
                self.config.tsne_iters,
                self.config.seed,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::artifact::{FrequencyArtifact, VectorArtifact};
    use crate::store::FREQUENCIES_FILE;
    use std::collections::HashMap;

    fn engine_with_fixture(dir: &std::path::Path) -> ProjectionEngine {
        let entries = vec![
            ("cat".to_string(), vec![1.0, 0.0, 0.2]),
            ("dog".to_string(), vec![0.9, 0.1, 0.2]),
            ("car".to_string(), vec![0.0, 1.0, -0.5]),
        ];
        VectorArtifact::new(dir.join(Variant::Tfidf.artifact_file()))
            .save(3, &entries)
            .unwrap();

        let mut frequencies = HashMap::new();
        frequencies.insert("cat".to_string(), 10u64);
        frequencies.insert("dog".to_string(), 5u64);
        frequencies.insert("car".to_string(), 1u64);
        FrequencyArtifact::new(dir.join(FREQUENCIES_FILE))
            .save(&frequencies)
            .unwrap();

        let store = Arc::new(ModelStore::new(dir.to_path_buf()));
        let config = ProjectionConfig {
            tsne_iters: 250,
            ..Default::default()
        };
        ProjectionEngine::new(store, config)
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("pca".parse::<Method>().unwrap(), Method::Pca);
        assert_eq!("linear".parse::<Method>().unwrap(), Method::Pca);
        assert_eq!("tsne".parse::<Method>().unwrap(), Method::Tsne);
        assert_eq!("nonlinear".parse::<Method>().unwrap(), Method::Tsne);
        assert!("umap".parse::<Method>().is_err());
    }

    #[test]
    fn test_project_returns_min_of_max_points_and_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());

        let points = engine.project(Variant::Tfidf, Method::Pca, 100).unwrap();
        assert_eq!(points.len(), 3);

        let points = engine.project(Variant::Tfidf, Method::Pca, 2).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_project_selects_most_frequent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());

        // frequencies: cat=10, dog=5, car=1 -> max_points=2 keeps cat, dog
        let points = engine.project(Variant::Tfidf, Method::Pca, 2).unwrap();
        let words: Vec<&str> = points.iter().map(|p| p.word.as_str()).collect();
        assert_eq!(words, vec!["cat", "dog"]);
        assert_eq!(points[0].frequency, 10);
    }

    #[test]
    fn test_project_coordinates_finite_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());

        for method in [Method::Pca, Method::Tsne] {
            let first = engine.project(Variant::Tfidf, method, 3).unwrap();
            let second = engine.project(Variant::Tfidf, method, 3).unwrap();

            for (a, b) in first.iter().zip(&second) {
                assert!(a.x.is_finite() && a.y.is_finite());
                assert_eq!((a.x, a.y), (b.x, b.y));
            }
        }
    }

    #[test]
    fn test_project_rejects_tiny_max_points() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());

        let result = engine.project(Variant::Tfidf, Method::Pca, 1);
        assert!(matches!(
            result,
            Err(ExplorerError::InvalidParameter { name: "max_points", .. })
        ));
    }

    #[test]
    fn test_project_insufficient_points() {
        let dir = tempfile::tempdir().unwrap();
        VectorArtifact::new(dir.path().join(Variant::Cbow.artifact_file()))
            .save(2, &[("only".to_string(), vec![1.0, 0.0])])
            .unwrap();

        let store = Arc::new(ModelStore::new(dir.path().to_path_buf()));
        let engine = ProjectionEngine::new(store, ProjectionConfig::default());

        let result = engine.project(Variant::Cbow, Method::Pca, 10);
        assert!(matches!(result, Err(ExplorerError::InsufficientPoints(1))));
    }

    #[test]
    fn test_neighborhood_marks_query() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());
        let similarity = SimilarityEngine::new(Arc::new(ModelStore::new(dir.path().to_path_buf())));

        let points = engine
            .neighborhood(&similarity, Variant::Tfidf, "Cat ", Method::Pca, 2)
            .unwrap();

        assert_eq!(points.len(), 3);
        assert!(points[0].is_query);
        assert_eq!(points[0].word, "cat");
        assert_eq!(points[0].similarity, 1.0);
        assert!(points[1..].iter().all(|p| !p.is_query));
    }

    #[test]
    fn test_neighborhood_unknown_word() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_with_fixture(dir.path());
        let similarity = SimilarityEngine::new(Arc::new(ModelStore::new(dir.path().to_path_buf())));

        let result = engine.neighborhood(&similarity, Variant::Tfidf, "plane", Method::Pca, 2);
        assert!(matches!(result, Err(ExplorerError::WordNotFound { .. })));
    }
}
