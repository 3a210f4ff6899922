//! Memoized loading of embedding artifacts.
//!
//! Each variant's table is loaded at most once per process, behind a
//! mutex-guarded check-and-set so concurrent first requests do not race
//! the deserialization. Load failures are isolated per variant: a missing
//! artifact makes that variant unavailable without affecting the others.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::errors::ExplorerError;
use crate::store::artifact::{ArtifactError, FrequencyArtifact, VectorArtifact};
use crate::store::table::EmbeddingTable;
use crate::store::{Variant, FREQUENCIES_FILE};

/// Summary metadata for one model variant.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub variant: Variant,
    pub display_name: &'static str,
    pub vocab_size: usize,
    pub dimensions: usize,
    pub loaded: bool,
}

/// Holds the deserialized embedding tables for all variants.
pub struct ModelStore {
    models_dir: PathBuf,
    /// Memoized tables, populated on first access per variant.
    tables: Mutex<HashMap<Variant, Arc<EmbeddingTable>>>,
    /// Memoized shared frequency table. A missing frequency artifact
    /// degrades to an empty table; it never fails a request.
    frequencies: Mutex<Option<Arc<HashMap<String, u64>>>>,
}

impl ModelStore {
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            tables: Mutex::new(HashMap::new()),
            frequencies: Mutex::new(None),
        }
    }

    /// Deserialize a variant's artifact fresh from disk.
    pub fn load(&self, variant: Variant) -> Result<Arc<EmbeddingTable>, ExplorerError> {
        let artifact = VectorArtifact::new(self.models_dir.join(variant.artifact_file()));

        let (dimensions, entries) = artifact.load().map_err(|err| {
            if err.is_not_found() {
                ExplorerError::ArtifactNotFound(variant)
            } else {
                ExplorerError::ArtifactCorrupt {
                    variant,
                    reason: err.to_string(),
                }
            }
        })?;

        let table = EmbeddingTable::new(dimensions, entries);
        log::info!(
            "loaded {} model: {} words, {} dimensions",
            variant,
            table.len(),
            table.dimensions()
        );

        Ok(Arc::new(table))
    }

    /// The cached table for a variant, loading lazily on first access.
    pub fn get(&self, variant: Variant) -> Result<Arc<EmbeddingTable>, ExplorerError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| anyhow::anyhow!("model table lock poisoned: {e}"))?;

        if let Some(table) = tables.get(&variant) {
            return Ok(table.clone());
        }

        let table = self.load(variant)?;
        tables.insert(variant, table.clone());
        Ok(table)
    }

    /// Eagerly load every variant, isolating per-variant failures.
    ///
    /// Returns the number of variants available.
    pub fn preload(&self) -> usize {
        let mut available = 0;
        for variant in Variant::ALL {
            match self.get(variant) {
                Ok(_) => available += 1,
                Err(err) => log::warn!("model {} unavailable: {}", variant, err),
            }
        }

        // Warm the frequency table as well
        let _ = self.frequencies();

        available
    }

    /// The shared word frequency table, loading lazily on first access.
    pub fn frequencies(&self) -> Arc<HashMap<String, u64>> {
        let mut guard = match self.frequencies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(frequencies) = guard.as_ref() {
            return frequencies.clone();
        }

        let artifact = FrequencyArtifact::new(self.models_dir.join(FREQUENCIES_FILE));
        let frequencies = match artifact.load() {
            Ok(map) => {
                log::info!("loaded word frequencies: {} words", map.len());
                Arc::new(map)
            }
            Err(ArtifactError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("word frequency artifact not found, ranking by word order only");
                Arc::new(HashMap::new())
            }
            Err(err) => {
                log::error!("failed to load word frequencies: {}", err);
                Arc::new(HashMap::new())
            }
        };

        *guard = Some(frequencies.clone());
        frequencies
    }

    /// Metadata for one variant.
    ///
    /// An unloadable variant reports `loaded: false` with zero sizes
    /// rather than erroring, so listing stays total.
    pub fn model_info(&self, variant: Variant) -> ModelInfo {
        match self.get(variant) {
            Ok(table) => ModelInfo {
                variant,
                display_name: variant.display_name(),
                vocab_size: table.len(),
                dimensions: table.dimensions(),
                loaded: true,
            },
            Err(_) => ModelInfo {
                variant,
                display_name: variant.display_name(),
                vocab_size: 0,
                dimensions: 0,
                loaded: false,
            },
        }
    }

    /// Metadata for all variants.
    pub fn all_model_info(&self) -> Vec<ModelInfo> {
        Variant::ALL
            .into_iter()
            .map(|variant| self.model_info(variant))
            .collect()
    }
}
