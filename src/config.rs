use crate::storage::{self, StorageManager};
use serde::{Deserialize, Serialize};

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

/// Default number of similar words returned per query
const DEFAULT_SIMILAR_K: usize = 10;
/// Upper bound for `k` accepted over the API
const DEFAULT_MAX_K: usize = 50;

/// Default number of words included in a projection
const DEFAULT_MAX_POINTS: usize = 500;
/// Hard cap on projection size (t-SNE is quadratic in point count)
const DEFAULT_MAX_POINTS_CAP: usize = 2000;
/// t-SNE perplexity
const DEFAULT_PERPLEXITY: f32 = 30.0;
/// t-SNE gradient descent iterations
const DEFAULT_TSNE_ITERS: usize = 1000;
/// Seed for PCA start vectors and t-SNE initialization
const DEFAULT_SEED: u64 = 42;

/// Configuration for similarity lookups
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Number of similar words returned when `k` is not given
    #[serde(default = "default_similar_k")]
    pub default_k: usize,

    /// Largest `k` a request may ask for
    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_SIMILAR_K,
            max_k: DEFAULT_MAX_K,
        }
    }
}

fn default_similar_k() -> usize {
    DEFAULT_SIMILAR_K
}

fn default_max_k() -> usize {
    DEFAULT_MAX_K
}

/// Configuration for 2D projection of embeddings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Reduction method used when the request does not name one ("pca" or "tsne")
    #[serde(default = "default_method")]
    pub default_method: String,

    /// Number of words projected when `max_points` is not given
    #[serde(default = "default_max_points")]
    pub default_max_points: usize,

    /// Hard cap on the number of projected words
    #[serde(default = "default_max_points_cap")]
    pub max_points: usize,

    /// t-SNE perplexity (clamped per-request to the selected point count)
    #[serde(default = "default_perplexity")]
    pub perplexity: f32,

    /// t-SNE gradient descent iterations
    #[serde(default = "default_tsne_iters")]
    pub tsne_iters: usize,

    /// RNG seed, fixed so repeated projections are identical
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_string(),
            default_max_points: DEFAULT_MAX_POINTS,
            max_points: DEFAULT_MAX_POINTS_CAP,
            perplexity: DEFAULT_PERPLEXITY,
            tsne_iters: DEFAULT_TSNE_ITERS,
            seed: DEFAULT_SEED,
        }
    }
}

const DEFAULT_METHOD: &str = "pca";

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn default_max_points() -> usize {
    DEFAULT_MAX_POINTS
}

fn default_max_points_cap() -> usize {
    DEFAULT_MAX_POINTS_CAP
}

fn default_perplexity() -> f32 {
    DEFAULT_PERPLEXITY
}

fn default_tsne_iters() -> usize {
    DEFAULT_TSNE_ITERS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the model artifact files
    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: DEFAULT_MODELS_DIR.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            similarity: SimilarityConfig::default(),
            projection: ProjectionConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_models_dir() -> String {
    DEFAULT_MODELS_DIR.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    fn validate(&mut self) {
        if self.similarity.default_k == 0 {
            panic!("similarity.default_k must be greater than 0");
        }

        if self.similarity.max_k < self.similarity.default_k {
            panic!(
                "similarity.max_k must be at least default_k ({})",
                self.similarity.default_k
            );
        }

        let proj = &self.projection;
        if proj.default_method != "pca" && proj.default_method != "tsne" {
            panic!(
                "projection.default_method must be 'pca' or 'tsne', got '{}'",
                proj.default_method
            );
        }

        if proj.default_max_points < 2 || proj.max_points < 2 {
            panic!("projection point counts must be at least 2");
        }

        if proj.default_max_points > proj.max_points {
            panic!(
                "projection.default_max_points must not exceed projection.max_points ({})",
                proj.max_points
            );
        }

        if !proj.perplexity.is_finite() || proj.perplexity < 1.0 {
            panic!(
                "projection.perplexity must be at least 1.0, got {}",
                proj.perplexity
            );
        }

        if proj.tsne_iters == 0 {
            panic!("projection.tsne_iters must be greater than 0");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        let store = storage::BackendLocal::new(base_path).expect("cannot create base directory");

        // create new if does not exist
        if !store.exists("config.yaml") {
            store
                .write(
                    "config.yaml",
                    serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
                )
                .expect("cannot write default config");
        }

        let config_str = String::from_utf8(store.read("config.yaml").expect("cannot read config"))
            .expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let store =
            storage::BackendLocal::new(&self.base_path).expect("cannot create base directory");

        let config_str = serde_yml::to_string(&self).unwrap();
        store
            .write("config.yaml", config_str.as_bytes())
            .expect("cannot write config");
    }
}
