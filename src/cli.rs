use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Base directory holding config.yaml
    #[clap(long, default_value = ".")]
    pub base_path: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the embedding query service.
    Daemon {},

    /// Print model metadata
    Models {
        /// Restrict output to one variant (tfidf, cbow, skipgram)
        #[clap(short, long)]
        variant: Option<String>,
    },

    /// Look up the most similar words
    Similar {
        /// The query word
        word: String,

        /// Model variant to query
        #[clap(short, long, default_value = "tfidf")]
        variant: String,

        /// Number of similar words to return
        #[clap(short)]
        k: Option<usize>,
    },

    /// Compare similar words across all model variants
    Compare {
        /// The query word
        word: String,

        /// Number of similar words per variant
        #[clap(short)]
        k: Option<usize>,
    },

    /// Reduce a model's vocabulary to 2D coordinates
    Project {
        /// Model variant to project
        #[clap(short, long, default_value = "tfidf")]
        variant: String,

        /// Reduction method (pca or tsne)
        #[clap(short, long)]
        method: Option<String>,

        /// Number of most frequent words to include
        #[clap(long)]
        max_points: Option<usize>,
    },

    /// Convert offline training output into binary artifacts
    Import {
        /// Variant the vector file belongs to
        #[clap(short, long)]
        variant: String,

        /// Vector file in word2vec text format
        #[clap(long)]
        vectors: PathBuf,

        /// Optional word<TAB>count frequency file
        #[clap(long)]
        frequencies: Option<PathBuf>,
    },
}
