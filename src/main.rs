use clap::Parser;
use std::sync::Arc;

mod cli;
mod config;
mod errors;
mod import;
mod projection;
mod similarity;
mod storage;
mod store;
mod web;

use config::Config;
use projection::{Method, ProjectionEngine};
use similarity::SimilarityEngine;
use store::{ModelStore, Variant};

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let config = Config::load_with(&args.base_path);

    match args.command {
        cli::Command::Daemon {} => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                )
                .init();

            web::start_daemon(config);
            Ok(())
        }

        cli::Command::Models { variant } => {
            let store = ModelStore::new(config.models_dir.clone().into());

            match variant {
                Some(variant) => {
                    let variant: Variant = variant.parse()?;
                    let info = store.model_info(variant);
                    println!("{}", serde_json::to_string_pretty(&info).unwrap());
                }
                None => {
                    let infos = store.all_model_info();
                    println!("{}", serde_json::to_string_pretty(&infos).unwrap());
                }
            }
            Ok(())
        }

        cli::Command::Similar { word, variant, k } => {
            let variant: Variant = variant.parse()?;
            let k = k.unwrap_or(config.similarity.default_k);

            let store = Arc::new(ModelStore::new(config.models_dir.clone().into()));
            let engine = SimilarityEngine::new(store);

            let similar = engine.top_similar(variant, &word, k)?;
            println!("{}", serde_json::to_string_pretty(&similar).unwrap());
            Ok(())
        }

        cli::Command::Compare { word, k } => {
            let k = k.unwrap_or(config.similarity.default_k);

            let store = Arc::new(ModelStore::new(config.models_dir.clone().into()));
            let engine = SimilarityEngine::new(store);

            let results = engine.compare(&word, k)?;
            println!("{}", serde_json::to_string_pretty(&results).unwrap());
            Ok(())
        }

        cli::Command::Project {
            variant,
            method,
            max_points,
        } => {
            let variant: Variant = variant.parse()?;
            let method: Method = method
                .as_deref()
                .unwrap_or(config.projection.default_method.as_str())
                .parse()?;
            let max_points = max_points.unwrap_or(config.projection.default_max_points);

            let store = Arc::new(ModelStore::new(config.models_dir.clone().into()));
            let engine = ProjectionEngine::new(store, config.projection.clone());

            let points = engine.project(variant, method, max_points)?;
            println!("{}", serde_json::to_string_pretty(&points).unwrap());
            Ok(())
        }

        cli::Command::Import {
            variant,
            vectors,
            frequencies,
        } => {
            let variant: Variant = variant.parse()?;
            let models_dir = std::path::PathBuf::from(&config.models_dir);

            let imported = import::import_vectors(&models_dir, variant, &vectors)?;
            println!("{imported} vectors imported for {variant}");

            if let Some(frequencies) = frequencies {
                let imported = import::import_frequencies(&models_dir, &frequencies)?;
                println!("{imported} word frequencies imported");
            }
            Ok(())
        }
    }
}
