//! One-shot conversion of offline training output into binary artifacts.
//!
//! The training pipeline exports vectors in the word2vec text format
//! (`word v1 v2 ... vN` per line, optional `count dims` header line) and
//! word counts as `word<TAB>count` lines. This command packs them into
//! the artifact files the daemon loads.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};

use crate::store::artifact::{FrequencyArtifact, VectorArtifact};
use crate::store::{Variant, FREQUENCIES_FILE};

pub fn import_vectors(models_dir: &Path, variant: Variant, input: &Path) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read vector file {}", input.display()))?;

    let mut entries: Vec<(String, Vec<f32>)> = Vec::new();
    let mut dimensions: Option<usize> = None;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let word = fields.next().unwrap().to_lowercase();
        let values: Vec<f32> = fields
            .map(|field| field.parse::<f32>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("line {}: malformed vector component", line_no + 1))?;

        // word2vec text files often start with a "<count> <dims>" header
        if line_no == 0 && values.len() == 1 && word.parse::<u64>().is_ok() {
            continue;
        }

        if values.is_empty() {
            bail!("line {}: no vector components", line_no + 1);
        }

        match dimensions {
            None => dimensions = Some(values.len()),
            Some(dims) if dims != values.len() => {
                bail!(
                    "line {}: expected {} dimensions, got {}",
                    line_no + 1,
                    dims,
                    values.len()
                );
            }
            Some(_) => {}
        }

        entries.push((word, values));
    }

    let dimensions = dimensions.context("vector file contains no entries")?;

    std::fs::create_dir_all(models_dir)?;
    let artifact = VectorArtifact::new(models_dir.join(variant.artifact_file()));
    artifact.save(dimensions, &entries)?;

    log::info!(
        "imported {} vectors ({} dims) into {}",
        entries.len(),
        dimensions,
        artifact.path().display()
    );

    Ok(entries.len())
}

pub fn import_frequencies(models_dir: &Path, input: &Path) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("cannot read frequency file {}", input.display()))?;

    let mut frequencies: HashMap<String, u64> = HashMap::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (word, count) = line
            .split_once('\t')
            .with_context(|| format!("line {}: expected 'word<TAB>count'", line_no + 1))?;
        let count: u64 = count
            .trim()
            .parse()
            .with_context(|| format!("line {}: malformed count", line_no + 1))?;

        frequencies.insert(word.to_lowercase(), count);
    }

    std::fs::create_dir_all(models_dir)?;
    let artifact = FrequencyArtifact::new(models_dir.join(FREQUENCIES_FILE));
    artifact.save(&frequencies)?;

    log::info!("imported {} word frequencies", frequencies.len());

    Ok(frequencies.len())
}
