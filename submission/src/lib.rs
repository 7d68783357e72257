//! Submission files for the embedding challenge.
//!
//! A submission is a CSV with columns `id` and `embedding`, the embedding
//! written as a bracketed literal such as `[0.12,-1.5,0.0]`.

use anyhow::{anyhow, ensure, Context};
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub embedding: String,
}

impl SubmissionRecord {
    /// The record as unquoted `id,embedding` text.
    pub fn to_row(&self) -> String {
        format!("{},{}", self.id, self.embedding)
    }
}

/// Renders values as `[v0,v1,...]` in the shortest form that parses back to the
/// same `f32` (`1.0`, `0.1`, `1e-7`).
pub fn format_embedding<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a f32>,
{
    format!("[{}]", values.into_iter().map(|v| format!("{v:?}")).join(","))
}

/// Inverse of [`format_embedding`].
pub fn parse_embedding(text: &str) -> anyhow::Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| anyhow!("Embedding is not a bracketed list: {text:.40}"))?;

    if inner.trim().is_empty() {
        return Ok(vec![]);
    }
    inner
        .split(',')
        .map(|value| {
            value
                .trim()
                .parse::<f32>()
                .with_context(|| format!("Bad embedding value '{}'", value.trim()))
        })
        .collect()
}

/// One record per embedding, in map order.
pub fn create_submission(embeddings: &IndexMap<String, Array1<f32>>) -> Vec<SubmissionRecord> {
    embeddings
        .iter()
        .map(|(id, embedding)| SubmissionRecord {
            id: id.clone(),
            embedding: format_embedding(embedding),
        })
        .collect()
}

pub fn write_submission<W: Write>(writer: W, records: &[SubmissionRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_submission_file<P: AsRef<Path>>(path: P, records: &[SubmissionRecord]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    write_submission(file, records)?;
    tracing::info!("Wrote {} submission records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_submission<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<SubmissionRecord>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("Opening {}", path.display()))?;
    let records = rdr
        .deserialize()
        .collect::<Result<Vec<SubmissionRecord>, _>>()?;
    Ok(records)
}

/// Checks ids are unique and every embedding parses to `expected_dim` finite values.
pub fn validate_submission(records: &[SubmissionRecord], expected_dim: usize) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for (row, record) in records.iter().enumerate() {
        ensure!(!record.id.is_empty(), "Row {row} has an empty id");
        ensure!(seen.insert(record.id.as_str()), "Duplicate id {} at row {row}", record.id);

        let values = parse_embedding(&record.embedding).with_context(|| format!("Row {row} ({})", record.id))?;
        ensure!(
            values.len() == expected_dim,
            "Row {row} ({}) has {} values, expected {expected_dim}",
            record.id,
            values.len()
        );
        ensure!(
            values.iter().all(|v| v.is_finite()),
            "Row {row} ({}) has non-finite values",
            record.id
        );
    }
    Ok(())
}

/// Stand-in embedding drawn from N(0, 1).
pub fn random_embedding<R: Rng + ?Sized>(rng: &mut R, dim: usize) -> Array1<f32> {
    (0..dim).map(|_| rng.sample::<f32, _>(StandardNormal)).collect()
}
