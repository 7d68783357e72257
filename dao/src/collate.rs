//! Merging of per-sample outputs into batches.
//!
//! Samples already carry a leading sample axis (`[1, T, C, H, W]` for the
//! challenge archives), so batching concatenates along that axis instead of
//! stacking onto a new one.

use crate::{Batch, Sample, SampleData, Tensor};
use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use ndarray::{concatenate, Axis};

/// Concatenates samples along axis 0, per modality for split outputs.
/// Identifiers are kept in batch order when every sample carries one.
pub fn collate(batch: Vec<Sample>) -> anyhow::Result<Batch> {
    if batch.is_empty() {
        bail!("Cannot collate an empty batch");
    }

    let file_names = match batch.iter().filter(|s| s.file_name.is_some()).count() {
        0 => None,
        n if n == batch.len() => Some(batch.iter().filter_map(|s| s.file_name.clone()).collect()),
        n => bail!("Only {n} of {} samples carry a file name", batch.len()),
    };

    let data = batch.into_iter().map(|sample| sample.data).collect::<Vec<_>>();
    let data = match &data[0] {
        SampleData::Concat(_) => {
            let tensors = data
                .iter()
                .map(|d| d.as_concat().ok_or_else(|| anyhow!("Cannot mix concatenated and per-modality samples")))
                .collect::<anyhow::Result<Vec<_>>>()?;
            SampleData::Concat(concat_samples(&tensors)?)
        }
        SampleData::ByModality(first) => {
            let maps = data
                .iter()
                .map(|d| d.as_by_modality().ok_or_else(|| anyhow!("Cannot mix concatenated and per-modality samples")))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut merged = IndexMap::new();
            for modality in first.keys() {
                let tensors = maps
                    .iter()
                    .map(|map| map.get(modality).ok_or_else(|| anyhow!("Sample is missing modality {modality}")))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                merged.insert(modality.clone(), concat_samples(&tensors)?);
            }
            SampleData::ByModality(merged)
        }
    };

    Ok(Batch { data, file_names })
}

/// A lone sample goes through the same path as a batch of one.
pub fn collate_one(sample: Sample) -> anyhow::Result<Batch> {
    collate(vec![sample])
}

fn concat_samples(tensors: &[&Tensor]) -> anyhow::Result<Tensor> {
    let views = tensors.iter().map(|t| t.view()).collect::<Vec<_>>();
    Ok(concatenate(Axis(0), &views)?)
}
