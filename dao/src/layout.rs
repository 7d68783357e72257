use crate::Tensor;
use anyhow::{anyhow, ensure};
use indexmap::IndexMap;
use ndarray::{concatenate, Axis, Slice};
use utils::cumulative_offsets;

/// Where each modality sits along the channel axis of a concatenated tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    entries: Vec<ChannelRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRange {
    pub modality: String,
    pub start: usize,
    pub count: usize,
}

pub fn channel_axis(tensor: &Tensor) -> anyhow::Result<Axis> {
    ensure!(
        tensor.ndim() >= 3,
        "Tensor of shape {:?} has no channel axis",
        tensor.shape()
    );
    Ok(Axis(tensor.ndim() - 3))
}

impl ChannelLayout {
    pub fn from_counts<S: AsRef<str>>(counts: &[(S, usize)]) -> Self {
        let starts = cumulative_offsets(&counts.iter().map(|(_, count)| *count).collect::<Vec<_>>());
        let entries = counts
            .iter()
            .zip(starts)
            .map(|((modality, count), start)| ChannelRange {
                modality: modality.as_ref().to_string(),
                start,
                count: *count,
            })
            .collect();
        Self { entries }
    }

    pub fn from_tensors(tensors: &IndexMap<String, Tensor>) -> anyhow::Result<Self> {
        let counts = tensors
            .iter()
            .map(|(modality, tensor)| {
                Ok::<_, anyhow::Error>((modality.as_str(), tensor.len_of(channel_axis(tensor)?)))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::from_counts(&counts))
    }

    pub fn entries(&self) -> &[ChannelRange] {
        &self.entries
    }

    pub fn get(&self, modality: &str) -> Option<&ChannelRange> {
        self.entries.iter().find(|entry| entry.modality == modality)
    }

    pub fn total_channels(&self) -> usize {
        self.entries.last().map_or(0, |entry| entry.start + entry.count)
    }

    /// Slices a concatenated tensor back into per-modality tensors.
    pub fn split(&self, tensor: &Tensor) -> anyhow::Result<IndexMap<String, Tensor>> {
        let axis = channel_axis(tensor)?;
        ensure!(
            tensor.len_of(axis) == self.total_channels(),
            "Tensor has {} channels but the layout describes {}",
            tensor.len_of(axis),
            self.total_channels()
        );

        Ok(self
            .entries
            .iter()
            .map(|entry| {
                let slice = Slice::from(entry.start..entry.start + entry.count);
                (entry.modality.clone(), tensor.slice_axis(axis, slice).to_owned())
            })
            .collect())
    }
}

/// Stacks per-modality tensors along the channel axis, in map order.
pub fn concat(tensors: &IndexMap<String, Tensor>) -> anyhow::Result<(Tensor, ChannelLayout)> {
    let layout = ChannelLayout::from_tensors(tensors)?;
    let first = tensors.values().next().ok_or_else(|| anyhow!("No modalities to concatenate"))?;
    let axis = channel_axis(first)?;

    let views = tensors.values().map(|t| t.view()).collect::<Vec<_>>();
    let joined = concatenate(axis, &views)?;
    Ok((joined, layout))
}
