// Dao impl for the Embed2Scale challenge archives

pub mod challenge_dataset;
pub mod collate;
pub mod layout;
pub mod loader;
pub mod modality;
pub mod ssl4eo_dataset;
pub mod transform;
pub mod zarr_loader;

#[cfg(test)]
mod fixtures;

pub use challenge_dataset::{ChallengeDataset, ChallengeDatasetBuilder};
pub use collate::{collate, collate_one};
pub use layout::ChannelLayout;
pub use loader::DataLoader;
pub use modality::{normalization_stats, Modality};
pub use ssl4eo_dataset::{Ssl4eoDataset, Ssl4eoDatasetBuilder};
pub use transform::{Compose, Normalize, Transform};

use indexmap::IndexMap;
use ndarray::ArrayD;

/// Imagery as `[B, T, C, H, W]`, or `[B, C, H, W]` for single timestamps.
/// The channel axis is always the third from last.
pub type Tensor = ArrayD<f32>;

/// Tensor output of a dataset: all modalities stacked along the channel axis,
/// or one tensor per modality in the order the modalities were requested.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Concat(Tensor),
    ByModality(IndexMap<String, Tensor>),
}

impl SampleData {
    pub fn as_concat(&self) -> Option<&Tensor> {
        match self {
            SampleData::Concat(tensor) => Some(tensor),
            SampleData::ByModality(_) => None,
        }
    }

    pub fn as_by_modality(&self) -> Option<&IndexMap<String, Tensor>> {
        match self {
            SampleData::Concat(_) => None,
            SampleData::ByModality(tensors) => Some(tensors),
        }
    }

    /// Size of the leading sample axis.
    pub fn num_samples(&self) -> usize {
        match self {
            SampleData::Concat(tensor) => tensor.shape()[0],
            SampleData::ByModality(tensors) => tensors.values().next().map_or(0, |t| t.shape()[0]),
        }
    }
}

/// One item of a dataset, optionally tagged with the id of the archive it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub data: SampleData,
    pub file_name: Option<String>,
}

/// Samples merged along the sample axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub data: SampleData,
    pub file_names: Option<Vec<String>>,
}

/// Indexable source of samples.
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, idx: usize) -> anyhow::Result<Sample>;
}
