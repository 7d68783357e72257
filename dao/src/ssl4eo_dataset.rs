// Dataset over SSL4EO-S12 v1.1 style archives, which bundle many samples per zarr.zip.
// With a bundle size of one it reads the challenge release as well.

use crate::layout::concat;
use crate::transform::Transform;
use crate::zarr_loader::{list_archives, read_bands, select_time, DEFAULT_DATASET_NAME};
use crate::{Dataset, Sample, SampleData, Tensor};
use anyhow::{anyhow, ensure, Context};
use indexmap::IndexMap;
use ndarray::Axis;
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};
use utils::{rng_from_seed, sample_indices};

pub const DEFAULT_MODALITIES: [&str; 3] = ["S2L1C", "S2L2A", "S1GRD"];
pub const DEFAULT_NUM_TIMESTAMPS: usize = 4;

pub struct Ssl4eoDatasetBuilder {
    data_dir: PathBuf,
    split_file: Option<PathBuf>,
    modalities: Vec<String>,
    dataset_name: String,
    transform: Option<Box<dyn Transform>>,
    concat: bool,
    single_timestamp: bool,
    num_timestamps: usize,
    num_batch_samples: Option<usize>,
    seed: Option<u64>,
}

impl Ssl4eoDatasetBuilder {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            split_file: None,
            modalities: DEFAULT_MODALITIES.iter().map(|m| m.to_string()).collect(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            transform: None,
            concat: false,
            single_timestamp: false,
            num_timestamps: DEFAULT_NUM_TIMESTAMPS,
            num_batch_samples: None,
            seed: None,
        }
    }

    /// Text file naming one archive per line; skips listing the data directory.
    pub fn split_file<P: AsRef<Path>>(mut self, split_file: P) -> Self {
        self.split_file = Some(split_file.as_ref().to_path_buf());
        self
    }

    pub fn modalities<S: AsRef<str>>(mut self, modalities: &[S]) -> Self {
        self.modalities = modalities.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    pub fn dataset_name(mut self, name: &str) -> Self {
        self.dataset_name = name.to_string();
        self
    }

    pub fn transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn concat(mut self, concat: bool) -> Self {
        self.concat = concat;
        self
    }

    /// Serve every timestamp of an archive as its own item, `[B, C, H, W]`.
    pub fn single_timestamp(mut self, single: bool) -> Self {
        self.single_timestamp = single;
        self
    }

    pub fn num_timestamps(mut self, num: usize) -> Self {
        self.num_timestamps = num;
        self
    }

    /// Randomly keep this many of the samples bundled in each archive.
    pub fn num_batch_samples(mut self, num: Option<usize>) -> Self {
        self.num_batch_samples = num;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> anyhow::Result<Ssl4eoDataset> {
        let first = self
            .modalities
            .first()
            .ok_or_else(|| anyhow!("No modalities provided."))?;
        ensure!(self.num_timestamps >= 1, "Number of timestamps must be at least 1");

        let archives = match &self.split_file {
            Some(split_file) => read_split_file(split_file)?,
            None => list_archives(&self.data_dir.join(first))?,
        };

        let samples = if self.single_timestamp {
            archives
                .iter()
                .flat_map(|name| std::iter::repeat_n(name.clone(), self.num_timestamps))
                .collect()
        } else {
            archives
        };
        tracing::info!("SSL4EO dataset with {} items from {}", samples.len(), self.data_dir.display());

        Ok(Ssl4eoDataset {
            data_dir: self.data_dir,
            modalities: self.modalities,
            dataset_name: self.dataset_name,
            transform: self.transform,
            concat: self.concat,
            single_timestamp: self.single_timestamp,
            num_timestamps: self.num_timestamps,
            num_batch_samples: self.num_batch_samples,
            rng: Mutex::new(rng_from_seed(self.seed)),
            samples,
        })
    }
}

fn read_split_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = fs::read_to_string(path).with_context(|| format!("Reading split file {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub struct Ssl4eoDataset {
    data_dir: PathBuf,
    modalities: Vec<String>,
    dataset_name: String,
    transform: Option<Box<dyn Transform>>,
    concat: bool,
    single_timestamp: bool,
    num_timestamps: usize,
    num_batch_samples: Option<usize>,
    rng: Mutex<ChaCha8Rng>,
    samples: Vec<String>,
}

impl Ssl4eoDataset {
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> Ssl4eoDatasetBuilder {
        Ssl4eoDatasetBuilder::new(data_dir)
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }
}

impl Dataset for Ssl4eoDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, idx: usize) -> anyhow::Result<Sample> {
        let file_name = self
            .samples
            .get(idx)
            .ok_or_else(|| anyhow!("Index {idx} out of range for dataset of length {}", self.len()))?;

        let mut per_modality: IndexMap<String, Tensor> = IndexMap::new();
        for modality in &self.modalities {
            let bands = read_bands(&self.data_dir.join(modality).join(file_name), &self.dataset_name)?;
            let bands = if self.single_timestamp {
                select_time(&bands, idx % self.num_timestamps)?
            } else {
                bands
            };
            per_modality.insert(modality.clone(), bands);
        }

        let num_samples = per_modality
            .values()
            .next()
            .map_or(0, |tensor| tensor.len_of(Axis(0)));
        if let Some(keep) = self.num_batch_samples.filter(|&keep| keep != num_samples) {
            let selected = {
                let mut rng = self.rng.lock();
                sample_indices(&mut *rng, num_samples, keep)?
            };
            for tensor in per_modality.values_mut() {
                *tensor = tensor.select(Axis(0), &selected);
            }
        }

        let (mut data, layout) = concat(&per_modality)?;

        if let Some(transform) = &self.transform {
            data = transform.apply(data)?;
        }

        let data = if self.concat {
            SampleData::Concat(data)
        } else {
            SampleData::ByModality(layout.split(&data)?)
        };

        Ok(Sample { data, file_name: None })
    }
}
