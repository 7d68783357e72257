//! Sequential batching over a [`Dataset`].
//!
//! Samples are read one at a time on the calling thread and merged with
//! [`collate`]. Shuffling draws a fresh permutation per call to `iter`.

use crate::collate::collate;
use crate::{Batch, Dataset};
use anyhow::ensure;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use utils::rng_from_seed;

pub struct DataLoader<D> {
    dataset: D,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    rng: Mutex<ChaCha8Rng>,
}

impl<D: Dataset> DataLoader<D> {
    pub fn new(dataset: D, batch_size: usize) -> anyhow::Result<Self> {
        ensure!(batch_size > 0, "Batch size must be at least 1");
        Ok(Self {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            rng: Mutex::new(rng_from_seed(None)),
        })
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.rng = Mutex::new(rng_from_seed(seed));
        self
    }

    /// Skip the final batch when it is shorter than `batch_size`.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }

    pub fn iter(&self) -> DataLoaderIter<'_, D> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut *self.rng.lock());
        }
        if self.drop_last {
            indices.truncate(self.num_batches() * self.batch_size);
        }

        DataLoaderIter {
            loader: self,
            indices,
            position: 0,
        }
    }
}

pub struct DataLoaderIter<'a, D> {
    loader: &'a DataLoader<D>,
    indices: Vec<usize>,
    position: usize,
}

impl<D: Dataset> Iterator for DataLoaderIter<'_, D> {
    type Item = anyhow::Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.indices.len() {
            return None;
        }
        let end = (self.position + self.loader.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.position..end];
        self.position = end;

        let samples = batch_indices
            .iter()
            .map(|&idx| self.loader.dataset.get(idx))
            .collect::<anyhow::Result<Vec<_>>>();
        Some(samples.and_then(collate))
    }
}

impl<'a, D: Dataset> IntoIterator for &'a DataLoader<D> {
    type Item = anyhow::Result<Batch>;
    type IntoIter = DataLoaderIter<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
