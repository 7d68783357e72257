// Dataset over the challenge release: one zarr.zip per sample and modality

use crate::layout::concat;
use crate::transform::Transform;
use crate::zarr_loader::{list_archives, read_bands, sample_id, select_times, DEFAULT_DATASET_NAME};
use crate::{Dataset, Sample, SampleData, Tensor};
use anyhow::{anyhow, ensure};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use utils::{rng_from_seed, sample_indices};

pub const MAX_SEASONS: usize = 4;

pub struct ChallengeDatasetBuilder {
    data_path: PathBuf,
    modalities: Vec<String>,
    dataset_name: String,
    seasons: usize,
    randomize_seasons: bool,
    concat: bool,
    output_file_name: bool,
    transform: Option<Box<dyn Transform>>,
    seed: Option<u64>,
}

impl ChallengeDatasetBuilder {
    /// `data_path` holds one sub-folder per modality, named as in `modalities`.
    pub fn new<P: AsRef<Path>, S: AsRef<str>>(data_path: P, modalities: &[S]) -> Self {
        Self {
            data_path: data_path.as_ref().to_path_buf(),
            modalities: modalities.iter().map(|m| m.as_ref().to_string()).collect(),
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            seasons: MAX_SEASONS,
            randomize_seasons: false,
            concat: true,
            output_file_name: false,
            transform: None,
            seed: None,
        }
    }

    pub fn dataset_name(mut self, name: &str) -> Self {
        self.dataset_name = name.to_string();
        self
    }

    pub fn seasons(mut self, seasons: usize) -> Self {
        self.seasons = seasons;
        self
    }

    pub fn randomize_seasons(mut self, randomize: bool) -> Self {
        self.randomize_seasons = randomize;
        self
    }

    pub fn concat(mut self, concat: bool) -> Self {
        self.concat = concat;
        self
    }

    pub fn output_file_name(mut self, output: bool) -> Self {
        self.output_file_name = output;
        self
    }

    pub fn transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> anyhow::Result<ChallengeDataset> {
        ensure!(
            (1..=MAX_SEASONS).contains(&self.seasons),
            "Number of seasons must be integer between 1 and {MAX_SEASONS}, got {}",
            self.seasons
        );
        let first = self
            .modalities
            .first()
            .ok_or_else(|| anyhow!("No modalities provided."))?;

        let samples = list_archives(&self.data_path.join(first))?;
        tracing::info!(
            "Found {} samples under {}",
            samples.len(),
            self.data_path.join(first).display()
        );

        // Without randomisation the first `seasons` are taken in order;
        // with it, any of the four may be drawn.
        let possible_seasons = if self.randomize_seasons { MAX_SEASONS } else { self.seasons };

        Ok(ChallengeDataset {
            data_path: self.data_path,
            modalities: self.modalities,
            dataset_name: self.dataset_name,
            seasons: self.seasons,
            randomize_seasons: self.randomize_seasons,
            possible_seasons,
            concat: self.concat,
            output_file_name: self.output_file_name,
            transform: self.transform,
            rng: Mutex::new(rng_from_seed(self.seed)),
            samples,
        })
    }
}

pub struct ChallengeDataset {
    data_path: PathBuf,
    modalities: Vec<String>,
    dataset_name: String,
    seasons: usize,
    randomize_seasons: bool,
    possible_seasons: usize,
    concat: bool,
    output_file_name: bool,
    transform: Option<Box<dyn Transform>>,
    rng: Mutex<ChaCha8Rng>,
    samples: Vec<String>,
}

impl ChallengeDataset {
    pub fn builder<P: AsRef<Path>, S: AsRef<str>>(data_path: P, modalities: &[S]) -> ChallengeDatasetBuilder {
        ChallengeDatasetBuilder::new(data_path, modalities)
    }

    pub fn modalities(&self) -> &[String] {
        &self.modalities
    }

    /// Archive file names of the first modality, in sample order.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Season indices for the next sample: ascending, or a random draw of distinct seasons.
    pub fn choose_seasons(&self) -> anyhow::Result<Vec<usize>> {
        if self.randomize_seasons {
            let mut rng = self.rng.lock();
            sample_indices(&mut *rng, self.possible_seasons, self.seasons)
        } else {
            Ok((0..self.possible_seasons).collect())
        }
    }
}

impl Dataset for ChallengeDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, idx: usize) -> anyhow::Result<Sample> {
        let file_name = self
            .samples
            .get(idx)
            .ok_or_else(|| anyhow!("Index {idx} out of range for dataset of length {}", self.len()))?;
        let seasons = self.choose_seasons()?;

        let mut per_modality: IndexMap<String, Tensor> = IndexMap::new();
        for modality in &self.modalities {
            let path = self.data_path.join(modality).join(file_name);
            let bands = read_bands(&path, &self.dataset_name)?;
            per_modality.insert(modality.clone(), select_times(&bands, &seasons)?);
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

        Ok(Sample {
            data,
            file_name: self.output_file_name.then(|| sample_id(file_name).to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{pattern_value, write_challenge_tree, FixtureModality};
    use crate::transform::Normalize;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};
    use test_case::test_case;

    const MODALITIES: [&str; 3] = ["s2l2a", "s2l1c", "s1"];

    fn challenge_tree(ids: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        write_challenge_tree(
            dir.path(),
            &[
                FixtureModality { name: "s2l2a", channels: 12 },
                FixtureModality { name: "s2l1c", channels: 13 },
                FixtureModality { name: "s1", channels: 2 },
            ],
            ids,
            4,
        )
        .unwrap();
        dir
    }

    #[test]
    fn length_matches_archive_count() {
        let dir = challenge_tree(&["c", "a", "b"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES).build().unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.samples(), &["a.zarr.zip", "b.zarr.zip", "c.zarr.zip"]);
    }

    #[test_case(0)]
    #[test_case(5)]
    fn season_count_out_of_range_is_rejected(seasons: usize) {
        let dir = challenge_tree(&["a"]);
        assert!(ChallengeDataset::builder(dir.path(), &MODALITIES).seasons(seasons).build().is_err());
    }

    #[test]
    fn empty_modality_list_is_rejected() {
        let dir = challenge_tree(&["a"]);
        let none: [&str; 0] = [];
        assert!(ChallengeDataset::builder(dir.path(), &none).build().is_err());
    }

    #[test]
    fn concatenates_modalities_along_channels() {
        let dir = challenge_tree(&["a", "b"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES)
            .output_file_name(true)
            .build()
            .unwrap();

        let sample = dataset.get(1).unwrap();
        assert_eq!(sample.file_name.as_deref(), Some("b"));

        let data = sample.data.as_concat().unwrap();
        assert_eq!(data.shape(), &[1, 4, 27, 2, 2]);
        // s2l1c channel 0 lands at channel 12, s1 channel 1 at channel 26
        assert_eq!(data[[0, 2, 12, 0, 1]], pattern_value(1, 1, 2, 0, 1));
        assert_eq!(data[[0, 3, 26, 1, 1]], pattern_value(1, 2, 3, 1, 3));
    }

    #[test]
    fn split_output_matches_concatenated_output() {
        let dir = challenge_tree(&["a"]);
        let joined = ChallengeDataset::builder(dir.path(), &MODALITIES).build().unwrap().get(0).unwrap();
        let split = ChallengeDataset::builder(dir.path(), &MODALITIES)
            .concat(false)
            .build()
            .unwrap()
            .get(0)
            .unwrap();

        let joined = joined.data.as_concat().unwrap();
        let split = split.data.as_by_modality().unwrap();
        assert_eq!(split.keys().map(String::as_str).collect::<Vec<_>>(), MODALITIES.to_vec());
        assert_eq!(split["s2l2a"].shape(), &[1, 4, 12, 2, 2]);
        assert_eq!(split["s2l1c"].shape(), &[1, 4, 13, 2, 2]);
        assert_eq!(split["s1"].shape(), &[1, 4, 2, 2, 2]);

        let (rejoined, _) = concat(split).unwrap();
        assert_eq!(&rejoined, joined);
    }

    #[test]
    fn ordered_seasons_are_ascending_prefix() {
        let dir = challenge_tree(&["a"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES).seasons(3).build().unwrap();

        assert_eq!(dataset.choose_seasons().unwrap(), vec![0, 1, 2]);

        let data = dataset.get(0).unwrap().data;
        let data = data.as_concat().unwrap();
        assert_eq!(data.shape(), &[1, 3, 27, 2, 2]);
        for t in 0..3 {
            assert_eq!(data[[0, t, 0, 0, 0]], pattern_value(0, 0, t, 0, 0));
        }
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(4)]
    fn random_seasons_are_distinct_and_in_range(seasons: usize) {
        let dir = challenge_tree(&["a"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES)
            .seasons(seasons)
            .randomize_seasons(true)
            .seed(Some(11))
            .build()
            .unwrap();

        for _ in 0..20 {
            let chosen = dataset.choose_seasons().unwrap();
            assert_eq!(chosen.len(), seasons);
            assert!(chosen.iter().all(|&s| s < MAX_SEASONS));
            assert_eq!(chosen.iter().collect::<HashSet<_>>().len(), seasons);
        }

        let data = dataset.get(0).unwrap().data;
        let data = data.as_concat().unwrap();
        assert_eq!(data.shape()[1], seasons);
        let times = (0..seasons).map(|t| data[[0, t, 0, 0, 0]] as usize / 100).collect::<HashSet<_>>();
        assert_eq!(times.len(), seasons);
    }

    #[test]
    fn random_seasons_draw_from_all_four() {
        let dir = challenge_tree(&["a"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES)
            .seasons(1)
            .randomize_seasons(true)
            .seed(Some(3))
            .build()
            .unwrap();

        let seen = (0..200).flat_map(|_| dataset.choose_seasons().unwrap()).collect::<HashSet<_>>();
        assert_eq!(seen, (0..MAX_SEASONS).collect::<HashSet<_>>());
    }

    #[test]
    fn transform_runs_before_split() {
        let dir = challenge_tree(&["a"]);
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES)
            .concat(false)
            .transform(Normalize::for_modalities(&MODALITIES).unwrap())
            .build()
            .unwrap();

        let sample = dataset.get(0).unwrap();
        let s1 = &sample.data.as_by_modality().unwrap()["s1"];
        let expected = (pattern_value(0, 2, 0, 1, 0) - -20.265) / 5.872;
        assert!((s1[[0, 0, 1, 0, 0]] - expected).abs() < 1e-3);
    }

    #[test]
    fn missing_modality_archive_fails() {
        let dir = challenge_tree(&["a"]);
        std::fs::remove_file(dir.path().join("s1").join("a.zarr.zip")).unwrap();
        let dataset = ChallengeDataset::builder(dir.path(), &MODALITIES).build().unwrap();

        assert!(dataset.get(0).is_err());
        assert!(dataset.get(1).is_err());
    }
}
