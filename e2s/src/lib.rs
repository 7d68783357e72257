// Settings shared by the challenge binaries, read from a TOML file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct E2sConfig {
    pub data: DataConfig,
    pub submission: SubmissionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,            // one sub-folder per modality
    pub modalities: Vec<String>,  // folder names, in channel order
    pub dataset_name: String,     // variable inside each zarr archive
    pub seasons: usize,
    pub randomize_seasons: bool,
    pub batch_size: usize,
    pub seed: Option<u64>,        // unset: seeded from the OS
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/path/to/challenge/data/"),
            modalities: vec!["s2l2a".to_string(), "s2l1c".to_string(), "s1".to_string()],
            dataset_name: "bands".to_string(),
            seasons: 4,
            randomize_seasons: false,
            batch_size: 2,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub embedding_dim: usize,
    pub num_embeddings: usize, // number of batches to embed before stopping
    pub output_path: PathBuf,
    pub write: bool,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            embedding_dim: submission::DEFAULT_EMBEDDING_DIM,
            num_embeddings: 10,
            output_path: PathBuf::from("./random_embeddings.csv"),
            write: false,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<E2sConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&contents)?)
}
