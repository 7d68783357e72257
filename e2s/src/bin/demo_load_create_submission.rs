/*
  Embed2Scale challenge demo.
  Loads the challenge data with the per-sample challenge dataset, then with the
  bundled SSL4EO-S12 v1.1 dataset, and finally builds a submission file from
  randomly generated embeddings.
*/

use anyhow::{ensure, Result};
use clap::Parser;
use dao::{
    ChallengeDataset, DataLoader, Dataset, Normalize, SampleData, Ssl4eoDataset,
};
use e2s::{load_config, E2sConfig};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::time::Instant;
use submission::{create_submission, random_embedding, write_submission_file};
use utils::{rng_from_seed, stream_seed};

// Independent random streams derived from the run seed
const SEASON_STREAM: u64 = 0;
const SHUFFLE_STREAM: u64 = 1;
const EMBEDDING_STREAM: u64 = 2;

/// clap parser
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to challenge data, one sub-folder per modality
    data_path: Option<PathBuf>,
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Path to the submission csv
    #[arg(short, long)]
    output_path: Option<PathBuf>,
    /// Save the submission csv at the end
    #[arg(short, long)]
    write: bool,
    /// Seed for season, shuffle and embedding randomness
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    embedding_dim: Option<usize>,
    /// Number of batches to embed before stopping
    #[arg(long)]
    num_embeddings: Option<usize>,
}

fn settings(args: &Args) -> Result<E2sConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => E2sConfig::default(),
    };
    if let Some(path) = &args.data_path {
        config.data.path = path.clone();
    }
    if let Some(path) = &args.output_path {
        config.submission.output_path = path.clone();
    }
    config.submission.write |= args.write;
    config.data.seed = args.seed.or(config.data.seed);
    config.data.batch_size = args.batch_size.unwrap_or(config.data.batch_size);
    config.submission.embedding_dim = args.embedding_dim.unwrap_or(config.submission.embedding_dim);
    config.submission.num_embeddings = args.num_embeddings.unwrap_or(config.submission.num_embeddings);
    Ok(config)
}

fn challenge_dataset(config: &E2sConfig, concat: bool, output_file_name: bool) -> Result<ChallengeDataset> {
    let data = &config.data;
    ChallengeDataset::builder(&data.path, &data.modalities)
        .dataset_name(&data.dataset_name)
        .seasons(data.seasons)
        .randomize_seasons(data.randomize_seasons)
        .transform(Normalize::for_modalities(&data.modalities)?)
        .concat(concat)
        .output_file_name(output_file_name)
        .seed(stream_seed(data.seed, SEASON_STREAM))
        .build()
}

fn show_shapes(data: &SampleData) {
    match data {
        SampleData::Concat(tensor) => println!("{:?}", tensor.shape()),
        SampleData::ByModality(tensors) => {
            for (modality, tensor) in tensors {
                println!("Modality {modality} shape: {:?}", tensor.shape());
            }
        }
    }
}

fn main() -> Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = settings(&args)?;
    let start = Instant::now();

    log::info!("Loading challenge data from {}", config.data.path.display());

    // Example 1: modalities kept apart, [n_samples, n_seasons, n_channels, height, width] each
    let dataset = challenge_dataset(&config, false, false)?;
    println!("Length of train dataset: {}", dataset.len());
    ensure!(!dataset.is_empty(), "No samples found under {}", config.data.path.display());
    show_shapes(&dataset.get(0)?.data);

    // Example 2: modalities concatenated along channels, with the sample id
    let dataset_e2s = challenge_dataset(&config, true, true)?;
    println!("Length of train dataset: {}", dataset_e2s.len());
    let first = dataset_e2s.get(0)?;
    show_shapes(&first.data);

    // The challenge archives hold one sample each; SSL4EO-S12 v1.1 bundles 64.
    let dataset_ssl4eo = Ssl4eoDataset::builder(&config.data.path)
        .modalities(&config.data.modalities)
        .dataset_name(&config.data.dataset_name)
        .transform(Normalize::for_modalities(&config.data.modalities)?)
        .concat(true)
        .single_timestamp(false)
        .num_batch_samples(Some(1))
        .num_timestamps(4)
        .seed(stream_seed(config.data.seed, SEASON_STREAM))
        .build()?;
    println!("Length of train dataset: {}", dataset_ssl4eo.len());
    let first_ssl4eo = dataset_ssl4eo.get(0)?;
    show_shapes(&first_ssl4eo.data);
    println!(
        "The two datasets' first sample is the same: {}",
        first.data == first_ssl4eo.data
    );

    let loader = DataLoader::new(dataset_e2s, config.data.batch_size)?
        .shuffle(true)
        .seed(stream_seed(config.data.seed, SHUFFLE_STREAM));

    if let Some(batch) = loader.iter().next() {
        let batch = batch?;
        for (find, file_name) in batch.file_names.iter().flatten().enumerate() {
            println!("File name {find}: {}...", file_name.chars().take(10).collect::<String>());
        }
        show_shapes(&batch.data);
    }

    // Submission from embeddings drawn at random
    let embedding_dim = config.submission.embedding_dim;
    let mut rng = rng_from_seed(stream_seed(config.data.seed, EMBEDDING_STREAM));
    let mut embeddings = IndexMap::new();
    for (ind, batch) in loader.iter().enumerate() {
        let batch = batch?;

        // -------------------------
        // Do compression magic here
        // -------------------------

        for file_name in batch.file_names.unwrap_or_default() {
            embeddings.insert(file_name, random_embedding(&mut rng, embedding_dim));
        }

        if ind + 1 >= config.submission.num_embeddings {
            break;
        }
    }

    let records = create_submission(&embeddings);
    log::info!("Created {} embeddings of dimension {embedding_dim}", records.len());

    println!("{:>4}  {:<20} embedding", "", "id");
    for (row, record) in records.iter().take(5).enumerate() {
        let preview = record.embedding.chars().take(40).collect::<String>();
        println!("{row:>4}  {:<20} {preview}...", record.id);
    }

    if config.submission.write {
        write_submission_file(&config.submission.output_path, &records)?;
        println!("Submission saved to {}", config.submission.output_path.display());
    }

    log::info!("Finished in {} ms", start.elapsed().as_millis());

    Ok(())
}
