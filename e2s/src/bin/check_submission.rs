use clap::Parser;
use submission::{read_submission, validate_submission, DEFAULT_EMBEDDING_DIM};

/// clap parser
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to submission csv
    submission_path: String,
    /// Expected embedding dimension
    #[arg(short, long, default_value_t = DEFAULT_EMBEDDING_DIM)]
    dim: usize,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    log::info!("Checking {}", args.submission_path);
    let records = read_submission(&args.submission_path)?;
    validate_submission(&records, args.dim)?;

    println!("{} records, embedding dimension {}: ok", records.len(), args.dim);

    Ok(())
}
