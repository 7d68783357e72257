// Sampling and offset helpers shared by the dataset accessors.

use anyhow::ensure;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Builds the generator used for every random choice in the workspace.
///
/// A fixed seed gives a reproducible sequence of season permutations,
/// bundle subsamples and embeddings; `None` seeds from the OS.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    }
}

/// Seed for one named random stream out of a shared run seed.
///
/// Consumers of the same run seed (season draws, shuffling, embeddings) each
/// take their own stream so their draws are independent. `None` stays `None`.
pub fn stream_seed(seed: Option<u64>, stream: u64) -> Option<u64> {
    seed.map(|seed| seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

// Picks k distinct indices from 0..n, in random order (a prefix of a random permutation)
pub fn sample_indices<R: Rng + ?Sized>(rng: &mut R, n: usize, k: usize) -> anyhow::Result<Vec<usize>> {
    ensure!(k <= n, "Cannot sample {k} distinct indices from a range of {n}");
    Ok(index::sample(rng, n, k).into_vec())
}

// Exclusive prefix sums: the start offset of each count
pub fn cumulative_offsets(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |acc, &count| {
            let start = *acc;
            *acc += count;
            Some(start)
        })
        .collect()
}
