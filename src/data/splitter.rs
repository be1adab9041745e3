// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Shuffles the QA rows and holds out a test fraction:
//   - Training set: anchor/positive pairs fed to the loss
//   - Test set:     queries for the retrieval evaluator
//
// The test set gets ceil(n * test_fraction) rows, so even a
// small file keeps at least one evaluation query.
//
// Shuffling uses Fisher-Yates via rand::seq::SliceRandom. The
// RNG is seeded when the config provides a seed, so a run can
// be reproduced exactly.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

/// Build the pipeline RNG: seeded when requested, from entropy otherwise.
pub fn pipeline_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    }
}

/// Shuffle `samples` and split into (train, test).
///
/// # Arguments
/// * `samples`       - All rows (consumed by this function)
/// * `test_fraction` - Proportion held out for evaluation, e.g. 0.1
/// * `rng`           - Source of randomness for the shuffle
pub fn split_train_test<T, R: Rng + ?Sized>(
    mut samples:   Vec<T>,
    test_fraction: f64,
    rng:           &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total  = samples.len();
    let n_test = ((total as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.min(total);

    // split_off(n) moves [n..] out — the tail becomes the test set
    let test = samples.split_off(total - n_test);

    tracing::debug!(
        "Dataset split: {} train, {} test",
        samples.len(),
        test.len(),
    );

    (samples, test)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_percent_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, test)     = split_train_test(items, 0.1, &mut pipeline_rng(Some(1)));
        assert_eq!(train.len(), 90);
        assert_eq!(test.len(),  10);
    }

    #[test]
    fn test_test_size_rounds_up() {
        let items: Vec<usize> = (0..5).collect();
        let (train, test)     = split_train_test(items, 0.1, &mut pipeline_rng(Some(1)));
        assert_eq!(train.len(), 4);
        assert_eq!(test.len(),  1);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, test)     = split_train_test(items, 0.3, &mut pipeline_rng(None));
        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let (a, _) = split_train_test((0..20).collect::<Vec<u32>>(), 0.2, &mut pipeline_rng(Some(7)));
        let (b, _) = split_train_test((0..20).collect::<Vec<u32>>(), 0.2, &mut pipeline_rng(Some(7)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, test)     = split_train_test(items, 0.1, &mut pipeline_rng(Some(1)));
        assert!(train.is_empty());
        assert!(test.is_empty());
    }
}
