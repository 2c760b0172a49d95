// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Randomly shuffles the training pool and splits it into two
// sets:
//   - Training set:   used to update model weights
//   - Validation set: used to pick the checkpoint
//
// The first round(N * train_fraction) shuffled samples become the
// training set, the remainder the validation set, so
//   |train| + |valid| = N   and   |train| = round(N * r).
//
// The RNG is passed in: a seeded StdRng makes the split
// reproducible, thread_rng() does not.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{seq::SliceRandom, Rng};

/// Shuffle `samples` with `rng` and split into (train, validation).
///
/// # Example
/// ```ignore
/// let mut rng = StdRng::seed_from_u64(7);
/// let (train, val) = split_train_val(all_samples, 0.8, &mut rng);
/// ```
pub fn split_train_val<T, R>(mut samples: Vec<T>, train_fraction: f64, rng: &mut R) -> (Vec<T>, Vec<T>)
where
    R: Rng + ?Sized,
{
    // Fisher-Yates: every permutation is equally likely
    samples.shuffle(rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;

    // Clamp to valid range to avoid panics on tiny datasets
    let split_at = split_at.min(total);

    // After this: samples = [0..split_at], val = [split_at..total]
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8, &mut rng());
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_sizes_follow_rounding_for_many_ratios() {
        for n in [1usize, 7, 13, 50, 101] {
            for r in [0.05, 0.3, 0.5, 0.66, 0.8, 0.95] {
                let (train, val) = split_train_val((0..n).collect::<Vec<_>>(), r, &mut rng());
                assert_eq!(train.len() + val.len(), n);
                assert_eq!(train.len(), ((n as f64) * r).round() as usize, "n={n} r={r}");
            }
        }
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize>  = (0..50).collect();
        let (train, val)       = split_train_val(items, 0.7, &mut rng());
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_gives_same_split() {
        let a = split_train_val((0..30).collect::<Vec<usize>>(), 0.8, &mut rng());
        let b = split_train_val((0..30).collect::<Vec<usize>>(), 0.8, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8, &mut rng());
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
