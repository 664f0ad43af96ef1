use mpg_schemas::FeatureMatrix;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use sha2::{Digest, Sha256};

use crate::{Dataset, DatasetError};

/// Split parameters. Same params + same dataset = same split, every run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitParams {
    /// Fraction of rows held out for testing, in (0, 1).
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

/// One side of the split.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
    /// Source row indices, in partition order.
    pub indices: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Immutable (train, test) pair built once per gate run.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub params: SplitParams,
    pub train: Partition,
    pub test: Partition,
}

impl DatasetSplit {
    /// SHA-256 over both partitions (indices, features, targets, little-endian).
    /// Equal fingerprints mean byte-identical splits.
    pub fn fingerprint(&self) -> String {
        let mut h = Sha256::new();
        for (tag, part) in [(b"test", &self.test), (b"trn_", &self.train)] {
            h.update(tag);
            h.update((part.len() as u64).to_le_bytes());
            for &i in &part.indices {
                h.update((i as u64).to_le_bytes());
            }
            for &v in part.features.as_slice() {
                h.update(v.to_le_bytes());
            }
            for &v in &part.targets {
                h.update(v.to_le_bytes());
            }
        }
        hex::encode(h.finalize())
    }
}

/// Shuffle row indices with a seeded Xoshiro256++ stream and hold out the
/// first `ceil(test_ratio * n)` rows as the test set.
///
/// # Errors
/// [`DatasetError::InvalidSplit`] when the ratio is outside (0, 1) or either
/// partition would be empty.
pub fn train_test_split(dataset: &Dataset, params: SplitParams) -> Result<DatasetSplit, DatasetError> {
    let r = params.test_ratio;
    if !(r.is_finite() && r > 0.0 && r < 1.0) {
        return Err(DatasetError::InvalidSplit(format!(
            "test_ratio {r} must lie in (0, 1)"
        )));
    }

    let n = dataset.len();
    let n_test = (r * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(DatasetError::InvalidSplit(format!(
            "{n} rows with test_ratio {r} leaves an empty partition"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok(DatasetSplit {
        params,
        train: partition(dataset, train_idx),
        test: partition(dataset, test_idx),
    })
}

fn partition(dataset: &Dataset, indices: &[usize]) -> Partition {
    let targets = indices.iter().map(|&i| dataset.targets()[i]).collect();
    Partition {
        features: dataset.features().select_rows(indices),
        targets,
        indices: indices.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(n: usize) -> Dataset {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let targets = (0..n).map(|i| i as f64 * 0.5).collect();
        Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            FeatureMatrix::from_rows(&rows).unwrap(),
            targets,
        )
        .unwrap()
    }

    #[test]
    fn test_size_rounds_up() {
        let split = train_test_split(&tiny(11), SplitParams::default()).unwrap();
        // ceil(0.2 * 11) = 3
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn partitions_cover_every_row_once() {
        let split = train_test_split(&tiny(50), SplitParams::default()).unwrap();
        let mut all: Vec<usize> = split
            .test
            .indices
            .iter()
            .chain(split.train.indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn rows_stay_aligned_with_targets() {
        let split = train_test_split(&tiny(20), SplitParams::default()).unwrap();
        for (k, &i) in split.test.indices.iter().enumerate() {
            assert_eq!(split.test.features.row(k)[0], i as f64);
            assert_eq!(split.test.targets[k], i as f64 * 0.5);
        }
    }

    #[test]
    fn degenerate_inputs_rejected() {
        assert!(train_test_split(&tiny(1), SplitParams::default()).is_err());
        for ratio in [0.0, 1.0, f64::NAN, -0.1] {
            let p = SplitParams {
                test_ratio: ratio,
                seed: 42,
            };
            assert!(matches!(
                train_test_split(&tiny(10), p),
                Err(DatasetError::InvalidSplit(_))
            ));
        }
    }
}
