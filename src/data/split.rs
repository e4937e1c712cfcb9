//! Train/validation split

use crate::error::{AutoMlError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

/// Train and held-out validation frames
#[derive(Debug, Clone)]
pub struct TrainTestData {
    pub train_set: Arc<DataFrame>,
    pub test_set: Arc<DataFrame>,
}

/// Shuffle rows and hold out `test_fraction` of them
pub fn train_test_split(df: &DataFrame, test_fraction: f64, seed: u64) -> Result<TrainTestData> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AutoMlError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n = df.height();
    let n_test = ((n as f64) * test_fraction).round() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AutoMlError::DataLoadError(format!(
            "{} rows cannot be split with test fraction {}",
            n, test_fraction
        )));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let take = |idx: &[IdxSize]| -> Result<DataFrame> {
        let idx = IdxCa::from_vec("idx".into(), idx.to_vec());
        Ok(df.take(&idx)?)
    };

    Ok(TrainTestData {
        train_set: Arc::new(take(train_idx)?),
        test_set: Arc::new(take(test_idx)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: usize) -> DataFrame {
        let ids: Vec<i64> = (0..n as i64).collect();
        df!("id" => ids).unwrap()
    }

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(&frame(100), 0.2, 42).unwrap();
        assert_eq!(split.test_set.height(), 20);
        assert_eq!(split.train_set.height(), 80);
    }

    #[test]
    fn test_split_is_partition() {
        let split = train_test_split(&frame(50), 0.3, 1).unwrap();
        let mut all: Vec<i64> = split
            .train_set
            .column("id")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .chain(
                split
                    .test_set
                    .column("id")
                    .unwrap()
                    .as_materialized_series()
                    .i64()
                    .unwrap()
                    .into_iter(),
            )
            .flatten()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = train_test_split(&frame(30), 0.2, 9).unwrap();
        let b = train_test_split(&frame(30), 0.2, 9).unwrap();
        assert!(a.test_set.equals(&b.test_set));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(train_test_split(&frame(10), 0.0, 1).is_err());
        assert!(train_test_split(&frame(10), 1.0, 1).is_err());
    }
}
