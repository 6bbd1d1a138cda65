//! Seeded train/test split.
//!
//! The permutation is a Fisher–Yates shuffle driven by MT19937 with masked rejection
//! sampling, the same draw sequence as the legacy numpy `RandomState(seed).permutation`.
//! A given seed therefore reproduces the reference partition row for row.

use crate::error::{ChurnError, Result};
use rand_mt::Mt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn next_u64(rng: &mut Mt) -> u64 {
    let hi = u64::from(rng.next_u32());
    let lo = u64::from(rng.next_u32());
    (hi << 32) | lo
}

/// Uniform draw in `[0, max]`.
fn random_interval(rng: &mut Mt, max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let mut mask = max;
    mask |= mask >> 1;
    mask |= mask >> 2;
    mask |= mask >> 4;
    mask |= mask >> 8;
    mask |= mask >> 16;
    mask |= mask >> 32;
    loop {
        let value = if max <= u64::from(u32::MAX) {
            u64::from(rng.next_u32()) & mask
        } else {
            next_u64(rng) & mask
        };
        if value <= max {
            return value;
        }
    }
}

pub fn permutation(n: usize, seed: u32) -> Vec<usize> {
    let mut rng = Mt::new(seed);
    let mut out: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = random_interval(&mut rng, i as u64) as usize;
        out.swap(i, j);
    }
    out
}

/// `ceil(test_ratio * n)` rows go to test, the rest to train, both in permutation order.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u32) -> Result<SplitIndices> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ChurnError::Training(format!(
            "test_ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    let n_test = (test_ratio * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(ChurnError::Training(format!(
            "{n} rows with test_ratio {test_ratio} leaves an empty partition"
        )));
    }
    let mut perm = permutation(n, seed);
    let train = perm.split_off(n_test);
    Ok(SplitIndices { train, test: perm })
}
