//! Training-sample selection.
//!
//! Draws a k-subset of `[0, n)` without replacement, as a selection mask.
//! The distribution is only approximately uniform over k-subsets; what
//! matters for training is that every row has non-zero selection
//! probability and that exactly `k` rows come back.

use rand::Rng;

use crate::error::{IndexError, Result};

/// Select exactly `k` of `n` indices. Returns a mask of length `n` with
/// exactly `k` entries set.
///
/// Two phases: a single sweep that accepts index `i` when a uniform draw in
/// `[0, n)` falls below `k` (stopping early once `k` are taken), then
/// rejection sampling to top up if the sweep came back short.
pub fn select<R: Rng>(n: usize, k: usize, rng: &mut R) -> Result<Vec<bool>> {
    if k > n {
        return Err(IndexError::InvalidParameter(format!(
            "cannot select {} of {} rows",
            k, n
        )));
    }

    let mut selected = vec![false; n];
    let mut num_selected = 0usize;

    for flag in selected.iter_mut() {
        if rng.random_range(0..n) < k {
            *flag = true;
            num_selected += 1;
            if num_selected == k {
                break;
            }
        }
    }

    while num_selected < k {
        let target = rng.random_range(0..n);
        if !selected[target] {
            selected[target] = true;
            num_selected += 1;
        }
    }

    Ok(selected)
}
