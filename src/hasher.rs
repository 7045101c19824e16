//! Projection, sign quantization, and bucket-id packing.
//!
//! A trained table maps a vector to its bucket in three refinement steps:
//!
//! 1. `project`: multiply by the table's basis, giving one score per code
//!    dimension.
//! 2. `quantize`: keep only the sign of each score (`>= 0` maps to 1).
//! 3. `pack_bits`: pack the sign pattern into a `u64` bucket id,
//!    big-endian: bit 0 lands in the most-significant position of the
//!    N-bit id.
//!
//! The big-endian packing is load-bearing: bucket ids are persisted
//! verbatim, so flipping the order would silently invalidate every saved
//! index.

use crate::dataset::VectorSet;

/// Multiply a basis (N rows of length D) by a vector, producing the
/// real-valued projection scores.
pub(crate) fn project(basis: &[Vec<f32>], v: &[f32]) -> Vec<f32> {
    basis
        .iter()
        .map(|row| row.iter().zip(v).map(|(&b, &x)| b * x).sum())
        .collect()
}

/// Sign-quantize projection scores: `true` where the score is non-negative.
///
/// Total over all finite and non-finite inputs; an all-zero projection
/// quantizes to all ones.
pub fn quantize(scores: &[f32]) -> Vec<bool> {
    scores.iter().map(|&f| f >= 0.0).collect()
}

/// Pack quantized bits into a bucket id, first bit most significant.
///
/// With fewer than 64 bits the high bits of the id stay zero.
pub fn pack_bits(bits: &[bool]) -> u64 {
    debug_assert!(bits.len() <= 64);
    let mut id = 0u64;
    for &bit in bits {
        id <<= 1;
        if bit {
            id |= 1;
        }
    }
    id
}

/// Per-dimension projection statistics, split by sign.
///
/// For each code dimension, the mean and standard deviation of the
/// non-negative (`pos`) and negative (`neg`) projection scores observed
/// across a dataset. Distance-aware probers use these to rank how marginal
/// a bit flip is.
///
/// The deviations are population estimates: the divisor is the conditional
/// count, not `count - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationStats {
    pub mean_pos: Vec<f32>,
    pub mean_neg: Vec<f32>,
    pub std_pos: Vec<f32>,
    pub std_neg: Vec<f32>,
}

/// Compute [`QuantizationStats`] for one basis over a whole dataset.
///
/// Two passes: conditional sums and counts first, then squared deviations
/// from the conditional means. A dimension that never saw a positive
/// (resp. negative) score reports 0 for that mean and deviation.
pub(crate) fn mean_and_std<V: VectorSet + ?Sized>(data: &V, basis: &[Vec<f32>]) -> QuantizationStats {
    let n = basis.len();
    let mut sum_pos = vec![0.0f32; n];
    let mut sum_neg = vec![0.0f32; n];
    let mut count_pos = vec![0u32; n];
    let mut count_neg = vec![0u32; n];

    for idx in 0..data.len() {
        let scores = project(basis, data.row(idx));
        for (i, &f) in scores.iter().enumerate() {
            if f >= 0.0 {
                sum_pos[i] += f;
                count_pos[i] += 1;
            } else {
                sum_neg[i] += f;
                count_neg[i] += 1;
            }
        }
    }

    let mut mean_pos = vec![0.0f32; n];
    let mut mean_neg = vec![0.0f32; n];
    for i in 0..n {
        if count_pos[i] != 0 {
            mean_pos[i] = sum_pos[i] / count_pos[i] as f32;
        }
        if count_neg[i] != 0 {
            mean_neg[i] = sum_neg[i] / count_neg[i] as f32;
        }
    }

    let mut dev_pos = vec![0.0f32; n];
    let mut dev_neg = vec![0.0f32; n];
    for idx in 0..data.len() {
        let scores = project(basis, data.row(idx));
        for (i, &f) in scores.iter().enumerate() {
            if f >= 0.0 {
                let d = f - mean_pos[i];
                dev_pos[i] += d * d;
            } else {
                let d = f - mean_neg[i];
                dev_neg[i] += d * d;
            }
        }
    }

    let mut std_pos = vec![0.0f32; n];
    let mut std_neg = vec![0.0f32; n];
    for i in 0..n {
        if count_pos[i] != 0 {
            std_pos[i] = (dev_pos[i] / count_pos[i] as f32).sqrt();
        }
        if count_neg[i] != 0 {
            std_neg[i] = (dev_neg[i] / count_neg[i] as f32).sqrt();
        }
    }

    QuantizationStats {
        mean_pos,
        mean_neg,
        std_pos,
        std_neg,
    }
}
