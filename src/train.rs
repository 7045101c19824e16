//! Per-table projection training and the batched parallel driver.
//!
//! Each table learns an independent N x D projection basis from a random
//! sample of the dataset:
//!
//! 1. Sample S rows and center them.
//! 2. Eigendecompose the sample covariance; keep the N leading principal
//!    components (ascending eigenvalue order within the kept block).
//! 3. Seed an orthonormal rotation from the SVD of a Gaussian matrix, then
//!    refine it with iterative-quantization steps: each step re-quantizes
//!    the projected sample to the nearest hypercube vertices and solves
//!    the orthogonal Procrustes problem between the two.
//! 4. Store the rotated components as the rows of the basis.
//!
//! Tables train concurrently in batches of scoped OS threads; every worker
//! writes only its own output slot, so the driver needs no locking.
//!
//! # References
//!
//! - Gong et al. (2013): "Iterative Quantization: A Procrustean Approach
//!   to Learning Binary Codes for Large-Scale Image Retrieval"

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::VectorSet;
use crate::error::{IndexError, Result};
use crate::index::IndexParams;
use crate::{linalg, sampling};

/// One trained table: N projection directions of length D.
pub(crate) type TableBasis = Vec<Vec<f32>>;

/// Options for [`crate::OrthantIndex::train_all`].
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Number of tables trained concurrently per batch.
    pub batch_size: usize,
    /// Base RNG seed. Table `k` trains from `seed + k`, so results depend
    /// only on the seed and the table index, never on `batch_size`. When
    /// unset, every table draws a fresh seed from ambient entropy.
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            batch_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            seed: None,
        }
    }
}

impl TrainOptions {
    /// Configure a deterministic base seed for reproducible training.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configure the number of concurrent training workers per batch.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Train all `params.l` tables in sequential batches of scoped workers.
///
/// All workers of a batch are joined before any error surfaces; the first
/// failure (in table order) wins and no partial result escapes.
pub(crate) fn train_tables<V>(
    data: &V,
    params: &IndexParams,
    opts: &TrainOptions,
) -> Result<Vec<TableBasis>>
where
    V: VectorSet + Sync + ?Sized,
{
    let batch_size = opts.batch_size.max(1);
    let seeds: Vec<u64> = (0..params.l)
        .map(|k| match opts.seed {
            Some(seed) => seed.wrapping_add(k as u64),
            None => rand::rng().random(),
        })
        .collect();

    let table_ids: Vec<usize> = (0..params.l).collect();
    let mut bases: Vec<TableBasis> = Vec::with_capacity(params.l);

    for chunk in table_ids.chunks(batch_size) {
        // The scope is the join barrier: it returns only once every worker
        // in the batch has finished, whatever their outcomes.
        let results: Vec<Result<TableBasis>> = std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|&k| {
                    let seed = seeds[k];
                    scope.spawn(move || train_single_table(data, params, seed))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(IndexError::Training("training worker panicked".into()))
                    })
                })
                .collect()
        });

        for (offset, result) in results.into_iter().enumerate() {
            let table = chunk[offset];
            match result {
                Ok(basis) => {
                    log::debug!("table {} trained", table);
                    bases.push(basis);
                }
                Err(err) => {
                    log::debug!("table {} training failed: {}", table, err);
                    return Err(err);
                }
            }
        }
    }

    Ok(bases)
}

/// Train one table: sampled PCA followed by an ITQ-refined rotation.
pub(crate) fn train_single_table<V>(data: &V, params: &IndexParams, seed: u64) -> Result<TableBasis>
where
    V: VectorSet + ?Sized,
{
    let rows = data.len();
    let (d, n, s) = (params.d, params.n, params.s);

    if rows == 0 {
        return Err(IndexError::Dataset("empty dataset".into()));
    }
    if data.dim() != d {
        return Err(IndexError::Dataset(format!(
            "dataset dimension {} does not match configured dimension {}",
            data.dim(),
            d
        )));
    }
    if s > rows {
        return Err(IndexError::InvalidParameter(format!(
            "sample size {} exceeds dataset cardinality {}",
            s, rows
        )));
    }
    if s < 2 {
        return Err(IndexError::InvalidParameter(
            "sample size must be at least 2".into(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);

    // Gather the sampled rows into an S x D matrix, widening to f64.
    let mask = sampling::select(rows, s, &mut rng)?;
    let mut x = Vec::with_capacity(s * d);
    for (idx, &picked) in mask.iter().enumerate() {
        if !picked {
            continue;
        }
        for &val in data.row(idx) {
            if !val.is_finite() {
                return Err(IndexError::Dataset(format!(
                    "non-finite value in row {}",
                    idx
                )));
            }
            x.push(val as f64);
        }
    }

    linalg::center_columns(&mut x, s, d);
    let cov = linalg::covariance(&x, s, d);
    let (eigvecs, eigvals) = linalg::jacobi_eigen_symmetric(&cov, d)?;

    // Keep the N largest-eigenvalue directions, ascending within the kept
    // block, as the columns of the D x N component matrix P.
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| eigvals[a].total_cmp(&eigvals[b]));
    let kept = &order[d - n..];

    let mut p = vec![0.0f64; d * n];
    for (col, &src) in kept.iter().enumerate() {
        for row in 0..d {
            p[row * n + col] = eigvecs[row * d + src];
        }
    }

    // Centered projections of the sample (S x N); the raw sample is no
    // longer needed after this.
    let c = linalg::mat_mul(&x, &p, s, d, n);
    drop(x);

    let r = learn_rotation(&c, s, n, params.i, &mut rng)?;

    // Stored basis row i is column i of P * R.
    let pr = linalg::mat_mul(&p, &r, d, n, n);
    let mut basis = vec![vec![0.0f32; d]; n];
    for (i, row) in basis.iter_mut().enumerate() {
        for (j, out) in row.iter_mut().enumerate() {
            *out = pr[j * n + i] as f32;
        }
    }
    Ok(basis)
}

/// Learn an orthogonal N x N rotation aligning the projected sample `c`
/// (S x N) with the binary hypercube.
///
/// The seed rotation is the left factor of the SVD of an i.i.d. Gaussian
/// matrix; `iterations` alternating Procrustes steps then refine it. With
/// zero iterations the seed rotation is returned as-is.
fn learn_rotation(
    c: &[f64],
    s: usize,
    n: usize,
    iterations: usize,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    let mut gaussian = vec![0.0f64; n * n];
    for val in &mut gaussian {
        *val = sample_standard_normal(rng);
    }
    let (mut r, _) = linalg::svd_square(&gaussian, n)?;

    for _ in 0..iterations {
        let cr = linalg::mat_mul(c, &r, s, n, n);

        // m = B' * C, with B the +/-1 quantization of C * R. The sign
        // convention matches the hasher: zero quantizes positive.
        let mut m = vec![0.0f64; n * n];
        for row in 0..s {
            let cr_row = &cr[row * n..(row + 1) * n];
            let c_row = &c[row * n..(row + 1) * n];
            for (a, &score) in cr_row.iter().enumerate() {
                let b = if score >= 0.0 { 1.0 } else { -1.0 };
                for (out, &cv) in m[a * n..(a + 1) * n].iter_mut().zip(c_row) {
                    *out += b * cv;
                }
            }
        }

        let (u, v) = linalg::svd_square(&m, n)?;
        r = linalg::mat_mul_transpose_b(&v, &u, n);
    }

    Ok(r)
}

/// One standard-normal draw via Box-Muller.
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
