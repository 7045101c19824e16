//! Small dense linear algebra used by training.
//!
//! Everything here operates on row-major `f64` buffers. Accumulating in
//! `f64` keeps the eigensolver stable even though the public surface of the
//! crate is `f32` end to end; bases are narrowed once at the end of
//! training.

use crate::error::{IndexError, Result};

/// Subtract the per-column mean from every row of an `rows x cols` matrix.
pub(crate) fn center_columns(x: &mut [f64], rows: usize, cols: usize) {
    debug_assert_eq!(x.len(), rows * cols);
    if rows == 0 {
        return;
    }
    let mut means = vec![0.0f64; cols];
    for r in 0..rows {
        let row = &x[r * cols..(r + 1) * cols];
        for (m, &v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    let inv = 1.0 / rows as f64;
    for m in &mut means {
        *m *= inv;
    }
    for r in 0..rows {
        let row = &mut x[r * cols..(r + 1) * cols];
        for (v, &m) in row.iter_mut().zip(&means) {
            *v -= m;
        }
    }
}

/// Sample covariance `xc' * xc / (rows - 1)` of a centered `rows x cols`
/// matrix. Only the upper triangle is accumulated, then mirrored.
pub(crate) fn covariance(xc: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    debug_assert_eq!(xc.len(), rows * cols);
    debug_assert!(rows >= 2);
    let mut cov = vec![0.0f64; cols * cols];
    for r in 0..rows {
        let row = &xc[r * cols..(r + 1) * cols];
        for i in 0..cols {
            let xi = row[i];
            for j in i..cols {
                cov[i * cols + j] += xi * row[j];
            }
        }
    }
    let inv = 1.0 / (rows - 1) as f64;
    for i in 0..cols {
        for j in i..cols {
            let v = cov[i * cols + j] * inv;
            cov[i * cols + j] = v;
            cov[j * cols + i] = v;
        }
    }
    cov
}

/// Row-major product of an `rows x inner` and an `inner x cols` matrix.
pub(crate) fn mat_mul(a: &[f64], b: &[f64], rows: usize, inner: usize, cols: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), rows * inner);
    debug_assert_eq!(b.len(), inner * cols);
    let mut out = vec![0.0f64; rows * cols];
    for r in 0..rows {
        let a_row = &a[r * inner..(r + 1) * inner];
        let out_row = &mut out[r * cols..(r + 1) * cols];
        for (k, &av) in a_row.iter().enumerate() {
            if av == 0.0 {
                continue;
            }
            let b_row = &b[k * cols..(k + 1) * cols];
            for (o, &bv) in out_row.iter_mut().zip(b_row) {
                *o += av * bv;
            }
        }
    }
    out
}

/// Product `a * b'` of two square `n x n` matrices.
pub(crate) fn mat_mul_transpose_b(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n * n);
    let mut out = vec![0.0f64; n * n];
    for i in 0..n {
        let a_row = &a[i * n..(i + 1) * n];
        for j in 0..n {
            let b_row = &b[j * n..(j + 1) * n];
            let mut acc = 0.0f64;
            for k in 0..n {
                acc += a_row[k] * b_row[k];
            }
            out[i * n + j] = acc;
        }
    }
    out
}

const JACOBI_MAX_SWEEPS: usize = 48;
const JACOBI_REL_TOL: f64 = 1e-12;

/// Eigendecomposition of a symmetric `n x n` matrix by cyclic Jacobi sweeps.
///
/// Returns `(u, lambda)` where column `j` of the row-major `u` is the
/// eigenvector paired with `lambda[j]`. Eigenvalues come back unsorted.
///
/// Fails with [`IndexError::Training`] when the off-diagonal mass has not
/// collapsed after the sweep budget; a deficient basis is never returned
/// silently.
pub(crate) fn jacobi_eigen_symmetric(a_in: &[f64], n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    debug_assert_eq!(a_in.len(), n * n);
    let mut a = a_in.to_vec();
    let mut u = vec![0.0f64; n * n];
    for i in 0..n {
        u[i * n + i] = 1.0;
    }

    let scale: f64 = a_in.iter().map(|v| v * v).sum::<f64>().sqrt();
    let tol = JACOBI_REL_TOL * scale.max(f64::MIN_POSITIVE);

    let mut converged = n < 2;
    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = off_diagonal_norm(&a, n);
        if off <= tol {
            converged = true;
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let app = a[p * n + p];
                let aqq = a[q * n + q];
                let tau = (aqq - app) / (2.0 * apq);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let ukp = u[k * n + p];
                    let ukq = u[k * n + q];
                    u[k * n + p] = c * ukp - s * ukq;
                    u[k * n + q] = s * ukp + c * ukq;
                }
            }
        }
    }

    if !converged && off_diagonal_norm(&a, n) > tol {
        return Err(IndexError::Training(format!(
            "Jacobi eigensolver did not converge for a {}x{} matrix",
            n, n
        )));
    }

    let lambda: Vec<f64> = (0..n).map(|i| a[i * n + i]).collect();
    Ok((u, lambda))
}

fn off_diagonal_norm(a: &[f64], n: usize) -> f64 {
    let mut acc = 0.0f64;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                let v = a[i * n + j];
                acc += v * v;
            }
        }
    }
    acc.sqrt()
}

/// Singular value decomposition `m = u * s * v'` of a square `n x n` matrix,
/// via the eigendecomposition of `m' * m`.
///
/// Returns `(u, v)` with paired columns, singular values descending. Both
/// factors are re-orthonormalized, so `u` and `v` stay orthogonal even when
/// `m` is rank-deficient (near-zero singular directions are completed with
/// unit vectors).
pub(crate) fn svd_square(m: &[f64], n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    debug_assert_eq!(m.len(), n * n);

    let mut mtm = vec![0.0f64; n * n];
    for i in 0..n {
        for j in i..n {
            let mut acc = 0.0f64;
            for k in 0..n {
                acc += m[k * n + i] * m[k * n + j];
            }
            mtm[i * n + j] = acc;
            mtm[j * n + i] = acc;
        }
    }

    let (vecs, vals) = jacobi_eigen_symmetric(&mtm, n)?;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| vals[b].total_cmp(&vals[a]));

    let mut v = vec![0.0f64; n * n];
    for (j, &src) in order.iter().enumerate() {
        for k in 0..n {
            v[k * n + j] = vecs[k * n + src];
        }
    }

    let sigma_max = vals[order[0]].max(0.0).sqrt();
    let cutoff = (f64::EPSILON * (n as f64) * sigma_max).max(f64::MIN_POSITIVE);

    let mut u = vec![0.0f64; n * n];
    for j in 0..n {
        let sigma = vals[order[j]].max(0.0).sqrt();
        if sigma > cutoff {
            let inv = 1.0 / sigma;
            for i in 0..n {
                let mut acc = 0.0f64;
                for k in 0..n {
                    acc += m[i * n + k] * v[k * n + j];
                }
                u[i * n + j] = acc * inv;
            }
        } else {
            // Rank-deficient direction: seed with a unit vector and let the
            // orthonormalization pass below rotate it into the null space.
            u[j * n + j] = 1.0;
        }
    }

    orthonormalize_columns(&mut u, n);
    Ok((u, v))
}

/// Modified Gram-Schmidt over the columns of a square row-major matrix.
pub(crate) fn orthonormalize_columns(m: &mut [f64], n: usize) {
    for j in 0..n {
        for prev in 0..j {
            let mut dot = 0.0f64;
            for k in 0..n {
                dot += m[k * n + j] * m[k * n + prev];
            }
            for k in 0..n {
                m[k * n + j] -= dot * m[k * n + prev];
            }
        }
        let mut norm = 0.0f64;
        for k in 0..n {
            norm += m[k * n + j] * m[k * n + j];
        }
        let norm = norm.sqrt();
        if norm > 1e-12 {
            for k in 0..n {
                m[k * n + j] /= norm;
            }
        } else {
            for k in 0..n {
                m[k * n + j] = if k == j { 1.0 } else { 0.0 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {}", a, b);
    }

    #[test]
    fn centering_zeroes_column_sums() {
        let mut x = vec![1.0, 10.0, 3.0, 20.0, 5.0, 30.0];
        center_columns(&mut x, 3, 2);
        let col0: f64 = (0..3).map(|r| x[r * 2]).sum();
        let col1: f64 = (0..3).map(|r| x[r * 2 + 1]).sum();
        assert_close(col0, 0.0, 1e-12);
        assert_close(col1, 0.0, 1e-12);
    }

    #[test]
    fn covariance_of_known_data() {
        // Two centered rows (-1, -2) and (1, 2): cov = [[2, 4], [4, 8]].
        let xc = vec![-1.0, -2.0, 1.0, 2.0];
        let cov = covariance(&xc, 2, 2);
        assert_close(cov[0], 2.0, 1e-12);
        assert_close(cov[1], 4.0, 1e-12);
        assert_close(cov[2], 4.0, 1e-12);
        assert_close(cov[3], 8.0, 1e-12);
    }

    #[test]
    fn jacobi_recovers_diagonal_spectrum() {
        let a = vec![3.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0];
        let (_, lambda) = jacobi_eigen_symmetric(&a, 3).unwrap();
        let mut sorted = lambda.clone();
        sorted.sort_by(|x, y| x.total_cmp(y));
        assert_close(sorted[0], 1.0, 1e-10);
        assert_close(sorted[1], 2.0, 1e-10);
        assert_close(sorted[2], 3.0, 1e-10);
    }

    #[test]
    fn jacobi_eigenvectors_diagonalize() {
        let a = vec![2.0, 1.0, 1.0, 2.0];
        let (u, lambda) = jacobi_eigen_symmetric(&a, 2).unwrap();
        // a * u_j = lambda_j * u_j
        for j in 0..2 {
            for i in 0..2 {
                let av: f64 = (0..2).map(|k| a[i * 2 + k] * u[k * 2 + j]).sum();
                assert_close(av, lambda[j] * u[i * 2 + j], 1e-10);
            }
        }
    }

    #[test]
    fn svd_factors_are_orthogonal() {
        let m = vec![1.0, 2.0, 0.5, -1.0, 0.0, 3.0, 2.0, 1.0, -0.5];
        let (u, v) = svd_square(&m, 3).unwrap();
        for mat in [&u, &v] {
            for a in 0..3 {
                for b in 0..3 {
                    let dot: f64 = (0..3).map(|k| mat[k * 3 + a] * mat[k * 3 + b]).sum();
                    let expect = if a == b { 1.0 } else { 0.0 };
                    assert_close(dot, expect, 1e-8);
                }
            }
        }
    }

    #[test]
    fn svd_handles_rank_deficiency() {
        // Rank-1 matrix: second and third singular values are zero.
        let m = vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 3.0, 6.0, 9.0];
        let (u, _v) = svd_square(&m, 3).unwrap();
        for a in 0..3 {
            for b in 0..3 {
                let dot: f64 = (0..3).map(|k| u[k * 3 + a] * u[k * 3 + b]).sum();
                let expect = if a == b { 1.0 } else { 0.0 };
                assert_close(dot, expect, 1e-8);
            }
        }
    }

    #[test]
    fn mat_mul_transpose_matches_naive() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![5.0, 6.0, 7.0, 8.0];
        let out = mat_mul_transpose_b(&a, &b, 2);
        // a * b' = [[1*5+2*6, 1*7+2*8], [3*5+4*6, 3*7+4*8]]
        assert_close(out[0], 17.0, 1e-12);
        assert_close(out[1], 23.0, 1e-12);
        assert_close(out[2], 39.0, 1e-12);
        assert_close(out[3], 53.0, 1e-12);
    }
}
