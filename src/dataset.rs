//! Dataset abstraction: read-only, row-major matrices of `f32` vectors.
//!
//! The index only needs three capabilities from its input data: row count,
//! dimension, and borrowed row access. [`DenseMatrix`] is the provided
//! contiguous implementation; callers with their own storage (memory-mapped
//! files, arena-backed buffers) can implement [`VectorSet`] directly as long
//! as rows are contiguous `f32` slices.

use crate::error::{IndexError, Result};

/// Read-only capability over a set of equal-length vectors.
///
/// Implementations must be immutable for the duration of any training or
/// hashing call that borrows them.
pub trait VectorSet {
    /// Number of vectors.
    fn len(&self) -> usize;

    /// Dimension of every vector.
    fn dim(&self) -> usize;

    /// Borrow vector `idx`. Panics if `idx >= len()`.
    fn row(&self, idx: usize) -> &[f32];

    /// Whether the set holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned row-major contiguous matrix of `f32` vectors.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    data: Vec<f32>,
    dim: usize,
}

impl DenseMatrix {
    /// Build from a flat row-major buffer. `data.len()` must be a multiple
    /// of `dim`.
    pub fn from_flat(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::Dataset("dimension must be at least 1".into()));
        }
        if data.len() % dim != 0 {
            return Err(IndexError::Dataset(format!(
                "buffer of {} floats is not a whole number of {}-dimensional rows",
                data.len(),
                dim
            )));
        }
        Ok(Self { data, dim })
    }

    /// Build from individual rows, which must all share one dimension.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dim = match rows.first() {
            Some(first) => first.len(),
            None => return Err(IndexError::Dataset("empty dataset".into())),
        };
        if dim == 0 {
            return Err(IndexError::Dataset("dimension must be at least 1".into()));
        }
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(IndexError::Dataset(format!(
                    "row {} has dimension {}, expected {}",
                    idx,
                    row.len(),
                    dim
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, dim })
    }

    /// The flat row-major buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

impl VectorSet for DenseMatrix {
    fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.dim;
        &self.data[start..start + self.dim]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_round_trips() {
        let m = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.dim(), 2);
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert_eq!(m.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(err, Err(IndexError::Dataset(_))));
    }

    #[test]
    fn from_flat_rejects_partial_rows() {
        let err = DenseMatrix::from_flat(vec![1.0, 2.0, 3.0], 2);
        assert!(matches!(err, Err(IndexError::Dataset(_))));
    }

    #[test]
    fn empty_rows_rejected() {
        assert!(DenseMatrix::from_rows(&[]).is_err());
    }
}
