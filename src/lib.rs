//! orthant: PCA + iterative-quantization locality-sensitive hashing for
//! approximate nearest-neighbor search.
//!
//! An [`OrthantIndex`] holds L independent hash tables. Each table learns a
//! linear projection from a random sample of the data (principal
//! components composed with an ITQ-refined orthogonal rotation), then maps
//! every vector to the sign pattern of its projection: the orthant it
//! falls in, packed into a 64-bit bucket id. Nearby vectors tend to share
//! orthants, so a query only scores the handful of rows in the buckets a
//! [`Prober`] chooses to visit.
//!
//! # Usage
//!
//! ```no_run
//! use orthant::{DenseMatrix, IndexParams, OrthantIndex, TrainOptions};
//!
//! # fn main() -> orthant::Result<()> {
//! let data = DenseMatrix::from_flat(vec![0.0; 1024 * 16], 16)?;
//! let params = IndexParams { m: 521, l: 4, d: 16, n: 12, s: 256, i: 50 };
//!
//! let mut index = OrthantIndex::new(params)?;
//! index.train_all(&data, &TrainOptions::default().with_seed(42))?;
//! index.hash(&data)?;
//! index.save("index.bin")?;
//! # Ok(())
//! # }
//! ```
//!
//! Query-time bucket ordering is pluggable: implement [`Prober`] and drive
//! it with [`OrthantIndex::query_by_prober`]. Candidate scoring (top-k
//! scanners, distance metrics) lives entirely in the caller.
//!
//! # References
//!
//! - Gong et al. (2013): "Iterative Quantization: A Procrustean Approach
//!   to Learning Binary Codes for Large-Scale Image Retrieval"
//! - Indyk & Motwani (1998): "Approximate nearest neighbors: towards
//!   removing the curse of dimensionality"

pub mod dataset;
pub mod error;
pub mod hasher;
pub mod index;
pub mod probe;
pub mod sampling;
pub mod train;

mod linalg;
mod persistence;

pub use dataset::{DenseMatrix, VectorSet};
pub use error::{IndexError, Result};
pub use hasher::QuantizationStats;
pub use index::{BucketId, IndexParams, OrthantIndex};
pub use probe::{Prober, Progress};
pub use train::TrainOptions;
