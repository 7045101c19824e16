//! The multi-table hash index: lifecycle, insertion, probing, and
//! prober-driven queries.
//!
//! An [`OrthantIndex`] owns L independent tables, each a trained projection
//! basis plus a bucket map from 64-bit code to the rows that hashed there.
//! The lifecycle is linear: a configured index trains, a trained index
//! hashes data, a populated index answers probes (or round-trips through
//! [`OrthantIndex::save`]/[`OrthantIndex::load`], which lands directly in
//! the populated state). There is no in-place retraining; build a fresh
//! index instead.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::dataset::VectorSet;
use crate::error::{IndexError, Result};
use crate::hasher::{self, QuantizationStats};
use crate::probe::{Prober, Progress};
use crate::train::{self, TableBasis, TrainOptions};

/// Packed binary code identifying one bucket within a table.
pub type BucketId = u64;

/// Member rows of one bucket, in insertion order.
pub(crate) type Bucket = SmallVec<[u32; 4]>;

/// Immutable configuration for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Table size hint for collaborators. Bounds the per-table random
    /// arrays; the bucket lookup itself never consults it.
    pub m: u32,
    /// Number of independent hash tables.
    pub l: usize,
    /// Input vector dimension.
    pub d: usize,
    /// Code width: output bits per bucket id, at most 64.
    pub n: usize,
    /// Training sample size per table.
    pub s: usize,
    /// Iterative-quantization refinement steps per table (0 keeps the
    /// random seed rotation).
    pub i: usize,
}

impl IndexParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.l == 0 {
            return Err(IndexError::InvalidParameter(
                "at least one table is required".into(),
            ));
        }
        if self.d == 0 {
            return Err(IndexError::InvalidParameter(
                "dimension must be at least 1".into(),
            ));
        }
        if self.n == 0 || self.n > 64 {
            return Err(IndexError::InvalidParameter(format!(
                "code width must be between 1 and 64 bits, got {}",
                self.n
            )));
        }
        if self.n > self.d {
            return Err(IndexError::InvalidParameter(format!(
                "code width {} exceeds dimension {}",
                self.n, self.d
            )));
        }
        if self.m == 0 {
            return Err(IndexError::InvalidParameter(
                "table size hint must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where the index is in its configure/train/populate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Configured,
    Trained,
    Populated,
}

impl Lifecycle {
    fn name(self) -> &'static str {
        match self {
            Lifecycle::Configured => "configured",
            Lifecycle::Trained => "trained",
            Lifecycle::Populated => "populated",
        }
    }
}

/// A projection-then-binary-quantization hash index over `f32` vectors.
#[derive(Debug)]
pub struct OrthantIndex {
    pub(crate) params: IndexParams,
    pub(crate) state: Lifecycle,
    /// One bucket map per table.
    pub(crate) tables: Vec<HashMap<BucketId, Bucket>>,
    /// Per-table random arrays. Persisted for format compatibility only;
    /// the canonical hash never folds them in.
    pub(crate) rnd: Vec<Vec<u32>>,
    /// Per-table projection bases; empty until training.
    pub(crate) bases: Vec<TableBasis>,
    pub(crate) stats: Option<QuantizationStats>,
}

impl OrthantIndex {
    /// Create an empty, configured index.
    ///
    /// Allocates the per-table maps and draws the per-table random arrays;
    /// bases stay unallocated until [`OrthantIndex::train_all`].
    pub fn new(params: IndexParams) -> Result<Self> {
        params.validate()?;
        let mut rng = rand::rng();
        let rnd = (0..params.l)
            .map(|_| (0..params.n).map(|_| rng.random_range(0..params.m)).collect())
            .collect();
        Ok(Self {
            params,
            state: Lifecycle::Configured,
            tables: vec![HashMap::new(); params.l],
            rnd,
            bases: vec![Vec::new(); params.l],
            stats: None,
        })
    }

    /// The configuration this index was created with.
    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    /// Number of hash tables.
    pub fn num_tables(&self) -> usize {
        self.params.l
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    /// Train every table's projection basis from `data`.
    ///
    /// All-or-nothing: on any worker failure every partial basis is
    /// discarded and the index stays configured.
    pub fn train_all<V>(&mut self, data: &V, opts: &TrainOptions) -> Result<()>
    where
        V: VectorSet + Sync + ?Sized,
    {
        if self.state != Lifecycle::Configured {
            return Err(IndexError::InvalidState {
                expected: "configured",
                actual: self.state.name(),
            });
        }
        self.bases = train::train_tables(data, &self.params, opts)?;
        self.state = Lifecycle::Trained;
        Ok(())
    }

    /// The trained basis of table `k`: N rows of length D.
    pub fn basis(&self, k: usize) -> Result<&[Vec<f32>]> {
        self.require_trained()?;
        self.check_table(k)?;
        Ok(&self.bases[k])
    }

    /// The random array of table `k`. Format compatibility only; it has no
    /// effect on hashing or lookup.
    pub fn rnd_array(&self, k: usize) -> Result<&[u32]> {
        self.check_table(k)?;
        Ok(&self.rnd[k])
    }

    // ------------------------------------------------------------------
    // Hashing
    // ------------------------------------------------------------------

    /// Real-valued projection of `v` through table `k`'s basis.
    pub fn project(&self, k: usize, v: &[f32]) -> Result<Vec<f32>> {
        self.require_trained()?;
        self.check_table(k)?;
        self.check_vector(v)?;
        Ok(hasher::project(&self.bases[k], v))
    }

    /// Sign-quantized projection of `v` through table `k`'s basis.
    pub fn hash_bits(&self, k: usize, v: &[f32]) -> Result<Vec<bool>> {
        Ok(hasher::quantize(&self.project(k, v)?))
    }

    /// Bucket id of `v` in table `k`.
    ///
    /// Always equal to packing the quantized projection: the three surface
    /// operations form a refinement chain.
    pub fn bucket_id(&self, k: usize, v: &[f32]) -> Result<BucketId> {
        Ok(hasher::pack_bits(&self.hash_bits(k, v)?))
    }

    /// Append `row` to its bucket in every table.
    ///
    /// The index never deduplicates; inserting the same row twice records
    /// it twice.
    pub fn insert(&mut self, row: u32, v: &[f32]) -> Result<()> {
        self.require_trained()?;
        self.check_vector(v)?;
        self.insert_unchecked(row, v);
        self.state = Lifecycle::Populated;
        Ok(())
    }

    fn insert_unchecked(&mut self, row: u32, v: &[f32]) {
        for k in 0..self.params.l {
            let bucket = hasher::pack_bits(&hasher::quantize(&hasher::project(&self.bases[k], v)));
            self.tables[k].entry(bucket).or_default().push(row);
        }
    }

    /// Hash every row of `data` into the index, in row order.
    pub fn hash<V>(&mut self, data: &V) -> Result<()>
    where
        V: VectorSet + ?Sized,
    {
        self.hash_with_progress(data, &mut || {})
    }

    /// [`OrthantIndex::hash`] with a per-row progress observer.
    pub fn hash_with_progress<V, P>(&mut self, data: &V, progress: &mut P) -> Result<()>
    where
        V: VectorSet + ?Sized,
        P: Progress,
    {
        self.require_trained()?;
        if data.dim() != self.params.d {
            return Err(IndexError::Dataset(format!(
                "dataset dimension {} does not match configured dimension {}",
                data.dim(),
                self.params.d
            )));
        }
        if data.len() > u32::MAX as usize {
            return Err(IndexError::Dataset(
                "dataset cardinality exceeds 32-bit row indices".into(),
            ));
        }
        for idx in 0..data.len() {
            self.insert_unchecked(idx as u32, data.row(idx));
            progress.tick();
        }
        if !data.is_empty() {
            self.state = Lifecycle::Populated;
        }
        log::debug!(
            "hashed {} rows into {} tables",
            data.len(),
            self.params.l
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Querying
    // ------------------------------------------------------------------

    /// Probe one bucket, forwarding each member to the prober in insertion
    /// order. Returns the bucket size, or 0 (without touching the prober)
    /// when the bucket does not exist.
    pub fn probe<P: Prober>(&self, t: usize, bucket: BucketId, prober: &mut P) -> Result<usize> {
        self.require_populated()?;
        self.check_table(t)?;
        let Some(members) = self.tables[t].get(&bucket) else {
            return Ok(0);
        };
        for &row in members.iter() {
            prober.visit(row);
        }
        Ok(members.len())
    }

    /// Drive a prober until it has seen `quota` candidates or runs out of
    /// buckets. Returns the number of candidates forwarded by this call.
    ///
    /// The index neither caps the number of buckets visited nor
    /// deduplicates across them; both are the prober's responsibility.
    pub fn query_by_prober<P: Prober>(&self, prober: &mut P, quota: usize) -> Result<usize> {
        self.require_populated()?;
        let mut forwarded = 0usize;
        while prober.items_probed() < quota && prober.has_next_bucket() {
            let (t, bucket) = prober.next_bucket();
            forwarded += self.probe(t, bucket, prober)?;
        }
        Ok(forwarded)
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Per-dimension sign-conditional projection statistics of table 0
    /// over `data`.
    pub fn mean_and_std<V>(&self, data: &V) -> Result<QuantizationStats>
    where
        V: VectorSet + ?Sized,
    {
        self.require_trained()?;
        if data.dim() != self.params.d {
            return Err(IndexError::Dataset(format!(
                "dataset dimension {} does not match configured dimension {}",
                data.dim(),
                self.params.d
            )));
        }
        Ok(hasher::mean_and_std(data, &self.bases[0]))
    }

    /// Compute and store [`QuantizationStats`] for later retrieval via
    /// [`OrthantIndex::stats`].
    pub fn set_mean_and_std<V>(&mut self, data: &V) -> Result<()>
    where
        V: VectorSet + ?Sized,
    {
        self.stats = Some(self.mean_and_std(data)?);
        Ok(())
    }

    /// The stored statistics, if [`OrthantIndex::set_mean_and_std`] ran.
    pub fn stats(&self) -> Option<&QuantizationStats> {
        self.stats.as_ref()
    }

    // ------------------------------------------------------------------
    // Table inspection
    // ------------------------------------------------------------------

    /// Number of non-empty buckets in table `t`.
    pub fn table_size(&self, t: usize) -> Result<usize> {
        self.check_table(t)?;
        Ok(self.tables[t].len())
    }

    /// Size of the fullest bucket in table `t` (0 when the table is empty).
    pub fn max_bucket_size(&self, t: usize) -> Result<usize> {
        self.check_table(t)?;
        Ok(self.tables[t].values().map(|m| m.len()).max().unwrap_or(0))
    }

    /// Iterate the buckets of table `t` in the map's natural order.
    pub fn buckets(&self, t: usize) -> Result<impl Iterator<Item = (BucketId, &[u32])> + '_> {
        self.check_table(t)?;
        Ok(self.tables[t].iter().map(|(&id, members)| (id, &members[..])))
    }

    /// Members of one bucket in insertion order, if the bucket exists.
    pub fn bucket_members(&self, t: usize, bucket: BucketId) -> Result<Option<&[u32]>> {
        self.check_table(t)?;
        Ok(self.tables[t].get(&bucket).map(|m| &m[..]))
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    pub(crate) fn require_trained(&self) -> Result<()> {
        match self.state {
            Lifecycle::Trained | Lifecycle::Populated => Ok(()),
            Lifecycle::Configured => Err(IndexError::InvalidState {
                expected: "trained",
                actual: self.state.name(),
            }),
        }
    }

    pub(crate) fn require_populated(&self) -> Result<()> {
        if self.state != Lifecycle::Populated {
            return Err(IndexError::InvalidState {
                expected: "populated",
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    fn check_table(&self, t: usize) -> Result<()> {
        if t >= self.params.l {
            return Err(IndexError::InvalidParameter(format!(
                "table index {} out of range for {} tables",
                t, self.params.l
            )));
        }
        Ok(())
    }

    fn check_vector(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.params.d {
            return Err(IndexError::Dataset(format!(
                "vector dimension {} does not match configured dimension {}",
                v.len(),
                self.params.d
            )));
        }
        Ok(())
    }
}
