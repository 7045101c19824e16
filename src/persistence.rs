//! Bit-exact binary persistence for populated indexes.
//!
//! Layout, all integers little-endian, all unsigned 32-bit unless noted:
//!
//! ```text
//! header: m, l, d, n, s                 (5 x u32; the ITQ budget is not
//!                                        persisted and reloads as 0)
//! per table:
//!   rnd array                           (n x u32)
//!   bucket count                        (u32)
//!   per bucket:
//!     bucket id                         (u64)
//!     member count                      (u32)
//!     members, insertion order          (count x u32)
//!   basis, row-major                    (n x d x f32)
//! ```
//!
//! There is no magic number, version tag, or checksum: the format is fixed
//! by existing index files in the field. Buckets stream in the map's
//! natural iteration order; member order within a bucket is preserved
//! exactly, so a load reproduces observable probe behavior bit for bit.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use smallvec::SmallVec;

use crate::error::{IndexError, Result};
use crate::index::{Bucket, IndexParams, Lifecycle, OrthantIndex};

impl OrthantIndex {
    /// Save a populated index to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.save_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Save a populated index to an arbitrary writer.
    pub fn save_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.require_populated()?;
        let p = &self.params;

        writer.write_all(&p.m.to_le_bytes())?;
        writer.write_all(&(p.l as u32).to_le_bytes())?;
        writer.write_all(&(p.d as u32).to_le_bytes())?;
        writer.write_all(&(p.n as u32).to_le_bytes())?;
        writer.write_all(&(p.s as u32).to_le_bytes())?;

        for k in 0..p.l {
            for &r in &self.rnd[k] {
                writer.write_all(&r.to_le_bytes())?;
            }
            writer.write_all(&(self.tables[k].len() as u32).to_le_bytes())?;
            for (&bucket, members) in &self.tables[k] {
                writer.write_all(&bucket.to_le_bytes())?;
                writer.write_all(&(members.len() as u32).to_le_bytes())?;
                for &row in members.iter() {
                    writer.write_all(&row.to_le_bytes())?;
                }
            }
            for basis_row in &self.bases[k] {
                for &val in basis_row {
                    writer.write_all(&val.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Load an index from `path`, landing directly in the populated state.
    ///
    /// Any failure surfaces as an error and constructs nothing.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::load_from(&mut reader)
    }

    /// Load an index from an arbitrary reader.
    pub fn load_from<R: Read>(reader: &mut R) -> Result<Self> {
        let m = read_u32(reader)?;
        let l = read_u32(reader)? as usize;
        let d = read_u32(reader)? as usize;
        let n = read_u32(reader)? as usize;
        let s = read_u32(reader)? as usize;

        let params = IndexParams { m, l, d, n, s, i: 0 };
        params
            .validate()
            .map_err(|e| IndexError::Format(format!("inconsistent header: {}", e)))?;

        let mut tables: Vec<HashMap<u64, Bucket>> = Vec::with_capacity(l);
        let mut rnd: Vec<Vec<u32>> = Vec::with_capacity(l);
        let mut bases: Vec<Vec<Vec<f32>>> = Vec::with_capacity(l);

        for _ in 0..l {
            let mut rnd_k = Vec::with_capacity(n);
            for _ in 0..n {
                rnd_k.push(read_u32(reader)?);
            }
            rnd.push(rnd_k);

            let count = read_u32(reader)? as usize;
            let mut table = HashMap::with_capacity(count);
            for _ in 0..count {
                let bucket = read_u64(reader)?;
                let len = read_u32(reader)? as usize;
                let mut members = SmallVec::new();
                for _ in 0..len {
                    members.push(read_u32(reader)?);
                }
                table.insert(bucket, members);
            }
            tables.push(table);

            let mut basis = Vec::with_capacity(n);
            for _ in 0..n {
                let mut row = Vec::with_capacity(d);
                for _ in 0..d {
                    row.push(read_f32(reader)?);
                }
                basis.push(row);
            }
            bases.push(basis);
        }

        Ok(Self {
            params,
            state: Lifecycle::Populated,
            tables,
            rnd,
            bases,
            stats: None,
        })
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}
