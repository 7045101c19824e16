//! File-based persistence: round trips, truncation, missing files.

use std::fs;

use orthant::{
    BucketId, DenseMatrix, IndexError, IndexParams, OrthantIndex, TrainOptions, VectorSet,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn populated_index() -> (OrthantIndex, DenseMatrix) {
    let mut rng = StdRng::seed_from_u64(2);
    let data: Vec<f32> = (0..128 * 6).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    let data = DenseMatrix::from_flat(data, 6).unwrap();

    let params = IndexParams { m: 521, l: 3, d: 6, n: 4, s: 48, i: 8 };
    let mut index = OrthantIndex::new(params).unwrap();
    index
        .train_all(&data, &TrainOptions::default().with_seed(11))
        .unwrap();
    index.hash(&data).unwrap();
    (index, data)
}

fn sorted_buckets(index: &OrthantIndex, t: usize) -> Vec<(BucketId, Vec<u32>)> {
    let mut buckets: Vec<(BucketId, Vec<u32>)> = index
        .buckets(t)
        .unwrap()
        .map(|(id, m)| (id, m.to_vec()))
        .collect();
    buckets.sort();
    buckets
}

#[test]
fn file_round_trip_is_bit_identical() {
    let (index, data) = populated_index();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.bin");

    index.save(&path).unwrap();
    let loaded = OrthantIndex::load(&path).unwrap();

    assert_eq!(loaded.params().m, index.params().m);
    assert_eq!(loaded.params().l, index.params().l);
    assert_eq!(loaded.params().d, index.params().d);
    assert_eq!(loaded.params().n, index.params().n);
    assert_eq!(loaded.params().s, index.params().s);
    for k in 0..index.num_tables() {
        assert_eq!(loaded.rnd_array(k).unwrap(), index.rnd_array(k).unwrap());
        assert_eq!(loaded.basis(k).unwrap(), index.basis(k).unwrap());
        assert_eq!(sorted_buckets(&loaded, k), sorted_buckets(&index, k));
    }

    // The loaded index is immediately queryable and hashes identically.
    for idx in 0..data.len().min(16) {
        assert_eq!(
            loaded.bucket_id(0, data.row(idx)).unwrap(),
            index.bucket_id(0, data.row(idx)).unwrap()
        );
    }
}

#[test]
fn saving_twice_produces_identical_bytes() {
    let (index, _) = populated_index();
    let mut first = Vec::new();
    let mut second = Vec::new();
    index.save_to(&mut first).unwrap();
    index.save_to(&mut second).unwrap();
    assert_eq!(first, second);
}

// S5: a stream one byte short must fail, constructing nothing.
#[test]
fn truncated_file_fails_to_load() {
    let (index, _) = populated_index();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.bin");
    index.save(&path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes.pop();
    fs::write(&path, &bytes).unwrap();

    let err = OrthantIndex::load(&path);
    assert!(matches!(
        err,
        Err(IndexError::Io(_)) | Err(IndexError::Format(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = OrthantIndex::load(dir.path().join("nope.bin"));
    assert!(matches!(err, Err(IndexError::Io(_))));
}

#[test]
fn load_and_requery_after_append() {
    // Appending to a loaded index keeps working: the learned projections
    // travel with the file.
    let (index, data) = populated_index();
    let mut bytes = Vec::new();
    index.save_to(&mut bytes).unwrap();

    let mut loaded = OrthantIndex::load_from(&mut bytes.as_slice()).unwrap();
    let extra = 4096u32;
    loaded.insert(extra, data.row(0)).unwrap();

    let id = loaded.bucket_id(0, data.row(0)).unwrap();
    let members = loaded.bucket_members(0, id).unwrap().unwrap();
    assert_eq!(members.last(), Some(&extra));
}
