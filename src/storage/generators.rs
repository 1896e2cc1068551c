// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Pull-driven record and batch producers.
//!
//! Every producer is a plain [`Iterator`] over a snapshot of record keys and a
//! position that wraps modulo the key count. Nothing runs until the caller
//! pulls; dropping the iterator is cancellation; calling the constructor again
//! restarts from the first key.
//!
//! ```text
//! RecordSource ──keys──▶ RecordGen ──▶ BatchGen   {field → [v; batch_size]}
//!                            │
//!                            └──────▶ XyGen      ([X_k; ..], [Y_k; ..])
//! ```
//!
//! Unreadable records are logged and skipped; a producer only ends when a
//! whole lap over its keys yields nothing usable.

use std::collections::BTreeMap;
use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::config::TrainingConfig;
use crate::error::{Result, TubError};
use crate::storage::record::{Record, Value};

/// One batch: field name → `batch_size` values.
pub type Batch = BTreeMap<String, Vec<Value>>;

/// `(X, Y)`: one column of `batch_size` values per requested key.
pub type XyBatch = (Vec<Vec<Value>>, Vec<Vec<Value>>);

/// Anything records can be pulled from by key.
pub trait RecordSource {
    type Key: Copy + Debug;

    /// Field names a batch covers when no keys are given.
    fn field_names(&self) -> Vec<String>;

    /// Keys of all readable records, in ascending order.
    fn readable_keys(&self) -> Vec<Self::Key>;

    fn read(&self, key: Self::Key) -> Result<Record>;
}

/// Infinite wraparound sequence of `(key, record)`.
pub struct RecordGen<'a, S: RecordSource> {
    source: &'a S,
    keys: Vec<S::Key>,
    pos: usize,
}

impl<'a, S: RecordSource> RecordGen<'a, S> {
    /// Iterate `keys` in the given order, wrapping after the last one.
    pub fn new(source: &'a S, keys: Vec<S::Key>) -> Self {
        Self { source, keys, pos: 0 }
    }

    pub fn keys(&self) -> &[S::Key] {
        &self.keys
    }
}

impl<S: RecordSource> Iterator for RecordGen<'_, S> {
    type Item = (S::Key, Record);

    fn next(&mut self) -> Option<Self::Item> {
        for _ in 0..self.keys.len() {
            let key = self.keys[self.pos];
            self.pos = (self.pos + 1) % self.keys.len();
            match self.source.read(key) {
                Ok(record) => return Some((key, record)),
                Err(e) => warn!(key = ?key, error = %e, "Skipping unreadable record"),
            }
        }
        None
    }
}

/// Infinite sequence of [`Batch`]es over consecutive wrapping records.
pub struct BatchGen<'a, S: RecordSource> {
    records: RecordGen<'a, S>,
    keys: Vec<String>,
    batch_size: usize,
}

impl<S: RecordSource> BatchGen<'_, S> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl<S: RecordSource> Iterator for BatchGen<'_, S> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let columns = fill_columns(&mut self.records, &self.keys, self.batch_size)?;
        Some(self.keys.iter().cloned().zip(columns).collect())
    }
}

/// Infinite sequence of [`XyBatch`]es for one side of a train/validation split.
pub struct XyGen<'a, S: RecordSource> {
    records: RecordGen<'a, S>,
    /// X keys followed by Y keys.
    keys: Vec<String>,
    x_len: usize,
    batch_size: usize,
}

impl<S: RecordSource> XyGen<'_, S> {
    /// Number of records this side of the split draws from.
    pub fn num_records(&self) -> usize {
        self.records.keys().len()
    }

    pub fn keys(&self) -> &[S::Key] {
        self.records.keys()
    }
}

impl<S: RecordSource> Iterator for XyGen<'_, S> {
    type Item = XyBatch;

    fn next(&mut self) -> Option<XyBatch> {
        let mut x = fill_columns(&mut self.records, &self.keys, self.batch_size)?;
        let y = x.split_off(self.x_len);
        Some((x, y))
    }
}

/// Pull records until `batch_size` of them hold every key. Records missing a
/// key are skipped.
fn fill_columns<S: RecordSource>(
    records: &mut RecordGen<'_, S>,
    keys: &[String],
    batch_size: usize,
) -> Option<Vec<Vec<Value>>> {
    let mut columns: Vec<Vec<Value>> = keys.iter().map(|_| Vec::with_capacity(batch_size)).collect();
    let mut filled = 0;
    let mut misses = 0;
    while filled < batch_size {
        let (key, record) = records.next()?;
        let row: Option<Vec<Value>> = keys.iter().map(|k| record.get(k).cloned()).collect();
        match row {
            Some(row) => {
                for (column, value) in columns.iter_mut().zip(row) {
                    column.push(value);
                }
                filled += 1;
                misses = 0;
            }
            None => {
                debug!(key = ?key, "Record lacks a requested field");
                misses += 1;
                if misses >= records.keys().len() {
                    warn!(keys = ?keys, "No record holds all requested fields");
                    return None;
                }
            }
        }
    }
    Some(columns)
}

/// Records of `source` in ascending key order, forever.
pub fn record_gen<S: RecordSource>(source: &S) -> RecordGen<'_, S> {
    RecordGen::new(source, source.readable_keys())
}

/// Batches of `batch_size` records. `keys = None` selects every field.
pub fn batch_gen<'a, S: RecordSource>(
    source: &'a S,
    batch_size: usize,
    keys: Option<&[&str]>,
) -> Result<BatchGen<'a, S>> {
    if batch_size == 0 {
        return Err(TubError::Config("batch_size must be > 0".into()));
    }
    let keys = match keys {
        Some(keys) => {
            let mut known = known_keys(source, keys)?;
            let mut seen = std::collections::HashSet::new();
            known.retain(|k| seen.insert(k.clone()));
            known
        }
        None => source.field_names(),
    };
    Ok(BatchGen { records: record_gen(source), keys, batch_size })
}

/// Training and validation `(X, Y)` producers over a seeded shuffle of the
/// readable records, split by `config.train_frac`.
pub fn train_val_gen<'a, S: RecordSource>(
    source: &'a S,
    x_keys: &[&str],
    y_keys: &[&str],
    config: &TrainingConfig,
) -> Result<(XyGen<'a, S>, XyGen<'a, S>)> {
    config.validate()?;
    let mut keys = known_keys(source, x_keys)?;
    keys.extend(known_keys(source, y_keys)?);

    let (train, val) = split_keys(source.readable_keys(), config.train_frac, config.seed);
    debug!(train = train.len(), val = val.len(), seed = config.seed, "Split records");

    let make = |split: Vec<S::Key>| XyGen {
        records: RecordGen::new(source, split),
        keys: keys.clone(),
        x_len: x_keys.len(),
        batch_size: config.batch_size,
    };
    Ok((make(train), make(val)))
}

/// Shuffle `keys` with `seed` and cut them into disjoint train/validation
/// sets. With two or more keys both sides get at least one.
pub fn split_keys<K>(mut keys: Vec<K>, train_frac: f64, seed: u64) -> (Vec<K>, Vec<K>) {
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    let n = keys.len();
    let n_train = if n < 2 {
        n
    } else {
        ((n as f64 * train_frac).round() as usize).clamp(1, n - 1)
    };
    let val = keys.split_off(n_train);
    (keys, val)
}

fn known_keys<S: RecordSource>(source: &S, keys: &[&str]) -> Result<Vec<String>> {
    let fields = source.field_names();
    keys.iter()
        .map(|k| {
            if fields.iter().any(|f| f == k) {
                Ok(k.to_string())
            } else {
                Err(TubError::UnknownField { field: k.to_string() })
            }
        })
        .collect()
}
