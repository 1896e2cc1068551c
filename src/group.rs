// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Read-only aggregation over several existing tubs.
//!
//! The group owns no storage: counts, records and generators all delegate to
//! the member tubs. Records are addressed by `(member position, index)`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::error::{Result, TubError};
use crate::storage::generators::{self, BatchGen, RecordGen, RecordSource, XyGen};
use crate::storage::index::TubFrame;
use crate::storage::record::{Record, Schema};
use crate::storage::tub::Tub;

pub struct TubGroup {
    tubs: Vec<Tub>,
    /// Union of member `(input, type)` pairs, first seen first.
    schema: Schema,
}

impl TubGroup {
    /// Open every path as an existing tub. Fails on the first that is not one.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let tubs = paths.into_iter().map(Tub::open).collect::<Result<Vec<_>>>()?;
        let schema = merge_schemas(&tubs);
        info!(tubs = tubs.len(), fields = schema.len(), "Opened tub group");
        Ok(TubGroup { tubs, schema })
    }

    /// Comma-separated list of tub paths, e.g. `data/tub_0,data/tub_1`.
    pub fn from_list(list: &str) -> Result<Self> {
        Self::new(list.split(',').map(str::trim).filter(|p| !p.is_empty()))
    }

    pub fn inputs(&self) -> &[String] {
        &self.schema.inputs
    }

    pub fn types(&self) -> &[String] {
        &self.schema.types
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tubs(&self) -> &[Tub] {
        &self.tubs
    }

    pub fn get_num_tubs(&self) -> usize {
        self.tubs.len()
    }

    pub fn get_num_records(&self) -> usize {
        self.tubs.iter().map(Tub::get_num_records).sum()
    }

    /// Member tub opened from `path`.
    pub fn get_tub(&self, path: impl AsRef<Path>) -> Option<&Tub> {
        let path = path.as_ref();
        self.tubs.iter().find(|t| t.path() == path)
    }

    /// Record `ix` of the member tub at `path`.
    pub fn get_record(&self, path: impl AsRef<Path>, ix: usize) -> Result<Record> {
        let path = path.as_ref();
        self.get_tub(path)
            .ok_or_else(|| TubError::NotATub { path: path.to_path_buf() })?
            .get_record(ix)
    }

    /// Each member's derived index, paired with its path.
    pub fn get_df(&self) -> Vec<(PathBuf, Arc<TubFrame>)> {
        self.tubs
            .iter()
            .map(|t| (t.path().to_path_buf(), t.get_df()))
            .collect()
    }

    pub fn get_record_gen(&self) -> RecordGen<'_, Self> {
        generators::record_gen(self)
    }

    pub fn get_batch_gen(&self, batch_size: usize, keys: Option<&[&str]>) -> Result<BatchGen<'_, Self>> {
        generators::batch_gen(self, batch_size, keys)
    }

    pub fn get_train_val_gen(
        &self,
        x_keys: &[&str],
        y_keys: &[&str],
        config: &TrainingConfig,
    ) -> Result<(XyGen<'_, Self>, XyGen<'_, Self>)> {
        generators::train_val_gen(self, x_keys, y_keys, config)
    }
}

impl RecordSource for TubGroup {
    type Key = (usize, usize);

    fn field_names(&self) -> Vec<String> {
        self.schema.inputs.clone()
    }

    fn readable_keys(&self) -> Vec<(usize, usize)> {
        self.tubs
            .iter()
            .enumerate()
            .flat_map(|(pos, tub)| tub.get_df().indices().into_iter().map(move |ix| (pos, ix)))
            .collect()
    }

    fn read(&self, (pos, ix): (usize, usize)) -> Result<Record> {
        self.tubs[pos].get_record(ix)
    }
}

fn merge_schemas(tubs: &[Tub]) -> Schema {
    let mut merged = Schema { inputs: Vec::new(), types: Vec::new() };
    for tub in tubs {
        for (input, type_name) in tub.schema().fields() {
            match merged.type_of(input) {
                None => {
                    merged.inputs.push(input.to_string());
                    merged.types.push(type_name.to_string());
                }
                Some(existing) if existing != type_name => {
                    warn!(
                        tub = ?tub.path(),
                        field = input,
                        kept = existing,
                        ignored = type_name,
                        "Conflicting field types across tubs"
                    );
                }
                Some(_) => {}
            }
        }
    }
    merged
}
