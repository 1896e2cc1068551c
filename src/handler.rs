// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Tub handler: enumerates the tubs under a root directory and opens new
//! numbered tubs for recording sessions.
//!
//! New tubs are named `tub_<n>_<yy-mm-dd>`, where `<n>` is the smallest
//! number not already used by a `tub_<n>[_...]` directory under the root.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::{Result, TubError};
use crate::storage::record::Schema;
use crate::storage::tub::{is_tub_dir, Tub};

const TUB_DIR_PREFIX: &str = "tub_";

/// Stateless view over a directory of tubs.
pub struct TubHandler {
    root: PathBuf,
}

impl TubHandler {
    /// Fails with [`TubError::RootMissing`] if `root` is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(TubError::RootMissing { path: root.to_path_buf() });
        }
        Ok(TubHandler { root: root.to_path_buf() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectories of the root that hold tub metadata, sorted by path.
    pub fn get_tub_list(&self) -> Result<Vec<PathBuf>> {
        let mut tubs: Vec<PathBuf> = self
            .subdirs()?
            .into_iter()
            .filter(|dir| is_tub_dir(dir))
            .collect();
        tubs.sort();
        Ok(tubs)
    }

    /// Smallest non-negative number not used by any `tub_<n>` directory.
    ///
    /// Directories without tub metadata still count as taken, so a number is
    /// never handed out for a path that already exists.
    pub fn next_tub_number(&self) -> Result<usize> {
        let used: HashSet<usize> = self
            .subdirs()?
            .iter()
            .filter_map(|dir| dir.file_name()?.to_str().and_then(tub_number))
            .collect();
        Ok((0..).find(|n| !used.contains(n)).unwrap_or_default())
    }

    /// Create a fresh tub at `root/tub_<next number>_<date>`.
    pub fn new_tub_writer(&self, schema: Schema) -> Result<Tub> {
        self.new_tub_writer_with_meta(schema, BTreeMap::new())
    }

    pub fn new_tub_writer_with_meta(
        &self,
        schema: Schema,
        user_meta: BTreeMap<String, String>,
    ) -> Result<Tub> {
        let number = self.next_tub_number()?;
        let date = Local::now().format("%y-%m-%d");
        let path = self.root.join(format!("{TUB_DIR_PREFIX}{number}_{date}"));
        let tub = Tub::create_with_meta(&path, schema, user_meta)?;
        info!(root = ?self.root, number, path = ?path, "New tub writer");
        Ok(tub)
    }

    fn subdirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

/// `tub_7` and `tub_7_24-05-01` → 7.
fn tub_number(dir_name: &str) -> Option<usize> {
    dir_name
        .strip_prefix(TUB_DIR_PREFIX)?
        .split('_')
        .next()?
        .parse()
        .ok()
}
