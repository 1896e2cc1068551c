// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Tub: one directory-scoped record store.
//!
//! ## Directory Layout
//!
//! ```text
//! <tub>/
//!   meta.json              {"inputs": [..], "types": [..],
//!                           "current_ix": N, "user_meta": {..}}
//!   record_<ix>.json       {"index": ix, "milliseconds": ts,
//!                           "values": {field: json | image file name}}
//!   <ix>_<field>.<ext>     one per image-typed field ('/' → '-', other
//!                          bytes outside [A-Za-z0-9_] → %XX)
//! ```
//!
//! The record files are the source of truth. The write cursor is persisted in
//! `meta.json` so removed indices are never handed out again, and the derived
//! [`TubFrame`] is only ever a cache of a directory scan.
//!
//! A tub assumes a single writer. Two handles appending to the same
//! directory will collide on indices.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TrainingConfig;
use crate::error::{Result, TubError};
use crate::storage::archive::{self, TarOptions};
use crate::storage::codec::{self, FieldKind};
use crate::storage::generators::{self, BatchGen, RecordGen, RecordSource, XyGen};
use crate::storage::index::{FrameRow, TubFrame};
use crate::storage::record::{Image, Record, Schema, Value};

// ─────────────────────────────── constants ───────────────────────────────────

pub const META_FILE: &str = "meta.json";
const RECORD_PREFIX: &str = "record_";
const RECORD_SUFFIX: &str = ".json";

// ─────────────────────────────── on-disk types ───────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct TubMeta {
    inputs: Vec<String>,
    types: Vec<String>,
    #[serde(default)]
    current_ix: usize,
    #[serde(default)]
    user_meta: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    index: usize,
    milliseconds: i64,
    values: serde_json::Map<String, serde_json::Value>,
}

/// Files found in a tub directory, grouped by record index.
#[derive(Debug, Default)]
pub(crate) struct DiskLayout {
    pub records: BTreeSet<usize>,
    /// Auxiliary file names per index, sorted.
    pub aux: BTreeMap<usize, Vec<String>>,
}

/// Outcome of [`Tub::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Persisted records examined.
    pub scanned: usize,
    /// Indices that failed to load.
    pub corrupt: Vec<usize>,
    /// Whether the corrupt records were deleted.
    pub fixed: bool,
}

impl CheckReport {
    /// Records that loaded successfully.
    pub fn readable(&self) -> usize {
        self.scanned - self.corrupt.len()
    }
}

// ─────────────────────────────── Tub ─────────────────────────────────────────

pub struct Tub {
    path: PathBuf,
    schema: Schema,
    user_meta: BTreeMap<String, String>,
    /// Next index to write.
    current_ix: usize,
    frame: RwLock<Option<Arc<TubFrame>>>,
}

impl Tub {
    /// Open the tub at `path`, or create it with `schema` if `path` holds no
    /// tub metadata yet.
    ///
    /// An existing tub keeps its persisted schema; a different `schema`
    /// argument is ignored with a warning.
    pub fn new(path: impl AsRef<Path>, schema: Option<Schema>) -> Result<Self> {
        Self::init(path.as_ref(), schema, BTreeMap::new())
    }

    /// Like [`Tub::new`] with a schema, also recording free-form user metadata
    /// in a freshly created tub.
    pub fn create_with_meta(
        path: impl AsRef<Path>,
        schema: Schema,
        user_meta: BTreeMap<String, String>,
    ) -> Result<Self> {
        Self::init(path.as_ref(), Some(schema), user_meta)
    }

    /// Open an existing tub. Fails with [`TubError::NotATub`] if `path` has
    /// no metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_meta(path)? {
            Some(meta) => Ok(Self::resume(path, meta)),
            None => Err(TubError::NotATub { path: path.to_path_buf() }),
        }
    }

    fn init(path: &Path, schema: Option<Schema>, user_meta: BTreeMap<String, String>) -> Result<Self> {
        if let Some(meta) = read_meta(path)? {
            let tub = Self::resume(path, meta);
            if schema.as_ref().is_some_and(|s| *s != tub.schema) {
                warn!(path = ?path, "Supplied schema differs from the persisted one, keeping persisted");
            }
            return Ok(tub);
        }

        let schema = schema.ok_or_else(|| TubError::SchemaMissing { path: path.to_path_buf() })?;
        schema.validate()?;
        let tub = Tub {
            path: path.to_path_buf(),
            schema,
            user_meta,
            current_ix: 0,
            frame: RwLock::new(None),
        };
        fs::create_dir_all(&tub.path)?;
        tub.write_meta()?;
        info!(path = ?tub.path, fields = tub.schema.len(), "Created tub");
        Ok(tub)
    }

    fn resume(path: &Path, meta: TubMeta) -> Self {
        let mut tub = Tub {
            path: path.to_path_buf(),
            schema: Schema { inputs: meta.inputs, types: meta.types },
            user_meta: meta.user_meta,
            current_ix: meta.current_ix,
            frame: RwLock::new(None),
        };
        let layout = tub.scan_layout();
        if let Some(&last) = layout.records.last() {
            tub.current_ix = tub.current_ix.max(last + 1);
        }
        info!(
            path = ?tub.path,
            records = layout.records.len(),
            current_ix = tub.current_ix,
            "Opened tub"
        );
        tub
    }

    // ─────────────────────────── accessors ───────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn inputs(&self) -> &[String] {
        &self.schema.inputs
    }

    pub fn types(&self) -> &[String] {
        &self.schema.types
    }

    pub fn user_meta(&self) -> &BTreeMap<String, String> {
        &self.user_meta
    }

    /// Write cursor: the index the next `put_record` will use.
    pub fn current_ix(&self) -> usize {
        self.current_ix
    }

    pub fn meta_path(&self) -> PathBuf {
        self.path.join(META_FILE)
    }

    pub fn record_path(&self, ix: usize) -> PathBuf {
        self.path.join(record_file_name(ix))
    }

    // ─────────────────────────── write path ──────────────────────────────────

    /// Append `record` at the cursor. Returns the advanced cursor, so the
    /// record just written is at `put_record(..) - 1`.
    ///
    /// Every field must be declared, its type name must resolve and the value
    /// must match that type; nothing is written otherwise.
    pub fn put_record(&mut self, record: &Record) -> Result<usize> {
        let mut fields = Vec::with_capacity(record.len());
        for (field, value) in record {
            let kind = self.field_kind(field)?;
            if !kind.accepts(value) {
                return Err(TubError::TypeMismatch {
                    field: field.clone(),
                    expected: self.schema.type_of(field).unwrap_or_default().to_string(),
                    actual: value.kind_name(),
                });
            }
            fields.push((field, kind, value));
        }

        let ix = self.current_ix;
        let mut values = serde_json::Map::new();
        let mut images = Vec::new();
        for (field, kind, value) in fields {
            let json = match value {
                Value::Image(img) if kind.is_binary() => {
                    let (bytes, ext) = codec::encode_image(img)?;
                    let name = image_file_name(ix, field, ext);
                    let json = serde_json::Value::from(name.clone());
                    images.push((name, bytes));
                    json
                }
                _ => codec::encode_inline(kind, value)?,
            };
            values.insert(field.clone(), json);
        }
        let file = RecordFile { index: ix, milliseconds: Utc::now().timestamp_millis(), values };
        let json = serde_json::to_vec(&file)?;

        if !self.path.is_dir() {
            fs::create_dir_all(&self.path)?;
        }
        let mut written = Vec::with_capacity(images.len());
        let committed = images
            .iter()
            .try_for_each(|(name, bytes)| {
                let path = self.path.join(name);
                fs::write(&path, bytes)?;
                written.push(path);
                Ok::<_, io::Error>(())
            })
            .and_then(|()| fs::write(self.record_path(ix), &json));
        if let Err(e) = committed {
            warn!(path = ?self.path, ix, error = %e, "Record write failed, discarding its image files");
            for path in &written {
                remove_if_present(path)?;
            }
            return Err(e.into());
        }

        self.current_ix += 1;
        self.write_meta()?;
        self.invalidate_df();
        debug!(path = ?self.path, ix, fields = record.len(), "Record written");
        Ok(self.current_ix)
    }

    /// Delete the files of record `ix`. The cursor is not touched and the
    /// index is never reused.
    pub fn remove_record(&mut self, ix: usize) -> Result<()> {
        if !self.record_path(ix).is_file() {
            return Err(TubError::RecordNotFound { ix });
        }
        let layout = self.scan_layout();
        self.purge_record(ix, &layout)?;
        self.invalidate_df();
        debug!(path = ?self.path, ix, "Record removed");
        Ok(())
    }

    /// Try to load every persisted record. With `fix`, records that fail are
    /// deleted.
    pub fn check(&mut self, fix: bool) -> Result<CheckReport> {
        let layout = self.scan_layout();
        let mut corrupt = Vec::new();
        for &ix in &layout.records {
            if let Err(e) = self.get_record(ix) {
                warn!(path = ?self.path, ix, error = %e, "Corrupt record");
                corrupt.push(ix);
            }
        }

        if fix && !corrupt.is_empty() {
            for &ix in &corrupt {
                self.purge_record(ix, &layout)?;
            }
            self.invalidate_df();
        }

        let report = CheckReport { scanned: layout.records.len(), corrupt, fixed: fix };
        info!(
            path = ?self.path,
            scanned = report.scanned,
            corrupt = report.corrupt.len(),
            fixed = fix,
            "Tub check complete"
        );
        Ok(report)
    }

    /// Remove the whole tub directory and reset to an empty store. A later
    /// `put_record` recreates the layout.
    pub fn delete(&mut self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.current_ix = 0;
        self.invalidate_df();
        info!(path = ?self.path, "Tub deleted");
        Ok(())
    }

    // ─────────────────────────── read path ───────────────────────────────────

    pub fn get_record(&self, ix: usize) -> Result<Record> {
        let file = self.read_record_file(ix)?;
        let mut record = Record::new();
        for (field, raw) in file.values {
            let kind = self.field_kind(&field).map_err(|e| corrupt(ix, e.to_string()))?;
            let value = if kind.is_binary() {
                Value::Image(self.load_image(ix, &field, kind, &raw)?.1)
            } else {
                codec::decode_inline(kind, &raw)
                    .map_err(|reason| corrupt(ix, format!("field '{field}': {reason}")))?
            };
            record.insert(field, value);
        }
        Ok(record)
    }

    /// Highest persisted record index, or -1 for an empty tub.
    pub fn get_last_ix(&self) -> i64 {
        self.scan_layout().records.last().map_or(-1, |&ix| ix as i64)
    }

    /// Number of persisted records, from a fresh directory scan.
    pub fn get_num_records(&self) -> usize {
        self.scan_layout().records.len()
    }

    /// Persisted record indices in ascending order.
    pub fn persisted_indices(&self) -> Vec<usize> {
        self.scan_layout().records.into_iter().collect()
    }

    /// Rebuild the derived index from disk. Unreadable records are left out.
    pub fn update_df(&self) -> Arc<TubFrame> {
        let layout = self.scan_layout();
        let rows = layout.records.iter().filter_map(|&ix| match self.read_row(ix) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(path = ?self.path, ix, error = %e, "Skipping unreadable record");
                None
            }
        });
        let mut frame = TubFrame::new();
        frame.rebuild_from_scanned(rows);
        let frame = Arc::new(frame);
        *self.frame.write() = Some(frame.clone());
        frame
    }

    /// The derived index, rebuilt on first use after any mutation.
    pub fn get_df(&self) -> Arc<TubFrame> {
        let cached = self.frame.read().clone();
        match cached {
            Some(frame) => frame,
            None => self.update_df(),
        }
    }

    // ─────────────────────────── generators ──────────────────────────────────

    /// Readable records in ascending index order, wrapping forever.
    pub fn get_record_gen(&self) -> RecordGen<'_, Self> {
        generators::record_gen(self)
    }

    /// Batches of `batch_size` consecutive wrapping records. `keys = None`
    /// selects every schema field.
    pub fn get_batch_gen(&self, batch_size: usize, keys: Option<&[&str]>) -> Result<BatchGen<'_, Self>> {
        generators::batch_gen(self, batch_size, keys)
    }

    /// Training and validation `(X, Y)` producers over a seeded split of the
    /// readable records.
    pub fn get_train_val_gen(
        &self,
        x_keys: &[&str],
        y_keys: &[&str],
        config: &TrainingConfig,
    ) -> Result<(XyGen<'_, Self>, XyGen<'_, Self>)> {
        generators::train_val_gen(self, x_keys, y_keys, config)
    }

    // ─────────────────────────── export ──────────────────────────────────────

    /// Write a gzip tar of `meta.json` plus every persisted record file.
    /// Returns the number of archive entries.
    pub fn tar_records(&self, path: impl AsRef<Path>) -> Result<usize> {
        archive::write_archive(self, path.as_ref(), &TarOptions::default())
    }

    pub fn tar_records_with(&self, path: impl AsRef<Path>, options: &TarOptions) -> Result<usize> {
        archive::write_archive(self, path.as_ref(), options)
    }

    // ─────────────────────────── internals ───────────────────────────────────

    fn field_kind(&self, field: &str) -> Result<FieldKind> {
        let type_name = self
            .schema
            .type_of(field)
            .ok_or_else(|| TubError::UnknownField { field: field.to_string() })?;
        FieldKind::resolve(type_name).ok_or_else(|| TubError::UnknownType {
            field: field.to_string(),
            type_name: type_name.to_string(),
        })
    }

    fn read_record_file(&self, ix: usize) -> Result<RecordFile> {
        let bytes = match fs::read(self.record_path(ix)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TubError::RecordNotFound { ix })
            }
            Err(e) => return Err(e.into()),
        };
        let file: RecordFile =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(ix, e.to_string()))?;
        if file.index != ix {
            return Err(corrupt(ix, format!("file claims index {}", file.index)));
        }
        Ok(file)
    }

    /// Inline values of record `ix`. Image fields are decoded and dropped, so
    /// a row exists only for records `get_record` can load.
    fn read_row(&self, ix: usize) -> Result<FrameRow> {
        let file = self.read_record_file(ix)?;
        let mut row = FrameRow {
            index: ix,
            milliseconds: file.milliseconds,
            values: BTreeMap::new(),
            images: BTreeMap::new(),
        };
        for (field, raw) in file.values {
            let kind = self.field_kind(&field).map_err(|e| corrupt(ix, e.to_string()))?;
            if kind.is_binary() {
                let (name, _) = self.load_image(ix, &field, kind, &raw)?;
                row.images.insert(field, name);
            } else {
                let value = codec::decode_inline(kind, &raw)
                    .map_err(|reason| corrupt(ix, format!("field '{field}': {reason}")))?;
                row.values.insert(field, value);
            }
        }
        Ok(row)
    }

    /// Read and decode the image file named by `raw`. Returns the file name
    /// with the image.
    fn load_image(
        &self,
        ix: usize,
        field: &str,
        kind: FieldKind,
        raw: &serde_json::Value,
    ) -> Result<(String, Image)> {
        let name = raw
            .as_str()
            .ok_or_else(|| corrupt(ix, format!("field '{field}' has no image file name")))?;
        let bytes = fs::read(self.path.join(name))
            .map_err(|e| corrupt(ix, format!("image file {name}: {e}")))?;
        let img = codec::decode_image(kind, bytes)
            .map_err(|reason| corrupt(ix, format!("image file {name}: {reason}")))?;
        Ok((name.to_string(), img))
    }

    pub(crate) fn scan_layout(&self) -> DiskLayout {
        let mut layout = DiskLayout::default();
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return layout,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Cannot scan tub directory");
                return layout;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(ix) = parse_record_file_name(name) {
                layout.records.insert(ix);
            } else if let Some(ix) = parse_aux_file_name(name) {
                layout.aux.entry(ix).or_default().push(name.to_string());
            }
        }
        for names in layout.aux.values_mut() {
            names.sort();
        }
        layout
    }

    fn purge_record(&self, ix: usize, layout: &DiskLayout) -> Result<()> {
        remove_if_present(&self.record_path(ix))?;
        for name in layout.aux.get(&ix).into_iter().flatten() {
            remove_if_present(&self.path.join(name))?;
        }
        Ok(())
    }

    fn write_meta(&self) -> Result<()> {
        let meta = TubMeta {
            inputs: self.schema.inputs.clone(),
            types: self.schema.types.clone(),
            current_ix: self.current_ix,
            user_meta: self.user_meta.clone(),
        };
        fs::write(self.meta_path(), serde_json::to_vec_pretty(&meta)?)?;
        Ok(())
    }

    fn invalidate_df(&self) {
        *self.frame.write() = None;
    }
}

impl RecordSource for Tub {
    type Key = usize;

    fn field_names(&self) -> Vec<String> {
        self.schema.inputs.clone()
    }

    fn readable_keys(&self) -> Vec<usize> {
        self.get_df().indices()
    }

    fn read(&self, key: usize) -> Result<Record> {
        self.get_record(key)
    }
}

// ─────────────────────────────── helpers ─────────────────────────────────────

/// Load `meta.json` from `dir`. `Ok(None)` if there is none.
fn read_meta(dir: &Path) -> Result<Option<TubMeta>> {
    let meta_path = dir.join(META_FILE);
    let bytes = match fs::read(&meta_path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let meta: TubMeta = serde_json::from_slice(&bytes).map_err(|e| TubError::Format {
        path: meta_path.clone(),
        reason: e.to_string(),
    })?;
    if meta.inputs.len() != meta.types.len() {
        return Err(TubError::Format {
            path: meta_path,
            reason: format!("{} inputs but {} types", meta.inputs.len(), meta.types.len()),
        });
    }
    Ok(Some(meta))
}

/// Whether `dir` holds tub metadata.
pub fn is_tub_dir(dir: &Path) -> bool {
    dir.join(META_FILE).is_file()
}

pub(crate) fn record_file_name(ix: usize) -> String {
    format!("{RECORD_PREFIX}{ix}{RECORD_SUFFIX}")
}

fn parse_record_file_name(name: &str) -> Option<usize> {
    name.strip_prefix(RECORD_PREFIX)?.strip_suffix(RECORD_SUFFIX)?.parse().ok()
}

/// `<ix>_<field>.<ext>` with `/` mapped to `-`. Any other byte outside
/// `[A-Za-z0-9_]` is written as `%XX`, so distinct fields never share a file.
fn image_file_name(ix: usize, field: &str, ext: &str) -> String {
    let mut name = format!("{ix}_");
    for b in field.bytes() {
        match b {
            b'/' => name.push('-'),
            b if b.is_ascii_alphanumeric() || b == b'_' => name.push(b as char),
            b => name.push_str(&format!("%{b:02X}")),
        }
    }
    name.push('.');
    name.push_str(ext);
    name
}

fn parse_aux_file_name(name: &str) -> Option<usize> {
    let (ix, rest) = name.split_once('_')?;
    if rest.is_empty() {
        return None;
    }
    ix.parse().ok()
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn corrupt(ix: usize, reason: String) -> TubError {
    TubError::CorruptRecord { ix, reason }
}
