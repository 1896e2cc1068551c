// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Derived record index ("df"): maps record index → FrameRow.
//!
//! The frame is a cache over a tub directory: it is rebuilt from the
//! per-record JSON files already on disk and never written anywhere.
//! Any put/remove on the owning tub drops it; the next reader rebuilds it.

use std::collections::BTreeMap;

use crate::storage::record::Value;

/// Non-binary contents of one readable record.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub index: usize,
    /// Wall-clock write time in milliseconds since the Unix epoch.
    pub milliseconds: i64,
    /// Inline (non-image) field values.
    pub values: BTreeMap<String, Value>,
    /// Image fields → auxiliary file name inside the tub directory.
    pub images: BTreeMap<String, String>,
}

/// In-memory index of all readable records of one tub, in index order.
#[derive(Debug, Default, Clone)]
pub struct TubFrame {
    rows: BTreeMap<usize, FrameRow>,
}

impl TubFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: FrameRow) {
        self.rows.insert(row.index, row);
    }

    pub fn get(&self, ix: usize) -> Option<&FrameRow> {
        self.rows.get(&ix)
    }

    /// Readable indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.rows.keys().copied().collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &FrameRow> {
        self.rows.values()
    }

    /// Values of one inline field, in index order. Rows without the field are skipped.
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = (usize, &'a Value)> + 'a {
        self.rows
            .values()
            .filter_map(move |r| r.values.get(field).map(|v| (r.index, v)))
    }

    pub fn first_ix(&self) -> Option<usize> {
        self.rows.keys().next().copied()
    }

    pub fn last_ix(&self) -> Option<usize> {
        self.rows.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rebuild the frame from rows recovered by scanning the tub directory.
    pub fn rebuild_from_scanned(&mut self, rows: impl IntoIterator<Item = FrameRow>) {
        self.rows.clear();
        for row in rows {
            self.insert(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, angle: f64) -> FrameRow {
        FrameRow {
            index,
            milliseconds: 0,
            values: BTreeMap::from([("angle".to_string(), Value::Float(angle))]),
            images: BTreeMap::new(),
        }
    }

    #[test]
    fn rebuild_replaces_previous_rows() {
        let mut frame = TubFrame::new();
        frame.insert(row(7, 0.0));
        frame.rebuild_from_scanned([row(2, 0.5), row(0, 0.1)]);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.indices(), vec![0, 2]);
        assert_eq!(frame.first_ix(), Some(0));
        assert_eq!(frame.last_ix(), Some(2));
        assert!(frame.get(7).is_none());
    }

    #[test]
    fn column_follows_index_order() {
        let mut frame = TubFrame::new();
        frame.rebuild_from_scanned([row(3, 0.3), row(1, 0.1)]);
        let col: Vec<_> = frame.column("angle").map(|(ix, v)| (ix, v.as_f64())).collect();
        assert_eq!(col, vec![(1, Some(0.1)), (3, Some(0.3))]);
        assert_eq!(frame.column("throttle").count(), 0);
    }
}
