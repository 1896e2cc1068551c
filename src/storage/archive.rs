// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Tub export: a gzip-compressed tar of the metadata and record files.
//!
//! Entry names are relative to the tub directory, so unpacking the archive
//! into an empty directory yields a tub that [`Tub::open`] accepts.

use std::fs::File;
use std::ops::Range;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use crate::error::Result;
use crate::storage::tub::{record_file_name, Tub, META_FILE};

/// What [`write_archive`] includes besides `meta.json`.
#[derive(Debug, Clone, Default)]
pub struct TarOptions {
    /// Only records whose index falls in this range.
    pub range: Option<Range<usize>>,
    /// Also bundle each record's auxiliary image files.
    pub include_images: bool,
}

/// Write the archive to `out`. Returns the number of entries written.
pub fn write_archive(tub: &Tub, out: &Path, options: &TarOptions) -> Result<usize> {
    let layout = tub.scan_layout();
    let file = File::create(out)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    builder.append_path_with_name(tub.meta_path(), META_FILE)?;
    let mut entries = 1;

    let selected = layout
        .records
        .iter()
        .copied()
        .filter(|ix| options.range.as_ref().map_or(true, |r| r.contains(ix)));
    for ix in selected {
        let name = record_file_name(ix);
        builder.append_path_with_name(tub.path().join(&name), &name)?;
        entries += 1;

        if options.include_images {
            for aux in layout.aux.get(&ix).into_iter().flatten() {
                builder.append_path_with_name(tub.path().join(aux), aux)?;
                entries += 1;
            }
        }
    }

    builder.into_inner()?.finish()?;
    info!(tub = ?tub.path(), output = ?out, entries, "Archive written");
    Ok(entries)
}
