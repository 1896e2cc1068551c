// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Storage subsystem: tub directory, codecs, derived index and generators.

pub mod archive;
pub mod codec;
pub mod generators;
pub mod index;
pub mod record;
pub mod tub;
