// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

pub mod config;
pub mod error;
pub mod group;
pub mod handler;
pub mod storage;

pub use config::{Config, TrainingConfig};
pub use error::{Result, TubError};
pub use group::TubGroup;
pub use handler::TubHandler;
pub use storage::record::{Image, RawImage, Record, Schema, Tensor, Value};
pub use storage::tub::{CheckReport, Tub};
