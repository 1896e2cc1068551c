//! Shared fixtures: a tiny synthetic camera and sample tubs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tubstore::{RawImage, Record, Schema, Tub, Value};

pub const WIDTH: u32 = 40;
pub const HEIGHT: u32 = 30;

pub fn sample_schema() -> Schema {
    Schema::new(
        ["cam/image_array", "angle", "throttle"],
        ["image_array", "float", "float"],
    )
    .expect("schema")
}

/// A frame with a white 6x6 square whose position moves with `step`.
pub fn square_frame(step: usize) -> RawImage {
    let mut pixels = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    let x0 = step % (WIDTH as usize - 6);
    let y0 = (step * 3) % (HEIGHT as usize - 6);
    for y in y0..y0 + 6 {
        for x in x0..x0 + 6 {
            let at = (y * WIDTH as usize + x) * 3;
            pixels[at..at + 3].copy_from_slice(&[255, 255, 255]);
        }
    }
    RawImage::new(WIDTH, HEIGHT, 3, pixels).expect("frame")
}

pub fn sample_record(step: usize) -> Record {
    let angle = (step as f64 * 0.1).sin();
    let throttle = (step as f64 * 0.1).cos();
    Record::from([
        ("cam/image_array".to_string(), Value::Image(tubstore::Image::Raw(square_frame(step)))),
        ("angle".to_string(), Value::Float(angle)),
        ("throttle".to_string(), Value::Float(throttle)),
    ])
}

pub fn create_sample_tub(path: &Path, records: usize) -> Tub {
    let mut tub = Tub::new(path, Some(sample_schema())).expect("create tub");
    for step in 0..records {
        tub.put_record(&sample_record(step)).expect("put record");
    }
    tub
}

/// `cnt` tubs named `tub_<i>` under `root`, `records` records each.
pub fn create_sample_tubs(root: &Path, cnt: usize, records: usize) -> Vec<Tub> {
    (0..cnt)
        .map(|i| create_sample_tub(&root.join(format!("tub_{i}")), records))
        .collect()
}

pub fn tub_paths(tubs: &[Tub]) -> Vec<PathBuf> {
    tubs.iter().map(|t| t.path().to_path_buf()).collect()
}
