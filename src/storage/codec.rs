// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Type-name registry and per-kind value codecs.
//!
//! | type name              | value                  | stored as                         |
//! |------------------------|------------------------|-----------------------------------|
//! | `float`                | `Float` (or `Int`)     | JSON number                       |
//! | `int`                  | `Int`                  | JSON integer                      |
//! | `boolean`              | `Bool`                 | JSON bool                         |
//! | `str`                  | `Str`                  | JSON string                       |
//! | `vector`, `list`       | 1-D `Array`            | JSON array of numbers             |
//! | `nparray`              | `Array`                | `{"shape": [..], "data": [..]}`   |
//! | `image_array`          | `Image` (read as Raw)  | auxiliary PNG file                |
//! | `image`                | `Image` (read as Encoded) | auxiliary file, bytes verbatim |

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::{Result, TubError};
use crate::storage::record::{Image, RawImage, Tensor, Value};

/// Value kind resolved from a declared type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
    Boolean,
    Str,
    Vector,
    NdArray,
    ImageArray,
    Image,
}

impl FieldKind {
    /// Look up a declared type name. `None` for unsupported names.
    pub fn resolve(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "float" => FieldKind::Float,
            "int" => FieldKind::Int,
            "boolean" => FieldKind::Boolean,
            "str" => FieldKind::Str,
            "vector" | "list" => FieldKind::Vector,
            "nparray" => FieldKind::NdArray,
            "image_array" => FieldKind::ImageArray,
            "image" => FieldKind::Image,
            _ => return None,
        };
        Some(kind)
    }

    /// Binary kinds live in auxiliary files rather than the record JSON.
    pub fn is_binary(self) -> bool {
        matches!(self, FieldKind::ImageArray | FieldKind::Image)
    }

    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (FieldKind::Float, Value::Float(_) | Value::Int(_)) => true,
            (FieldKind::Int, Value::Int(_)) => true,
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Str, Value::Str(_)) => true,
            (FieldKind::Vector, Value::Array(t)) => t.shape.len() == 1 && t.is_consistent(),
            (FieldKind::NdArray, Value::Array(t)) => t.is_consistent(),
            (FieldKind::ImageArray | FieldKind::Image, Value::Image(_)) => true,
            _ => false,
        }
    }
}

/// Encode a non-binary value for the record JSON.
pub fn encode_inline(kind: FieldKind, value: &Value) -> Result<serde_json::Value> {
    let json = match (kind, value) {
        (FieldKind::Vector, Value::Array(t)) => serde_json::to_value(&t.data)?,
        (_, Value::Array(t)) => serde_json::to_value(t)?,
        (_, Value::Float(v)) => serde_json::Value::from(*v),
        (_, Value::Int(v)) => serde_json::Value::from(*v),
        (_, Value::Bool(v)) => serde_json::Value::from(*v),
        (_, Value::Str(v)) => serde_json::Value::from(v.as_str()),
        (_, Value::Image(_)) => {
            return Err(TubError::Image("image values cannot be stored inline".into()))
        }
    };
    Ok(json)
}

/// Decode a non-binary value from the record JSON.
pub fn decode_inline(kind: FieldKind, json: &serde_json::Value) -> std::result::Result<Value, String> {
    match kind {
        FieldKind::Float => json.as_f64().map(Value::Float).ok_or_else(|| "expected a number".into()),
        FieldKind::Int => json.as_i64().map(Value::Int).ok_or_else(|| "expected an integer".into()),
        FieldKind::Boolean => json.as_bool().map(Value::Bool).ok_or_else(|| "expected a bool".into()),
        FieldKind::Str => json
            .as_str()
            .map(|s| Value::Str(s.to_string()))
            .ok_or_else(|| "expected a string".into()),
        FieldKind::Vector => {
            let data: Vec<f64> = serde_json::from_value(json.clone()).map_err(|e| e.to_string())?;
            Ok(Value::Array(Tensor::vector(data)))
        }
        FieldKind::NdArray => {
            let tensor: Tensor = serde_json::from_value(json.clone()).map_err(|e| e.to_string())?;
            if !tensor.is_consistent() {
                return Err(format!("shape {:?} does not match {} elements", tensor.shape, tensor.len()));
            }
            Ok(Value::Array(tensor))
        }
        FieldKind::ImageArray | FieldKind::Image => Err("image field stored inline".into()),
    }
}

/// Encode an image for its auxiliary file. Returns the bytes and file extension.
pub fn encode_image(image: &Image) -> Result<(Bytes, &'static str)> {
    match image {
        Image::Raw(raw) => Ok((Bytes::from(encode_png(raw)?), "png")),
        Image::Encoded(bytes) => Ok((bytes.clone(), extension_for(bytes))),
    }
}

/// Decode an auxiliary image file according to the field kind.
pub fn decode_image(kind: FieldKind, bytes: Vec<u8>) -> std::result::Result<Image, String> {
    match kind {
        FieldKind::ImageArray => decode_raw(&bytes).map(Image::Raw),
        FieldKind::Image => Ok(Image::Encoded(Bytes::from(bytes))),
        _ => Err("not an image field".into()),
    }
}

fn extension_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("jpg")
}

fn encode_png(raw: &RawImage) -> Result<Vec<u8>> {
    let (w, h, pixels) = (raw.width, raw.height, raw.pixels.to_vec());
    let dynamic = match raw.channels {
        1 => image::GrayImage::from_raw(w, h, pixels).map(DynamicImage::ImageLuma8),
        2 => image::GrayAlphaImage::from_raw(w, h, pixels).map(DynamicImage::ImageLumaA8),
        3 => image::RgbImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgb8),
        4 => image::RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8),
        n => return Err(TubError::Image(format!("unsupported channel count {n}"))),
    }
    .ok_or_else(|| TubError::Image(format!("pixel buffer does not match {w}x{h}x{}", raw.channels)))?;

    let mut out = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| TubError::Image(e.to_string()))?;
    Ok(out.into_inner())
}

fn decode_raw(bytes: &[u8]) -> std::result::Result<RawImage, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let (width, height) = (img.width(), img.height());
    let (channels, pixels) = match img {
        DynamicImage::ImageLuma8(b) => (1, b.into_raw()),
        DynamicImage::ImageLumaA8(b) => (2, b.into_raw()),
        DynamicImage::ImageRgba8(b) => (4, b.into_raw()),
        other => (3, other.to_rgb8().into_raw()),
    };
    Ok(RawImage { width, height, channels, pixels: Bytes::from(pixels) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_type_names() {
        assert_eq!(FieldKind::resolve("float"), Some(FieldKind::Float));
        assert_eq!(FieldKind::resolve("list"), Some(FieldKind::Vector));
        assert_eq!(FieldKind::resolve("image_array"), Some(FieldKind::ImageArray));
        assert_eq!(FieldKind::resolve("bob"), None);
    }

    #[test]
    fn float_fields_accept_ints() {
        assert!(FieldKind::Float.accepts(&Value::Int(3)));
        assert!(!FieldKind::Int.accepts(&Value::Float(3.0)));
        assert!(!FieldKind::Float.accepts(&Value::Str("x".into())));
    }

    #[test]
    fn vector_requires_one_dimension() {
        let flat = Value::Array(Tensor::vector(vec![1.0, 2.0]));
        let grid = Value::Array(Tensor::new(vec![1, 2], vec![1.0, 2.0]).unwrap());
        assert!(FieldKind::Vector.accepts(&flat));
        assert!(!FieldKind::Vector.accepts(&grid));
        assert!(FieldKind::NdArray.accepts(&grid));
    }

    #[test]
    fn nparray_keeps_shape() {
        let tensor = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let json = encode_inline(FieldKind::NdArray, &Value::Array(tensor.clone())).unwrap();
        assert_eq!(decode_inline(FieldKind::NdArray, &json).unwrap(), Value::Array(tensor));
    }

    #[test]
    fn raw_image_is_lossless() {
        let pixels: Vec<u8> = (0..4 * 3 * 3).map(|i| i as u8).collect();
        let raw = RawImage::new(4, 3, 3, pixels).unwrap();
        let (bytes, ext) = encode_image(&Image::Raw(raw.clone())).unwrap();
        assert_eq!(ext, "png");
        let decoded = decode_image(FieldKind::ImageArray, bytes.to_vec()).unwrap();
        assert_eq!(decoded, Image::Raw(raw));
    }

    #[test]
    fn encoded_image_extension_follows_content() {
        let raw = RawImage::new(2, 2, 1, vec![0u8; 4]).unwrap();
        let png = encode_png(&raw).unwrap();
        let (_, ext) = encode_image(&Image::Encoded(Bytes::from(png))).unwrap();
        assert_eq!(ext, "png");
        let (_, ext) = encode_image(&Image::Encoded(Bytes::from_static(b"not an image"))).unwrap();
        assert_eq!(ext, "jpg");
    }
}
