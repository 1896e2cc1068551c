// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Record values and the tub schema.
//!
//! A [`Record`] maps field names to [`Value`]s. Which values a field accepts,
//! and how they are laid out on disk, is decided by the field's declared type
//! name in the [`Schema`] (see [`crate::storage::codec`]).

use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TubError};

/// One indexed set of named field values.
pub type Record = BTreeMap<String, Value>;

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Array(Tensor),
    Image(Image),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
            Value::Image(_) => "image",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Image(img) => Some(img),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}

impl From<Tensor> for Value {
    fn from(v: Tensor) -> Self { Value::Array(v) }
}

impl From<Image> for Value {
    fn from(v: Image) -> Self { Value::Image(v) }
}

/// Dense numeric array in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    /// Returns `None` if `data` does not hold exactly `shape.product()` elements.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Option<Self> {
        let tensor = Tensor { shape, data };
        tensor.is_consistent().then_some(tensor)
    }

    /// One-dimensional tensor.
    pub fn vector(data: Vec<f64>) -> Self {
        Tensor { shape: vec![data.len()], data }
    }

    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Image payload: either raw pixels or already-encoded file bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    Raw(RawImage),
    /// Encoded bytes (JPEG, PNG, ...) stored verbatim.
    Encoded(Bytes),
}

/// Interleaved 8-bit pixels, `height` rows of `width * channels` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Bytes,
}

impl RawImage {
    /// Returns `None` if the pixel buffer length does not match the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, pixels: impl Into<Bytes>) -> Option<Self> {
        let pixels = pixels.into();
        let expected = width as usize * height as usize * channels as usize;
        (pixels.len() == expected).then_some(RawImage { width, height, channels, pixels })
    }
}

/// Declared field names paired positionally with their type names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub inputs: Vec<String>,
    pub types: Vec<String>,
}

impl Schema {
    pub fn new<I, S, T, U>(inputs: I, types: T) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        T: IntoIterator<Item = U>,
        U: Into<String>,
    {
        let schema = Schema {
            inputs: inputs.into_iter().map(Into::into).collect(),
            types: types.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.inputs.len() != self.types.len() {
            return Err(TubError::InvalidSchema(format!(
                "{} inputs but {} types",
                self.inputs.len(),
                self.types.len()
            )));
        }
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.as_str()) {
                return Err(TubError::InvalidSchema(format!("duplicate input '{input}'")));
            }
        }
        Ok(())
    }

    /// Declared type name of `field`.
    pub fn type_of(&self, field: &str) -> Option<&str> {
        self.inputs
            .iter()
            .position(|f| f == field)
            .map(|i| self.types[i].as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inputs.iter().any(|f| f == field)
    }

    /// `(input, type)` pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs.iter().map(String::as_str).zip(self.types.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_mismatched_lengths() {
        assert!(Schema::new(["a", "b"], ["float"]).is_err());
    }

    #[test]
    fn schema_rejects_duplicate_inputs() {
        assert!(Schema::new(["a", "a"], ["float", "int"]).is_err());
    }

    #[test]
    fn schema_type_lookup() {
        let schema = Schema::new(["cam/image_array", "angle"], ["image_array", "float"]).unwrap();
        assert_eq!(schema.type_of("angle"), Some("float"));
        assert_eq!(schema.type_of("throttle"), None);
    }

    #[test]
    fn raw_image_checks_buffer_length() {
        assert!(RawImage::new(2, 2, 3, vec![0u8; 12]).is_some());
        assert!(RawImage::new(2, 2, 3, vec![0u8; 11]).is_none());
    }

    #[test]
    fn tensor_checks_shape() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 6]).is_some());
        assert!(Tensor::new(vec![2, 3], vec![0.0; 5]).is_none());
    }
}
