use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Descriptor width must be non-zero")]
    ZeroWidth,

    #[error("Descriptor data length {len} is not a multiple of width {width}")]
    RaggedData { len: usize, width: usize },

    #[error("Descriptor {index} holds a NaN or infinite value")]
    NonFinite { index: usize },
}

/// Distance used to compare two descriptor vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Bit-count distance between packed binary descriptors.
    Hamming,
    /// L2 distance between floating-point descriptors.
    Euclidean,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Hamming => write!(f, "hamming"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Storage {
    Binary(Vec<u8>),
    Float(Vec<f32>),
}

/// All feature vectors extracted from one image, stored row-major.
///
/// The metric is implied by the storage kind: packed bytes compare by
/// Hamming distance, `f32` rows by Euclidean distance. A set may hold zero
/// vectors when extraction found no features.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    width: usize,
    storage: Storage,
}

impl DescriptorSet {
    /// Binary descriptors, `width` bytes per vector.
    pub fn binary(width: usize, data: Vec<u8>) -> Result<Self, DescriptorError> {
        check_shape(width, data.len())?;
        Ok(Self {
            width,
            storage: Storage::Binary(data),
        })
    }

    /// Floating-point descriptors, `width` dimensions per vector.
    ///
    /// Every value must be finite; distances are ordered with plain `<`.
    pub fn float(width: usize, data: Vec<f32>) -> Result<Self, DescriptorError> {
        check_shape(width, data.len())?;
        if let Some(at) = data.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::NonFinite { index: at / width });
        }
        Ok(Self {
            width,
            storage: Storage::Float(data),
        })
    }

    pub fn binary_from_rows<R: AsRef<[u8]>>(width: usize, rows: &[R]) -> Result<Self, DescriptorError> {
        let mut data = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(DescriptorError::RaggedData {
                    len: row.len(),
                    width,
                });
            }
            data.extend_from_slice(row);
        }
        Self::binary(width, data)
    }

    pub fn float_from_rows<R: AsRef<[f32]>>(width: usize, rows: &[R]) -> Result<Self, DescriptorError> {
        let mut data = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(DescriptorError::RaggedData {
                    len: row.len(),
                    width,
                });
            }
            data.extend_from_slice(row);
        }
        Self::float(width, data)
    }

    pub fn metric(&self) -> Metric {
        match self.storage {
            Storage::Binary(_) => Metric::Hamming,
            Storage::Float(_) => Metric::Euclidean,
        }
    }

    /// Bytes (binary) or dimensions (float) per vector.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of vectors in the set.
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Binary(data) => data.len() / self.width,
            Storage::Float(data) => data.len() / self.width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Binary(data) => Some(data),
            Storage::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f32]> {
        match &self.storage {
            Storage::Float(data) => Some(data),
            Storage::Binary(_) => None,
        }
    }
}

fn check_shape(width: usize, len: usize) -> Result<(), DescriptorError> {
    if width == 0 {
        return Err(DescriptorError::ZeroWidth);
    }
    if len % width != 0 {
        return Err(DescriptorError::RaggedData { len, width });
    }
    Ok(())
}
