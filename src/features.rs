//! Owned corpus storage.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scalar::Scalar;

/// Flat row-major feature storage: `len` vectors of `dim` elements each.
///
/// Corpus indices are `u32` items and always coincide with the insertion
/// position. Storage is immutable once an index owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features<T> {
    data: Vec<T>,
    dim: usize,
}

impl<T: Scalar> Features<T> {
    /// Copies `rows` into owned storage, validating every row against `dim`.
    pub fn from_rows(dim: usize, rows: &[Vec<T>]) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(Error::InvalidFeatureDim {
                    expected: dim,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, dim })
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Feature vector of item `i`.
    pub fn get(&self, i: usize) -> &[T] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.dim.max(1))
    }
}
