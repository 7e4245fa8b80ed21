//! Self-describing index serialization.
//!
//! Layout: 4-byte magic, little-endian `u32` format version, one-byte index
//! kind, one-byte scalar kind, then a bincode payload of the index struct.
//! Cut planes serialize as tagged enum variants, so loaders recover the
//! concrete plane types without out-of-band registration. Kernel backends
//! are never persisted; they are rebound from the caller's [`Context`] at
//! search time.
//!
//! [`Context`]: crate::context::Context

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::index::{BspTreeIndex, CompositeIndex, EntryPointIndex, FlatIndex, GraphIndex, Index};
use crate::scalar::Scalar;

/// Magic bytes opening every persisted index.
pub const MAGIC: [u8; 4] = *b"PRXI";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Concrete index kinds carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexKind {
    Flat = 1,
    BspTree = 2,
    Graph = 3,
    Composite = 4,
}

impl TryFrom<u8> for IndexKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(IndexKind::Flat),
            2 => Ok(IndexKind::BspTree),
            3 => Ok(IndexKind::Graph),
            4 => Ok(IndexKind::Composite),
            other => Err(Error::Serialization(format!("unknown index kind {other}"))),
        }
    }
}

/// Scalar element tags carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScalarKind {
    F32 = 1,
    U8 = 2,
}

pub(crate) fn save_index<I: Serialize + ?Sized>(
    index: &I,
    kind: IndexKind,
    scalar: ScalarKind,
    w: &mut dyn Write,
) -> Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&[kind as u8, scalar as u8])?;

    let payload = bincode::serialize(index).map_err(|e| Error::Serialization(e.to_string()))?;
    w.write_all(&payload)?;
    Ok(())
}

fn read_header(r: &mut dyn Read, expected: IndexKind, scalar: ScalarKind) -> Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(Error::Serialization("bad magic bytes".into()));
    }

    let mut version = [0u8; 4];
    r.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(Error::Serialization(format!(
            "unsupported format version {version}"
        )));
    }

    let mut tags = [0u8; 2];
    r.read_exact(&mut tags)?;
    let kind = IndexKind::try_from(tags[0])?;
    if kind != expected {
        return Err(Error::Serialization(format!(
            "expected {expected:?} index, found {kind:?}"
        )));
    }
    if tags[1] != scalar as u8 {
        return Err(Error::Serialization(format!(
            "scalar kind mismatch: expected {scalar:?}"
        )));
    }
    Ok(())
}

fn decode<I: DeserializeOwned>(r: &mut dyn Read) -> Result<I> {
    bincode::deserialize_from(r).map_err(|e| Error::Serialization(e.to_string()))
}

pub fn load_flat_index<T: Scalar, R: Read>(r: &mut R) -> Result<FlatIndex<T>> {
    read_header(r, IndexKind::Flat, T::KIND)?;
    decode(r)
}

pub fn load_bsp_tree_index<T: Scalar, R: Read>(r: &mut R) -> Result<BspTreeIndex<T>> {
    read_header(r, IndexKind::BspTree, T::KIND)?;
    decode(r)
}

pub fn load_graph_index<T: Scalar, R: Read>(r: &mut R) -> Result<GraphIndex<T>> {
    read_header(r, IndexKind::Graph, T::KIND)?;
    decode(r)
}

pub fn load_composite_index<T, H, E, R>(r: &mut R) -> Result<CompositeIndex<T, H, E>>
where
    T: Scalar,
    H: Index<T> + Serialize + DeserializeOwned,
    E: EntryPointIndex<T> + Serialize + DeserializeOwned,
    R: Read,
{
    read_header(r, IndexKind::Composite, T::KIND)?;
    decode(r)
}
