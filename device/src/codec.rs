//! Self-describing value codec.
//!
//! Generalizes the original Python implementation's use of `pickle` (a
//! runtime-specific, unsafe-to-replicate object serializer) into a small
//! tagged `Value` enum, serialized with `bincode`. `bincode` encodes an enum
//! as a little-endian `u32` discriminant followed by the variant's payload,
//! so a completely zero-filled slot decodes as the variant at index 0 with
//! no further bytes consumed — this is the "zero slot is empty" sentinel
//! the inode allocator (see `fsengine::inode`) relies on.
//!
//! Decoding always goes through [`decode_slot`], which reads from a
//! [`std::io::Cursor`] over the whole slot rather than calling
//! `bincode::deserialize` on an exact-length slice. Every `Value` variant's
//! `Deserialize` implementation only consumes the bytes it needs, so this
//! gives the self-delimiting behavior a fixed-size, zero-padded slot
//! requires: trailing padding is never inspected.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

/// One hard-link entry's worth of file-type tag.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    /// A directory inode.
    Directory,
    /// A regular file inode.
    Regular,
    /// A symbolic link inode.
    Symlink,
}

impl FileType {
    /// Single-character rendering used by `stat`/`ls`-adjacent output:
    /// `'d'`, `'f'`, `'l'`.
    pub fn as_char(self) -> char {
        match self {
            FileType::Directory => 'd',
            FileType::Regular => 'f',
            FileType::Symlink => 'l',
        }
    }

    /// The `links_cnt` a freshly allocated inode of this type starts at.
    pub fn default_links_cnt(self) -> u32 {
        match self {
            FileType::Directory => 2,
            FileType::Regular | FileType::Symlink => 1,
        }
    }
}

/// The semantic contents of one occupied inode slot.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct InodeRecord {
    /// Dense index into the inode table.
    pub id: u64,
    /// Names under which this inode appears in directories, one per hard
    /// link, in link order.
    pub file_name: Vec<String>,
    /// Directory, regular file, or symlink.
    pub file_type: FileType,
    /// Number of directory entries referring to this inode.
    pub links_cnt: u32,
    /// Size in bytes of the encoded payload stored in `data_blocks_map`.
    pub file_size: u64,
    /// Ordered list of data block indices whose concatenated contents are
    /// the encoded payload.
    pub data_blocks_map: Vec<u64>,
}

/// A self-describing value. Every on-disk payload (bitmap string, directory
/// map, inode record, symlink target, regular-file content) is wrapped in
/// one of these before being handed to the codec.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum Value {
    /// The sentinel decoded from a zero-filled slot.
    Empty,
    /// A bare integer.
    Int(u64),
    /// A UTF-8 string (used for the bitmap and symlink targets).
    Str(String),
    /// A raw byte string (used for regular-file content).
    Bytes(Vec<u8>),
    /// An ordered list of block indices.
    IntList(Vec<u64>),
    /// An ordered name -> inode id map (used for directory payloads).
    /// Kept as a `Vec` of pairs rather than a `HashMap` so that insertion
    /// order (`.` and `..` first) survives a round trip.
    NameMap(Vec<(String, u64)>),
    /// An inode record.
    Inode(InodeRecord),
}

/// Encode a value with no slot-size constraint.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Encode a value and pad it with zero bytes up to `slot_size`. Errors if
/// the encoded value does not fit.
pub fn encode_into_slot(value: &Value, slot_size: u64) -> Result<Vec<u8>> {
    let mut bytes = encode(value)?;
    if bytes.len() as u64 > slot_size {
        return Err(DeviceError::ValueTooLarge(bytes.len() as u64, slot_size));
    }
    bytes.resize(slot_size as usize, 0);
    Ok(bytes)
}

/// Decode a value out of a (possibly zero-padded) slot. Self-delimiting:
/// only consumes as many bytes as the encoded variant needs, so trailing
/// padding is ignored.
pub fn decode_slot(slot: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(slot);
    Ok(bincode::deserialize_from(&mut cursor)?)
}

/// Whether `slot` decodes to the empty sentinel, i.e. whether the slot
/// represents a free inode. This is the codec-level implementation of the
/// "all-zero slot is empty" rule spec'd for the inode table.
pub fn is_empty_slot(slot: &[u8]) -> bool {
    matches!(decode_slot(slot), Ok(Value::Empty))
}
