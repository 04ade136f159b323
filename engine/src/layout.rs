//! On-disk region layout.
//!
//! Grounded in `original_source/file_system.py::FileSystem.__init__` and
//! `_calculate_data_blocks_number`, generalized from Python's
//! `len(pickle.dumps(""))` overhead constant to the codec's own empty-value
//! encoding, computed once via `lazy_static` the way the teacher computes
//! `SUPERBLOCK_SIZE`/`DINODE_SIZE` in `cplfs_api::types`.

use fsdevice::codec::{self, Value};
use lazy_static::lazy_static;

use crate::error::{FsError, FsResult};

/// Fixed size of one inode table slot, in bytes.
pub const INODE_SIZE: u64 = 256;

lazy_static! {
    /// The codec's fixed overhead for encoding an empty string. Used only
    /// to reproduce the original's `len(pickle.dumps(""))` bitmap-sizing
    /// arithmetic; any other empty value would do, since every `Value`
    /// variant without payload shares this shape.
    static ref EMPTY_PAYLOAD_OVERHEAD: u64 =
        codec::encode(&Value::Str(String::new())).unwrap().len() as u64;
}

/// The byte offsets and sizes of the three on-disk regions: bitmap, inode
/// table, data.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Size of one data block, in bytes.
    pub block_size: u64,
    /// Number of inode slots in the inode table.
    pub inodes_number: u64,
    /// Number of data blocks in the data region.
    pub data_blocks: u64,
    /// Size, in bytes, of the encoded bitmap string at offset 0.
    pub bitmap_bytes: u64,
    /// Byte offset of the first inode slot.
    pub inode_table_offset: u64,
    /// Byte offset of the first data block.
    pub data_offset: u64,
}

impl Layout {
    /// Derive the region layout for a device of `device_size` bytes, with
    /// the given `block_size` and `inodes_number`.
    pub fn new(device_size: u64, block_size: u64, inodes_number: u64) -> FsResult<Layout> {
        let inode_region_bytes = inodes_number * INODE_SIZE;
        if device_size <= inode_region_bytes {
            return Err(FsError::InvalidSize(
                "device is too small to hold the requested inode table".to_string(),
            ));
        }

        // Naive block count before accounting for the bitmap's own footprint.
        let naive_data_blocks = (device_size - inode_region_bytes) / block_size;

        // Grow a bitmap-block counter until it can hold the encoded bitmap
        // string for `naive_data_blocks` blocks, then steal that many
        // blocks away from the data region.
        let overhead = *EMPTY_PAYLOAD_OVERHEAD;
        let mut bitmap_blocks = 0u64;
        while bitmap_blocks * block_size < naive_data_blocks + overhead {
            bitmap_blocks += 1;
        }
        if bitmap_blocks > naive_data_blocks {
            return Err(FsError::InvalidSize(
                "device is too small to hold even an empty bitmap".to_string(),
            ));
        }
        let data_blocks = naive_data_blocks - bitmap_blocks;
        let bitmap_bytes = overhead + data_blocks;

        let inode_table_offset = bitmap_bytes + 1; // one padding byte
        let data_offset = inode_table_offset + inode_region_bytes + 1; // one padding byte

        Ok(Layout {
            block_size,
            inodes_number,
            data_blocks,
            bitmap_bytes,
            inode_table_offset,
            data_offset,
        })
    }

    /// Byte offset of inode slot `id`.
    pub fn inode_offset(&self, id: u64) -> u64 {
        self.inode_table_offset + id * INODE_SIZE
    }

    /// Byte offset of data block `index`.
    pub fn data_block_offset(&self, index: u64) -> u64 {
        self.data_offset + index * self.block_size
    }
}
