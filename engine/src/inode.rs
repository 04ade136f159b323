//! The inode table: a fixed array of fixed-size slots.
//!
//! Grounded in `original_source/file_system.py::_get_free_inode`/
//! `_read_inode`/`_write_inode`/`_clear_inode`, and in spirit the teacher's
//! `InodeLayerFS::i_alloc`/`i_get`/`i_put`/`i_free` (minus caching, minus
//! indirect blocks — both Non-goals here). Root always occupies slot 0,
//! written directly by `FileSystem::mkfs`, not through `get_free`.

use fsdevice::codec::{self, InodeRecord, Value};
use fsdevice::device::StorageDevice;

use crate::error::{FsError, FsResult};
use crate::layout::{Layout, INODE_SIZE};

/// Accessor for the fixed-size inode slot array.
pub struct InodeTable<'a> {
    layout: &'a Layout,
}

impl<'a> InodeTable<'a> {
    /// Wrap a layout for inode table access.
    pub fn new(layout: &'a Layout) -> InodeTable<'a> {
        InodeTable { layout }
    }

    /// Scan slot 0..N-1 and return the first whose codec-decoded contents
    /// are [`Value::Empty`]. Fails with [`FsError::OutOfInodes`] if none
    /// are free.
    pub fn get_free(&self, device: &StorageDevice) -> FsResult<u64> {
        for id in 0..self.layout.inodes_number {
            let raw = device.read(self.layout.inode_offset(id), INODE_SIZE)?;
            if codec::is_empty_slot(&raw) {
                log::trace!("inode slot {} is free", id);
                return Ok(id);
            }
        }
        Err(FsError::OutOfInodes)
    }

    /// Read the inode record stored at slot `id`. Fails if the slot is
    /// empty or out of bounds.
    pub fn read(&self, device: &StorageDevice, id: u64) -> FsResult<InodeRecord> {
        if id >= self.layout.inodes_number {
            return Err(FsError::FileDoesNotExist(format!(
                "inode {} is out of range",
                id
            )));
        }
        let raw = device.read(self.layout.inode_offset(id), INODE_SIZE)?;
        match codec::decode_slot(&raw)? {
            Value::Inode(record) => Ok(record),
            Value::Empty => Err(FsError::FileDoesNotExist(format!(
                "inode {} is free",
                id
            ))),
            other => Err(FsError::InvalidSize(format!(
                "inode slot {} decoded to an unexpected value: {:?}",
                id, other
            ))),
        }
    }

    /// Write `record` into its own slot (`record.id`).
    pub fn write(&self, device: &mut StorageDevice, record: &InodeRecord) -> FsResult<()> {
        let encoded = codec::encode_into_slot(&Value::Inode(record.clone()), INODE_SIZE)?;
        device.write(self.layout.inode_offset(record.id), &encoded)?;
        log::debug!("wrote inode {} (links_cnt={})", record.id, record.links_cnt);
        Ok(())
    }

    /// Zero-fill slot `id`, marking it free.
    pub fn clear(&self, device: &mut StorageDevice, id: u64) -> FsResult<()> {
        device.clear(self.layout.inode_offset(id), INODE_SIZE)?;
        log::debug!("cleared inode {}", id);
        Ok(())
    }
}
