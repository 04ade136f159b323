//! Directory contents: a name -> inode id map, stored the same way regular
//! file content is stored (a list of data blocks holding one encoded
//! `Value::NameMap` payload), plus the grow/shrink policy for that list.
//!
//! Grounded in `original_source/files.py::Directory` (an in-memory
//! name -> inode dict, written out as a single pickled blob across as many
//! blocks as needed) and `file_system.py::_write_dir`/`_read_dir`. The
//! teacher has no direct analogue (`cplfs_sol::c_dirs_support` embeds one
//! `Dirent` per data block instead of one payload spanning many); the
//! single-payload shape here follows the original rather than the teacher,
//! since spec'd directory entries are variable-length names rather than
//! fixed-size C structs.

use fsdevice::codec::{self, Value};
use fsdevice::device::StorageDevice;

use crate::bitmap::Bitmap;
use crate::error::{FsError, FsResult};
use crate::inode::InodeTable;
use crate::layout::Layout;

/// Reads and writes the name -> inode id map backing one directory inode,
/// and grows or shrinks the inode's `data_blocks_map` to match.
pub struct DirectoryStore<'a> {
    layout: &'a Layout,
    bitmap: Bitmap<'a>,
    inodes: InodeTable<'a>,
}

impl<'a> DirectoryStore<'a> {
    /// Wrap a layout for directory payload access.
    pub fn new(layout: &'a Layout) -> DirectoryStore<'a> {
        DirectoryStore {
            layout,
            bitmap: Bitmap::new(layout),
            inodes: InodeTable::new(layout),
        }
    }

    /// Read the full name -> id map for the directory inode `id`.
    pub fn read(&self, device: &StorageDevice, id: u64) -> FsResult<Vec<(String, u64)>> {
        let record = self.inodes.read(device, id)?;
        let mut payload = Vec::new();
        for &block in &record.data_blocks_map {
            payload.extend(device.read(self.layout.data_block_offset(block), self.layout.block_size)?);
        }
        match codec::decode_slot(&payload)? {
            Value::NameMap(entries) => Ok(entries),
            other => Err(FsError::InvalidSize(format!(
                "directory {} payload decoded to an unexpected value: {:?}",
                id, other
            ))),
        }
    }

    /// Replace the full name -> id map for directory inode `id`, growing or
    /// shrinking its `data_blocks_map` to fit. Growth appends one block at a
    /// time; shrinkage frees down to `needed_blocks` once the allocated
    /// blocks hold more than one block's worth of slack past the encoded
    /// payload, matching `_remove_file_from_parent_directory_entry`'s
    /// `block_size * len(data_blocks_map) - len(dumped) > block_size` check.
    pub fn write(&self, device: &mut StorageDevice, id: u64, entries: &[(String, u64)]) -> FsResult<()> {
        let mut record = self.inodes.read(device, id)?;
        let encoded = codec::encode(&Value::NameMap(entries.to_vec()))?;
        let block_size = self.layout.block_size;
        let needed_blocks = ((encoded.len() as u64) + block_size - 1) / block_size.max(1);
        let needed_blocks = needed_blocks.max(1);
        let current_blocks = record.data_blocks_map.len() as u64;

        if needed_blocks > current_blocks {
            let extra = self.bitmap.find_free(device, needed_blocks - current_blocks)?;
            self.bitmap.mark(device, b'1', &extra)?;
            record.data_blocks_map.extend(extra);
        } else if current_blocks * block_size - encoded.len() as u64 > block_size {
            let freed: Vec<u64> = record.data_blocks_map.split_off(needed_blocks as usize);
            self.bitmap.mark(device, b'0', &freed)?;
        }

        let mut padded = encoded;
        padded.resize((record.data_blocks_map.len() as u64 * block_size) as usize, 0);
        for (i, &block) in record.data_blocks_map.iter().enumerate() {
            let start = i * block_size as usize;
            let end = start + block_size as usize;
            device.write(self.layout.data_block_offset(block), &padded[start..end])?;
        }

        record.file_size = encoded_len_before_padding(&entries.to_vec())?;
        self.inodes.write(device, &record)?;
        Ok(())
    }

    /// Look up one name in a directory's map.
    pub fn lookup(&self, device: &StorageDevice, dir_id: u64, name: &str) -> FsResult<Option<u64>> {
        let entries = self.read(device, dir_id)?;
        Ok(entries.into_iter().find(|(n, _)| n == name).map(|(_, id)| id))
    }

    /// Insert a new name -> id entry. Fails with
    /// [`FsError::FileAlreadyExists`] if the name is already present.
    pub fn insert(&self, device: &mut StorageDevice, dir_id: u64, name: &str, id: u64) -> FsResult<()> {
        let mut entries = self.read(device, dir_id)?;
        if entries.iter().any(|(n, _)| n == name) {
            return Err(FsError::FileAlreadyExists(name.to_string()));
        }
        entries.push((name.to_string(), id));
        self.write(device, dir_id, &entries)
    }

    /// Remove a name -> id entry. Fails with [`FsError::FileDoesNotExist`]
    /// if the name is absent.
    pub fn remove(&self, device: &mut StorageDevice, dir_id: u64, name: &str) -> FsResult<u64> {
        let mut entries = self.read(device, dir_id)?;
        let position = entries
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| FsError::FileDoesNotExist(name.to_string()))?;
        let (_, id) = entries.remove(position);
        self.write(device, dir_id, &entries)?;
        Ok(id)
    }
}

fn encoded_len_before_padding(entries: &[(String, u64)]) -> FsResult<u64> {
    Ok(codec::encode(&Value::NameMap(entries.to_vec()))?.len() as u64)
}
