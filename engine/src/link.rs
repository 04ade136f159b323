//! Hard links, unlinking, and symlink creation.
//!
//! Grounded in `original_source/file_system.py::link`/`unlink`/`symlink`:
//! a hard link appends a name to the target inode's `file_name` list and
//! bumps `links_cnt`; unlinking does the reverse and garbage-collects the
//! inode once `links_cnt` reaches zero, refusing if any descriptor still
//! has the inode open. Directories can never be hard-linked or unlinked
//! through this path — `mkdir`/`rmdir` own their own bookkeeping (see
//! `crate::fs`).

use fsdevice::codec::{self, FileType, InodeRecord, Value};
use fsdevice::device::StorageDevice;

use crate::bitmap::Bitmap;
use crate::directory::DirectoryStore;
use crate::error::{FsError, FsResult};
use crate::file::OpenFileTable;
use crate::inode::InodeTable;
use crate::layout::Layout;

/// Creates and destroys hard links and symlinks.
pub struct LinkManager<'a> {
    layout: &'a Layout,
    bitmap: Bitmap<'a>,
    inodes: InodeTable<'a>,
    dirs: DirectoryStore<'a>,
}

impl<'a> LinkManager<'a> {
    /// Wrap a layout for link bookkeeping.
    pub fn new(layout: &'a Layout) -> LinkManager<'a> {
        LinkManager {
            layout,
            bitmap: Bitmap::new(layout),
            inodes: InodeTable::new(layout),
            dirs: DirectoryStore::new(layout),
        }
    }

    /// Add `link_name` as a new hard link to `target_inode` inside
    /// `parent_dir`. Fails with [`FsError::DirectoryLinkException`] if the
    /// target is a directory.
    pub fn link(&self, device: &mut StorageDevice, target_inode: u64, parent_dir: u64, link_name: &str) -> FsResult<()> {
        let mut record = self.inodes.read(device, target_inode)?;
        if record.file_type == FileType::Directory {
            return Err(FsError::DirectoryLinkException(
                "cannot create a hard link to a directory".to_string(),
            ));
        }
        self.dirs.insert(device, parent_dir, link_name, target_inode)?;
        record.file_name.push(link_name.to_string());
        record.links_cnt += 1;
        self.inodes.write(device, &record)?;
        Ok(())
    }

    /// Remove `name` from `parent_dir` and drop one link from
    /// `target_inode`, freeing its blocks and inode slot once no name or
    /// open descriptor references it. Fails with
    /// [`FsError::DirectoryLinkException`] for a directory target, or
    /// [`FsError::CannotUnlinkOpenFile`] if any descriptor still has it
    /// open.
    pub fn unlink(
        &self,
        device: &mut StorageDevice,
        table: &OpenFileTable,
        parent_dir: u64,
        name: &str,
        target_inode: u64,
    ) -> FsResult<()> {
        let mut record = self.inodes.read(device, target_inode)?;
        if record.file_type == FileType::Directory {
            return Err(FsError::DirectoryLinkException(
                "cannot unlink a directory".to_string(),
            ));
        }
        if table.is_open(target_inode) {
            return Err(FsError::CannotUnlinkOpenFile(name.to_string()));
        }

        self.dirs.remove(device, parent_dir, name)?;
        if let Some(pos) = record.file_name.iter().position(|n| n == name) {
            record.file_name.remove(pos);
        }
        record.links_cnt = record.links_cnt.saturating_sub(1);

        if record.links_cnt == 0 {
            if !record.data_blocks_map.is_empty() {
                self.bitmap.mark(device, b'0', &record.data_blocks_map)?;
            }
            self.inodes.clear(device, target_inode)?;
        } else {
            self.inodes.write(device, &record)?;
        }
        Ok(())
    }

    /// Create a new symlink inode named `link_name` in `parent_dir`,
    /// holding `target_path` as its content. Fails with
    /// [`FsError::TooLongSymlink`] if the target does not fit in one
    /// block.
    pub fn symlink(&self, device: &mut StorageDevice, parent_dir: u64, link_name: &str, target_path: &str) -> FsResult<u64> {
        let encoded = codec::encode(&Value::Str(target_path.to_string()))?;
        if encoded.len() as u64 > self.layout.block_size {
            return Err(FsError::TooLongSymlink);
        }

        let id = self.inodes.get_free(device)?;
        let block = self.bitmap.find_free(device, 1)?;
        self.bitmap.mark(device, b'1', &block)?;
        let padded = codec::encode_into_slot(&Value::Str(target_path.to_string()), self.layout.block_size)?;
        device.write(self.layout.data_block_offset(block[0]), &padded)?;

        let record = InodeRecord {
            id,
            file_name: vec![link_name.to_string()],
            file_type: FileType::Symlink,
            links_cnt: FileType::Symlink.default_links_cnt(),
            file_size: encoded.len() as u64,
            data_blocks_map: vec![block[0]],
        };
        self.dirs.insert(device, parent_dir, link_name, id)?;
        self.inodes.write(device, &record)?;
        Ok(id)
    }
}
