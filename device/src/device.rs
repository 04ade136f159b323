//! Byte-addressed block driver over a memory-mapped backing file.
//!
//! Grounded in `original_source/device.py` + `driver.py` (a `StorageDevice`
//! that owns a path and a declared size, and a `Driver` that reopens the
//! file and seeks on every call) and in the teacher's `controller::Device`
//! (which instead keeps the file memory-mapped for its whole lifetime).
//! The Rust version follows the teacher: one `mmap`, kept open until the
//! device is dropped.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::{DeviceError, Result};

/// A single backing store for a filesystem image, exposing byte-addressed
/// `read`/`write`/`clear`. Concurrency and caching are explicitly out of
/// scope (see spec §5): nothing here is safe to share across threads or
/// processes.
#[derive(Debug)]
pub struct StorageDevice {
    path: PathBuf,
    size: u64,
    contents: MmapMut,
}

impl StorageDevice {
    /// Open or create the backing file at `path`.
    ///
    /// If `reuse` is true, the file must already exist and have length
    /// exactly `size`, or this fails with [`DeviceError::InvalidSize`]. If
    /// `reuse` is false, the file is created (erroring if it already
    /// exists) and zero-filled to `size` bytes.
    pub fn open<P: AsRef<Path>>(path: P, size: u64, reuse: bool) -> Result<StorageDevice> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();
        if reuse && !exists {
            return Err(DeviceError::InvalidSize(
                "tried to reuse a backing file that does not exist",
            ));
        }
        if !reuse && exists {
            return Err(DeviceError::InvalidSize(
                "tried to create a backing file that already exists",
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if reuse {
            if file.metadata()?.len() != size {
                return Err(DeviceError::InvalidSize(
                    "existing backing file length does not match the declared size",
                ));
            }
        } else {
            file.set_len(size)?;
        }

        let contents = unsafe { MmapMut::map_mut(&file)? };
        log::debug!(
            "opened backing store at {:?} ({} bytes, reuse={})",
            path,
            size,
            reuse
        );
        Ok(StorageDevice {
            path,
            size,
            contents,
        })
    }

    /// Total size of the backing store, in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the file backing this device.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, addr: u64, n: u64) -> Result<()> {
        if addr.checked_add(n).map_or(true, |end| end > self.size) {
            return Err(DeviceError::InvalidSize(
                "read/write/clear past the end of the device",
            ));
        }
        Ok(())
    }

    /// Read `n` bytes starting at byte offset `addr`.
    pub fn read(&self, addr: u64, n: u64) -> Result<Vec<u8>> {
        self.check_range(addr, n)?;
        let start = addr as usize;
        let end = (addr + n) as usize;
        Ok(self.contents[start..end].to_vec())
    }

    /// Write `data` starting at byte offset `addr`. All-or-nothing with
    /// respect to the requested range: either the whole write lands, or
    /// (on an out-of-range request) none of it does.
    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len() as u64)?;
        let start = addr as usize;
        let end = start + data.len();
        self.contents[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Overwrite `n` bytes starting at byte offset `addr` with zeroes.
    pub fn clear(&mut self, addr: u64, n: u64) -> Result<()> {
        self.check_range(addr, n)?;
        let start = addr as usize;
        let end = (addr + n) as usize;
        self.contents[start..end].fill(0);
        Ok(())
    }
}

impl Drop for StorageDevice {
    fn drop(&mut self) {
        if let Err(e) = self.contents.flush() {
            log::warn!("failed to flush backing store on drop: {}", e);
        }
    }
}
