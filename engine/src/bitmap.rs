//! The data-block allocation bitmap.
//!
//! Grounded in `original_source/writable.py::Bitmap` (an ASCII `'0'`/`'1'`
//! string, re-written in full on every update) and
//! `file_system.py::_get_free_blocks`/`_write_data`/`_clear_data_block`.
//! Persisted at byte offset 0 as `Value::Str` through the codec, exactly
//! `layout.bitmap_bytes` bytes — no padding, since that size is computed to
//! fit the string exactly (see `layout::Layout::new`).

use fsdevice::codec::{self, Value};
use fsdevice::device::StorageDevice;

use crate::error::{FsError, FsResult};
use crate::layout::Layout;

/// Thin wrapper around the persisted bitmap string. Holds no state itself
/// beyond the layout needed to find it on disk; every operation reads the
/// current string fresh and writes the updated string back in one shot, per
/// spec §4.3 ("no reservation").
pub struct Bitmap<'a> {
    layout: &'a Layout,
}

impl<'a> Bitmap<'a> {
    /// Wrap a layout for bitmap access.
    pub fn new(layout: &'a Layout) -> Bitmap<'a> {
        Bitmap { layout }
    }

    /// Write a fresh all-free bitmap string during `mkfs`.
    pub fn init(&self, device: &mut StorageDevice) -> FsResult<()> {
        let bits = "0".repeat(self.layout.data_blocks as usize);
        let encoded = codec::encode_into_slot(&Value::Str(bits), self.layout.bitmap_bytes)?;
        device.write(0, &encoded)?;
        Ok(())
    }

    fn read_bits(&self, device: &StorageDevice) -> FsResult<Vec<u8>> {
        let raw = device.read(0, self.layout.bitmap_bytes)?;
        match codec::decode_slot(&raw)? {
            Value::Str(s) => Ok(s.into_bytes()),
            other => Err(FsError::InvalidSize(format!(
                "bitmap slot decoded to an unexpected value: {:?}",
                other
            ))),
        }
    }

    fn write_bits(&self, device: &mut StorageDevice, bits: &[u8]) -> FsResult<()> {
        let s = String::from_utf8(bits.to_vec())
            .expect("bitmap bytes are always ASCII '0'/'1' characters");
        let encoded = codec::encode_into_slot(&Value::Str(s), self.layout.bitmap_bytes)?;
        device.write(0, &encoded)?;
        Ok(())
    }

    /// Return the first `n` free (`'0'`) block indices, in ascending
    /// order. Fails with [`FsError::OutOfBlocks`] if fewer than `n` are
    /// free. Does not mark anything allocated — the caller commits via
    /// [`Bitmap::mark`].
    pub fn find_free(&self, device: &StorageDevice, n: u64) -> FsResult<Vec<u64>> {
        let bits = self.read_bits(device)?;
        let free: Vec<u64> = bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b == b'0')
            .map(|(i, _)| i as u64)
            .take(n as usize)
            .collect();
        if (free.len() as u64) < n {
            return Err(FsError::OutOfBlocks);
        }
        Ok(free)
    }

    /// Set every bit in `indices` to `value` (`'0'` or `'1'`) and persist
    /// the updated bitmap in one write.
    pub fn mark(&self, device: &mut StorageDevice, value: u8, indices: &[u64]) -> FsResult<()> {
        let mut bits = self.read_bits(device)?;
        for &i in indices {
            bits[i as usize] = value;
        }
        log::debug!(
            "marked {} block(s) as {}: {:?}",
            indices.len(),
            value as char,
            indices
        );
        self.write_bits(device, &bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_device(name: &str, size: u64) -> StorageDevice {
        let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        dir.push("target");
        dir.push("bitmap-tests");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join(format!("{}.img", name));
        let _ = std::fs::remove_file(&path);
        StorageDevice::open(&path, size, false).unwrap()
    }

    #[test]
    fn find_free_then_mark_is_visible() {
        let layout = Layout::new(4096 * 50, 4096, 20).unwrap();
        let mut device = temp_device("find_free_then_mark_is_visible", 4096 * 50);
        let bitmap = Bitmap::new(&layout);
        bitmap.init(&mut device).unwrap();

        let free = bitmap.find_free(&device, 3).unwrap();
        assert_eq!(free, vec![0, 1, 2]);

        bitmap.mark(&mut device, b'1', &free).unwrap();
        let next_free = bitmap.find_free(&device, 1).unwrap();
        assert_eq!(next_free, vec![3]);

        bitmap.mark(&mut device, b'0', &[1]).unwrap();
        let free_again = bitmap.find_free(&device, 2).unwrap();
        assert_eq!(free_again, vec![1, 3]);
    }

    #[test]
    fn out_of_blocks_when_not_enough_free() {
        let layout = Layout::new(4096 * 50, 4096, 20).unwrap();
        let mut device = temp_device("out_of_blocks_when_not_enough_free", 4096 * 50);
        let bitmap = Bitmap::new(&layout);
        bitmap.init(&mut device).unwrap();
        assert!(bitmap.find_free(&device, layout.data_blocks + 1).is_err());
    }
}
