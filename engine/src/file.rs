//! Regular-file content storage and the in-memory open-file table.
//!
//! Content storage is grounded in `original_source/writable.py::Data` and
//! `file_system.py::_read_data`/`_write_data`/`_allocate_blocks`: a file's
//! bytes are wrapped in one self-describing value and split across however
//! many fixed-size blocks the encoding needs, the same mechanism
//! [`crate::directory::DirectoryStore`] uses for name maps. `write`
//! reallocates a fresh block run every call and frees the old one
//! (`file_system.py::write`); `truncate` rewrites in place when the new
//! content still fits the existing block run, and only reallocates when it
//! does not.
//!
//! The open-file table's cursor-advance quirks in [`OpenFileTable::read`]
//! and [`OpenFileTable::write`] are transcribed directly from the resolved
//! policy for the read off-by-one and the write-tail-drop behavior; both
//! are preserved verbatim rather than "fixed".

use std::collections::BTreeMap;

use fsdevice::codec::{self, Value};
use fsdevice::device::StorageDevice;

use crate::bitmap::Bitmap;
use crate::error::{FsError, FsResult};
use crate::inode::InodeTable;
use crate::layout::Layout;

/// Maximum number of simultaneously open descriptors.
const MAX_OPEN_FILES: usize = 10000;

fn block_count_for(encoded_len: u64, block_size: u64) -> u64 {
    if encoded_len == 0 {
        0
    } else {
        (encoded_len + block_size - 1) / block_size
    }
}

fn write_padded(device: &mut StorageDevice, layout: &Layout, addresses: &[u64], encoded: &[u8]) -> FsResult<()> {
    let mut padded = encoded.to_vec();
    padded.resize((addresses.len() as u64 * layout.block_size) as usize, 0);
    for (i, &block) in addresses.iter().enumerate() {
        let start = i * layout.block_size as usize;
        let end = start + layout.block_size as usize;
        device.write(layout.data_block_offset(block), &padded[start..end])?;
    }
    Ok(())
}

/// Read a file's content out of its allocated blocks. Empty for a file
/// with no allocated blocks.
pub fn read_content(device: &StorageDevice, layout: &Layout, addresses: &[u64]) -> FsResult<Vec<u8>> {
    if addresses.is_empty() {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    for &block in addresses {
        buf.extend(device.read(layout.data_block_offset(block), layout.block_size)?);
    }
    match codec::decode_slot(&buf)? {
        Value::Bytes(bytes) => Ok(bytes),
        Value::Empty => Ok(Vec::new()),
        other => Err(FsError::InvalidSize(format!(
            "file content decoded to an unexpected value: {:?}",
            other
        ))),
    }
}

/// Replace a file's content with a freshly allocated block run sized to
/// fit, freeing the previous run. Returns the new block addresses and the
/// encoded payload length.
pub fn write_content_fresh(
    device: &mut StorageDevice,
    layout: &Layout,
    bitmap: &Bitmap,
    old_addresses: &[u64],
    bytes: &[u8],
) -> FsResult<(Vec<u64>, u64)> {
    let encoded = codec::encode(&Value::Bytes(bytes.to_vec()))?;
    let needed = block_count_for(encoded.len() as u64, layout.block_size);
    let new_addresses = if needed == 0 {
        Vec::new()
    } else {
        let addresses = bitmap.find_free(device, needed)?;
        bitmap.mark(device, b'1', &addresses)?;
        addresses
    };
    write_padded(device, layout, &new_addresses, &encoded)?;
    if !old_addresses.is_empty() {
        bitmap.mark(device, b'0', old_addresses)?;
    }
    Ok((new_addresses, encoded.len() as u64))
}

/// Rewrite a file's content into its existing block run, without changing
/// which blocks are allocated. Fails with [`FsError::InvalidSize`] if the
/// new content no longer fits.
fn write_content_in_place(device: &mut StorageDevice, layout: &Layout, addresses: &[u64], bytes: &[u8]) -> FsResult<u64> {
    let encoded = codec::encode(&Value::Bytes(bytes.to_vec()))?;
    let capacity = addresses.len() as u64 * layout.block_size;
    if encoded.len() as u64 > capacity {
        return Err(FsError::InvalidSize(
            "content no longer fits the file's allocated blocks".to_string(),
        ));
    }
    write_padded(device, layout, addresses, &encoded)?;
    Ok(encoded.len() as u64)
}

/// One entry in the open-file table: which inode it names, its in-memory
/// content buffer, and its private seek cursor.
#[derive(Debug, Clone)]
pub struct OpenFile {
    /// The inode this descriptor was opened against.
    pub inode_id: u64,
    /// The file's full content, held in memory for the descriptor's
    /// lifetime and flushed to disk on every `write`.
    pub data: Vec<u8>,
    /// The descriptor's private seek cursor.
    pub cursor: u64,
}

/// The in-memory table of open descriptors.
#[derive(Debug, Default)]
pub struct OpenFileTable {
    files: BTreeMap<u64, OpenFile>,
}

impl OpenFileTable {
    /// An empty table.
    pub fn new() -> OpenFileTable {
        OpenFileTable {
            files: BTreeMap::new(),
        }
    }

    /// Whether any descriptor currently names `inode_id`.
    pub fn is_open(&self, inode_id: u64) -> bool {
        self.files.values().any(|f| f.inode_id == inode_id)
    }

    /// Allocate a new descriptor for `inode_id` with `data` as its initial
    /// content and cursor at 0. Descriptor numbers are the smallest unused
    /// integer above the current maximum, so closing and reopening can
    /// reuse a number, exactly as `max(open, default=0) + 1` does.
    pub fn open(&mut self, inode_id: u64, data: Vec<u8>) -> FsResult<u64> {
        if self.files.len() >= MAX_OPEN_FILES {
            return Err(FsError::TooManyFilesOpened);
        }
        let fd = self.files.keys().next_back().copied().unwrap_or(0) + 1;
        self.files.insert(
            fd,
            OpenFile {
                inode_id,
                data,
                cursor: 0,
            },
        );
        Ok(fd)
    }

    /// Drop a descriptor.
    pub fn close(&mut self, fd: u64) -> FsResult<()> {
        self.files
            .remove(&fd)
            .map(|_| ())
            .ok_or(FsError::WrongFileDescriptorNumber(fd))
    }

    /// Which inode a descriptor names.
    pub fn inode_of(&self, fd: u64) -> FsResult<u64> {
        self.files
            .get(&fd)
            .map(|f| f.inode_id)
            .ok_or(FsError::WrongFileDescriptorNumber(fd))
    }

    /// Set a descriptor's cursor. Out-of-range positions are accepted and
    /// clamped by the next `read`.
    pub fn seek(&mut self, fd: u64, pos: u64) -> FsResult<()> {
        let file = self
            .files
            .get_mut(&fd)
            .ok_or(FsError::WrongFileDescriptorNumber(fd))?;
        file.cursor = pos;
        Ok(())
    }

    /// Read up to `n` bytes from the current cursor. `start` is
    /// `cursor − 1` for any nonzero cursor — a preserved quirk, not a
    /// typo.
    pub fn read(&mut self, fd: u64, n: u64) -> FsResult<Vec<u8>> {
        let file = self
            .files
            .get_mut(&fd)
            .ok_or(FsError::WrongFileDescriptorNumber(fd))?;
        let len = file.data.len() as u64;
        let start = if file.cursor == 0 { 0 } else { file.cursor - 1 };
        let start = start.min(len);
        let end = start + n;
        if end > len {
            file.cursor = len;
            Ok(file.data[start as usize..].to_vec())
        } else {
            file.cursor = end;
            Ok(file.data[start as usize..end as usize].to_vec())
        }
    }

    /// Overwrite from the cursor with up to `n` bytes of `bytes`. Returns
    /// the descriptor's full updated content for the caller to persist.
    /// Bytes past `cursor + n` in the previous content are dropped, not
    /// preserved — this is the documented write-tail policy.
    pub fn write(&mut self, fd: u64, bytes: &[u8], n: u64) -> FsResult<Vec<u8>> {
        let file = self
            .files
            .get_mut(&fd)
            .ok_or(FsError::WrongFileDescriptorNumber(fd))?;
        let take = (n as usize).min(bytes.len());
        let slice = &bytes[..take];
        let cursor = file.cursor as usize;
        let new_content = if file.data.is_empty() {
            let mut v = vec![0u8; cursor];
            v.extend_from_slice(slice);
            v
        } else if file.data.len() < cursor {
            let mut v = file.data.clone();
            v.resize(cursor, 0);
            v.extend_from_slice(slice);
            v
        } else {
            let mut v = file.data[..cursor].to_vec();
            v.extend_from_slice(slice);
            v
        };
        file.data = new_content.clone();
        file.cursor += n;
        Ok(new_content)
    }
}

/// Drives file content persistence through the open-file table.
pub struct FileEngine<'a> {
    layout: &'a Layout,
    bitmap: Bitmap<'a>,
    inodes: InodeTable<'a>,
}

impl<'a> FileEngine<'a> {
    /// Wrap a layout for file content access.
    pub fn new(layout: &'a Layout) -> FileEngine<'a> {
        FileEngine {
            layout,
            bitmap: Bitmap::new(layout),
            inodes: InodeTable::new(layout),
        }
    }

    /// Open inode `inode_id` for reading and writing, loading its content
    /// into the open-file table.
    pub fn open(&self, device: &StorageDevice, table: &mut OpenFileTable, inode_id: u64) -> FsResult<u64> {
        let record = self.inodes.read(device, inode_id)?;
        let data = read_content(device, self.layout, &record.data_blocks_map)?;
        table.open(inode_id, data)
    }

    /// Apply a write through the open-file table and persist the result.
    pub fn write(&self, device: &mut StorageDevice, table: &mut OpenFileTable, fd: u64, bytes: &[u8], n: u64) -> FsResult<()> {
        let inode_id = table.inode_of(fd)?;
        let new_content = table.write(fd, bytes, n)?;
        let mut record = self.inodes.read(device, inode_id)?;
        let old_addresses = record.data_blocks_map.clone();
        let (new_addresses, size) =
            write_content_fresh(device, self.layout, &self.bitmap, &old_addresses, &new_content)?;
        record.data_blocks_map = new_addresses;
        record.file_size = size;
        self.inodes.write(device, &record)?;
        Ok(())
    }

    /// Set a file's length to exactly `size` bytes, zero-padding or
    /// dropping the tail as needed, rewriting in place when the new
    /// content still fits the existing block run.
    pub fn truncate(&self, device: &mut StorageDevice, inode_id: u64, size: u64) -> FsResult<()> {
        let mut record = self.inodes.read(device, inode_id)?;
        let mut content = read_content(device, self.layout, &record.data_blocks_map)?;
        content.resize(size as usize, 0);

        match write_content_in_place(device, self.layout, &record.data_blocks_map, &content) {
            Ok(new_size) => {
                record.file_size = new_size;
            }
            Err(_) => {
                let old_addresses = record.data_blocks_map.clone();
                let (new_addresses, new_size) =
                    write_content_fresh(device, self.layout, &self.bitmap, &old_addresses, &content)?;
                record.data_blocks_map = new_addresses;
                record.file_size = new_size;
            }
        }
        self.inodes.write(device, &record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsdevice::codec::{FileType, InodeRecord};
    use std::path::PathBuf;

    fn temp_device(name: &str, size: u64) -> StorageDevice {
        let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        dir.push("target");
        dir.push("file-tests");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join(format!("{}.img", name));
        let _ = std::fs::remove_file(&path);
        StorageDevice::open(&path, size, false).unwrap()
    }

    fn make_empty_file(device: &mut StorageDevice, layout: &Layout, id: u64) {
        InodeTable::new(layout)
            .write(
                device,
                &InodeRecord {
                    id,
                    file_name: vec!["f".to_string()],
                    file_type: FileType::Regular,
                    links_cnt: 1,
                    file_size: 0,
                    data_blocks_map: vec![],
                },
            )
            .unwrap();
    }

    #[test]
    fn open_file_table_reuses_the_lowest_free_descriptor() {
        let mut table = OpenFileTable::new();
        let a = table.open(1, vec![]).unwrap();
        let b = table.open(2, vec![]).unwrap();
        assert_eq!((a, b), (1, 2));
        table.close(a).unwrap();
        let c = table.open(3, vec![]).unwrap();
        assert_eq!(c, 1);
    }

    #[test]
    fn read_off_by_one_quirk_at_nonzero_cursor() {
        let mut table = OpenFileTable::new();
        let fd = table.open(1, b"hello world".to_vec()).unwrap();
        table.seek(fd, 6).unwrap();
        // start = 6 - 1 = 5, so this reads "o world" not "world".
        let out = table.read(fd, 7).unwrap();
        assert_eq!(out, b"o world");
    }

    #[test]
    fn read_at_zero_cursor_has_no_offset() {
        let mut table = OpenFileTable::new();
        let fd = table.open(1, b"hello".to_vec()).unwrap();
        let out = table.read(fd, 5).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn write_past_end_pads_with_zeros() {
        let mut table = OpenFileTable::new();
        let fd = table.open(1, vec![]).unwrap();
        table.seek(fd, 3).unwrap();
        let content = table.write(fd, b"hi", 2).unwrap();
        assert_eq!(content, vec![0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn write_in_the_middle_drops_the_old_tail() {
        let mut table = OpenFileTable::new();
        let fd = table.open(1, b"hello world".to_vec()).unwrap();
        table.seek(fd, 2).unwrap();
        let content = table.write(fd, b"XY", 2).unwrap();
        assert_eq!(content, b"heXY".to_vec());
    }

    #[test]
    fn write_then_read_round_trips_through_the_device() {
        let layout = Layout::new(4096 * 50, 4096, 20).unwrap();
        let mut device = temp_device("write_then_read_round_trips_through_the_device", 4096 * 50);
        Bitmap::new(&layout).init(&mut device).unwrap();
        make_empty_file(&mut device, &layout, 0);

        let engine = FileEngine::new(&layout);
        let mut table = OpenFileTable::new();
        let fd = engine.open(&device, &mut table, 0).unwrap();
        engine.write(&mut device, &mut table, fd, b"hello", 5).unwrap();

        let record = InodeTable::new(&layout).read(&device, 0).unwrap();
        let persisted = read_content(&device, &layout, &record.data_blocks_map).unwrap();
        assert_eq!(persisted, b"hello".to_vec());
    }

    #[test]
    fn truncate_shrinks_in_place() {
        let layout = Layout::new(4096 * 50, 4096, 20).unwrap();
        let mut device = temp_device("truncate_shrinks_in_place", 4096 * 50);
        Bitmap::new(&layout).init(&mut device).unwrap();
        make_empty_file(&mut device, &layout, 0);

        let engine = FileEngine::new(&layout);
        let mut table = OpenFileTable::new();
        let fd = engine.open(&device, &mut table, 0).unwrap();
        engine.write(&mut device, &mut table, fd, b"hello world", 11).unwrap();

        engine.truncate(&mut device, 0, 5).unwrap();
        let record = InodeTable::new(&layout).read(&device, 0).unwrap();
        let persisted = read_content(&device, &layout, &record.data_blocks_map).unwrap();
        assert_eq!(persisted, b"hello".to_vec());
    }

    #[test]
    fn truncate_grows_with_zero_padding() {
        let layout = Layout::new(4096 * 50, 4096, 20).unwrap();
        let mut device = temp_device("truncate_grows_with_zero_padding", 4096 * 50);
        Bitmap::new(&layout).init(&mut device).unwrap();
        make_empty_file(&mut device, &layout, 0);

        let engine = FileEngine::new(&layout);
        let mut table = OpenFileTable::new();
        let fd = engine.open(&device, &mut table, 0).unwrap();
        engine.write(&mut device, &mut table, fd, b"hi", 2).unwrap();

        engine.truncate(&mut device, 0, 5).unwrap();
        let record = InodeTable::new(&layout).read(&device, 0).unwrap();
        let persisted = read_content(&device, &layout, &record.data_blocks_map).unwrap();
        assert_eq!(persisted, vec![b'h', b'i', 0, 0, 0]);
    }
}
