//! The filesystem facade: the single entry point wiring the bitmap, inode
//! table, directory protocol, path resolver, file engine, and link
//! manager together into the operations a caller sees.
//!
//! Grounded in `original_source/file_system.py::FileSystem` for the
//! operation set and `terminal.py::mkfs` for the bootstrap parameters
//! (block size, inode count, a fixed disk size in blocks). `mkdir`/`rmdir`
//! own the parent `links_cnt` bookkeeping that a subdirectory's `..` entry
//! implies; `link`/`unlink` never touch it, since only directories create
//! that extra hard reference to their parent.

use std::path::Path;

use fsdevice::codec::{FileType, InodeRecord};
use fsdevice::device::StorageDevice;

use crate::bitmap::Bitmap;
use crate::directory::DirectoryStore;
use crate::error::{FsError, FsResult};
use crate::file::{FileEngine, OpenFileTable};
use crate::inode::InodeTable;
use crate::layout::Layout;
use crate::link::LinkManager;
use crate::path::PathResolver;

/// A filesystem instance bound to one backing file.
pub struct FileSystem {
    device: StorageDevice,
    layout: Layout,
    cwd: Vec<String>,
    open_files: OpenFileTable,
}

impl FileSystem {
    /// Format (or reopen, if `reuse`) a backing file at `path` as a
    /// filesystem with `inodes_number` inode slots across
    /// `disk_blocks * block_size` bytes.
    pub fn mkfs(path: &Path, block_size: u64, disk_blocks: u64, inodes_number: u64, reuse: bool) -> FsResult<FileSystem> {
        let device_size = block_size * disk_blocks;
        let mut device = StorageDevice::open(path, device_size, reuse)?;
        let layout = Layout::new(device_size, block_size, inodes_number)?;

        if !reuse {
            Bitmap::new(&layout).init(&mut device)?;
            let root = InodeRecord {
                id: 0,
                file_name: vec!["/".to_string()],
                file_type: FileType::Directory,
                links_cnt: FileType::Directory.default_links_cnt(),
                file_size: 0,
                data_blocks_map: vec![],
            };
            InodeTable::new(&layout).write(&mut device, &root)?;
            DirectoryStore::new(&layout).write(
                &mut device,
                0,
                &[(".".to_string(), 0), ("..".to_string(), 0)],
            )?;
        }

        log::debug!(
            "mkfs: {} inode(s), {} block(s) of {} byte(s), reuse={}",
            inodes_number,
            disk_blocks,
            block_size,
            reuse
        );
        Ok(FileSystem {
            device,
            layout,
            cwd: Vec::new(),
            open_files: OpenFileTable::new(),
        })
    }

    /// The current working directory as an absolute path string.
    pub fn cwd(&self) -> String {
        Self::join(&self.cwd)
    }

    fn join(components: &[String]) -> String {
        if components.is_empty() {
            "/".to_string()
        } else {
            "/".to_string() + &components.join("/")
        }
    }

    fn resolve(&self, path: &str, return_symlink_inode_id: bool) -> FsResult<u64> {
        PathResolver::new(&self.layout).resolve(&self.device, &self.cwd, path, return_symlink_inode_id)
    }

    /// Resolve `path`'s parent directory and final component name, without
    /// requiring the final component itself to exist.
    fn split_parent(&self, path: &str) -> FsResult<(u64, String)> {
        PathResolver::new(&self.layout).resolve_parent(&self.device, &self.cwd, path)
    }

    /// List the current directory's entries, one per line, as
    /// `"<inode_id> <name>"`.
    pub fn ls(&self) -> FsResult<String> {
        let cwd_id = self.resolve(".", false)?;
        let entries = DirectoryStore::new(&self.layout).read(&self.device, cwd_id)?;
        Ok(entries
            .into_iter()
            .map(|(name, id)| format!("{} {}", id, name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// A printable rendering of the inode `path` names. Resolves a
    /// trailing symlink to its own inode rather than following it.
    pub fn stat(&self, path: &str) -> FsResult<String> {
        let id = self.resolve(path, true)?;
        let record = InodeTable::new(&self.layout).read(&self.device, id)?;
        Ok(format!(
            "id: {}\nfile_name: {:?}\nfile_type: {}\nlinks_cnt: {}\nfile_size: {}\ndata_blocks_map: {:?}",
            record.id,
            record.file_name,
            record.file_type.as_char(),
            record.links_cnt,
            record.file_size,
            record.data_blocks_map
        ))
    }

    /// Create a new, empty regular file.
    pub fn create(&mut self, path: &str) -> FsResult<()> {
        let (parent_id, name) = self.split_parent(path)?;
        let inodes = InodeTable::new(&self.layout);
        let id = inodes.get_free(&self.device)?;
        let record = InodeRecord {
            id,
            file_name: vec![name.clone()],
            file_type: FileType::Regular,
            links_cnt: FileType::Regular.default_links_cnt(),
            file_size: 0,
            data_blocks_map: vec![],
        };
        DirectoryStore::new(&self.layout).insert(&mut self.device, parent_id, &name, id)?;
        inodes.write(&mut self.device, &record)?;
        Ok(())
    }

    /// Open `path` for reading and writing, returning a descriptor.
    pub fn open(&mut self, path: &str) -> FsResult<u64> {
        let id = self.resolve(path, false)?;
        FileEngine::new(&self.layout).open(&self.device, &mut self.open_files, id)
    }

    /// Close a descriptor.
    pub fn close(&mut self, fd: u64) -> FsResult<()> {
        self.open_files.close(fd)
    }

    /// Set a descriptor's seek cursor.
    pub fn seek(&mut self, fd: u64, pos: u64) -> FsResult<()> {
        self.open_files.seek(fd, pos)
    }

    /// Read up to `n` bytes from a descriptor's current cursor.
    pub fn read(&mut self, fd: u64, n: u64) -> FsResult<Vec<u8>> {
        self.open_files.read(fd, n)
    }

    /// Write up to `n` bytes of `data` at a descriptor's current cursor.
    pub fn write(&mut self, fd: u64, data: &[u8], n: u64) -> FsResult<()> {
        FileEngine::new(&self.layout).write(&mut self.device, &mut self.open_files, fd, data, n)
    }

    /// Add `link_path` as a new hard link to the file named by `src_path`.
    pub fn link(&mut self, src_path: &str, link_path: &str) -> FsResult<()> {
        let target_id = self.resolve(src_path, false)?;
        let (parent_id, name) = self.split_parent(link_path)?;
        LinkManager::new(&self.layout).link(&mut self.device, target_id, parent_id, &name)
    }

    /// Remove a name, garbage-collecting the inode once its link count
    /// and open descriptors both reach zero. Operates on the directory
    /// entry's own inode — a trailing symlink is unlinked itself, never
    /// dereferenced to the inode it points at.
    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        let (parent_id, name) = self.split_parent(path)?;
        let target_id = DirectoryStore::new(&self.layout)
            .lookup(&self.device, parent_id, &name)?
            .ok_or_else(|| FsError::FileDoesNotExist(name.clone()))?;
        LinkManager::new(&self.layout).unlink(&mut self.device, &self.open_files, parent_id, &name, target_id)
    }

    /// Create a symlink at `link_path` pointing at `target_path` joined
    /// against `cwd` (not collapsed — `.`/`..` in the stored target are
    /// resolved as directory entries when the link is followed, matching
    /// `_resolve_path` in the original).
    pub fn symlink(&mut self, target_path: &str, link_path: &str) -> FsResult<()> {
        let resolver = PathResolver::new(&self.layout);
        let canonical_target = Self::join(&resolver.split(&self.cwd, target_path));
        let (parent_id, name) = self.split_parent(link_path)?;
        LinkManager::new(&self.layout).symlink(&mut self.device, parent_id, &name, &canonical_target)?;
        Ok(())
    }

    /// Set a regular file's length to exactly `size` bytes.
    pub fn truncate(&mut self, path: &str, size: u64) -> FsResult<()> {
        let id = self.resolve(path, false)?;
        FileEngine::new(&self.layout).truncate(&mut self.device, id, size)
    }

    /// Create a new, empty directory.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::FileAlreadyExists("/".to_string()));
        }
        let resolver = PathResolver::new(&self.layout);
        let (parent_id, name) = resolver.resolve_parent(&self.device, &self.cwd, path)?;

        let inodes = InodeTable::new(&self.layout);
        let dirs = DirectoryStore::new(&self.layout);
        if dirs.lookup(&self.device, parent_id, &name)?.is_some() {
            return Err(FsError::FileAlreadyExists(name));
        }

        let id = inodes.get_free(&self.device)?;
        let record = InodeRecord {
            id,
            file_name: vec![name.clone()],
            file_type: FileType::Directory,
            links_cnt: FileType::Directory.default_links_cnt(),
            file_size: 0,
            data_blocks_map: vec![],
        };
        inodes.write(&mut self.device, &record)?;
        dirs.write(
            &mut self.device,
            id,
            &[(".".to_string(), id), ("..".to_string(), parent_id)],
        )?;
        dirs.insert(&mut self.device, parent_id, &name, id)?;

        let mut parent_record = inodes.read(&self.device, parent_id)?;
        parent_record.links_cnt += 1;
        inodes.write(&mut self.device, &parent_record)?;
        log::debug!("mkdir {} -> inode {} under parent {}", name, id, parent_id);
        Ok(())
    }

    /// Remove an empty, non-root directory.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::CannotRemoveDirectory(
                "root directory cannot be removed".to_string(),
            ));
        }
        let resolver = PathResolver::new(&self.layout);
        let (parent_id, name) = resolver.resolve_parent(&self.device, &self.cwd, path)?;

        let inodes = InodeTable::new(&self.layout);
        let dirs = DirectoryStore::new(&self.layout);
        let bitmap = Bitmap::new(&self.layout);

        let target_id = dirs
            .lookup(&self.device, parent_id, &name)?
            .ok_or_else(|| FsError::FileDoesNotExist(name.clone()))?;
        let target_record = inodes.read(&self.device, target_id)?;
        if target_record.file_type != FileType::Directory {
            return Err(FsError::InvalidPath(format!("{} is not a directory", name)));
        }
        let entries = dirs.read(&self.device, target_id)?;
        if entries.len() > 2 {
            return Err(FsError::CannotRemoveDirectory(
                "directory is not empty".to_string(),
            ));
        }

        if !target_record.data_blocks_map.is_empty() {
            bitmap.mark(&mut self.device, b'0', &target_record.data_blocks_map)?;
        }
        inodes.clear(&mut self.device, target_id)?;
        dirs.remove(&mut self.device, parent_id, &name)?;

        let mut parent_record = inodes.read(&self.device, parent_id)?;
        parent_record.links_cnt = parent_record.links_cnt.saturating_sub(1);
        inodes.write(&mut self.device, &parent_record)?;
        log::debug!("rmdir {} (inode {}) under parent {}", name, target_id, parent_id);
        Ok(())
    }

    /// Change the working directory. Pure string absolutization against
    /// `cwd`, with no existence or type check — a `cd` to a missing path
    /// or a non-directory silently succeeds, only surfacing an error on
    /// the next operation that actually walks the resulting `cwd`,
    /// matching `original_source/file_system.py`'s `cwd` setter.
    pub fn cd(&mut self, path: &str) -> FsResult<()> {
        let resolver = PathResolver::new(&self.layout);
        self.cwd = resolver.absolutize(&self.cwd, path);
        log::trace!("cwd is now {}", self.cwd());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        dir.push("target");
        dir.push("fs-tests");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join(format!("{}.img", name));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn mkfs_creates_an_empty_root() {
        let path = temp_path("mkfs_creates_an_empty_root");
        let fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        assert_eq!(fs.ls().unwrap(), "0 .\n0 ..");
        assert_eq!(fs.cwd(), "/");
    }

    #[test]
    fn mkdir_then_ls_then_stat() {
        let path = temp_path("mkdir_then_ls_then_stat");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.mkdir("/a").unwrap();
        assert_eq!(fs.ls().unwrap(), "0 .\n0 ..\n1 a");
        let stat = fs.stat("/a").unwrap();
        assert!(stat.contains("links_cnt: 2"));
        assert!(stat.contains("file_type: d"));
    }

    #[test]
    fn create_open_write_seek_read_round_trips() {
        let path = temp_path("create_open_write_seek_read_round_trips");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.create("/f").unwrap();
        let fd = fs.open("/f").unwrap();
        fs.write(fd, b"hello", 5).unwrap();
        fs.seek(fd, 0).unwrap();
        assert_eq!(fs.read(fd, 5).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn link_and_unlink_track_link_count() {
        let path = temp_path("link_and_unlink_track_link_count");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.create("/f").unwrap();
        fs.link("/f", "/g").unwrap();
        assert!(fs.stat("/g").unwrap().contains("links_cnt: 2"));
        fs.unlink("/f").unwrap();
        assert!(fs.stat("/g").unwrap().contains("links_cnt: 1"));
    }

    #[test]
    fn symlink_cd_and_terminal_stat() {
        let path = temp_path("symlink_cd_and_terminal_stat");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.mkdir("/a").unwrap();
        fs.symlink("/a", "/s").unwrap();
        fs.cd("/s").unwrap();
        assert_eq!(fs.ls().unwrap(), "1 .\n0 ..");
        assert!(fs.stat("/s").unwrap().contains("file_type: l"));
    }

    #[test]
    fn rmdir_refuses_nonempty_and_root() {
        let path = temp_path("rmdir_refuses_nonempty_and_root");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.mkdir("/a").unwrap();
        fs.create("/a/f").unwrap();
        assert!(fs.rmdir("/a").is_err());
        assert!(fs.rmdir("/").is_err());
    }

    #[test]
    fn unlinking_a_symlink_name_removes_the_symlink_not_its_target() {
        let path = temp_path("unlinking_a_symlink_name_removes_the_symlink_not_its_target");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.create("/f").unwrap();
        fs.symlink("/f", "/s").unwrap();

        fs.unlink("/s").unwrap();

        // The symlink name is gone, but the file it pointed at is untouched.
        assert!(fs.stat("/s").is_err());
        assert!(fs.stat("/f").unwrap().contains("links_cnt: 1"));
        let fd = fs.open("/f").unwrap();
        assert_eq!(fs.read(fd, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn cd_to_a_missing_path_succeeds_but_later_walk_fails() {
        let path = temp_path("cd_to_a_missing_path_succeeds_but_later_walk_fails");
        let mut fs = FileSystem::mkfs(&path, 4096, 50, 20, false).unwrap();
        fs.cd("/does-not-exist").unwrap();
        assert_eq!(fs.cwd(), "/does-not-exist");
        assert!(fs.ls().is_err());
    }
}
