//! Path resolution: turning a POSIX-style path string into an inode id,
//! descending one directory entry at a time from the root.
//!
//! Grounded in `original_source/file_system.py::_get_file_inode_id`, which
//! walks `pathlib.PurePosixPath.parents` — a purely textual join against
//! `cwd` that never collapses `.`/`..` ahead of time. `.` and `..` are
//! looked up as ordinary directory entries at each step (every directory
//! always has both, per spec §3's invariant 3), so a missing intermediate
//! component is caught even when a later `..` would otherwise cancel it
//! out textually, and a symlink-aware `..` resolves against the directory
//! actually reached rather than the path string. Only `cd` needs a
//! collapsed path string (to store as the new `cwd`); see [`absolutize`].
//!
//! Symlinks are transparent by default: encountering one mid-path (or as
//! the final component, unless `return_symlink_inode_id` is set and the
//! final component's name matches the symlink's own recorded name) swaps in
//! the inode the link's target path resolves to, always starting the
//! lookup back at the root — the original never threads a working
//! directory through this function, so neither do we; callers resolve
//! relative paths against `cwd` before symlink indirection ever begins.
//!
//! The original has no bound on symlink chain length and will recurse
//! until the interpreter's stack gives out on a cyclic chain. A fixed
//! depth limit is added here (see `MAX_SYMLINK_DEPTH`) so a cycle fails
//! cleanly with [`FsError::InvalidPath`] instead of overflowing the stack.

use fsdevice::codec::{FileType, Value};
use fsdevice::device::StorageDevice;

use crate::directory::DirectoryStore;
use crate::error::{FsError, FsResult};
use crate::inode::InodeTable;
use crate::layout::Layout;

/// Inode id of the filesystem root, always allocated at slot 0 by `mkfs`.
pub const ROOT_INODE: u64 = 0;

/// Upper bound on symlink indirection depth for one resolution. Not
/// present in the original; a real filesystem needs one or a symlink
/// cycle hangs resolution forever.
const MAX_SYMLINK_DEPTH: u32 = 40;

/// Resolves path strings against the directory tree.
pub struct PathResolver<'a> {
    layout: &'a Layout,
    inodes: InodeTable<'a>,
    dirs: DirectoryStore<'a>,
}

impl<'a> PathResolver<'a> {
    /// Wrap a layout for path resolution.
    pub fn new(layout: &'a Layout) -> PathResolver<'a> {
        PathResolver {
            layout,
            inodes: InodeTable::new(layout),
            dirs: DirectoryStore::new(layout),
        }
    }

    /// Split `path` into literal components, joining it against `cwd`
    /// first if it is not itself absolute. Unlike [`absolutize`], `.` and
    /// `..` are kept as-is rather than collapsed: [`walk`] resolves them
    /// as ordinary directory entries, the way `_get_file_inode_id` walks
    /// `PurePosixPath.parents` in the original. Empty components from a
    /// repeated `/` are dropped.
    ///
    /// [`absolutize`]: PathResolver::absolutize
    /// [`walk`]: PathResolver::walk
    pub(crate) fn split(&self, cwd: &[String], path: &str) -> Vec<String> {
        let mut components: Vec<String> = if path.starts_with('/') {
            Vec::new()
        } else {
            cwd.to_vec()
        };
        for part in path.split('/') {
            if !part.is_empty() {
                components.push(part.to_string());
            }
        }
        components
    }

    /// Split `path` into normalized components, joining it against `cwd`
    /// first if it is not itself absolute. `.` components are dropped,
    /// `..` pops the previous component (clamped at the root). Used only
    /// to compute the new `cwd` string on `cd` (spec §4.5); ordinary path
    /// resolution uses [`split`](PathResolver::split) plus directory-entry
    /// lookups instead, so that a missing component or a symlink-relative
    /// `..` is caught instead of being textually cancelled out.
    pub fn absolutize(&self, cwd: &[String], path: &str) -> Vec<String> {
        let mut components: Vec<String> = if path.starts_with('/') {
            Vec::new()
        } else {
            cwd.to_vec()
        };
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    components.pop();
                }
                other => components.push(other.to_string()),
            }
        }
        components
    }

    /// Resolve `path` (relative to `cwd` if not absolute) to an inode id.
    /// If `return_symlink_inode_id` is set, a symlink named as the path's
    /// final component is returned un-dereferenced rather than followed
    /// (used by `stat`); symlinks encountered mid-path are always
    /// followed. `.` and `..` components are resolved as ordinary
    /// directory entries, not collapsed ahead of time.
    pub fn resolve(
        &self,
        device: &StorageDevice,
        cwd: &[String],
        path: &str,
        return_symlink_inode_id: bool,
    ) -> FsResult<u64> {
        let components = self.split(cwd, path);
        self.walk(device, &components, return_symlink_inode_id, 0)
    }

    /// Resolve `path`'s parent directory and final literal component name,
    /// without requiring the final component itself to exist. The parent
    /// prefix is walked the same way [`resolve`](PathResolver::resolve)
    /// walks a full path, so a `..` in `path` resolves against the
    /// directories actually reached rather than being cancelled out
    /// textually.
    pub fn resolve_parent(
        &self,
        device: &StorageDevice,
        cwd: &[String],
        path: &str,
    ) -> FsResult<(u64, String)> {
        let mut components = self.split(cwd, path);
        let name = components
            .pop()
            .ok_or_else(|| FsError::InvalidPath("path has no final component".to_string()))?;
        let parent_id = self.walk(device, &components, false, 0)?;
        Ok((parent_id, name))
    }

    fn walk(
        &self,
        device: &StorageDevice,
        components: &[String],
        return_symlink_inode_id: bool,
        depth: u32,
    ) -> FsResult<u64> {
        let mut current = ROOT_INODE;
        for (i, name) in components.iter().enumerate() {
            let is_last = i == components.len() - 1;
            let found = self
                .dirs
                .lookup(device, current, name)?
                .ok_or_else(|| FsError::FileDoesNotExist(name.clone()))?;

            let record = self.inodes.read(device, found)?;
            if record.file_type == FileType::Symlink {
                let terminal_request = is_last
                    && return_symlink_inode_id
                    && record.file_name.first().map(String::as_str) == Some(name.as_str());
                if terminal_request {
                    current = found;
                    continue;
                }
                current = self.dereference(device, &record, depth)?;
                continue;
            }

            if !is_last && record.file_type != FileType::Directory {
                return Err(FsError::InvalidPath(format!(
                    "{} is not a directory",
                    name
                )));
            }
            current = found;
        }
        Ok(current)
    }

    fn dereference(
        &self,
        device: &StorageDevice,
        symlink: &fsdevice::codec::InodeRecord,
        depth: u32,
    ) -> FsResult<u64> {
        if depth >= MAX_SYMLINK_DEPTH {
            return Err(FsError::InvalidPath(
                "too many levels of symbolic links".to_string(),
            ));
        }
        let target = self.read_symlink_target(device, symlink)?;
        let components = self.split(&[], &target);
        self.walk(device, &components, false, depth + 1)
    }

    /// Read the literal target path string a symlink inode holds. A
    /// symlink's payload is always one block (see
    /// [`crate::link::LinkManager::symlink`]'s `TooLongSymlink` check).
    fn read_symlink_target(
        &self,
        device: &StorageDevice,
        symlink: &fsdevice::codec::InodeRecord,
    ) -> FsResult<String> {
        let block = symlink
            .data_blocks_map
            .first()
            .ok_or_else(|| FsError::InvalidSize("symlink has no target block".to_string()))?;
        let raw = device.read(
            self.layout.data_block_offset(*block),
            self.layout.block_size,
        )?;
        match fsdevice::codec::decode_slot(&raw)? {
            Value::Str(s) => Ok(s),
            other => Err(FsError::InvalidSize(format!(
                "symlink payload decoded to an unexpected value: {:?}",
                other
            ))),
        }
    }
}
