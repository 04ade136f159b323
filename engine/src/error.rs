//! The filesystem's error taxonomy.
//!
//! One flat enum, the way the teacher chains `BlockLayerError` ->
//! `InodeLayerError` -> `DirLayerError`, except collapsed to a single level
//! since the engine here is not layered into separate student-assignment
//! crates. Every REPL-visible error corresponds 1:1 with a variant name, so
//! the REPL can print `err.name()` the way `original_source/terminal.py`
//! prints `e.__class__.__name__`.

use fsdevice::DeviceError;
use thiserror::Error;

/// Every way a filesystem operation can fail.
#[derive(Error, Debug)]
pub enum FsError {
    /// The inode table has no free slot left.
    #[error("out of inodes")]
    OutOfInodes,

    /// The bitmap has fewer free blocks than requested.
    #[error("out of blocks")]
    OutOfBlocks,

    /// A path failed to resolve: too deep a symlink chain, or otherwise
    /// structurally invalid.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A path component does not exist.
    #[error("file does not exist: {0}")]
    FileDoesNotExist(String),

    /// A name is already present where a new entry was about to be
    /// created.
    #[error("file already exists: {0}")]
    FileAlreadyExists(String),

    /// A declared size did not match reality, or an encoded value did not
    /// fit in its slot.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// `rmdir` was asked to remove a non-empty directory, or the root.
    #[error("cannot remove directory: {0}")]
    CannotRemoveDirectory(String),

    /// A symlink target's encoded payload does not fit in one block.
    #[error("symlink target too long for one block")]
    TooLongSymlink,

    /// The open-file table is at capacity.
    #[error("too many files opened")]
    TooManyFilesOpened,

    /// A file descriptor does not name an open file.
    #[error("wrong file descriptor number: {0}")]
    WrongFileDescriptorNumber(u64),

    /// `link` or `unlink` was asked to operate on a directory.
    #[error("cannot hard-link or unlink a directory: {0}")]
    DirectoryLinkException(String),

    /// `unlink` was asked to remove the last name of a file that is
    /// currently open.
    #[error("cannot unlink a file that is currently open: {0}")]
    CannotUnlinkOpenFile(String),

    /// The REPL received input it could not parse as any known command.
    #[error("invalid input")]
    InvalidInput,

    /// An error from the device layer (I/O, codec, out-of-range access).
    #[error("device error")]
    Device(#[from] DeviceError),
}

impl FsError {
    /// The bare variant name, e.g. `"FileDoesNotExist"` — used by the REPL
    /// to reproduce `original_source/terminal.py`'s
    /// `print(e.__class__.__name__)` behavior.
    pub fn name(&self) -> &'static str {
        match self {
            FsError::OutOfInodes => "OutOfInodes",
            FsError::OutOfBlocks => "OutOfBlocks",
            FsError::InvalidPath(_) => "InvalidPath",
            FsError::FileDoesNotExist(_) => "FileDoesNotExist",
            FsError::FileAlreadyExists(_) => "FileAlreadyExists",
            FsError::InvalidSize(_) => "InvalidSize",
            FsError::CannotRemoveDirectory(_) => "CannotRemoveDirectory",
            FsError::TooLongSymlink => "TooLongSymlink",
            FsError::TooManyFilesOpened => "TooManyFilesOpened",
            FsError::WrongFileDescriptorNumber(_) => "WrongFileDescriptorNumber",
            FsError::DirectoryLinkException(_) => "DirectoryLinkException",
            FsError::CannotUnlinkOpenFile(_) => "CannotUnlinkOpenFile",
            FsError::InvalidInput => "InvalidInput",
            FsError::Device(_) => "DeviceError",
        }
    }
}

/// Shorthand for a `Result` with this crate's error type.
pub type FsResult<T> = std::result::Result<T, FsError>;
