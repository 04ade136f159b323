//! A small Unix-style filesystem that lives entirely inside one backing
//! file: inode/block allocation, a directory entry protocol, symlink-aware
//! path resolution, and descriptor-based file I/O, all routed through a
//! byte-addressable block driver (`fsdevice`).
//!
//! [`fs::FileSystem`] is the entry point. Everything else in this crate is
//! a layer it composes: [`layout`] derives the fixed on-disk regions,
//! [`bitmap`] and [`inode`] allocate blocks and inode slots,
//! [`directory`] reads and writes directory payloads, [`path`] resolves
//! path strings to inode ids, [`file`] drives descriptor-based I/O, and
//! [`link`] implements hard links, unlinking, and symlink creation.

#![deny(missing_docs)]

pub mod bitmap;
pub mod directory;
pub mod error;
pub mod file;
pub mod fs;
pub mod inode;
pub mod layout;
pub mod link;
pub mod path;

pub use error::{FsError, FsResult};
pub use fs::FileSystem;
