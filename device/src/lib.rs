//! The device layer: the external collaborators of the filesystem engine.
//!
//! This crate plays the role the teacher repository gives to `cplfs_api`:
//! a small, independently-documented layer that the engine crate depends on
//! but never has to reimplement. It provides two things:
//!
//! - [`device::StorageDevice`], a byte-addressed block driver over a
//!   memory-mapped backing file (`read`/`write`/`clear`).
//! - [`codec`], a self-describing value codec used to encode directory
//!   maps, bitmap strings, inode records, and file/symlink payloads into
//!   fixed-size, zero-padded slots.
#![deny(missing_docs)]

pub mod codec;
pub mod device;
pub mod error;

pub use codec::{FileType, InodeRecord, Value};
pub use device::StorageDevice;
pub use error::{DeviceError, Result};
