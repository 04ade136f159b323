//! The error type used by the device layer.
//!
//! Mirrors the shape of the teacher's `cplfs_api::error_given::APIError`:
//! a single flat enum, `#[from]`-wrapping the lower-level errors it can
//! surface, so that callers in `fsengine` can use `?` freely.

use std::io;
use thiserror::Error;

/// Errors produced by the backing store and the codec.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// I/O failure opening, sizing or mapping the backing file.
    #[error("I/O error in the device layer")]
    Io(#[from] io::Error),

    /// Failure encoding or decoding a value through the codec.
    #[error("codec error in the device layer")]
    Codec(#[from] bincode::Error),

    /// A byte range fell outside the backing store, or an existing file's
    /// length did not match the size requested for it.
    #[error("invalid size or out-of-range access: {0}")]
    InvalidSize(&'static str),

    /// An encoded value did not fit in the fixed-size slot it was written
    /// into (e.g. an inode record larger than `INODE_SIZE`).
    #[error("encoded value of {0} bytes does not fit in a slot of {1} bytes")]
    ValueTooLarge(u64, u64),
}

/// Shorthand for a `Result` with this crate's error type.
pub type Result<T> = std::result::Result<T, DeviceError>;
