//! # Core Error Types
//!
//! Only recoverable conditions live here. Handle misuse and pause-counter
//! abuse are programming errors and are asserted instead.

use thiserror::Error;

/// Errors returned by the arena allocator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The arena cannot grow far enough to satisfy the request.
    #[error("arena exhausted: requested {requested} bytes, {used} of {max} bytes in use")]
    OutOfMemory {
        /// Bytes the failed request needed (rounded to its size class).
        requested: usize,
        /// Bytes currently reserved by the bump region.
        used: usize,
        /// Configured hard limit.
        max: usize,
    },

    /// The request is larger than the biggest size class.
    #[error("allocation of {requested} bytes exceeds the largest cell ({max} bytes)")]
    TooLarge {
        /// Requested size in bytes.
        requested: usize,
        /// Largest cell the arena hands out.
        max: usize,
    },

    /// A container or table index no longer fits in 32 bits.
    #[error("index overflow: {0} elements")]
    IndexOverflow(usize),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parsed but are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while restoring a snapshot against the live registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A table in the snapshot names a type the live registry does not know.
    #[error("snapshot references unknown type `{0}`")]
    UnknownType(String),

    /// A delegate in the snapshot is missing from the live registry.
    #[error("snapshot references unknown delegate `{0}`")]
    UnknownDelegate(String),

    /// The saved layout does not match the live type.
    #[error("layout mismatch for `{name}`: saved {saved} bytes, live {live} bytes")]
    LayoutMismatch {
        /// Stable name of the type.
        name: String,
        /// Size recorded in the snapshot.
        saved: usize,
        /// Size of the live type.
        live: usize,
    },

    /// The arena image is internally inconsistent.
    #[error("corrupt arena image: {0}")]
    CorruptImage(String),
}

/// Result alias for allocation-backed operations.
pub type CoreResult<T> = Result<T, AllocError>;
