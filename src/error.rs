//! Construction-time errors.

use std::error::Error;
use std::fmt;

/// Rejected [`RangeLock`](crate::RangeLock) configuration.
///
/// Returned by [`RangeLock::with_region_size`](crate::RangeLock::with_region_size)
/// when the requested region size cannot be used. No instance is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Region size of zero. Regions must hold at least one byte.
    ZeroRegionSize,

    /// Region size that is not a power of two. Region-id arithmetic relies
    /// on power-of-two alignment.
    NotPowerOfTwo(u64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRegionSize => write!(f, "region size must be non-zero"),

            Self::NotPowerOfTwo(size) => {
                write!(f, "region size {size} is not a power of two")
            }
        }
    }
}

impl Error for ConfigError {}
