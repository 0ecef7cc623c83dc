//! Configuration constants and buffer pool settings.

use crate::buffer::replacer::ReplacerKind;
use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 = 4,294,967,296 pages
/// - Max database size: 4,294,967,296 × 4KB = 16TB
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Maximum theoretical database size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Default number of records per page-table bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 50;

/// Default number of frames in a buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Settings for a [`BufferPoolManager`](crate::buffer::BufferPoolManager).
///
/// # Example
/// ```
/// use pagepool::common::config::BufferPoolConfig;
/// use pagepool::buffer::replacer::ReplacerKind;
///
/// let config = BufferPoolConfig::new(16)
///     .bucket_size(4)
///     .replacer(ReplacerKind::Fifo);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames allocated at startup.
    pub pool_size: usize,

    /// Capacity of each bucket in the page table.
    ///
    /// Page IDs hash to themselves and the directory never shrinks. More than
    /// `bucket_size` resident pages whose IDs share their low `d` bits force
    /// a directory of at least `2^(d+1)` slots, so keep this at least the pool
    /// size when resident IDs are sparse multiples of a large power of two.
    pub bucket_size: usize,

    /// Eviction policy.
    pub replacer: ReplacerKind,
}

impl BufferPoolConfig {
    /// Default settings with the given pool size.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    /// Set the page-table bucket capacity.
    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Set the eviction policy.
    pub fn replacer(mut self, replacer: ReplacerKind) -> Self {
        self.replacer = replacer;
        self
    }

    /// Check that every setting is usable.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the pool or bucket size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig("pool_size must be > 0".into()));
        }
        if self.bucket_size == 0 {
            return Err(Error::InvalidConfig("bucket_size must be > 0".into()));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            bucket_size: DEFAULT_BUCKET_SIZE,
            replacer: ReplacerKind::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_max_db_size() {
        // 16TB = 16 * 1024^4 bytes
        let expected = 16 * 1024u64 * 1024 * 1024 * 1024;
        assert_eq!(MAX_DB_SIZE_BYTES, expected);
    }

    #[test]
    fn test_config_defaults() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.bucket_size, DEFAULT_BUCKET_SIZE);
        assert_eq!(config.replacer, ReplacerKind::Lru);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BufferPoolConfig::new(8).bucket_size(2).replacer(ReplacerKind::Fifo);
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.bucket_size, 2);
        assert_eq!(config.replacer, ReplacerKind::Fifo);
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        assert!(matches!(
            BufferPoolConfig::new(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BufferPoolConfig::new(4).bucket_size(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
