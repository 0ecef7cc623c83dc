//! A pass-through hasher for integer keys.

use std::hash::{BuildHasherDefault, Hasher};

/// Hashes a single integer to itself.
///
/// Page IDs are handed out sequentially, so their low bits are already evenly
/// spread; the extendible hash table addresses its directory with exactly
/// those bits. Composite keys and byte strings are folded polynomially so they
/// still hash deterministically.
///
/// # Example
/// ```
/// use std::hash::BuildHasher;
/// use pagepool::hash::BuildIdentityHasher;
///
/// let build = BuildIdentityHasher::default();
/// assert_eq!(build.hash_one(42u32), 42);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityHasher {
    hash: u64,
}

impl IdentityHasher {
    #[inline]
    fn mix(&mut self, n: u64) {
        self.hash = self.hash.wrapping_mul(31).wrapping_add(n);
    }
}

impl Hasher for IdentityHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.mix(u64::from(b));
        }
    }

    #[inline]
    fn write_u8(&mut self, n: u8) {
        self.mix(u64::from(n));
    }

    #[inline]
    fn write_u16(&mut self, n: u16) {
        self.mix(u64::from(n));
    }

    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.mix(u64::from(n));
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.mix(n);
    }

    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.mix(n as u64);
    }
}

/// `BuildHasher` for [`IdentityHasher`].
pub type BuildIdentityHasher = BuildHasherDefault<IdentityHasher>;
