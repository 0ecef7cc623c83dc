//! Hash containers.
//!
//! - [`ExtendibleHashTable`] - Concurrent extendible-hash map, used as the
//!   buffer pool's page table
//! - [`IdentityHasher`] - Pass-through hasher for integer keys

mod extendible_hash_table;
mod identity_hasher;

pub use extendible_hash_table::ExtendibleHashTable;
pub use identity_hasher::{BuildIdentityHasher, IdentityHasher};
