//! hash_displace — minimal perfect hashing by hash and displace (no compress step).
//!
//! - Add a known set of keys to a [`Builder`], each landing in a first-level bucket.
//! - [`Builder::build`] searches, largest bucket first, the smallest seed that moves
//!   each bucket's keys onto free slots of `[0..n)`.
//! - O(1) lookups on the resulting [`MinimalPerfectHasher`]; keys outside the
//!   build set get an arbitrary in-range slot, so keep your own payload to verify.

mod builder;
mod hash;
mod mphf;
mod util;

pub use builder::{BuildConfig, Builder, MphError};
pub use hash::{AHasher, FoldingHasher, RandomizedHasher, WyHasher, Xxh3Hasher};
pub use mphf::{MinimalPerfectHasher, SeedTable};
