use crate::builder::MphError;
use crate::hash::{RandomizedHasher, first_level_hash, second_level_hash};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Everything needed to rebuild a [`MinimalPerfectHasher`] besides its hasher.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTable {
    pub bucket_count: usize,
    pub key_count: usize,
    pub seeds: Vec<u32>, // len == bucket_count
}

/// Minimal perfect hash function produced by [`crate::Builder::build`].
///
/// Maps each key it was built from to a distinct slot in `[0, size())`. Any other
/// key still maps to some slot in range: this is not a membership test, callers
/// must keep their own payload per slot and compare after lookup.
pub struct MinimalPerfectHasher<K, H> {
    hasher: H,
    bucket_count: usize,
    n: usize,
    seeds: Box<[u32]>,
    _key: PhantomData<fn(&K)>,
}

impl<K, H> MinimalPerfectHasher<K, H> {
    pub(crate) fn new(hasher: H, bucket_count: usize, n: usize, seeds: Box<[u32]>) -> Self {
        debug_assert_eq!(seeds.len(), bucket_count);
        Self {
            hasher,
            bucket_count,
            n,
            seeds,
            _key: PhantomData,
        }
    }

    /// O(1) lookup, the same two-level formula the builder resolved seeds for.
    ///
    /// # Panics
    /// If the function was built from an empty key set.
    #[inline]
    pub fn lookup<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
        H: RandomizedHasher<Q>,
    {
        assert!(self.n > 0, "lookup on a minimal perfect hash built from no keys");
        let p = first_level_hash(key, self.bucket_count);
        second_level_hash(&self.hasher, key, self.n, self.seeds[p])
    }

    /// Looks up every key of `keys`, in parallel with the `parallel` feature.
    pub fn lookup_all<Q>(&self, keys: &[Q]) -> Vec<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Sync,
        H: RandomizedHasher<Q> + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            keys.par_iter().map(|k| self.lookup(k)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            keys.iter().map(|k| self.lookup(k)).collect()
        }
    }

    /// Number of keys the function was built from; every lookup is below it.
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Per-bucket seeds, indexed by first-level bucket.
    #[inline]
    pub fn seeds(&self) -> &[u32] {
        &self.seeds
    }

    #[inline]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn into_parts(self) -> (SeedTable, H) {
        let table = SeedTable {
            bucket_count: self.bucket_count,
            key_count: self.n,
            seeds: self.seeds.into_vec(),
        };
        (table, self.hasher)
    }

    /// Reassembles a function from a stored seed table.
    ///
    /// `hasher` must be the one the table was built with; nothing can verify that.
    pub fn from_parts(table: SeedTable, hasher: H) -> Result<Self, MphError> {
        if table.bucket_count == 0 {
            return Err(MphError::NoBuckets);
        }
        if table.seeds.len() != table.bucket_count {
            return Err(MphError::SeedTableMismatch {
                expected: table.bucket_count,
                actual: table.seeds.len(),
            });
        }
        Ok(Self::new(
            hasher,
            table.bucket_count,
            table.key_count,
            table.seeds.into_boxed_slice(),
        ))
    }

    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, MphError> {
        // Field order matches `SeedTable`, so `from_bytes` can decode it as one.
        Ok(bincode::serialize(&(self.bucket_count, self.n, &self.seeds[..]))?)
    }

    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8], hasher: H) -> Result<Self, MphError> {
        let table: SeedTable = bincode::deserialize(bytes)?;
        Self::from_parts(table, hasher)
    }
}

impl<K, H> fmt::Debug for MinimalPerfectHasher<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinimalPerfectHasher")
            .field("bucket_count", &self.bucket_count)
            .field("n", &self.n)
            .field("seeds", &self.seeds.len())
            .finish_non_exhaustive()
    }
}

impl<K, H> fmt::Display for MinimalPerfectHasher<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "minimal perfect hash function for {} keys", self.n)
    }
}
