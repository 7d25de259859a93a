use crate::hash::{RandomizedHasher, first_level_hash, second_level_hash};
use crate::mphf::MinimalPerfectHasher;
use crate::util::BitSet;
use hashbrown::HashSet;
use std::hash::Hash;
use thiserror::Error;

/// Build parameters.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Rejected seed attempts tolerated across the whole build, all buckets together.
    pub max_failures: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_failures: 100_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum MphError {
    #[error(
        "can't build minimal perfect hash function after {failures} rejected seeds \
         (stuck on bucket {bucket}); try increasing the number of initial buckets"
    )]
    Unresolvable { failures: u32, bucket: usize },
    #[error("seed table declares no buckets")]
    NoBuckets,
    #[error("seed table holds {actual} seeds but {expected} buckets were declared")]
    SeedTableMismatch { expected: usize, actual: usize },
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serde(#[from] Box<bincode::ErrorKind>),
}

/// Keys sharing one first-level hash value.
#[derive(Debug)]
struct Bucket<K> {
    idx: usize,
    keys: HashSet<K>,
}

/// Mutable state of one `build` call, shared by all bucket searches.
struct BuildContext {
    claimed: BitSet,
    failures: u32,
    max_failures: u32,
    // Reused between attempts, always cleared first.
    positions: Vec<usize>,
}

impl BuildContext {
    fn new(n: usize, cfg: &BuildConfig) -> Self {
        Self {
            claimed: BitSet::new(n),
            failures: 0,
            max_failures: cfg.max_failures,
            positions: Vec::new(),
        }
    }

    /// Finds the smallest positive seed placing every key of `bucket` on a distinct
    /// unclaimed slot, then claims those slots.
    ///
    /// A seed either places the whole bucket or is discarded; nothing from a
    /// rejected attempt reaches `claimed`.
    fn place<K, H>(&mut self, bucket: &Bucket<K>, hasher: &H) -> Result<u32, MphError>
    where
        H: RandomizedHasher<K>,
    {
        let n = self.claimed.len();
        let mut seed = 0u32;
        loop {
            seed += 1;
            if self.try_seed(bucket, hasher, n, seed) {
                break;
            }
            self.failures += 1;
            if self.failures >= self.max_failures {
                tracing::warn!(
                    "giving up on bucket {} of size {} after {} rejected seeds",
                    bucket.idx,
                    bucket.keys.len(),
                    self.failures
                );
                return Err(MphError::Unresolvable {
                    failures: self.failures,
                    bucket: bucket.idx,
                });
            }
        }

        for &p in &self.positions {
            self.claimed.set(p);
        }
        Ok(seed)
    }

    /// Leaves the slots of an accepted seed in `positions`.
    fn try_seed<K, H>(&mut self, bucket: &Bucket<K>, hasher: &H, n: usize, seed: u32) -> bool
    where
        H: RandomizedHasher<K>,
    {
        self.positions.clear();
        for key in &bucket.keys {
            let p = second_level_hash(hasher, key, n, seed);
            if self.claimed.test(p) {
                return false;
            }
            self.positions.push(p);
        }
        // Collisions inside the bucket.
        self.positions.sort_unstable();
        !self.positions.windows(2).any(|w| w[0] == w[1])
    }
}

/// Collects keys, then searches per-bucket seeds (hash and displace, no compress step).
///
/// `bucket_count` is conventionally about half the expected number of distinct
/// keys; fewer buckets means larger ones and a higher chance of exhausting the
/// retry ceiling.
pub struct Builder<K, H> {
    cfg: BuildConfig,
    hasher: H,
    buckets: Vec<Bucket<K>>,
    size: usize,
}

impl<K, H> Builder<K, H>
where
    K: Hash + Eq,
    H: RandomizedHasher<K>,
{
    /// # Panics
    /// If `bucket_count` is zero.
    pub fn new(bucket_count: usize, hasher: H) -> Self {
        assert!(bucket_count > 0, "bucket count must be positive");
        let buckets = (0..bucket_count)
            .map(|idx| Bucket {
                idx,
                keys: HashSet::new(),
            })
            .collect();
        Self {
            cfg: BuildConfig::default(),
            hasher,
            buckets,
            size: 0,
        }
    }

    pub fn with_config(mut self, cfg: BuildConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Adds `key`, returning `false` if it was already present.
    pub fn add(&mut self, key: K) -> bool {
        let b = first_level_hash(&key, self.buckets.len());
        let inserted = self.buckets[b].keys.insert(key);
        if inserted {
            self.size += 1;
        }
        inserted
    }

    /// Number of distinct keys added so far.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Runs the displacement search and returns the immutable hash function.
    ///
    /// The whole build shares one budget of [`BuildConfig::max_failures`] rejected
    /// seeds; exhausting it yields [`MphError::Unresolvable`] and no artifact.
    pub fn build(self) -> Result<MinimalPerfectHasher<K, H>, MphError> {
        let Self {
            cfg,
            hasher,
            mut buckets,
            size: n,
        } = self;
        let bucket_count = buckets.len();
        tracing::debug!("building minimal perfect hash: {} keys in {} buckets", n, bucket_count);

        // Largest first; the stable sort keeps index order among equal sizes.
        buckets.sort_by_key(|b| std::cmp::Reverse(b.keys.len()));

        let mut ctx = BuildContext::new(n, &cfg);
        let mut seeds = vec![0u32; bucket_count];
        for bucket in &buckets {
            if bucket.keys.is_empty() {
                // Sorted by size, so only empty buckets remain; they keep seed 0.
                break;
            }
            let seed = ctx.place(bucket, &hasher)?;
            tracing::trace!("bucket {} ({} keys) resolved with seed {}", bucket.idx, bucket.keys.len(), seed);
            seeds[bucket.idx] = seed;
        }
        debug_assert_eq!(ctx.claimed.count_ones(), n);

        tracing::debug!(
            "built minimal perfect hash for {} keys: {} rejected seeds, largest seed {}",
            n,
            ctx.failures,
            seeds.iter().copied().max().unwrap_or(0)
        );
        Ok(MinimalPerfectHasher::new(hasher, bucket_count, n, seeds.into_boxed_slice()))
    }
}

impl<K, H> Extend<K> for Builder<K, H>
where
    K: Hash + Eq,
    H: RandomizedHasher<K>,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.add(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Xxh3Hasher;

    #[test]
    fn add_deduplicates() {
        let mut b = Builder::new(4, Xxh3Hasher);
        assert!(b.is_empty());
        assert!(b.add("alpha"));
        assert!(!b.add("alpha"));
        assert!(b.add("bravo"));
        assert_eq!(b.len(), 2);
        assert_eq!(b.bucket_count(), 4);
    }

    #[test]
    fn extend_counts_distinct_keys() {
        let mut b = Builder::new(3, Xxh3Hasher);
        b.extend(["x", "y", "x", "z", "y"]);
        assert_eq!(b.len(), 3);
    }

    #[test]
    #[should_panic(expected = "bucket count must be positive")]
    fn zero_buckets_is_rejected() {
        let _ = Builder::<u32, _>::new(0, Xxh3Hasher);
    }

    #[test]
    fn failure_budget_is_shared_across_buckets() {
        let (mut zero, mut one) = (Vec::new(), Vec::new());
        for k in 0u32.. {
            if first_level_hash(&k, 2) == 0 {
                zero.push(k);
            } else {
                one.push(k);
            }
            if zero.len() >= 2 && !one.is_empty() {
                break;
            }
        }
        let (x1, x2, y) = (zero[0], zero[1], one[0]);

        // Bucket 0 collides on seeds 1..=3 and fits on seed 4; bucket 1 always
        // hits the slot bucket 0 claimed.
        let hasher = move |k: &u32, seed: u32| -> u64 { if *k == x2 && seed >= 4 { 2 } else { 0 } };
        let mut b = Builder::new(2, hasher).with_config(BuildConfig { max_failures: 10 });
        b.extend([x1, x2, y]);
        match b.build() {
            Err(MphError::Unresolvable { failures, bucket }) => {
                assert_eq!(failures, 10);
                assert_eq!(bucket, 1);
            }
            other => panic!("expected Unresolvable, got {other:?}"),
        }
    }

    #[test]
    fn constant_hasher_fails_after_the_ceiling() {
        let constant = |_: &u32, _: u32| 0u64;
        let mut b = Builder::new(8, constant).with_config(BuildConfig { max_failures: 25 });
        b.extend(0..32u32);
        assert!(matches!(
            b.build(),
            Err(MphError::Unresolvable { failures: 25, .. })
        ));
    }

    #[test]
    fn seeds_are_smallest_positive() {
        // Seed-blind identity: the first seed tried never collides.
        let ident = |k: &u64, _: u32| *k << 1;
        let mut b = Builder::new(2, ident);
        b.extend(0..6u64);
        let mph = b.build().unwrap();
        assert!(mph.seeds().iter().all(|&s| s <= 1));
        assert!(mph.seeds().contains(&1));
        for k in 0..6u64 {
            assert_eq!(mph.lookup(&k), k as usize);
        }
    }

    #[test]
    fn empty_buckets_keep_seed_zero() {
        let mut b = Builder::new(50, Xxh3Hasher);
        b.add(7u32);
        let mph = b.build().unwrap();
        assert_eq!(mph.seeds().iter().filter(|&&s| s == 0).count(), 49);
        assert_eq!(mph.lookup(&7u32), 0);
    }
}
