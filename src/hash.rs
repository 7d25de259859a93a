use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// Seed of the first-level hash. Fixed so bucket layout survives a process restart.
const FIRST_LEVEL_SEED: u64 = 0xC0FF_EE00_D15E_A5E;

/// A seeded hash function over `K`.
///
/// Must be deterministic for a given `(key, seed)` pair and should behave like an
/// independent random function as `seed` varies. The builder relies on this to
/// find, for every bucket, a seed that scatters its keys onto free slots; a hasher
/// that ignores the seed makes construction fail once the retry ceiling is hit.
pub trait RandomizedHasher<K: ?Sized> {
    fn hash(&self, key: &K, seed: u32) -> u64;
}

impl<K: ?Sized, F> RandomizedHasher<K> for F
where
    F: Fn(&K, u32) -> u64,
{
    #[inline]
    fn hash(&self, key: &K, seed: u32) -> u64 {
        self(key, seed)
    }
}

/// Folds each character of a string through a seeded pseudo-random stream:
/// `acc = 37 * acc + char + rng.next()`.
///
/// Adequate for dictionary-sized sets, not meant to be fast or strong.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldingHasher;

impl<K: AsRef<str> + ?Sized> RandomizedHasher<K> for FoldingHasher {
    fn hash(&self, key: &K, seed: u32) -> u64 {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        key.as_ref().chars().fold(0u64, |acc, c| {
            acc.wrapping_mul(37)
                .wrapping_add(c as u64)
                .wrapping_add(rng.next_u32() as u64)
        })
    }
}

/// XXH3 over the key's `Hash` impl, seeded per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh3Hasher;

impl<K: Hash + ?Sized> RandomizedHasher<K> for Xxh3Hasher {
    #[inline]
    fn hash(&self, key: &K, seed: u32) -> u64 {
        let mut h = Xxh3::with_seed(seed as u64);
        key.hash(&mut h);
        h.finish()
    }
}

/// wyhash over the raw key bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WyHasher;

impl<K: AsRef<[u8]> + ?Sized> RandomizedHasher<K> for WyHasher {
    #[inline]
    fn hash(&self, key: &K, seed: u32) -> u64 {
        wyhash::wyhash(key.as_ref(), seed as u64)
    }
}

/// aHash with the seed mixed into the first key of its state.
///
/// Output is stable within a build of the crate but aHash does not promise it
/// across versions or targets, so prefer [`Xxh3Hasher`] for persisted tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct AHasher;

impl<K: Hash + ?Sized> RandomizedHasher<K> for AHasher {
    #[inline]
    fn hash(&self, key: &K, seed: u32) -> u64 {
        let state = ahash::RandomState::with_seeds(
            seed as u64,
            0x243F_6A88_85A3_08D3,
            0x1319_8A2E_0370_7344,
            0xA409_3822_299F_31D0,
        );
        state.hash_one(key)
    }
}

/// Bucket of `key`: `(h >> 1) % bucket_count`, `h` being the key's own hash.
#[inline]
pub fn first_level_hash<K: Hash + ?Sized>(key: &K, bucket_count: usize) -> usize {
    let mut h = Xxh3::with_seed(FIRST_LEVEL_SEED);
    key.hash(&mut h);
    ((h.finish() >> 1) % bucket_count as u64) as usize
}

/// Final slot of `key` in `[0, n)` for a bucket resolved with `seed`.
#[inline]
pub fn second_level_hash<K, H>(hasher: &H, key: &K, n: usize, seed: u32) -> usize
where
    K: ?Sized,
    H: RandomizedHasher<K> + ?Sized,
{
    ((hasher.hash(key, seed) >> 1) % n as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hashers_are_deterministic() {
        for seed in [0, 1, 7, u32::MAX] {
            assert_eq!(
                RandomizedHasher::<str>::hash(&FoldingHasher, "charlie", seed),
                RandomizedHasher::<str>::hash(&FoldingHasher, "charlie", seed)
            );
            assert_eq!(
                RandomizedHasher::<str>::hash(&Xxh3Hasher, "charlie", seed),
                RandomizedHasher::<str>::hash(&Xxh3Hasher, "charlie", seed)
            );
            assert_eq!(
                RandomizedHasher::<str>::hash(&WyHasher, "charlie", seed),
                RandomizedHasher::<str>::hash(&WyHasher, "charlie", seed)
            );
            assert_eq!(
                RandomizedHasher::<str>::hash(&AHasher, "charlie", seed),
                RandomizedHasher::<str>::hash(&AHasher, "charlie", seed)
            );
        }
    }

    #[test]
    fn seed_changes_the_output() {
        let distinct: HashSet<u64> = (1..=64)
            .map(|seed| RandomizedHasher::<str>::hash(&Xxh3Hasher, "delta", seed))
            .collect();
        assert!(distinct.len() > 60);

        let distinct: HashSet<u64> = (1..=64)
            .map(|seed| RandomizedHasher::<str>::hash(&FoldingHasher, "delta", seed))
            .collect();
        assert!(distinct.len() > 60);
    }

    #[test]
    fn owned_and_borrowed_keys_agree() {
        let owned = String::from("bravo");
        assert_eq!(
            RandomizedHasher::<String>::hash(&Xxh3Hasher, &owned, 3),
            RandomizedHasher::<str>::hash(&Xxh3Hasher, "bravo", 3)
        );
        assert_eq!(
            RandomizedHasher::<String>::hash(&FoldingHasher, &owned, 3),
            RandomizedHasher::<str>::hash(&FoldingHasher, "bravo", 3)
        );
        assert_eq!(first_level_hash(&owned, 17), first_level_hash("bravo", 17));
    }

    #[test]
    fn closures_are_hashers() {
        let h = |k: &u64, seed: u32| k.wrapping_mul(seed as u64 + 1);
        assert_eq!(h.hash(&5, 2), 15);
    }

    #[test]
    fn level_hashes_stay_in_range() {
        for i in 0..1_000u32 {
            assert!(first_level_hash(&i, 13) < 13);
            assert!(second_level_hash(&Xxh3Hasher, &i, 29, i) < 29);
        }
        let max = |_: &u32, _: u32| u64::MAX;
        assert!(second_level_hash(&max, &0, 7, 1) < 7);
    }
}
