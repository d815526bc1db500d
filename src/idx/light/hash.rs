use std::hash::{BuildHasher, Hash};

use ahash::RandomState;

/// Computes the 32-bit hash used to place a key in a [`super::HashIndex`].
///
/// Implementations must be deterministic: the same key always hashes to
/// the same value for the lifetime of an index.
pub trait KeyHasher<K: ?Sized> {
	fn hash(&self, key: &K) -> u32;
}

/// A hasher with fixed seeds, so that hashes do not vary between indexes
/// or between runs of the same build.
#[derive(Clone, Debug)]
pub struct SeededHasher {
	state: RandomState,
}

impl SeededHasher {
	pub fn new(seed: u64) -> Self {
		Self {
			state: RandomState::with_seeds(
				seed,
				seed.rotate_left(16),
				seed.rotate_left(32),
				seed.rotate_left(48),
			),
		}
	}
}

impl<K: Hash + ?Sized> KeyHasher<K> for SeededHasher {
	fn hash(&self, key: &K) -> u32 {
		let h = BuildHasher::hash_one(&self.state, key);
		(h ^ (h >> 32)) as u32
	}
}
