//! A generic open-addressing hash index.
//!
//! Entries live in fixed-size extents taken from an [`ExtentPool`]. Slots are
//! found by linear probing, and removed entries leave a tombstone behind
//! unless the collision chain ends right after them.
//!
//! Extents are shared with frozen iterators through reference counting. Any
//! write to a shared extent first copies it, so a [`FrozenIter`] keeps seeing
//! the exact entries which were present when it was created.

use std::sync::Arc;

use anyhow::Result;

use crate::mem::{Extent, ExtentPool};

mod hash;
mod iter;

pub use hash::{KeyHasher, SeededHasher};
pub use iter::FrozenIter;

/// The position of an entry within a [`HashIndex`].
///
/// A position is only valid until the index is next modified.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pos(usize);

#[derive(Clone, Debug)]
enum Slot<K, V> {
	Empty,
	Deleted,
	Full {
		hash: u32,
		key: K,
		value: V,
	},
}

type Extents<K, V> = Vec<Arc<Extent<Slot<K, V>>>>;

pub struct HashIndex<K, V, H = SeededHasher> {
	pool: ExtentPool,
	hasher: H,
	extents: Extents<K, V>,
	/// The number of slots in each extent, always a power of two
	per_extent: usize,
	/// The number of live entries
	len: usize,
	/// The number of tombstones
	deleted: usize,
}

impl<K, V, H> HashIndex<K, V, H>
where
	K: Eq + Clone,
	V: Clone,
	H: KeyHasher<K>,
{
	/// Creates an empty index. No extents are taken until the first insert.
	pub fn new(pool: ExtentPool, hasher: H) -> Self {
		let slots = (pool.extent_size() / std::mem::size_of::<Slot<K, V>>()).max(1);
		// Round down to a power of two, so that the capacity always is one
		let per_extent = if slots.is_power_of_two() {
			slots
		} else {
			slots.next_power_of_two() >> 1
		};
		Self {
			pool,
			hasher,
			extents: Vec::new(),
			per_extent,
			len: 0,
			deleted: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Returns the total number of slots
	pub fn capacity(&self) -> usize {
		self.extents.len() * self.per_extent
	}

	pub fn pool(&self) -> &ExtentPool {
		&self.pool
	}

	/// Finds the position of the entry with this key
	pub fn find(&self, key: &K) -> Option<Pos> {
		self.find_hashed(self.hasher.hash(key), key)
	}

	/// Returns the entry at a position
	pub fn get(&self, pos: Pos) -> Option<(&K, &V)> {
		if pos.0 >= self.capacity() {
			return None;
		}
		match self.slot(pos.0) {
			Slot::Full {
				key,
				value,
				..
			} => Some((key, value)),
			_ => None,
		}
	}

	/// Inserts an entry whose key is not yet present in the index.
	///
	/// Fails when the pool can not provide the extents needed to grow the
	/// index, or to copy an extent held by a frozen iterator. In both cases
	/// the index is left unchanged.
	pub fn insert(&mut self, key: K, value: V) -> Result<Pos> {
		let hash = self.hasher.hash(&key);
		if self.find_hashed(hash, &key).is_some() {
			fail!("Attempted to insert a key which is already present in the index");
		}
		if (self.len + self.deleted + 1) * 4 > self.capacity() * 3 {
			self.rehash()?;
		}
		let pos = self.vacant(hash);
		let slot = self.touch(pos)?;
		let tombstone = matches!(slot, Slot::Deleted);
		*slot = Slot::Full {
			hash,
			key,
			value,
		};
		if tombstone {
			self.deleted -= 1;
		}
		self.len += 1;
		Ok(Pos(pos))
	}

	/// Replaces the value of an existing entry, returning its position and
	/// the previous value, or `None` when the key is not present.
	pub fn replace(&mut self, key: K, value: V) -> Result<Option<(Pos, V)>> {
		let hash = self.hasher.hash(&key);
		let Some(pos) = self.find_hashed(hash, &key) else {
			return Ok(None);
		};
		let old = self.replace_at(pos, value)?;
		Ok(Some((pos, old)))
	}

	/// Replaces the value of the entry at a position found earlier, returning
	/// the previous value
	pub fn replace_at(&mut self, pos: Pos, value: V) -> Result<V> {
		if self.get(pos).is_none() {
			fail!("There is no entry at index position {}", pos.0);
		}
		match self.touch(pos.0)? {
			Slot::Full {
				value: current,
				..
			} => Ok(std::mem::replace(current, value)),
			_ => fail!("The index lost the entry at position {}", pos.0),
		}
	}

	/// Removes the entry at a position. Removing never fails, even when an
	/// extent must be copied away from a frozen iterator.
	pub fn delete(&mut self, pos: Pos) {
		if self.get(pos).is_none() {
			return;
		}
		let mask = self.capacity() - 1;
		let ends_chain = matches!(self.slot((pos.0 + 1) & mask), Slot::Empty);
		let (idx, off) = self.split(pos.0);
		let ext = &mut self.extents[idx];
		if Arc::get_mut(ext).is_none() {
			*ext = Arc::new(self.pool.alloc_copy_overcommit(&**ext));
		}
		if let Some(ext) = Arc::get_mut(ext) {
			ext[off] = if ends_chain {
				Slot::Empty
			} else {
				Slot::Deleted
			};
			self.len -= 1;
			if !ends_chain {
				self.deleted += 1;
			}
		}
	}

	/// Takes a frozen view of the current entries
	pub fn freeze(&self) -> FrozenIter<K, V> {
		FrozenIter::new(self.extents.clone(), self.per_extent)
	}

	/// Iterates over the current entries in index order
	pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
		self.extents.iter().flat_map(|e| e.iter()).filter_map(|s| match s {
			Slot::Full {
				key,
				value,
				..
			} => Some((key, value)),
			_ => None,
		})
	}

	fn split(&self, pos: usize) -> (usize, usize) {
		(pos / self.per_extent, pos & (self.per_extent - 1))
	}

	fn slot(&self, pos: usize) -> &Slot<K, V> {
		let (idx, off) = self.split(pos);
		&self.extents[idx][off]
	}

	fn find_hashed(&self, hash: u32, key: &K) -> Option<Pos> {
		if self.len == 0 {
			return None;
		}
		let mask = self.capacity() - 1;
		let mut pos = hash as usize & mask;
		for _ in 0..=mask {
			match self.slot(pos) {
				Slot::Empty => return None,
				Slot::Full {
					hash: h,
					key: k,
					..
				} if *h == hash && k == key => return Some(Pos(pos)),
				_ => {}
			}
			pos = (pos + 1) & mask;
		}
		None
	}

	/// Returns the first free slot on the collision chain of a hash
	fn vacant(&self, hash: u32) -> usize {
		let mask = self.capacity() - 1;
		let mut pos = hash as usize & mask;
		while let Slot::Full {
			..
		} = self.slot(pos)
		{
			pos = (pos + 1) & mask;
		}
		pos
	}

	/// Returns a writable slot, copying its extent first when a frozen
	/// iterator still holds on to it
	fn touch(&mut self, pos: usize) -> Result<&mut Slot<K, V>> {
		let (idx, off) = self.split(pos);
		let ext = &mut self.extents[idx];
		if Arc::get_mut(ext).is_none() {
			*ext = Arc::new(self.pool.alloc_copy(&**ext)?);
		}
		match Arc::get_mut(ext) {
			Some(ext) => Ok(&mut ext[off]),
			None => fail!("Extent {idx} is still shared after being copied"),
		}
	}

	/// Rebuilds the index with room for one more entry, dropping every
	/// tombstone.
	///
	/// While the live entries fit, the current extents are reused, and only
	/// those held by a frozen iterator are swapped for new ones. Otherwise the
	/// entries move into a larger set of extents. Either way, every extent is
	/// taken from the pool before any entry moves.
	fn rehash(&mut self) -> Result<()> {
		let mut capacity = self.per_extent;
		while (self.len + 1) * 4 > capacity * 3 {
			capacity *= 2;
		}
		let capacity = capacity.max(self.capacity());
		let reused = if capacity == self.capacity() {
			self.extents.len()
		} else {
			0
		};
		let shared = self.extents.iter().take(reused).filter(|e| Arc::strong_count(e) > 1).count();
		let mut fresh = Vec::with_capacity(capacity / self.per_extent - reused + shared);
		for _ in 0..capacity / self.per_extent - reused + shared {
			fresh.push(self.pool.alloc(self.per_extent, Slot::Empty)?);
		}
		trace!("Rehashing index of {} entries from {} to {} slots", self.len, self.capacity(), capacity);
		// Nothing can fail from here on
		let mut live = Vec::with_capacity(self.len);
		let mut target = Vec::with_capacity(capacity / self.per_extent);
		for ext in std::mem::take(&mut self.extents) {
			match Arc::try_unwrap(ext) {
				Ok(mut ext) if target.len() < reused => {
					for slot in ext.iter_mut() {
						if let Slot::Full {
							..
						} = slot
						{
							live.push(std::mem::replace(slot, Slot::Empty));
						} else {
							*slot = Slot::Empty;
						}
					}
					target.push(ext);
				}
				Ok(ext) => live.extend(ext.iter().filter(|s| matches!(s, Slot::Full { .. })).cloned()),
				Err(ext) => {
					live.extend(ext.iter().filter(|s| matches!(s, Slot::Full { .. })).cloned());
					if target.len() < reused {
						// A frozen iterator let go of the extent since it was counted
						let empty = match fresh.pop() {
							Some(empty) => empty,
							None => {
								let mut copy = self.pool.alloc_copy_overcommit(&ext);
								copy.fill(Slot::Empty);
								copy
							}
						};
						target.push(empty);
					}
				}
			}
		}
		if reused == 0 {
			target.extend(fresh);
		}
		for slot in live {
			place(&mut target, self.per_extent, slot);
		}
		self.extents = target.into_iter().map(Arc::new).collect();
		self.deleted = 0;
		Ok(())
	}
}

/// Puts an entry into the first empty slot of its collision chain
fn place<K, V>(extents: &mut [Extent<Slot<K, V>>], per_extent: usize, slot: Slot<K, V>) {
	let Slot::Full {
		hash,
		..
	} = slot
	else {
		return;
	};
	let mask = extents.len() * per_extent - 1;
	let mut pos = hash as usize & mask;
	loop {
		let target = &mut extents[pos / per_extent][pos & (per_extent - 1)];
		if let Slot::Empty = target {
			*target = slot;
			return;
		}
		pos = (pos + 1) & mask;
	}
}
