//! The current values of all sequences.
//!
//! Each sequence which has produced or been given a value has exactly one
//! entry in the store, keyed by its identifier. Entries are created lazily by
//! [`SequenceStore::next`], [`SequenceStore::set`] and [`SequenceStore::update`],
//! and removed by [`SequenceStore::reset`]. Every operation is all-or-nothing:
//! when it fails, the store is left exactly as it was.

use anyhow::Result;

use crate::catalog::{SequenceDefinition, SequenceId};
use crate::cnf::SEQUENCE_HASH_SEED;
use crate::idx::light::{HashIndex, Pos, SeededHasher};
use crate::kvs::snapshot::{SnapshotIterator, decode_tuple};
use crate::kvs::step::next_value;
use crate::mem::ExtentPool;

pub struct SequenceStore {
	index: HashIndex<SequenceId, i64>,
}

impl SequenceStore {
	/// Creates an empty store, sized from the environment configuration
	pub fn init() -> Self {
		Self::with_pool(ExtentPool::from_config())
	}

	/// Creates an empty store which takes its memory from the given pool
	pub fn with_pool(pool: ExtentPool) -> Self {
		debug!(
			"Initialising sequence store with extent size {} and limit {}",
			pool.extent_size(),
			pool.limit()
		);
		#[cfg(feature = "allocation-tracking")]
		crate::mem::registry::register_memory_reporter("sequence_data_extent", pool.reporter());
		Self {
			index: HashIndex::new(pool, SeededHasher::new(SEQUENCE_HASH_SEED)),
		}
	}

	/// Destroys the store and releases its pool
	pub fn teardown(self) {
		debug!("Tearing down sequence store with {} entries", self.index.len());
		drop(self);
		#[cfg(feature = "allocation-tracking")]
		crate::mem::registry::cleanup_memory_reporters();
	}

	/// Returns the current value of a sequence, if it has one
	pub fn get(&self, def: &SequenceDefinition) -> Option<i64> {
		let pos = self.index.find(&def.id)?;
		self.index.get(pos).map(|(_, v)| *v)
	}

	/// Returns the number of sequences with a current value
	pub fn len(&self) -> usize {
		self.index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}

	pub fn pool(&self) -> &ExtentPool {
		self.index.pool()
	}

	/// Forgets the current value of a sequence, so that the next value starts
	/// over from the start of the sequence.
	pub fn reset(&mut self, def: &SequenceDefinition) {
		if let Some(pos) = self.index.find(&def.id) {
			trace!("Resetting sequence '{}'", def.name);
			self.index.delete(pos);
		}
	}

	/// Sets the current value of a sequence, whatever its previous value.
	pub fn set(&mut self, def: &SequenceDefinition, value: i64) -> Result<()> {
		trace!("Setting sequence '{}' to {value}", def.name);
		let pos = self.index.find(&def.id);
		self.commit(def.id, pos, value)
	}

	/// Moves a sequence forward to `value`.
	///
	/// A sequence without a current value takes `value` as it is. Otherwise
	/// the current value only changes when `value` lies further along the
	/// direction of the step. The value is not checked against the bounds of
	/// the sequence.
	pub fn update(&mut self, def: &SequenceDefinition, value: i64) -> Result<()> {
		let Some(pos) = self.index.find(&def.id) else {
			trace!("Updating sequence '{}' to {value}", def.name);
			self.index.insert(def.id, value)?;
			return Ok(());
		};
		let current = match self.index.get(pos) {
			Some((_, v)) => *v,
			None => fail!("Sequence '{}' lost its entry in the store", def.name),
		};
		let progresses = if def.is_ascending() {
			value > current
		} else {
			value < current
		};
		if progresses {
			trace!("Updating sequence '{}' from {current} to {value}", def.name);
			self.index.replace_at(pos, value)?;
		}
		Ok(())
	}

	/// Steps a sequence and returns its new current value.
	///
	/// Fails with [`crate::err::Error::InvalidSequence`] when the bounds or the
	/// step of the definition are inconsistent.
	pub fn next(&mut self, def: &SequenceDefinition) -> Result<i64> {
		def.validate()?;
		let pos = self.index.find(&def.id);
		let current = pos.and_then(|p| self.index.get(p)).map(|(_, v)| *v);
		let value = next_value(current, def)?;
		self.commit(def.id, pos, value)?;
		trace!("Sequence '{}' moved to {value}", def.name);
		Ok(value)
	}

	/// Takes a snapshot of every current value. The store may keep changing
	/// while the snapshot is being read.
	pub fn snapshot(&self) -> SnapshotIterator {
		trace!("Creating snapshot of {} sequence values", self.index.len());
		SnapshotIterator::new(self.index.freeze())
	}

	/// Installs the values of a snapshot written by [`SnapshotIterator`].
	///
	/// The whole snapshot is decoded before any value is installed, so
	/// malformed data leaves the store untouched. When the pool runs out of
	/// memory part way, the values installed so far are rolled back.
	pub fn recover(&mut self, data: &[u8]) -> Result<()> {
		let mut rest = data;
		let mut tuples = Vec::new();
		while !rest.is_empty() {
			tuples.push(decode_tuple(&mut rest)?);
		}
		debug!("Recovering {} sequence values from snapshot", tuples.len());
		let mut undo = Vec::with_capacity(tuples.len());
		for (id, value) in tuples {
			let pos = self.index.find(&id);
			let previous = pos.and_then(|p| self.index.get(p)).map(|(_, v)| *v);
			if let Err(e) = self.commit(id, pos, value) {
				warn!("Rolling back {} recovered sequence values: {e}", undo.len());
				self.rollback(undo)?;
				return Err(e);
			}
			undo.push((id, previous));
		}
		Ok(())
	}

	/// Restores the values which entries had before a failed recovery, newest
	/// change first. Every extent touched was already copied away from frozen
	/// iterators, so restoring takes no memory.
	fn rollback(&mut self, undo: Vec<(SequenceId, Option<i64>)>) -> Result<()> {
		for (id, previous) in undo.into_iter().rev() {
			let Some(pos) = self.index.find(&id) else {
				fail!("Sequence {id} lost its entry while rolling back a recovery");
			};
			match previous {
				Some(value) => {
					self.index.replace_at(pos, value)?;
				}
				None => self.index.delete(pos),
			}
		}
		Ok(())
	}

	fn commit(&mut self, id: SequenceId, pos: Option<Pos>, value: i64) -> Result<()> {
		match pos {
			Some(pos) => {
				self.index.replace_at(pos, value)?;
			}
			None => {
				self.index.insert(id, value)?;
			}
		}
		Ok(())
	}
}

impl std::fmt::Debug for SequenceStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SequenceStore").field("len", &self.index.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;
	use crate::err::Error;

	fn is_out_of_memory(err: &anyhow::Error) -> bool {
		err.downcast_ref::<Error>().is_some_and(Error::is_out_of_memory)
	}

	fn store() -> SequenceStore {
		SequenceStore::with_pool(ExtentPool::new(512, 0))
	}

	fn def(id: u32, start: i64, min: i64, max: i64, step: i64, cycle: bool) -> SequenceDefinition {
		SequenceDefinition {
			start,
			min,
			max,
			step,
			cycle,
			..SequenceDefinition::new(id, "seq", 1)
		}
	}

	#[test]
	fn cycling_scenario() {
		let mut store = store();
		let d = def(7, 100, 0, 105, 5, true);
		assert_eq!(store.next(&d).unwrap(), 100);
		assert_eq!(store.next(&d).unwrap(), 105);
		assert_eq!(store.next(&d).unwrap(), 0);
		store.reset(&d);
		assert_eq!(store.get(&d), None);
		assert_eq!(store.next(&d).unwrap(), 100);
		store.teardown();
	}

	#[test]
	fn one_entry_per_sequence() {
		let mut store = store();
		let a = def(1, 1, 1, 100, 1, false);
		let b = def(2, 1, 1, 100, 1, false);
		store.next(&a).unwrap();
		store.set(&a, 50).unwrap();
		store.update(&a, 60).unwrap();
		store.next(&a).unwrap();
		store.set(&b, 3).unwrap();
		assert_eq!(store.len(), 2);
		assert_eq!(store.get(&a), Some(61));
		assert_eq!(store.get(&b), Some(3));
		store.reset(&a);
		store.reset(&a);
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn update_only_moves_forward() {
		let mut store = store();
		let up = def(1, 1, 1, 100, 1, false);
		store.update(&up, 10).unwrap();
		assert_eq!(store.get(&up), Some(10));
		store.update(&up, 5).unwrap();
		store.update(&up, 10).unwrap();
		assert_eq!(store.get(&up), Some(10));
		store.update(&up, 20).unwrap();
		assert_eq!(store.get(&up), Some(20));
		let down = def(2, -1, -100, -1, -1, false);
		store.update(&down, -10).unwrap();
		store.update(&down, -5).unwrap();
		assert_eq!(store.get(&down), Some(-10));
		store.update(&down, -20).unwrap();
		assert_eq!(store.get(&down), Some(-20));
		// Values are taken as they are, even outside of the bounds
		store.update(&up, 1000).unwrap();
		assert_eq!(store.get(&up), Some(1000));
	}

	#[test]
	fn overflow_leaves_value_unchanged() {
		let mut store = store();
		let d = def(1, 1, 1, 3, 1, false);
		for expected in 1..=3 {
			assert_eq!(store.next(&d).unwrap(), expected);
		}
		let err = store.next(&d).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::SequenceOverflow { .. })));
		assert_eq!(store.get(&d), Some(3));
	}

	#[test]
	fn next_after_set_catches_up() {
		let mut store = store();
		let d = def(1, 10, 10, 20, 2, false);
		store.set(&d, -5).unwrap();
		assert_eq!(store.next(&d).unwrap(), 10);
		assert_eq!(store.next(&d).unwrap(), 12);
	}

	#[test]
	fn out_of_memory_changes_nothing() {
		let mut store = SequenceStore::with_pool(ExtentPool::new(64, 1));
		let mut id = 0;
		let err = loop {
			id += 1;
			if let Err(e) = store.next(&def(id, 1, 1, 10, 1, false)) {
				break e;
			}
		};
		assert!(is_out_of_memory(&err));
		assert_eq!(store.len(), id as usize - 1);
		assert_eq!(store.get(&def(id, 1, 1, 10, 1, false)), None);
		// Existing entries can still be stepped and reset
		assert_eq!(store.next(&def(1, 1, 1, 10, 1, false)).unwrap(), 2);
		store.reset(&def(1, 1, 1, 10, 1, false));
		assert_eq!(store.len(), id as usize - 2);
	}

	fn encode(store: &SequenceStore) -> Vec<u8> {
		let mut it = store.snapshot();
		let mut data = Vec::new();
		while let Some(tuple) = it.next().unwrap() {
			data.extend_from_slice(tuple);
		}
		data
	}

	#[test]
	fn failed_recovery_is_rolled_back() {
		let mut source = store();
		for id in 0..100u32 {
			source.set(&def(id, 1, 1, 10, 1, false), id as i64 * 7).unwrap();
		}
		let data = encode(&source);
		let mut store = SequenceStore::with_pool(ExtentPool::new(512, 1));
		for id in [3u32, 50, 99] {
			store.set(&def(id, 1, 1, 10, 1, false), -1).unwrap();
		}
		assert!(is_out_of_memory(&store.recover(&data).unwrap_err()));
		assert_eq!(store.len(), 3);
		for id in [3u32, 50, 99] {
			assert_eq!(store.get(&def(id, 1, 1, 10, 1, false)), Some(-1));
		}
		assert_eq!(store.get(&def(0, 1, 1, 10, 1, false)), None);
		let mut empty = SequenceStore::with_pool(ExtentPool::new(512, 1));
		assert!(is_out_of_memory(&empty.recover(&data).unwrap_err()));
		assert!(empty.is_empty());
		// The same snapshot fits once the pool is large enough
		let mut large = SequenceStore::with_pool(ExtentPool::new(512, 0));
		large.recover(&data).unwrap();
		assert_eq!(large.len(), 100);
	}

	#[test]
	fn failed_recovery_with_open_snapshot() {
		let mut store = SequenceStore::with_pool(ExtentPool::new(512, 2));
		for id in 0..3u32 {
			store.set(&def(id, 1, 1, 10, 1, false), id as i64).unwrap();
		}
		let mut snapshot = store.snapshot();
		let mut source = self::store();
		for id in 0..50u32 {
			source.set(&def(id, 1, 1, 10, 1, false), 1000).unwrap();
		}
		assert!(is_out_of_memory(&store.recover(&encode(&source)).unwrap_err()));
		assert_eq!(store.len(), 3);
		for id in 0..3u32 {
			assert_eq!(store.get(&def(id, 1, 1, 10, 1, false)), Some(id as i64));
		}
		let mut frozen = Vec::new();
		while let Some(mut tuple) = snapshot.next().unwrap() {
			frozen.push(decode_tuple(&mut tuple).unwrap());
		}
		frozen.sort();
		assert_eq!(frozen, (0..3u32).map(|id| (SequenceId(id), id as i64)).collect::<Vec<_>>());
	}

	#[test]
	fn next_rejects_invalid_definitions() {
		let mut store = store();
		store.set(&def(1, 1, 1, 10, 1, false), 5).unwrap();
		let broken = def(1, 1, 10, 1, 1, false);
		let err = store.next(&broken).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidSequence { .. })));
		assert_eq!(store.get(&broken), Some(5));
	}

	#[cfg(feature = "allocation-tracking")]
	#[test]
	fn reports_memory_usage() {
		let mut store = store();
		store.next(&def(1, 1, 1, 10, 1, false)).unwrap();
		let usage = crate::mem::registry::memory_reporters_by_name();
		assert!(usage["sequence_data_extent"].allocated >= 512);
	}

	#[test]
	fn frozen_snapshot_blocks_copy_when_exhausted() {
		let mut store = SequenceStore::with_pool(ExtentPool::new(512, 1));
		let d = def(1, 1, 1, 10, 1, false);
		store.next(&d).unwrap();
		let snapshot = store.snapshot();
		assert!(is_out_of_memory(&store.next(&d).unwrap_err()));
		assert_eq!(store.get(&d), Some(1));
		// Resetting always succeeds
		store.reset(&d);
		assert!(store.is_empty());
		snapshot.destroy();
		assert_eq!(store.pool().used(), 1);
	}
}
