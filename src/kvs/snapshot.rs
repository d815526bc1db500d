use anyhow::Result;
use rmpv::Value;

use crate::catalog::SequenceId;
use crate::err::Error;
use crate::idx::light::FrozenIter;

/// The largest encoded tuple: an array header of one byte, then two
/// integers of at most nine bytes each.
pub const SEQUENCE_TUPLE_BUF_SIZE: usize = 1 + 2 * 9;

/// Walks a frozen view of a [`super::SequenceStore`], encoding every entry as
/// a MessagePack `[id, value]` tuple.
///
/// The view is taken when the iterator is created. Later changes to the
/// store are not visible to the iterator, and do not disturb it.
pub struct SnapshotIterator {
	iter: FrozenIter<SequenceId, i64>,
	tuple: Vec<u8>,
}

impl SnapshotIterator {
	pub(super) fn new(iter: FrozenIter<SequenceId, i64>) -> Self {
		Self {
			iter,
			tuple: Vec::with_capacity(SEQUENCE_TUPLE_BUF_SIZE),
		}
	}

	/// Encodes the next entry, returning `None` once every entry was visited.
	///
	/// The returned bytes are only valid until the next call.
	#[expect(clippy::should_implement_trait)]
	pub fn next(&mut self) -> Result<Option<&[u8]>> {
		let Some((id, value)) = self.iter.next() else {
			return Ok(None);
		};
		// Non-negative values are written as unsigned integers
		let tuple = Value::Array(vec![Value::from(id.0), Value::from(value)]);
		self.tuple.clear();
		rmpv::encode::write_value(&mut self.tuple, &tuple)
			.map_err(|e| anyhow::Error::new(Error::unreachable(e)))?;
		debug_assert!(self.tuple.len() <= SEQUENCE_TUPLE_BUF_SIZE);
		Ok(Some(self.tuple.as_slice()))
	}

	/// Releases the frozen view
	pub fn destroy(self) {
		trace!("Releasing sequence snapshot");
	}
}

/// Reads a single `[id, value]` tuple from the front of `data`, advancing
/// past it.
pub fn decode_tuple(data: &mut &[u8]) -> Result<(SequenceId, i64)> {
	let invalid = |msg: String| anyhow::Error::new(Error::InvalidSnapshot(msg));
	let value = rmpv::decode::read_value(data).map_err(|e| invalid(e.to_string()))?;
	let items = match value {
		Value::Array(items) => items,
		v => return Err(invalid(format!("expected an array, found {v}"))),
	};
	let [id, value] = items.as_slice() else {
		return Err(invalid(format!("expected a tuple of 2 fields, found {}", items.len())));
	};
	let id = id
		.as_u64()
		.and_then(|v| u32::try_from(v).ok())
		.ok_or_else(|| invalid(format!("sequence id {id} is out of range")))?;
	let value =
		value.as_i64().ok_or_else(|| invalid(format!("sequence value {value} is out of range")))?;
	Ok((SequenceId(id), value))
}

#[cfg(test)]
mod tests {
	use test_log::test;

	use super::*;
	use crate::catalog::SequenceDefinition;
	use crate::kvs::SequenceStore;
	use crate::mem::ExtentPool;

	fn store() -> SequenceStore {
		SequenceStore::with_pool(ExtentPool::new(128, 0))
	}

	fn collect(mut it: SnapshotIterator) -> Vec<(SequenceId, i64)> {
		let mut out = Vec::new();
		while let Some(mut tuple) = it.next().unwrap() {
			out.push(decode_tuple(&mut tuple).unwrap());
			assert!(tuple.is_empty());
		}
		it.destroy();
		out.sort();
		out
	}

	#[test]
	fn compact_encoding() {
		let mut store = store();
		store.set(&SequenceDefinition::new(1, "a", 1), -1).unwrap();
		let mut it = store.snapshot();
		assert_eq!(it.next().unwrap(), Some(&[0x92, 0x01, 0xff][..]));
		assert_eq!(it.next().unwrap(), None);
		store.reset(&SequenceDefinition::new(1, "a", 1));
		store.set(&SequenceDefinition::new(7, "b", 1), 100).unwrap();
		let mut it = store.snapshot();
		assert_eq!(it.next().unwrap(), Some(&[0x92, 0x07, 0x64][..]));
		store.set(&SequenceDefinition::new(7, "b", 1), i64::MIN).unwrap();
		let mut it = store.snapshot();
		let tuple = it.next().unwrap().unwrap();
		assert_eq!(tuple.len(), 11);
		assert_eq!(tuple[2], 0xd3);
	}

	#[test]
	fn visits_every_entry_once() {
		let mut store = store();
		let mut expected = Vec::new();
		for id in 0..200u32 {
			let value = match id % 3 {
				0 => i64::MAX - id as i64,
				1 => i64::MIN + id as i64,
				_ => id as i64 * 1000,
			};
			store.set(&SequenceDefinition::new(id, "seq", 1), value).unwrap();
			expected.push((SequenceId(id), value));
		}
		assert_eq!(collect(store.snapshot()), expected);
	}

	#[test]
	fn mutation_during_iteration() {
		let mut store = store();
		for id in 0..50u32 {
			store.set(&SequenceDefinition::new(id, "seq", 1), id as i64).unwrap();
		}
		let mut it = store.snapshot();
		let mut seen = Vec::new();
		let mut round = 0u32;
		while let Some(mut tuple) = it.next().unwrap() {
			seen.push(decode_tuple(&mut tuple).unwrap());
			// Change, remove and add entries while the snapshot is read
			store.set(&SequenceDefinition::new(round, "seq", 1), -1).unwrap();
			store.reset(&SequenceDefinition::new(49 - round, "seq", 1));
			store.set(&SequenceDefinition::new(1000 + round, "seq", 1), 7).unwrap();
			round += 1;
		}
		seen.sort();
		assert_eq!(seen, (0..50u32).map(|id| (SequenceId(id), id as i64)).collect::<Vec<_>>());
	}

	#[test]
	fn recover_round_trip() {
		let mut store = store();
		for id in 0..20u32 {
			store.set(&SequenceDefinition::new(id, "seq", 1), id as i64 - 10).unwrap();
		}
		let mut it = store.snapshot();
		let mut data = Vec::new();
		while let Some(tuple) = it.next().unwrap() {
			data.extend_from_slice(tuple);
		}
		let mut restored = SequenceStore::with_pool(ExtentPool::new(128, 0));
		restored.recover(&data).unwrap();
		assert_eq!(collect(restored.snapshot()), collect(store.snapshot()));
		assert_eq!(restored.len(), 20);
	}

	#[test]
	fn malformed_snapshots() {
		let cases: [&[u8]; 5] = [
			// Not an array
			&[0x01],
			// Three fields
			&[0x93, 0x01, 0x02, 0x03],
			// An id larger than 32 bits
			&[0x92, 0xcf, 0, 0, 0, 1, 0, 0, 0, 0, 0x01],
			// A value larger than i64::MAX
			&[0x92, 0x01, 0xcf, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
			// Truncated
			&[0x92, 0x01],
		];
		for case in cases {
			let mut store = store();
			let mut data = vec![0x92, 0x05, 0x05];
			data.extend_from_slice(case);
			let err = store.recover(&data).unwrap_err();
			assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidSnapshot(_))));
			assert!(store.is_empty());
		}
	}
}
