use super::{Extents, Slot};

/// An iterator over the entries of a [`super::HashIndex`] as they were when
/// the iterator was created.
///
/// The iterator shares the extents of the index instead of borrowing it, so
/// the index may be modified while the iteration is in progress. Entries are
/// visited in slot order, each exactly once.
pub struct FrozenIter<K, V> {
	extents: Extents<K, V>,
	per_extent: usize,
	/// The next slot to visit
	pos: usize,
}

impl<K, V> FrozenIter<K, V> {
	pub(super) fn new(extents: Extents<K, V>, per_extent: usize) -> Self {
		Self {
			extents,
			per_extent,
			pos: 0,
		}
	}
}

impl<K: Clone, V: Clone> Iterator for FrozenIter<K, V> {
	type Item = (K, V);

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let ext = self.extents.get(self.pos / self.per_extent)?;
			let slot = &ext[self.pos & (self.per_extent - 1)];
			self.pos += 1;
			if let Slot::Full {
				key,
				value,
				..
			} = slot
			{
				return Some((key.clone(), value.clone()));
			}
		}
	}
}
