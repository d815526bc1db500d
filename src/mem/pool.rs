use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use anyhow::Result;

use crate::cnf::{SEQUENCE_EXTENT_LIMIT, SEQUENCE_EXTENT_SIZE};
use crate::err::Error;
use crate::mem::registry::MemoryReporter;

/// The counters shared between a pool and every extent it has handed out.
#[derive(Debug)]
struct PoolStats {
	/// The size of every extent in bytes
	extent_size: usize,
	/// The maximum number of live extents, or 0 for no limit
	limit: usize,
	/// The number of extents which are currently live
	used: AtomicUsize,
}

impl MemoryReporter for PoolStats {
	fn memory_allocated(&self) -> usize {
		self.used.load(Ordering::Relaxed) * self.extent_size
	}

	fn memory_limit(&self) -> Option<usize> {
		(self.limit > 0).then_some(self.limit * self.extent_size)
	}
}

/// A pool of fixed-size extents.
///
/// Every extent counts against the pool until it is dropped, which may be
/// long after the pool itself, when a frozen view still holds on to it.
#[derive(Clone, Debug)]
pub struct ExtentPool {
	stats: Arc<PoolStats>,
}

impl ExtentPool {
	pub fn new(extent_size: usize, limit: usize) -> Self {
		debug!("Creating extent pool with extent size {extent_size} and limit {limit}");
		Self {
			stats: Arc::new(PoolStats {
				extent_size: extent_size.max(1),
				limit,
				used: AtomicUsize::new(0),
			}),
		}
	}

	/// Creates a pool sized from the environment configuration
	pub fn from_config() -> Self {
		Self::new(*SEQUENCE_EXTENT_SIZE, *SEQUENCE_EXTENT_LIMIT)
	}

	pub fn extent_size(&self) -> usize {
		self.stats.extent_size
	}

	pub fn limit(&self) -> usize {
		self.stats.limit
	}

	/// Returns the number of extents which are currently live
	pub fn used(&self) -> usize {
		self.stats.used.load(Ordering::Relaxed)
	}

	/// Returns the number of bytes held by live extents
	pub fn memory_allocated(&self) -> usize {
		self.stats.memory_allocated()
	}

	pub(crate) fn reporter(&self) -> Weak<dyn MemoryReporter> {
		let stats: Arc<dyn MemoryReporter> = self.stats.clone();
		Arc::downgrade(&stats)
	}

	/// Allocates an extent holding `len` copies of `fill`
	pub fn alloc<T: Clone>(&self, len: usize, fill: T) -> Result<Extent<T>> {
		self.reserve()?;
		Ok(self.extent(vec![fill; len].into_boxed_slice()))
	}

	/// Allocates a new extent holding a copy of an existing one
	pub fn alloc_copy<T: Clone>(&self, src: &Extent<T>) -> Result<Extent<T>> {
		self.reserve()?;
		Ok(self.extent(src.slots.clone()))
	}

	/// Allocates a copy of an extent, even when the pool is exhausted.
	///
	/// Used on paths which release memory and so must not fail.
	pub(crate) fn alloc_copy_overcommit<T: Clone>(&self, src: &Extent<T>) -> Extent<T> {
		self.stats.used.fetch_add(1, Ordering::Relaxed);
		self.extent(src.slots.clone())
	}

	fn reserve(&self) -> Result<()> {
		let limit = self.stats.limit;
		let reserved = self.stats.used.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
			if limit > 0 && used >= limit {
				None
			} else {
				Some(used + 1)
			}
		});
		match reserved {
			Ok(_) => Ok(()),
			Err(used) => {
				warn!("Extent pool exhausted with {used} of {limit} extents in use");
				Err(anyhow::Error::new(Error::OutOfMemory {
					size: self.stats.extent_size,
					allocator: "mempool",
					object: "sequence_data_extent",
				}))
			}
		}
	}

	fn extent<T>(&self, slots: Box<[T]>) -> Extent<T> {
		Extent {
			slots,
			stats: self.stats.clone(),
		}
	}
}

/// A block of slots handed out by an [`ExtentPool`].
#[derive(Debug)]
pub struct Extent<T> {
	slots: Box<[T]>,
	stats: Arc<PoolStats>,
}

impl<T> Drop for Extent<T> {
	fn drop(&mut self) {
		self.stats.used.fetch_sub(1, Ordering::Relaxed);
	}
}

impl<T> Deref for Extent<T> {
	type Target = [T];
	fn deref(&self) -> &Self::Target {
		&self.slots
	}
}

impl<T> DerefMut for Extent<T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.slots
	}
}
