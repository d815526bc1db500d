use std::collections::BTreeMap;
use std::sync::Weak;

use parking_lot::RwLock;

static MEMORY_REPORTERS: RwLock<Vec<MemoryReporterEntry>> = RwLock::new(Vec::new());

struct MemoryReporterEntry {
	name: &'static str,
	reporter: Weak<dyn MemoryReporter>,
}

/// Trait for allocators which report their memory usage to the registry
pub trait MemoryReporter: Send + Sync {
	/// Returns the amount of memory currently allocated
	fn memory_allocated(&self) -> usize;

	/// Returns the most memory which may be allocated, if there is a limit
	fn memory_limit(&self) -> Option<usize> {
		None
	}
}

/// The memory used by every live reporter registered under one name
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryUsage {
	/// The number of live reporters
	pub reporters: usize,
	pub allocated: usize,
	/// The sum of the limits, or `None` when any reporter is unlimited
	pub limit: Option<usize>,
}

/// Returns the total memory allocated by all live reporters
pub fn memory_reporters_allocated_total() -> usize {
	MEMORY_REPORTERS
		.read()
		.iter()
		.filter_map(|r| r.reporter.upgrade())
		.map(|r| r.memory_allocated())
		.sum()
}

/// Returns the memory used by the live reporters of each name
pub fn memory_reporters_by_name() -> BTreeMap<&'static str, MemoryUsage> {
	let reporters = MEMORY_REPORTERS.read();
	let mut output = BTreeMap::new();
	for entry in reporters.iter() {
		let Some(reporter) = entry.reporter.upgrade() else {
			continue;
		};
		let usage = output.entry(entry.name).or_insert(MemoryUsage {
			limit: Some(0),
			..MemoryUsage::default()
		});
		usage.reporters += 1;
		usage.allocated += reporter.memory_allocated();
		usage.limit = usage.limit.zip(reporter.memory_limit()).map(|(a, b)| a + b);
	}
	output
}

/// Registers an allocator under a name. Reporters are dropped from the
/// registry once nothing else holds on to them.
pub fn register_memory_reporter(name: &'static str, reporter: Weak<dyn MemoryReporter>) {
	let mut reporters = MEMORY_REPORTERS.write();
	reporters.retain(|r| r.reporter.strong_count() > 0);
	reporters.push(MemoryReporterEntry {
		name,
		reporter,
	});
}

/// Removes the reporters which are no longer alive
pub fn cleanup_memory_reporters() {
	MEMORY_REPORTERS.write().retain(|r| r.reporter.strong_count() > 0);
}
