//! The in-memory store holding the current value of every sequence.

mod sequences;
mod snapshot;
mod step;

pub use sequences::SequenceStore;
pub use snapshot::{SEQUENCE_TUPLE_BUF_SIZE, SnapshotIterator, decode_tuple};
pub use step::next_value;
