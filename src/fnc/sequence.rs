use anyhow::Result;

use crate::catalog::Sequence;
use crate::err::Error;
use crate::iam::{Principal, check_sequence};
use crate::kvs::SequenceStore;

fn allowed(seq: &Sequence, principal: &Principal) -> Result<()> {
	check_sequence(seq, principal).into_result().map_err(|e| anyhow::Error::new(Error::from(e)))
}

/// Return the next value for a given sequence.
pub fn nextval(store: &mut SequenceStore, principal: &Principal, seq: &Sequence) -> Result<i64> {
	allowed(seq, principal)?;
	store.next(seq)
}

/// Set the current value of a given sequence.
pub fn setval(
	store: &mut SequenceStore,
	principal: &Principal,
	seq: &Sequence,
	value: i64,
) -> Result<()> {
	allowed(seq, principal)?;
	store.set(seq, value)
}

/// Move a given sequence forward to a value, if it is not already past it.
pub fn advance(
	store: &mut SequenceStore,
	principal: &Principal,
	seq: &Sequence,
	value: i64,
) -> Result<()> {
	allowed(seq, principal)?;
	store.update(seq, value)
}

/// Restart a given sequence from its start value.
pub fn reset(store: &mut SequenceStore, principal: &Principal, seq: &Sequence) -> Result<()> {
	allowed(seq, principal)?;
	store.reset(seq);
	Ok(())
}

/// Return the current value of a given sequence, without changing it.
pub fn currval(store: &SequenceStore, seq: &Sequence) -> Option<i64> {
	store.get(seq)
}
