use anyhow::Result;

use crate::catalog::SequenceDefinition;
use crate::err::Error;

/// Computes the value which follows `current` in a sequence.
///
/// A sequence without a current value starts at its start value. A current
/// value which lies before the range of the sequence snaps to the first
/// bound of the range without consuming a step. Stepping past the far bound,
/// or past the range of `i64`, either wraps back to the first bound when the
/// sequence cycles, or fails with [`Error::SequenceOverflow`].
///
/// The definition must have passed [`SequenceDefinition::validate`].
pub fn next_value(current: Option<i64>, def: &SequenceDefinition) -> Result<i64> {
	let Some(value) = current else {
		return Ok(def.start);
	};
	let next = if def.step > 0 {
		if value < def.min {
			Some(def.min)
		} else {
			value.checked_add(def.step).filter(|v| *v <= def.max)
		}
	} else if value > def.max {
		Some(def.max)
	} else {
		value.checked_add(def.step).filter(|v| *v >= def.min)
	};
	let next = match next {
		Some(v) => v,
		None if def.cycle => {
			if def.step > 0 {
				def.min
			} else {
				def.max
			}
		}
		None => {
			return Err(anyhow::Error::new(Error::SequenceOverflow {
				name: def.name.clone(),
			}))
		}
	};
	debug_assert!(next >= def.min && next <= def.max);
	Ok(next)
}
