use std::ops::Deref;

use anyhow::Result;

use crate::catalog::{SequenceId, UserId};
use crate::cnf::AUTH_TOKEN_MAX;
use crate::err::Error;
use crate::iam::{AuthToken, Privilege};

/// The stored definition of a sequence, as owned by the schema.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SequenceDefinition {
	pub id: SequenceId,
	pub name: String,
	/// The user which owns this sequence
	pub uid: UserId,
	/// The first value returned by a sequence without a current value
	pub start: i64,
	pub min: i64,
	pub max: i64,
	/// The increment applied on every step, the sign sets the direction
	pub step: i64,
	/// Whether the sequence wraps to its opposite bound instead of overflowing
	pub cycle: bool,
}

impl SequenceDefinition {
	/// Creates an ascending sequence over all positive values
	pub fn new(id: impl Into<SequenceId>, name: &str, uid: impl Into<UserId>) -> Self {
		Self {
			id: id.into(),
			name: name.to_string(),
			uid: uid.into(),
			start: 1,
			min: 1,
			max: i64::MAX,
			step: 1,
			cycle: false,
		}
	}

	/// Check whether this sequence steps towards larger values
	pub fn is_ascending(&self) -> bool {
		self.step > 0
	}

	/// Ensures the bounds and the step of this definition are consistent
	pub fn validate(&self) -> Result<()> {
		let message = if self.step == 0 {
			"the step can not be zero".to_string()
		} else if self.min > self.max {
			format!("the minimum {} is greater than the maximum {}", self.min, self.max)
		} else if self.start < self.min || self.start > self.max {
			format!("the start {} is outside of the range {}..={}", self.start, self.min, self.max)
		} else {
			return Ok(());
		};
		Err(anyhow::Error::new(Error::InvalidSequence {
			name: self.name.clone(),
			message,
		}))
	}
}

/// The effective privileges granted on a sequence, by authentication token.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SequenceAccess {
	effective: [Privilege; AUTH_TOKEN_MAX],
}

impl SequenceAccess {
	/// Adds privileges for the user holding this token
	pub fn grant(&mut self, token: AuthToken, privileges: Privilege) {
		if let Some(v) = self.effective.get_mut(token.index()) {
			v.insert(privileges);
		}
	}

	/// Removes privileges from the user holding this token
	pub fn revoke(&mut self, token: AuthToken, privileges: Privilege) {
		if let Some(v) = self.effective.get_mut(token.index()) {
			v.remove(privileges);
		}
	}

	/// Returns the privileges held by this token
	pub fn effective(&self, token: AuthToken) -> Privilege {
		self.effective.get(token.index()).copied().unwrap_or_default()
	}
}

/// A sequence definition together with the privileges granted on it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sequence {
	def: SequenceDefinition,
	pub access: SequenceAccess,
}

impl Sequence {
	pub fn new(def: SequenceDefinition) -> Result<Self> {
		def.validate()?;
		Ok(Self {
			def,
			access: SequenceAccess::default(),
		})
	}

	pub fn def(&self) -> &SequenceDefinition {
		&self.def
	}
}

impl Deref for Sequence {
	type Target = SequenceDefinition;
	fn deref(&self) -> &Self::Target {
		&self.def
	}
}
