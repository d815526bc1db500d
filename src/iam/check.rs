use crate::catalog::Sequence;
use crate::iam::{Error, Principal, Privilege};

/// The privileges needed to change the value of a sequence.
pub const SEQUENCE_ACCESS: Privilege = Privilege::READ.union(Privilege::WRITE);

/// The outcome of checking a principal against an object.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Access {
	Allowed,
	Denied(Denial),
}

/// Describes which privilege a principal is missing, and where.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Denial {
	pub privilege: Privilege,
	pub object_type: &'static str,
	pub object: String,
	pub user: String,
}

impl Access {
	pub fn is_allowed(&self) -> bool {
		matches!(self, Access::Allowed)
	}

	/// Converts a denial into the error reported to the caller
	pub fn into_result(self) -> Result<(), Error> {
		match self {
			Access::Allowed => Ok(()),
			Access::Denied(d) => {
				let err = Error::AccessDenied {
					privilege: d.privilege.to_string(),
					object_type: d.object_type.to_string(),
					object: d.object,
					user: d.user,
				};
				trace!("{}", err);
				Err(err)
			}
		}
	}
}

/// Checks whether a principal may change the value of a sequence.
///
/// Privileges held universally by the principal are never required on the
/// sequence itself. The owner of a sequence is always allowed, and any other
/// principal must have been granted the remaining privileges on the sequence
/// under its current authentication token.
pub fn check_sequence(seq: &Sequence, principal: &Principal) -> Access {
	let required = SEQUENCE_ACCESS.difference(principal.universal);
	// Universal grants cover everything which is needed
	if required.is_empty() {
		return Access::Allowed;
	}
	// The owner of a sequence needs no grants
	if seq.uid == principal.uid {
		return Access::Allowed;
	}
	// Every remaining privilege must be granted on the sequence
	if seq.access.effective(principal.auth_token).contains(required) {
		return Access::Allowed;
	}
	let denial = if principal.universal.contains(Privilege::USAGE) {
		Denial {
			privilege: SEQUENCE_ACCESS,
			object_type: "sequence",
			object: seq.name.clone(),
			user: principal.name.clone(),
		}
	} else {
		Denial {
			privilege: Privilege::USAGE,
			object_type: "universe",
			object: String::new(),
			user: principal.name.clone(),
		}
	};
	Access::Denied(denial)
}
