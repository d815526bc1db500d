use std::fmt;

use crate::catalog::UserId;
use crate::iam::Privilege;

/// The per-session slot under which a user's object privileges are cached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct AuthToken(pub u8);

impl AuthToken {
	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct Principal {
	pub uid: UserId,
	pub name: String,
	pub auth_token: AuthToken,
	/// Privileges held on every object
	pub universal: Privilege,
}

impl Principal {
	pub fn new(uid: impl Into<UserId>, name: &str, auth_token: AuthToken) -> Self {
		Self {
			uid: uid.into(),
			name: name.to_string(),
			auth_token,
			universal: Privilege::USAGE | Privilege::SESSION,
		}
	}

	/// A principal holding every privilege on every object
	pub fn admin(uid: impl Into<UserId>, name: &str) -> Self {
		Self {
			universal: Privilege::all(),
			..Self::new(uid, name, AuthToken::default())
		}
	}

	pub fn with_universal(mut self, universal: Privilege) -> Self {
		self.universal = universal;
		self
	}
}

impl fmt::Display for Principal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.name)
	}
}
