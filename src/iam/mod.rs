use thiserror::Error;

pub mod check;
pub mod entities;

pub use self::check::*;
pub use self::entities::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	#[error("{privilege} access to {object_type} '{object}' is denied for user '{user}'")]
	AccessDenied {
		privilege: String,
		object_type: String,
		object: String,
		user: String,
	},
}

impl From<Error> for String {
	fn from(e: Error) -> String {
		e.to_string()
	}
}
