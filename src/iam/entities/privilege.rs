use std::fmt;

use bitflags::bitflags;

bitflags! {
	/// A set of privileges which can be granted to a user, either on a
	/// single object or universally across all objects.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct Privilege: u16 {
		const READ = 1;
		const WRITE = 1 << 1;
		const EXECUTE = 1 << 2;
		const SESSION = 1 << 3;
		const USAGE = 1 << 4;
		const CREATE = 1 << 5;
		const DROP = 1 << 6;
		const ALTER = 1 << 7;
	}
}

impl Default for Privilege {
	fn default() -> Self {
		Self::empty()
	}
}

impl fmt::Display for Privilege {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_empty() {
			return write!(f, "none");
		}
		for (i, (name, _)) in self.iter_names().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}", name.to_ascii_lowercase())?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display() {
		assert_eq!(Privilege::empty().to_string(), "none");
		assert_eq!(Privilege::USAGE.to_string(), "usage");
		assert_eq!((Privilege::READ | Privilege::WRITE).to_string(), "read, write");
	}
}
