use core::fmt;

use thiserror::Error;

use crate::iam::Error as IamError;

/// An error originating from the sequence value store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The store encountered unreachable logic
	#[error("The database encountered unreachable logic: {0}")]
	Unreachable(String),

	/// An allocator could not provide the memory for an object
	#[error("Failed to allocate {size} bytes in {allocator} for {object}")]
	OutOfMemory {
		size: usize,
		allocator: &'static str,
		object: &'static str,
	},

	/// A sequence without cycling stepped past its bounds
	#[error("Sequence '{name}' has overflowed")]
	SequenceOverflow {
		name: String,
	},

	/// The definition of a sequence breaks its own bounds
	#[error("Invalid sequence definition for '{name}': {message}")]
	InvalidSequence {
		name: String,
		message: String,
	},

	/// A sequence snapshot tuple could not be decoded
	#[error("Invalid sequence snapshot data: {0}")]
	InvalidSnapshot(String),

	/// Represents an underlying IAM error
	#[error("IAM error: {0}")]
	IamError(#[from] IamError),
}

impl Error {
	#[track_caller]
	pub fn unreachable<T: fmt::Display>(message: T) -> Error {
		let location = std::panic::Location::caller();
		let message = format!("{}:{}: {}", location.file(), location.line(), message);
		Error::Unreachable(message)
	}

	/// Check if this error was caused by the allocator running out of memory
	pub fn is_out_of_memory(&self) -> bool {
		matches!(self, Error::OutOfMemory { .. })
	}
}
