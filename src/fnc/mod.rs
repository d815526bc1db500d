//! Executes the sequence functions on behalf of a user.

pub mod sequence;
