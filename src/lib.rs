//! # SurrealDB Sequences
//!
//! This crate holds the in-memory value store behind database sequences.
//! It keeps the current value of every sequence which has been used, steps
//! sequences within their configured bounds, guards mutation with an access
//! check, and streams the whole store as MessagePack tuples for snapshots.
//!
//! The definitions of sequences, the identity of the caller, and the writing
//! of snapshot files are owned by other subsystems, and only appear here as
//! the values passed into the store.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod catalog;
pub mod cnf;
pub mod err;
pub mod fnc;
pub mod iam;
pub mod idx;
pub mod kvs;
pub mod mem;
