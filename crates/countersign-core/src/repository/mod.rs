//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (countersign-infra) implements. The core crate never depends on any
//! specific storage technology.
//!
//! Mutating saves are compare-and-swap: callers pass the version they read,
//! and a stale version fails with `RepositoryError::Conflict`. That is the
//! serialization point for concurrent writers on the same aggregate.

pub mod order;
pub mod proposal;
