//! Shared domain types for Countersign.
//!
//! This crate contains the core domain types of the procurement approval
//! workflow: ProcurementOrder with its embedded signer chain, UpdateProposal
//! with its typed changeset, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod changeset;
pub mod error;
pub mod identity;
pub mod order;
pub mod proposal;
