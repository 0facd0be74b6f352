//! Workflow logic and trait definitions for Countersign.
//!
//! This crate defines the "ports" (repository and collaborator traits) that
//! the infrastructure layer implements, plus the two workflow services that
//! make up the procurement approval core: [`signing::SigningWorkflow`] and
//! [`proposal::ProposalWorkflow`]. It depends only on `countersign-types` --
//! never on `countersign-infra` or any database/IO crate.

pub mod external;
pub mod proposal;
pub mod repository;
pub mod signing;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;
