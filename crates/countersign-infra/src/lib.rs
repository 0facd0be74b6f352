//! Infrastructure layer for Countersign.
//!
//! Contains implementations of the repository and collaborator traits
//! defined in `countersign-core`: SQLite storage (orders, proposals,
//! sessions, directory), a filesystem blob store for signature images, and
//! webhook notification delivery.

pub mod blob;
pub mod config;
pub mod notify;
pub mod sqlite;
