//! External collaborator trait definitions.
//!
//! The workflow core consumes, but does not implement, four collaborators
//! owned by the surrounding system: blob storage for signature images and
//! summary documents, outbound notification fan-out, session verification,
//! and a read-only directory of employees and suppliers.

pub mod blob;
pub mod directory;
pub mod identity;
pub mod notify;
