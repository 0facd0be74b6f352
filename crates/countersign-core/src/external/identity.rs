//! Session verification collaborator trait.

use countersign_types::error::AuthError;
use countersign_types::identity::Caller;

/// Verifies a caller's session token and yields their identity.
///
/// Session issuance (login) is owned by the surrounding system; this
/// subsystem only consumes verification.
pub trait IdentityProvider: Send + Sync {
    fn verify(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Caller, AuthError>> + Send;
}
