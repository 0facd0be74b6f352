//! Notification collaborator trait.

use serde::Serialize;

use countersign_types::error::NotifyError;

/// An outbound notification to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Email address or employee id, resolved by the delivery system.
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Outbound notification fan-out (email / in-app).
///
/// Workflows treat every send as best-effort: a failure is logged and the
/// surrounding operation still succeeds. Retry belongs to the delivery
/// system, not to the workflow.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        notification: &Notification,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}
