//! Proposal repository trait definition.

use countersign_types::error::RepositoryError;
use countersign_types::order::OrderId;
use countersign_types::proposal::{ProposalId, ProposalStatus, UpdateProposal};

/// Repository trait for update proposal persistence.
///
/// Proposals are transient intent: they are inserted pending, claimed by
/// the decider that resolves them, and deleted once the decision has been
/// applied. Implementations must reject a second proposal for the same
/// order with `RepositoryError::Conflict` while any row for that order
/// still exists (the SQLite implementation backs this with a unique index
/// on `order_id`).
pub trait ProposalRepository: Send + Sync {
    /// Insert a pending proposal. Fails with `Conflict` when a proposal
    /// already exists for the same order.
    fn insert(
        &self,
        proposal: &UpdateProposal,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a proposal by id.
    fn get(
        &self,
        id: &ProposalId,
    ) -> impl std::future::Future<Output = Result<Option<UpdateProposal>, RepositoryError>> + Send;

    /// The pending proposal for an order, if one exists.
    fn find_pending_for_order(
        &self,
        order_id: &OrderId,
    ) -> impl std::future::Future<Output = Result<Option<UpdateProposal>, RepositoryError>> + Send;

    /// Atomically move a proposal from `PendingReview` to the given decided
    /// status, claiming it for a single decider. Returns `false` when the
    /// proposal is gone or was already claimed; exactly one of any number
    /// of concurrent claimers sees `true`.
    fn claim(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Return a claimed proposal to `PendingReview` after a decision that
    /// failed before touching the order.
    fn release(
        &self,
        id: &ProposalId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a proposal. Idempotent: returns `false` when the proposal was
    /// already gone, which a retried decision treats as success.
    fn delete(
        &self,
        id: &ProposalId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
