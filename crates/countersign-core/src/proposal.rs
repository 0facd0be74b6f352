//! Amendment proposal lifecycle: create, then approve or reject.
//!
//! A proposal is a shadow changeset against an issued order. Creating one
//! parks the order in `PendingUpdate`; a decision merges the changeset (on
//! approve) or leaves the order untouched (on reject), then removes the
//! proposal and fans out to the company's admins.
//!
//! The decision sequence is ordered so a crash can only leave the proposal
//! behind, never lose it, while two concurrent deciders can never both act:
//! the decider first claims the proposal row (a status compare-and-swap
//! that exactly one claimer wins), then compare-and-swaps the order, and
//! deletes the proposal last. Re-running a half-finished decision resumes
//! the recorded claim and re-merges the same changeset, which is
//! idempotent.

use chrono::Utc;
use tracing::{debug, info, warn};

use countersign_types::changeset::Changeset;
use countersign_types::error::{ProposalError, RepositoryError};
use countersign_types::identity::{CompanyId, EmployeeId};
use countersign_types::order::{OrderId, OrderStatus, ProcurementOrder};
use countersign_types::proposal::{
    Decision, DecisionOutcome, ProposalId, ProposalStatus, UpdateProposal,
};

use crate::external::directory::EmployeeDirectory;
use crate::external::notify::{Notification, Notifier};
use crate::repository::order::OrderRepository;
use crate::repository::proposal::ProposalRepository;
use crate::token::DecisionTokenSigner;

/// How many times a losing CAS writer re-runs read-validate-mutate before
/// giving up with `Conflict`.
const MAX_CAS_RETRIES: u32 = 3;

/// Creates and resolves amendment proposals against procurement orders.
pub struct ProposalWorkflow<O, P, N, D>
where
    O: OrderRepository,
    P: ProposalRepository,
    N: Notifier,
    D: EmployeeDirectory,
{
    orders: O,
    proposals: P,
    notifier: N,
    directory: D,
    tokens: DecisionTokenSigner,
    /// Public base URL the supplier decision link is built on.
    decision_link_base: String,
    token_ttl: chrono::Duration,
}

impl<O, P, N, D> ProposalWorkflow<O, P, N, D>
where
    O: OrderRepository,
    P: ProposalRepository,
    N: Notifier,
    D: EmployeeDirectory,
{
    pub fn new(
        orders: O,
        proposals: P,
        notifier: N,
        directory: D,
        tokens: DecisionTokenSigner,
        decision_link_base: String,
        token_ttl: chrono::Duration,
    ) -> Self {
        Self {
            orders,
            proposals,
            notifier,
            directory,
            tokens,
            decision_link_base,
            token_ttl,
        }
    }

    /// Create a pending amendment proposal against an order.
    ///
    /// The changeset is validated against the live order before anything is
    /// persisted. At most one proposal may be outstanding per order; the
    /// repository's uniqueness guarantee closes the race two concurrent
    /// creators would otherwise hit.
    pub async fn create_proposal(
        &self,
        order_id: &OrderId,
        changes: Changeset,
        proposed_by: &EmployeeId,
    ) -> Result<ProposalId, ProposalError> {
        let stored = self
            .orders
            .get(order_id)
            .await?
            .ok_or(ProposalError::OrderNotFound)?;

        if self
            .proposals
            .find_pending_for_order(order_id)
            .await?
            .is_some()
        {
            return Err(ProposalError::ProposalAlreadyPending);
        }

        changes.validate(&stored.order)?;

        let proposal = UpdateProposal::new(*order_id, changes, *proposed_by);
        match self.proposals.insert(&proposal).await {
            Ok(()) => {}
            // Lost the uniqueness race to a concurrent creator.
            Err(RepositoryError::Conflict(_)) => {
                return Err(ProposalError::ProposalAlreadyPending);
            }
            Err(err) => return Err(err.into()),
        }

        if let Err(err) = self.mark_order_pending_update(order_id).await {
            // Roll the proposal back so the failed create leaves nothing.
            if let Err(del_err) = self.proposals.delete(&proposal.id).await {
                warn!(proposal_id = %proposal.id, error = %del_err, "rollback delete failed");
            }
            return Err(err);
        }

        info!(
            proposal_id = %proposal.id,
            order_id = %order_id,
            "amendment proposal created"
        );
        self.notify_supplier_confirmation(&stored.order, &proposal)
            .await;

        Ok(proposal.id)
    }

    /// Resolve a proposal by id.
    pub async fn decide(
        &self,
        proposal_id: &ProposalId,
        decision: Decision,
    ) -> Result<DecisionOutcome, ProposalError> {
        let proposal = self
            .proposals
            .get(proposal_id)
            .await?
            .ok_or(ProposalError::ProposalNotFound)?;

        // Claim the proposal before touching the order. The status CAS
        // means exactly one of two concurrent deciders proceeds; the loser
        // never reaches the order, so a rejected proposal's changeset can
        // never be merged by a racing approver. A claim left behind by a
        // crashed decision is resumable, but only with the decision it
        // recorded.
        match proposal.status {
            ProposalStatus::PendingReview => {
                if !self.proposals.claim(&proposal.id, decision.into()).await? {
                    debug!(proposal_id = %proposal_id, "proposal claimed by a concurrent decider");
                    return Err(ProposalError::ProposalNotFound);
                }
            }
            recorded if recorded == ProposalStatus::from(decision) => {
                debug!(proposal_id = %proposal_id, "resuming a half-finished decision");
            }
            _ => return Err(ProposalError::ProposalNotFound),
        }

        let order = match self.resolve_order(&proposal, decision).await {
            Ok(order) => order,
            Err(err) => {
                // The order was not changed; put the proposal back up for
                // decision instead of leaving it claimed.
                if let Err(rel_err) = self.proposals.release(&proposal.id).await {
                    warn!(proposal_id = %proposal_id, error = %rel_err, "claim release failed");
                }
                return Err(err);
            }
        };

        // Deleting the proposal is the last mutating step, gated on the
        // order save having succeeded. If it fails the proposal stays
        // claimed and the decision can be retried; re-merging the same
        // changeset is idempotent.
        let deleted = self.proposals.delete(&proposal.id).await?;
        if !deleted {
            // A concurrent resumption of the same claim finished first;
            // its fan-out stands.
            debug!(proposal_id = %proposal_id, "proposal already resolved elsewhere");
            return Ok(DecisionOutcome { decision, order });
        }

        info!(
            proposal_id = %proposal_id,
            order_id = %order.id,
            decision = %decision,
            "proposal decided"
        );
        self.notify_admins(&order, decision).await;

        Ok(DecisionOutcome { decision, order })
    }

    /// Resolve a proposal on behalf of a session caller.
    ///
    /// The proposal's target order must belong to the caller's company; a
    /// proposal against another company's order is indistinguishable from a
    /// missing one, matching how order reads are scoped.
    pub async fn decide_for_company(
        &self,
        company_id: &CompanyId,
        proposal_id: &ProposalId,
        decision: Decision,
    ) -> Result<DecisionOutcome, ProposalError> {
        let proposal = self
            .proposals
            .get(proposal_id)
            .await?
            .ok_or(ProposalError::ProposalNotFound)?;

        let stored = self
            .orders
            .get(&proposal.order_id)
            .await?
            .ok_or(ProposalError::ProposalNotFound)?;
        if &stored.order.company_id != company_id {
            return Err(ProposalError::ProposalNotFound);
        }

        self.decide(proposal_id, decision).await
    }

    /// Resolve the pending proposal for a purchase order number.
    ///
    /// The decision trigger the supplier UI calls addresses proposals by PO
    /// number rather than proposal id.
    pub async fn decide_by_po_number(
        &self,
        company_id: &CompanyId,
        po_number: &str,
        decision: Decision,
    ) -> Result<DecisionOutcome, ProposalError> {
        let stored = self
            .orders
            .get_by_po_number(company_id, po_number)
            .await?
            .ok_or(ProposalError::OrderNotFound)?;

        let proposal = self
            .proposals
            .find_pending_for_order(&stored.order.id)
            .await?
            .ok_or(ProposalError::ProposalNotFound)?;

        self.decide(&proposal.id, decision).await
    }

    /// Resolve a proposal via a supplier decision link.
    ///
    /// The capability token is signed, time-limited, and single-use: once a
    /// proposal is decided it no longer exists, so a replayed token fails
    /// with `ProposalNotFound`.
    pub async fn decide_with_token(
        &self,
        token: &str,
        decision: Decision,
    ) -> Result<DecisionOutcome, ProposalError> {
        let proposal_id = self.tokens.verify(token, Utc::now())?;
        self.decide(&proposal_id, decision).await
    }

    /// CAS loop parking the order in `PendingUpdate`.
    async fn mark_order_pending_update(&self, order_id: &OrderId) -> Result<(), ProposalError> {
        for attempt in 0..MAX_CAS_RETRIES {
            let stored = self
                .orders
                .get(order_id)
                .await?
                .ok_or(ProposalError::OrderNotFound)?;
            let mut order = stored.order;
            if order.status == OrderStatus::PendingUpdate {
                return Ok(());
            }
            order.status = OrderStatus::PendingUpdate;
            order.updated_at = Utc::now();

            match self.orders.save(&order, stored.version).await {
                Ok(_) => return Ok(()),
                Err(RepositoryError::Conflict(_)) => {
                    debug!(order_id = %order_id, attempt, "lost pending-update save race, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ProposalError::Conflict)
    }

    /// CAS loop applying the decision to the order.
    ///
    /// Approve merges the changeset (only the fields present) and restores
    /// `status` to the signing-derived state unless the changeset sets it
    /// explicitly. Reject restores `status` only; every other field is
    /// untouched.
    async fn resolve_order(
        &self,
        proposal: &UpdateProposal,
        decision: Decision,
    ) -> Result<ProcurementOrder, ProposalError> {
        for attempt in 0..MAX_CAS_RETRIES {
            let stored = self
                .orders
                .get(&proposal.order_id)
                .await?
                .ok_or(ProposalError::OrderNotFound)?;
            let mut order = stored.order;

            match decision {
                Decision::Approve => {
                    // Re-validate at approval time; the order may have
                    // drifted since the proposal was created.
                    proposal.changes.apply(&mut order)?;
                    if !proposal.changes.sets_status() {
                        order.status = order.signing_derived_status();
                    }
                }
                Decision::Reject => {
                    let restored = order.signing_derived_status();
                    if order.status == restored {
                        return Ok(order);
                    }
                    order.status = restored;
                }
            }
            order.updated_at = Utc::now();

            match self.orders.save(&order, stored.version).await {
                Ok(_) => return Ok(order),
                Err(RepositoryError::Conflict(_)) => {
                    debug!(order_id = %proposal.order_id, attempt, "lost decision save race, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ProposalError::Conflict)
    }

    /// Best-effort supplier confirmation request carrying the decision link.
    async fn notify_supplier_confirmation(
        &self,
        order: &ProcurementOrder,
        proposal: &UpdateProposal,
    ) {
        let contact = match self.directory.supplier_contact(&order.supplier_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(supplier = %order.supplier_id, "no supplier contact for update confirmation");
                return;
            }
            Err(err) => {
                warn!(supplier = %order.supplier_id, error = %err, "supplier lookup failed");
                return;
            }
        };

        let token = self.tokens.issue(&proposal.id, self.token_ttl, Utc::now());
        let link = format!(
            "{}/api/v1/proposals/decision?token={token}",
            self.decision_link_base
        );
        let notification = Notification {
            recipient: contact.email,
            subject: format!("Update requested for purchase order {}", order.po_number),
            body: format!(
                "{}, an update to purchase order {} has been requested and needs \
                 your confirmation. Review and decide here: {link}",
                contact.name, order.po_number,
            ),
        };

        if let Err(err) = self.notifier.send(&notification).await {
            warn!(order_id = %order.id, error = %err, "supplier confirmation notification failed");
        }
    }

    /// Best-effort fan-out to every company admin after a decision.
    async fn notify_admins(&self, order: &ProcurementOrder, decision: Decision) {
        let admins = match self.directory.admins(&order.company_id).await {
            Ok(admins) => admins,
            Err(err) => {
                warn!(company = %order.company_id, error = %err, "admin lookup failed");
                return;
            }
        };

        let verdict = match decision {
            Decision::Approve => "approved",
            Decision::Reject => "rejected",
        };
        for admin in admins {
            let notification = Notification {
                recipient: admin.email.clone(),
                subject: format!("Purchase order {} update {verdict}", order.po_number),
                body: format!(
                    "The update request for purchase order {} was {verdict}.",
                    order.po_number,
                ),
            };
            if let Err(err) = self.notifier.send(&notification).await {
                warn!(recipient = %notification.recipient, error = %err, "admin notification failed");
            }
        }
    }
}
