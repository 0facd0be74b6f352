//! Amendment proposals against an issued procurement order.
//!
//! A proposal is transient intent: it is removed from storage when it is
//! decided, and at most one may be outstanding per order at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::changeset::Changeset;
use crate::identity::EmployeeId;
use crate::order::{OrderId, ProcurementOrder};

/// Unique identifier for an update proposal, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    /// Create a new ProposalId using UUID v7 (time-sortable).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProposalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Review state of a proposal. Rows are inserted as `PendingReview`; a
/// decider first moves the row to the decided status to claim it, then
/// deletes it once the outcome has been applied to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    PendingReview,
    Approved,
    Rejected,
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::PendingReview => write!(f, "pending_review"),
            ProposalStatus::Approved => write!(f, "approved"),
            ProposalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ProposalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_review" => Ok(ProposalStatus::PendingReview),
            "approved" => Ok(ProposalStatus::Approved),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(format!("invalid proposal status: '{other}'")),
        }
    }
}

/// A supplier- or employee-initiated request to amend an issued order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateProposal {
    pub id: ProposalId,
    pub order_id: OrderId,
    pub changes: Changeset,
    pub status: ProposalStatus,
    pub proposed_by: EmployeeId,
    pub created_at: DateTime<Utc>,
}

impl UpdateProposal {
    /// Create a pending proposal against an order.
    pub fn new(order_id: OrderId, changes: Changeset, proposed_by: EmployeeId) -> Self {
        Self {
            id: ProposalId::new(),
            order_id,
            changes,
            status: ProposalStatus::PendingReview,
            proposed_by,
            created_at: Utc::now(),
        }
    }
}

/// The decision taken on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(format!("decision must be 'approve' or 'reject', got '{other}'")),
        }
    }
}

impl From<Decision> for ProposalStatus {
    /// The status a decider records on the proposal row when claiming it.
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => ProposalStatus::Approved,
            Decision::Reject => ProposalStatus::Rejected,
        }
    }
}

/// Result of resolving a proposal: the decision taken and the order as it
/// stands afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub order: ProcurementOrder,
}
