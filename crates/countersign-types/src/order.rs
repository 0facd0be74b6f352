//! Procurement order aggregate and its embedded signer chain.
//!
//! The signer list is fixed when the order is issued and embedded in the
//! order document. Whose turn it is to sign is always derived by scanning
//! for the lowest unsigned sequence position -- the running signature count
//! is only a completion check, never the source of truth for turn identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::identity::{CompanyId, EmployeeId, Role, SupplierId};

/// Unique identifier for a procurement order, wrapping a UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Create a new OrderId using UUID v7 (time-sortable).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Workflow state of a procurement order.
///
/// - Pending: signatures are being collected
/// - PendingUpdate: an amendment proposal is awaiting an admin decision
/// - Completed: every signer has signed and the order is approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PendingUpdate,
    Completed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::PendingUpdate => write!(f, "pending_update"),
            OrderStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "pending_update" => Ok(OrderStatus::PendingUpdate),
            "completed" => Ok(OrderStatus::Completed),
            other => Err(format!("invalid order status: '{other}'")),
        }
    }
}

/// Internal approval state of a procurement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::PendingApproval => write!(f, "pending_approval"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_approval" => Ok(ApprovalStatus::PendingApproval),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("invalid approval status: '{other}'")),
        }
    }
}

/// One product line on a procurement order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
}

impl ProductLine {
    /// Recompute the line total from unit price and quantity.
    pub fn recompute_total(&mut self) {
        self.line_total = self.unit_price * f64::from(self.quantity);
    }
}

/// A party required to sign the order, at a fixed position in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    pub employee_id: EmployeeId,
    pub name: String,
    pub role: Role,
    /// Zero-based position in the signing chain. Unique per order.
    pub sequence_position: u32,
    pub has_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    /// Blob URL of the stored signature image, set once the signer signs.
    pub signature_ref: Option<String>,
}

impl Signer {
    /// Create an unsigned signer at the given chain position.
    pub fn new(employee_id: EmployeeId, name: &str, role: Role, sequence_position: u32) -> Self {
        Self {
            employee_id,
            name: name.to_string(),
            role,
            sequence_position,
            has_signed: false,
            signed_at: None,
            signature_ref: None,
        }
    }
}

/// A procurement order awaiting turn-ordered signatures.
///
/// Invariants:
/// - `0 <= signature_count <= signers.len()`
/// - `status == Completed` iff every signer has signed and
///   `approval_status == Approved`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementOrder {
    pub id: OrderId,
    pub company_id: CompanyId,
    /// Purchase order number, unique per company.
    pub po_number: String,
    pub supplier_id: SupplierId,
    pub total_cost: f64,
    pub currency: String,
    pub products: Vec<ProductLine>,
    pub delivery_date: Option<DateTime<Utc>>,
    /// Free-text status note carried alongside the order record.
    pub status_note: Option<String>,
    /// Signing chain, fixed at creation, ordered by `sequence_position`.
    pub signers: Vec<Signer>,
    /// Number of signers who have signed. Derived completion check only.
    pub signature_count: u32,
    pub status: OrderStatus,
    pub approval_status: ApprovalStatus,
    /// Blob URL of the order summary document sent to the supplier.
    pub summary_document_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcurementOrder {
    /// The lowest sequence position that has not signed yet, or `None` when
    /// every signer has signed.
    ///
    /// This scan is the authoritative turn lookup. It stays correct even if
    /// signer positions are non-contiguous or the list is stored out of
    /// order.
    pub fn next_unsigned_position(&self) -> Option<u32> {
        self.signers
            .iter()
            .filter(|s| !s.has_signed)
            .map(|s| s.sequence_position)
            .min()
    }

    /// Whether every signer on the chain has signed.
    pub fn fully_signed(&self) -> bool {
        self.signature_count as usize == self.signers.len()
    }

    /// Look up a signer by employee id.
    pub fn signer(&self, employee_id: &EmployeeId) -> Option<&Signer> {
        self.signers.iter().find(|s| &s.employee_id == employee_id)
    }

    /// Mutable signer lookup by employee id.
    pub fn signer_mut(&mut self, employee_id: &EmployeeId) -> Option<&mut Signer> {
        self.signers
            .iter_mut()
            .find(|s| &s.employee_id == employee_id)
    }

    /// The status the signing progress alone implies: `Completed` once the
    /// chain is exhausted, `Pending` otherwise. Used to restore `status`
    /// when an amendment proposal is resolved.
    pub fn signing_derived_status(&self) -> OrderStatus {
        if self.fully_signed() {
            OrderStatus::Completed
        } else {
            OrderStatus::Pending
        }
    }
}

/// View returned to a signer after a successful signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedOrder {
    pub order: ProcurementOrder,
    pub signature_url: String,
}
