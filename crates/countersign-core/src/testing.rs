//! In-memory fakes for workflow tests.
//!
//! These mirror the countersign-infra implementations closely enough to
//! exercise the workflows' contracts: version-checked saves, the one
//! pending proposal per order rule, and best-effort collaborators whose
//! failures can be forced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use countersign_types::error::{BlobError, NotifyError, RepositoryError};
use countersign_types::identity::{CompanyId, Contact, EmployeeId, Role, SupplierId};
use countersign_types::order::{
    ApprovalStatus, OrderId, OrderStatus, ProcurementOrder, ProductLine, Signer,
};
use countersign_types::proposal::{ProposalId, ProposalStatus, UpdateProposal};

use crate::external::blob::BlobStore;
use crate::external::directory::EmployeeDirectory;
use crate::external::notify::{Notification, Notifier};
use crate::repository::order::{OrderRepository, StoredOrder};
use crate::repository::proposal::ProposalRepository;

/// Build a pending order with `n` signers at positions `0..n`.
pub fn make_order(n: u32) -> ProcurementOrder {
    let now = Utc::now();
    let signers = (0..n)
        .map(|i| Signer::new(EmployeeId::new(), &format!("signer-{i}"), Role::Employee, i))
        .collect();
    ProcurementOrder {
        id: OrderId::new(),
        company_id: CompanyId::new(),
        po_number: "PO-1001".to_string(),
        supplier_id: SupplierId::new(),
        total_cost: 500.0,
        currency: "USD".to_string(),
        products: vec![ProductLine {
            product_id: uuid::Uuid::now_v7(),
            name: "Widget".to_string(),
            sku: "W-1".to_string(),
            unit_price: 5.0,
            quantity: 100,
            line_total: 500.0,
        }],
        delivery_date: None,
        status_note: None,
        signers,
        signature_count: 0,
        status: OrderStatus::Pending,
        approval_status: ApprovalStatus::PendingApproval,
        summary_document_ref: Some("mem://documents/summary.pdf".to_string()),
        created_at: now,
        updated_at: now,
    }
}

/// Version-checked in-memory order store.
#[derive(Clone, Default)]
pub struct MemoryOrders {
    inner: Arc<Mutex<HashMap<OrderId, (ProcurementOrder, i64)>>>,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(order: ProcurementOrder) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .unwrap()
            .insert(order.id, (order, 0));
        store
    }
}

impl OrderRepository for MemoryOrders {
    async fn insert(&self, order: &ProcurementOrder) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("order already exists".into()));
        }
        inner.insert(order.id, (order.clone(), 0));
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> Result<Option<StoredOrder>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .get(id)
            .map(|(order, version)| StoredOrder {
                order: order.clone(),
                version: *version,
            }))
    }

    async fn get_by_po_number(
        &self,
        company_id: &CompanyId,
        po_number: &str,
    ) -> Result<Option<StoredOrder>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .find(|(order, _)| &order.company_id == company_id && order.po_number == po_number)
            .map(|(order, version)| StoredOrder {
                order: order.clone(),
                version: *version,
            }))
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ProcurementOrder>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|(order, _)| &order.company_id == company_id)
            .map(|(order, _)| order.clone())
            .collect())
    }

    async fn save(
        &self,
        order: &ProcurementOrder,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let (stored, version) = inner
            .get_mut(&order.id)
            .ok_or(RepositoryError::NotFound)?;
        if *version != expected_version {
            return Err(RepositoryError::Conflict(format!(
                "version {expected_version} is stale, stored is {version}"
            )));
        }
        *stored = order.clone();
        *version += 1;
        Ok(*version)
    }
}

/// In-memory proposal store enforcing one pending proposal per order.
#[derive(Clone, Default)]
pub struct MemoryProposals {
    inner: Arc<Mutex<HashMap<ProposalId, UpdateProposal>>>,
    fail_next_delete: Arc<AtomicBool>,
}

impl MemoryProposals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_delete(&self) {
        self.fail_next_delete.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl ProposalRepository for MemoryProposals {
    async fn insert(&self, proposal: &UpdateProposal) -> Result<(), RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        // One row per order, claimed or not, until a decision fully lands.
        if inner.values().any(|p| p.order_id == proposal.order_id) {
            return Err(RepositoryError::Conflict(
                "proposal exists for order".into(),
            ));
        }
        inner.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get(&self, id: &ProposalId) -> Result<Option<UpdateProposal>, RepositoryError> {
        Ok(self.inner.lock().unwrap().get(id).cloned())
    }

    async fn find_pending_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<UpdateProposal>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .find(|p| &p.order_id == order_id && p.status == ProposalStatus::PendingReview)
            .cloned())
    }

    async fn claim(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
    ) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(id) {
            Some(p) if p.status == ProposalStatus::PendingReview => {
                p.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: &ProposalId) -> Result<(), RepositoryError> {
        if let Some(p) = self.inner.lock().unwrap().get_mut(id) {
            p.status = ProposalStatus::PendingReview;
        }
        Ok(())
    }

    async fn delete(&self, id: &ProposalId) -> Result<bool, RepositoryError> {
        if self.fail_next_delete.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Query("forced delete failure".into()));
        }
        Ok(self.inner.lock().unwrap().remove(id).is_some())
    }
}

/// Blob store fake with forced-failure support.
#[derive(Clone, Default)]
pub struct MemoryBlobs {
    stored: Arc<Mutex<Vec<String>>>,
    counter: Arc<AtomicU64>,
    fail_next_store: Arc<AtomicBool>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_store(&self) {
        self.fail_next_store.store(true, Ordering::SeqCst);
    }

    pub fn stored_urls(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

impl BlobStore for MemoryBlobs {
    async fn store(&self, _bytes: &[u8], folder_hint: &str) -> Result<String, BlobError> {
        if self.fail_next_store.swap(false, Ordering::SeqCst) {
            return Err(BlobError::Io("forced store failure".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let url = format!("mem://{folder_hint}/{n}");
        self.stored.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), BlobError> {
        self.stored.lock().unwrap().retain(|u| u != url);
        Ok(())
    }
}

/// Notifier fake recording every send.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("forced notifier failure".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Directory fake with a fixed admin list and supplier contact.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    pub admins: Vec<Contact>,
    pub supplier: Option<Contact>,
}

impl StaticDirectory {
    /// Two admins and a supplier contact -- the common fixture.
    pub fn with_supplier() -> Self {
        Self {
            admins: vec![
                Contact {
                    name: "Admin One".to_string(),
                    email: "admin1@example.com".to_string(),
                },
                Contact {
                    name: "Admin Two".to_string(),
                    email: "admin2@example.com".to_string(),
                },
            ],
            supplier: Some(Contact {
                name: "Acme Supply".to_string(),
                email: "orders@acme.example.com".to_string(),
            }),
        }
    }
}

impl EmployeeDirectory for StaticDirectory {
    async fn admins(&self, _company_id: &CompanyId) -> Result<Vec<Contact>, RepositoryError> {
        Ok(self.admins.clone())
    }

    async fn supplier_contact(
        &self,
        _supplier_id: &SupplierId,
    ) -> Result<Option<Contact>, RepositoryError> {
        Ok(self.supplier.clone())
    }
}
