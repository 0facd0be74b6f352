//! Order repository trait definition.

use countersign_types::error::RepositoryError;
use countersign_types::identity::CompanyId;
use countersign_types::order::{OrderId, ProcurementOrder};

/// An order together with the storage version it was read at.
///
/// The version must be handed back to [`OrderRepository::save`] so the
/// write can be compare-and-swapped against concurrent mutations.
#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub order: ProcurementOrder,
    pub version: i64,
}

/// Repository trait for procurement order persistence.
///
/// Implementations live in countersign-infra (e.g., SqliteOrderRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait OrderRepository: Send + Sync {
    /// Insert a newly issued order at version 0.
    fn insert(
        &self,
        order: &ProcurementOrder,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load an order by id, with its current version.
    fn get(
        &self,
        id: &OrderId,
    ) -> impl std::future::Future<Output = Result<Option<StoredOrder>, RepositoryError>> + Send;

    /// Load an order by purchase order number within a company.
    fn get_by_po_number(
        &self,
        company_id: &CompanyId,
        po_number: &str,
    ) -> impl std::future::Future<Output = Result<Option<StoredOrder>, RepositoryError>> + Send;

    /// List all orders for a company, newest first.
    fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> impl std::future::Future<Output = Result<Vec<ProcurementOrder>, RepositoryError>> + Send;

    /// Compare-and-swap save: persists the order only if the stored version
    /// still equals `expected_version`. Returns the new version on success;
    /// fails with `RepositoryError::Conflict` when a concurrent writer won.
    fn save(
        &self,
        order: &ProcurementOrder,
        expected_version: i64,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}
