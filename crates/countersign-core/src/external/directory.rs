//! Employee/supplier directory collaborator trait.

use countersign_types::error::RepositoryError;
use countersign_types::identity::{CompanyId, Contact, SupplierId};

/// Read-only view of the surrounding ERP's people records, used to resolve
/// notification recipients. Employee and supplier CRUD stays external.
pub trait EmployeeDirectory: Send + Sync {
    /// All employees with the Admin role in a company.
    fn admins(
        &self,
        company_id: &CompanyId,
    ) -> impl std::future::Future<Output = Result<Vec<Contact>, RepositoryError>> + Send;

    /// The notification contact for a supplier, if known.
    fn supplier_contact(
        &self,
        supplier_id: &SupplierId,
    ) -> impl std::future::Future<Output = Result<Option<Contact>, RepositoryError>> + Send;
}
