//! Read-only employee/supplier directory backed by the ERP tables.

use sqlx::Row;

use countersign_core::external::directory::EmployeeDirectory;
use countersign_types::error::RepositoryError;
use countersign_types::identity::{CompanyId, Contact, Role, SupplierId};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `EmployeeDirectory`.
pub struct SqliteEmployeeDirectory {
    pool: DatabasePool,
}

impl SqliteEmployeeDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn contact_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Contact, RepositoryError> {
    Ok(Contact {
        name: row
            .try_get("name")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        email: row
            .try_get("email")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
    })
}

impl EmployeeDirectory for SqliteEmployeeDirectory {
    async fn admins(&self, company_id: &CompanyId) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name, email FROM employees WHERE company_id = ? AND role = ? ORDER BY name",
        )
        .bind(company_id.to_string())
        .bind(Role::Admin.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(contact_from_row).collect()
    }

    async fn supplier_contact(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query("SELECT name, email FROM suppliers WHERE id = ?")
            .bind(supplier_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(contact_from_row).transpose()
    }
}
