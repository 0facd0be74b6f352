//! SQLite order repository implementation.
//!
//! Implements `OrderRepository` from `countersign-core` using sqlx with
//! split read/write pools. The signer chain and product lines are stored as
//! JSON columns; the order row is a self-contained document. Saves are
//! compare-and-swap on the `version` column.

use sqlx::Row;

use countersign_core::repository::order::{OrderRepository, StoredOrder};
use countersign_types::error::RepositoryError;
use countersign_types::identity::CompanyId;
use countersign_types::order::{
    ApprovalStatus, OrderId, OrderStatus, ProcurementOrder, ProductLine, Signer,
};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `OrderRepository`.
pub struct SqliteOrderRepository {
    pool: DatabasePool,
}

impl SqliteOrderRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to the domain order.
struct OrderRow {
    id: String,
    company_id: String,
    po_number: String,
    supplier_id: String,
    total_cost: f64,
    currency: String,
    products: String,
    delivery_date: Option<String>,
    status_note: Option<String>,
    signers: String,
    signature_count: i64,
    status: String,
    approval_status: String,
    summary_document_ref: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            company_id: row.try_get("company_id")?,
            po_number: row.try_get("po_number")?,
            supplier_id: row.try_get("supplier_id")?,
            total_cost: row.try_get("total_cost")?,
            currency: row.try_get("currency")?,
            products: row.try_get("products")?,
            delivery_date: row.try_get("delivery_date")?,
            status_note: row.try_get("status_note")?,
            signers: row.try_get("signers")?,
            signature_count: row.try_get("signature_count")?,
            status: row.try_get("status")?,
            approval_status: row.try_get("approval_status")?,
            summary_document_ref: row.try_get("summary_document_ref")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_stored(self) -> Result<StoredOrder, RepositoryError> {
        let id = self
            .id
            .parse::<OrderId>()
            .map_err(|e| RepositoryError::Query(format!("invalid order id: {e}")))?;
        let company_id = self
            .company_id
            .parse::<CompanyId>()
            .map_err(|e| RepositoryError::Query(format!("invalid company id: {e}")))?;
        let supplier_id = self
            .supplier_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid supplier id: {e}")))?;

        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let approval_status: ApprovalStatus = self
            .approval_status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let products: Vec<ProductLine> = serde_json::from_str(&self.products)
            .map_err(|e| RepositoryError::Query(format!("invalid products JSON: {e}")))?;
        let signers: Vec<Signer> = serde_json::from_str(&self.signers)
            .map_err(|e| RepositoryError::Query(format!("invalid signers JSON: {e}")))?;

        let delivery_date = self
            .delivery_date
            .as_deref()
            .map(parse_datetime)
            .transpose()?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        let order = ProcurementOrder {
            id,
            company_id,
            po_number: self.po_number,
            supplier_id,
            total_cost: self.total_cost,
            currency: self.currency,
            products,
            delivery_date,
            status_note: self.status_note,
            signers,
            signature_count: self.signature_count as u32,
            status,
            approval_status,
            summary_document_ref: self.summary_document_ref,
            created_at,
            updated_at,
        };
        Ok(StoredOrder {
            order,
            version: self.version,
        })
    }
}

impl OrderRepository for SqliteOrderRepository {
    async fn insert(&self, order: &ProcurementOrder) -> Result<(), RepositoryError> {
        let products_json = serde_json::to_string(&order.products)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let signers_json = serde_json::to_string(&order.signers)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO orders (id, company_id, po_number, supplier_id, total_cost, currency, products, delivery_date, status_note, signers, signature_count, status, approval_status, summary_document_ref, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(order.company_id.to_string())
        .bind(&order.po_number)
        .bind(order.supplier_id.to_string())
        .bind(order.total_cost)
        .bind(&order.currency)
        .bind(&products_json)
        .bind(order.delivery_date.as_ref().map(format_datetime))
        .bind(&order.status_note)
        .bind(&signers_json)
        .bind(order.signature_count as i64)
        .bind(order.status.to_string())
        .bind(order.approval_status.to_string())
        .bind(&order.summary_document_ref)
        .bind(format_datetime(&order.created_at))
        .bind(format_datetime(&order.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "purchase order '{}' already exists for company",
                    order.po_number
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, id: &OrderId) -> Result<Option<StoredOrder>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let order_row =
                    OrderRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(order_row.into_stored()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_po_number(
        &self,
        company_id: &CompanyId,
        po_number: &str,
    ) -> Result<Option<StoredOrder>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM orders WHERE company_id = ? AND po_number = ?")
            .bind(company_id.to_string())
            .bind(po_number)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let order_row =
                    OrderRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(order_row.into_stored()?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Vec<ProcurementOrder>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM orders WHERE company_id = ? ORDER BY created_at DESC")
            .bind(company_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let order_row =
                OrderRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            orders.push(order_row.into_stored()?.order);
        }
        Ok(orders)
    }

    async fn save(
        &self,
        order: &ProcurementOrder,
        expected_version: i64,
    ) -> Result<i64, RepositoryError> {
        let products_json = serde_json::to_string(&order.products)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let signers_json = serde_json::to_string(&order.signers)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE orders SET total_cost = ?, currency = ?, products = ?, delivery_date = ?, status_note = ?, signers = ?, signature_count = ?, status = ?, approval_status = ?, summary_document_ref = ?, version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(order.total_cost)
        .bind(&order.currency)
        .bind(&products_json)
        .bind(order.delivery_date.as_ref().map(format_datetime))
        .bind(&order.status_note)
        .bind(&signers_json)
        .bind(order.signature_count as i64)
        .bind(order.status.to_string())
        .bind(order.approval_status.to_string())
        .bind(&order.summary_document_ref)
        .bind(format_datetime(&order.updated_at))
        .bind(order.id.to_string())
        .bind(expected_version)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Distinguish a stale version from a deleted row.
            let exists: Option<(i64,)> = sqlx::query_as("SELECT version FROM orders WHERE id = ?")
                .bind(order.id.to_string())
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            return match exists {
                Some((stored,)) => Err(RepositoryError::Conflict(format!(
                    "version {expected_version} is stale, stored is {stored}"
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }

        Ok(expected_version + 1)
    }
}
