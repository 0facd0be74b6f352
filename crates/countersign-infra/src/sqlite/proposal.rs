//! SQLite proposal repository implementation.
//!
//! Proposals live in this table from insertion until the decision that
//! resolves them is fully applied; the decider claims the row by moving its
//! status off `pending_review`, then deletes it. The unique index on
//! `order_id` enforces the one outstanding proposal per order rule at the
//! storage layer for claimed and unclaimed rows alike.

use sqlx::Row;

use countersign_core::repository::proposal::ProposalRepository;
use countersign_types::changeset::Changeset;
use countersign_types::error::RepositoryError;
use countersign_types::order::OrderId;
use countersign_types::proposal::{ProposalId, ProposalStatus, UpdateProposal};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `ProposalRepository`.
pub struct SqliteProposalRepository {
    pool: DatabasePool,
}

impl SqliteProposalRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn proposal_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UpdateProposal, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let order_id: String = row
        .try_get("order_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let changes: String = row
        .try_get("changes")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let proposed_by: String = row
        .try_get("proposed_by")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    let changes: Changeset = serde_json::from_str(&changes)
        .map_err(|e| RepositoryError::Query(format!("invalid changeset JSON: {e}")))?;

    Ok(UpdateProposal {
        id: id
            .parse::<ProposalId>()
            .map_err(|e| RepositoryError::Query(format!("invalid proposal id: {e}")))?,
        order_id: order_id
            .parse::<OrderId>()
            .map_err(|e| RepositoryError::Query(format!("invalid order id: {e}")))?,
        changes,
        status: status.parse().map_err(|e: String| RepositoryError::Query(e))?,
        proposed_by: proposed_by
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid employee id: {e}")))?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl ProposalRepository for SqliteProposalRepository {
    async fn insert(&self, proposal: &UpdateProposal) -> Result<(), RepositoryError> {
        let changes_json = serde_json::to_string(&proposal.changes)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO proposals (id, order_id, changes, status, proposed_by, version, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(proposal.id.to_string())
        .bind(proposal.order_id.to_string())
        .bind(&changes_json)
        .bind(proposal.status.to_string())
        .bind(proposal.proposed_by.to_string())
        .bind(format_datetime(&proposal.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "a pending proposal already exists for order {}",
                    proposal.order_id
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, id: &ProposalId) -> Result<Option<UpdateProposal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM proposals WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn find_pending_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<UpdateProposal>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM proposals WHERE order_id = ? AND status = ?")
            .bind(order_id.to_string())
            .bind(ProposalStatus::PendingReview.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn claim(
        &self,
        id: &ProposalId,
        status: ProposalStatus,
    ) -> Result<bool, RepositoryError> {
        // Single-statement status CAS: only a pending row can be claimed,
        // so exactly one concurrent decider sees a row update.
        let result = sqlx::query(
            "UPDATE proposals SET status = ?, version = version + 1
             WHERE id = ? AND status = ?",
        )
        .bind(status.to_string())
        .bind(id.to_string())
        .bind(ProposalStatus::PendingReview.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, id: &ProposalId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE proposals SET status = ?, version = version + 1
             WHERE id = ?",
        )
        .bind(ProposalStatus::PendingReview.to_string())
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: &ProposalId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM proposals WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::order::SqliteOrderRepository;
    use chrono::Utc;
    use countersign_core::repository::order::OrderRepository;
    use countersign_types::changeset::Amendment;
    use countersign_types::identity::{CompanyId, EmployeeId, Role, SupplierId};
    use countersign_types::order::{ApprovalStatus, OrderStatus, ProcurementOrder, Signer};

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    // Orders must exist first; proposals carry a foreign key to them.
    async fn seed_order(pool: &DatabasePool) -> OrderId {
        let now = Utc::now();
        let order = ProcurementOrder {
            id: OrderId::new(),
            company_id: CompanyId::new(),
            po_number: "PO-3001".to_string(),
            supplier_id: SupplierId::new(),
            total_cost: 50.0,
            currency: "USD".to_string(),
            products: Vec::new(),
            delivery_date: None,
            status_note: None,
            signers: vec![Signer::new(EmployeeId::new(), "First", Role::Manager, 0)],
            signature_count: 0,
            status: OrderStatus::Pending,
            approval_status: ApprovalStatus::PendingApproval,
            summary_document_ref: None,
            created_at: now,
            updated_at: now,
        };
        SqliteOrderRepository::new(pool.clone())
            .insert(&order)
            .await
            .unwrap();
        order.id
    }

    fn make_proposal(order_id: OrderId) -> UpdateProposal {
        let changes = Changeset::new(vec![Amendment::TotalCost(75.0)]).unwrap();
        UpdateProposal::new(order_id, changes, EmployeeId::new())
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);

        repo.insert(&proposal).await.unwrap();

        let found = repo.get(&proposal.id).await.unwrap().unwrap();
        assert_eq!(found.order_id, order_id);
        assert_eq!(found.changes, proposal.changes);
        assert_eq!(found.status, ProposalStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_second_pending_for_order_conflicts() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);

        repo.insert(&make_proposal(order_id)).await.unwrap();
        let err = repo.insert(&make_proposal(order_id)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_pending_for_order() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);
        repo.insert(&proposal).await.unwrap();

        let found = repo.find_pending_for_order(&order_id).await.unwrap().unwrap();
        assert_eq!(found.id, proposal.id);

        let none = repo.find_pending_for_order(&OrderId::new()).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);
        repo.insert(&proposal).await.unwrap();

        assert!(repo.delete(&proposal.id).await.unwrap());
        assert!(!repo.delete(&proposal.id).await.unwrap());
        assert!(repo.get(&proposal.id).await.unwrap().is_none());

        // The slot frees up once the pending proposal is gone.
        repo.insert(&make_proposal(order_id)).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_wins_exactly_once() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);
        repo.insert(&proposal).await.unwrap();

        assert!(repo
            .claim(&proposal.id, ProposalStatus::Rejected)
            .await
            .unwrap());
        // Already claimed; a second decider gets nothing.
        assert!(!repo
            .claim(&proposal.id, ProposalStatus::Approved)
            .await
            .unwrap());

        let claimed = repo.get(&proposal.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, ProposalStatus::Rejected);
        // A claimed row is no longer pending.
        assert!(repo
            .find_pending_for_order(&order_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_release_returns_claim_to_pending() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);
        repo.insert(&proposal).await.unwrap();

        assert!(repo
            .claim(&proposal.id, ProposalStatus::Approved)
            .await
            .unwrap());
        repo.release(&proposal.id).await.unwrap();

        let found = repo.find_pending_for_order(&order_id).await.unwrap().unwrap();
        assert_eq!(found.id, proposal.id);
        // Releasable again means claimable again.
        assert!(repo
            .claim(&proposal.id, ProposalStatus::Rejected)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_claimed_row_still_blocks_new_proposals() {
        let pool = test_pool().await;
        let order_id = seed_order(&pool).await;
        let repo = SqliteProposalRepository::new(pool);
        let proposal = make_proposal(order_id);
        repo.insert(&proposal).await.unwrap();
        assert!(repo
            .claim(&proposal.id, ProposalStatus::Approved)
            .await
            .unwrap());

        // The order's slot stays occupied until the decision lands.
        let err = repo.insert(&make_proposal(order_id)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
