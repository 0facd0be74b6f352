//! Amendment proposal handlers for the REST API.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use countersign_core::repository::order::OrderRepository;
use countersign_types::changeset::Changeset;
use countersign_types::error::ProposalError;
use countersign_types::proposal::{Decision, ProposalId};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthSession;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/orders/:id/proposals request body. The changes map carries
/// only the fields being amended, keyed by their wire names.
#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub changes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: String,
}

/// Query parameters of the supplier decision link.
#[derive(Debug, Deserialize)]
pub struct DecisionLinkQuery {
    pub token: String,
    pub decision: String,
}

fn parse_decision(raw: &str) -> Result<Decision, AppError> {
    raw.parse().map_err(AppError::Validation)
}

/// POST /api/v1/orders/:id/proposals - Create an update proposal.
pub async fn create_proposal(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(id): Path<String>,
    Json(body): Json<CreateProposalRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let order_id = id
        .parse()
        .map_err(|_| AppError::Proposal(ProposalError::OrderNotFound))?;

    // Scope the order to the caller's company before touching the workflow.
    state
        .orders
        .get(&order_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .filter(|s| s.order.company_id == caller.company_id)
        .ok_or(AppError::Proposal(ProposalError::OrderNotFound))?;

    let changes =
        Changeset::from_map(&body.changes).map_err(|e| AppError::Proposal(e.into()))?;
    let proposal_id = state
        .proposals
        .create_proposal(&order_id, changes, &caller.employee_id)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::json!({ "proposal_id": proposal_id });
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("decision", &format!("/api/v1/proposals/{proposal_id}/decision"))
        .with_link("order", &format!("/api/v1/orders/{order_id}"));

    Ok(Json(resp))
}

/// POST /api/v1/proposals/:id/decision - Approve or reject a proposal.
/// Scoped to the caller's company: a proposal against another company's
/// order looks identical to a missing one.
pub async fn decide(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(id): Path<String>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let proposal_id: ProposalId = id
        .parse()
        .map_err(|_| AppError::Proposal(ProposalError::ProposalNotFound))?;
    let decision = parse_decision(&body.decision)?;

    let outcome = state
        .proposals
        .decide_for_company(&caller.company_id, &proposal_id, decision)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&outcome)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("order", &format!("/api/v1/orders/{}", outcome.order.id));

    Ok(Json(resp))
}

/// POST /api/v1/proposals/decision?token=...&decision=... - Resolve a
/// proposal via a supplier decision link. The signed token is the
/// credential; no session is required.
pub async fn decide_with_token(
    State(state): State<AppState>,
    Query(query): Query<DecisionLinkQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let decision = parse_decision(&query.decision)?;
    let outcome = state
        .proposals
        .decide_with_token(&query.token, decision)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&outcome)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(data, request_id, elapsed)))
}

/// POST /api/v1/orders/by-number/:po_number/decision - Resolve the pending
/// proposal for a purchase order number within the caller's company.
pub async fn decide_by_po_number(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(po_number): Path<String>,
    Json(body): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let decision = parse_decision(&body.decision)?;
    let outcome = state
        .proposals
        .decide_by_po_number(&caller.company_id, &po_number, decision)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&outcome)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("order", &format!("/api/v1/orders/{}", outcome.order.id));

    Ok(Json(resp))
}
