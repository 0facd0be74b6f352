//! Order read and signing handlers for the REST API.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use countersign_core::repository::order::OrderRepository;
use countersign_types::error::SigningError;
use countersign_types::order::OrderId;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthSession;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/orders/:id/signatures request body.
#[derive(Debug, Deserialize)]
pub struct SignatureRequest {
    /// The signature image, as a base64 string or `data:image/png;base64,`
    /// data URL.
    pub signature: String,
}

/// Decode the signature payload the signing pad sends.
fn decode_signature(signature: &str) -> Result<Vec<u8>, AppError> {
    let encoded = match signature.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => signature,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Validation("signature is not valid base64".to_string()))
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Signing(SigningError::OrderNotFound))
}

/// POST /api/v1/orders/:id/signatures - Record the caller's signature.
pub async fn request_signature(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(id): Path<String>,
    Json(body): Json<SignatureRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let order_id = parse_order_id(&id)?;
    let image = decode_signature(&body.signature)?;

    let signed = state
        .signing
        .request_signature(&order_id, &caller.employee_id, &image)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&signed)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", &format!("/api/v1/orders/{}", signed.order.id));

    Ok(Json(resp))
}

/// GET /api/v1/orders - List the caller's company's orders.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let orders = state
        .orders
        .list_for_company(&caller.company_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = orders
        .iter()
        .map(|o| serde_json::to_value(o).map_err(|e| AppError::Internal(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    let resp = ApiResponse::success(data, request_id, elapsed).with_link("self", "/api/v1/orders");

    Ok(Json(resp))
}

/// GET /api/v1/orders/:id - Fetch one order.
pub async fn get_order(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let order_id = parse_order_id(&id)?;
    let stored = state
        .orders
        .get(&order_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        // Orders from other companies are indistinguishable from missing.
        .filter(|s| s.order.company_id == caller.company_id)
        .ok_or(AppError::Signing(SigningError::OrderNotFound))?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&stored.order)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", &format!("/api/v1/orders/{}", stored.order.id));

    Ok(Json(resp))
}

/// GET /api/v1/orders/by-number/:po_number - Fetch one order by purchase
/// order number, scoped to the caller's company.
pub async fn get_order_by_number(
    State(state): State<AppState>,
    AuthSession(caller): AuthSession,
    Path(po_number): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let stored = state
        .orders
        .get_by_po_number(&caller.company_id, &po_number)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or(AppError::Signing(SigningError::OrderNotFound))?;
    let elapsed = start.elapsed().as_millis() as u64;

    let data = serde_json::to_value(&stored.order)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", &format!("/api/v1/orders/{}", stored.order.id));

    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_signature_accepts_raw_base64() {
        let decoded = decode_signature("cG5nLWJ5dGVz").unwrap();
        assert_eq!(decoded, b"png-bytes");
    }

    #[test]
    fn test_decode_signature_accepts_data_url() {
        let decoded = decode_signature("data:image/png;base64,cG5nLWJ5dGVz").unwrap();
        assert_eq!(decoded, b"png-bytes");
    }

    #[test]
    fn test_decode_signature_rejects_garbage() {
        assert!(decode_signature("not base64 at all!!!").is_err());
    }
}
