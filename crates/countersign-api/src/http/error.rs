//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use countersign_types::error::{
    AuthError, ChangesetError, ProposalError, SigningError, TokenError,
};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Signing workflow errors.
    Signing(SigningError),
    /// Proposal workflow errors.
    Proposal(ProposalError),
    /// Authentication failure.
    Auth(AuthError),
    /// Validation error on request input.
    Validation(String),
    /// Resource not found.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<SigningError> for AppError {
    fn from(e: SigningError) -> Self {
        AppError::Signing(e)
    }
}

impl From<ProposalError> for AppError {
    fn from(e: ProposalError) -> Self {
        AppError::Proposal(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Signing(SigningError::OrderNotFound) => {
                (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", "Order not found".to_string())
            }
            AppError::Signing(SigningError::SignerNotFound) => {
                (StatusCode::NOT_FOUND, "SIGNER_NOT_FOUND", "Caller is not a signer on this order".to_string())
            }
            AppError::Signing(SigningError::AlreadySigned) => {
                (StatusCode::CONFLICT, "ALREADY_SIGNED", "This signer has already signed".to_string())
            }
            AppError::Signing(SigningError::NotYourTurn { expected_position }) => {
                (StatusCode::CONFLICT, "NOT_YOUR_TURN", format!("It is the turn of the signer at position {expected_position}"))
            }
            AppError::Signing(SigningError::SignatureUpload(e)) => {
                (StatusCode::BAD_GATEWAY, "SIGNATURE_UPLOAD_FAILED", e.to_string())
            }
            AppError::Signing(SigningError::Conflict) => {
                (StatusCode::CONFLICT, "CONFLICT", "The order changed concurrently, retry the request".to_string())
            }
            AppError::Signing(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SIGNING_ERROR", e.to_string())
            }
            AppError::Proposal(ProposalError::OrderNotFound) => {
                (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND", "Order not found".to_string())
            }
            AppError::Proposal(ProposalError::ProposalNotFound) => {
                (StatusCode::NOT_FOUND, "PROPOSAL_NOT_FOUND", "Proposal not found or already decided".to_string())
            }
            AppError::Proposal(ProposalError::ProposalAlreadyPending) => {
                (StatusCode::CONFLICT, "PROPOSAL_ALREADY_PENDING", "An update proposal is already pending for this order".to_string())
            }
            AppError::Proposal(ProposalError::Changeset(e)) => {
                let code = match e {
                    ChangesetError::UnknownField(_) => "UNKNOWN_FIELD",
                    _ => "VALIDATION_ERROR",
                };
                (StatusCode::BAD_REQUEST, code, e.to_string())
            }
            AppError::Proposal(ProposalError::Token(TokenError::Expired)) => {
                (StatusCode::GONE, "TOKEN_EXPIRED", "This decision link has expired".to_string())
            }
            AppError::Proposal(ProposalError::Token(e)) => {
                (StatusCode::UNAUTHORIZED, "TOKEN_INVALID", e.to_string())
            }
            AppError::Proposal(ProposalError::Conflict) => {
                (StatusCode::CONFLICT, "CONFLICT", "The order changed concurrently, retry the request".to_string())
            }
            AppError::Proposal(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PROPOSAL_ERROR", e.to_string())
            }
            AppError::Auth(AuthError::StorageError(e)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.clone())
            }
            AppError::Auth(e) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        // Error paths mint their own request id; timing is not tracked
        // once a handler has bailed.
        let request_id = uuid::Uuid::now_v7().to_string();
        let body = ApiResponse::error(code, &message, request_id, 0);

        (status, Json(body)).into_response()
    }
}
