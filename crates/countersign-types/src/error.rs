use thiserror::Error;

/// Errors from repository operations (used by trait definitions in
/// countersign-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the blob store collaborator.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob store timed out")]
    Timeout,

    #[error("blob store error: {0}")]
    Io(String),
}

/// Errors from the notification collaborator. Always treated as
/// best-effort by the workflows: logged, never propagated.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier timed out")]
    Timeout,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Errors from session verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,

    #[error("invalid session token")]
    InvalidToken,

    #[error("session expired")]
    SessionExpired,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from decision capability token verification.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed decision token")]
    Malformed,

    #[error("decision token expired")]
    Expired,

    #[error("decision token signature mismatch")]
    BadSignature,
}

/// Errors while parsing or applying an amendment changeset.
#[derive(Debug, Error)]
pub enum ChangesetError {
    #[error("field '{0}' is not amendable")]
    UnknownField(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("duplicate amendment for '{0}'")]
    DuplicateField(String),

    #[error("changeset is empty")]
    Empty,
}

/// Errors surfaced by the signing workflow.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("order not found")]
    OrderNotFound,

    #[error("employee is not a signer on this order")]
    SignerNotFound,

    #[error("signer has already signed")]
    AlreadySigned,

    #[error("not this signer's turn; position {expected_position} signs next")]
    NotYourTurn { expected_position: u32 },

    #[error("failed to store signature image: {0}")]
    SignatureUpload(#[from] BlobError),

    #[error("lost a concurrent update race; retry the request")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Errors surfaced by the proposal workflow.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("order not found")]
    OrderNotFound,

    #[error("proposal not found")]
    ProposalNotFound,

    #[error("an update proposal is already pending for this order")]
    ProposalAlreadyPending,

    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("lost a concurrent update race; retry the request")]
    Conflict,

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_error_display() {
        let err = SigningError::NotYourTurn {
            expected_position: 2,
        };
        assert_eq!(
            err.to_string(),
            "not this signer's turn; position 2 signs next"
        );
    }

    #[test]
    fn test_changeset_error_display() {
        let err = ChangesetError::UnknownField("shippingCost".to_string());
        assert_eq!(err.to_string(), "field 'shippingCost' is not amendable");
    }

    #[test]
    fn test_proposal_error_wraps_changeset() {
        let err: ProposalError = ChangesetError::Empty.into();
        assert_eq!(err.to_string(), "changeset is empty");
    }
}
