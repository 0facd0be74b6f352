//! Signed, time-limited capability tokens for supplier decision links.
//!
//! The confirmation email sent to a supplier embeds a decision link. The
//! link carries a token of the form `base64url(payload).hex(hmac)` where
//! the payload is `"{proposal_id}:{expiry_unix}"` and the MAC is
//! HMAC-SHA256 over the payload. Verification is constant-time via the
//! hmac crate's `verify_slice`.
//!
//! Tokens are single-use by construction: deciding a proposal deletes it,
//! so a replayed token resolves to a proposal that no longer exists.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use countersign_types::error::TokenError;
use countersign_types::proposal::ProposalId;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies decision capability tokens.
#[derive(Clone)]
pub struct DecisionTokenSigner {
    secret: Vec<u8>,
}

impl DecisionTokenSigner {
    /// Create a signer over a shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for a proposal, valid for `ttl` from `now`.
    pub fn issue(
        &self,
        proposal_id: &ProposalId,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> String {
        let expiry = (now + ttl).timestamp();
        let payload = format!("{proposal_id}:{expiry}");
        let mac = self.mac_hex(payload.as_bytes());
        format!("{}.{}", URL_SAFE_NO_PAD.encode(payload.as_bytes()), mac)
    }

    /// Verify a token and return the proposal it grants a decision on.
    ///
    /// The MAC is checked before the payload is trusted; expiry is checked
    /// against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ProposalId, TokenError> {
        let (payload_b64, sig_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;

        let expected = hex_decode(sig_hex).ok_or(TokenError::Malformed)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::BadSignature)?;
        mac.update(&payload);
        mac.verify_slice(&expected)
            .map_err(|_| TokenError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;
        let (id, expiry) = payload.split_once(':').ok_or(TokenError::Malformed)?;
        let expiry: i64 = expiry.parse().map_err(|_| TokenError::Malformed)?;

        if now.timestamp() > expiry {
            return Err(TokenError::Expired);
        }

        id.parse().map_err(|_| TokenError::Malformed)
    }

    fn mac_hex(&self, payload: &[u8]) -> String {
        // new_from_slice only fails for unusable key lengths, which
        // HMAC-SHA256 does not have.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload);
        hex_encode(&mac.finalize().into_bytes())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> DecisionTokenSigner {
        DecisionTokenSigner::new(b"decision-secret".to_vec())
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let id = ProposalId::new();
        let now = Utc::now();
        let token = signer().issue(&id, chrono::Duration::hours(48), now);
        let verified = signer().verify(&token, now).unwrap();
        assert_eq!(verified, id);
    }

    #[test]
    fn test_expired_token_rejected() {
        let id = ProposalId::new();
        let now = Utc::now();
        let token = signer().issue(&id, chrono::Duration::hours(1), now);
        let later = now + chrono::Duration::hours(2);
        assert!(matches!(
            signer().verify(&token, later),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let id = ProposalId::new();
        let now = Utc::now();
        let token = signer().issue(&id, chrono::Duration::hours(1), now);
        let other = DecisionTokenSigner::new(b"other-secret".to_vec());
        assert!(matches!(
            other.verify(&token, now),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let id = ProposalId::new();
        let now = Utc::now();
        let token = signer().issue(&id, chrono::Duration::hours(1), now);

        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload =
            URL_SAFE_NO_PAD.encode(format!("{}:{}", ProposalId::new(), i64::MAX));
        let forged = format!("{forged_payload}.{sig}");

        assert!(matches!(
            signer().verify(&forged, now),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let now = Utc::now();
        assert!(matches!(
            signer().verify("no-dot-here", now),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            signer().verify("!!!.zz", now),
            Err(TokenError::Malformed)
        ));
    }
}
