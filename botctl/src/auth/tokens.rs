//! Bearer token issuance and verification.
//!
//! Tokens are HMAC-signed JWTs keyed by the credential store's signing
//! secret. The signing algorithm is pinned at both ends: a token whose
//! header names any other algorithm is rejected, which blocks
//! algorithm-substitution attacks. Two token kinds exist - a temporary
//! token bridging the two login stages, and an access token bound to a
//! stored session.

use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The pinned signing algorithm.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Temporary,
    Access,
}

/// Raw JWT claims. `sid` is present for access tokens only.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    jti: String,
    #[serde(rename = "typ")]
    kind: TokenKind,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// A verified token, decoded and validated as one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Accepted only by second-factor verification.
    Temporary { email: String },
    /// Grants access while its session id still resolves in the store.
    Access { email: String, session_id: String },
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token signing algorithm does not match")]
    AlgorithmMismatch,
    #[error("token is malformed")]
    Malformed,
    #[error("token is of the wrong type")]
    WrongType,
    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies both token kinds with one symmetric key.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(signing_secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding: DecodingKey::from_secret(signing_secret.as_bytes()),
            ttl,
        }
    }

    fn issue(&self, email: &str, session_id: Option<&str>, kind: TokenKind) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            sid: session_id.map(str::to_string),
            jti: Uuid::new_v4().to_string(),
            kind,
            iat: now,
            nbf: now,
            exp: now + self.ttl.as_secs() as i64,
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Issue the token returned by a successful first login stage.
    pub fn issue_temporary(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, None, TokenKind::Temporary)
    }

    /// Issue the bearer token bound to a stored session.
    pub fn issue_access(&self, email: &str, session_id: &str) -> Result<String, TokenError> {
        self.issue(email, Some(session_id), TokenKind::Access)
    }

    /// Check signature, algorithm, temporal claims, and claim shape.
    /// Returns decoded claims only when every check passes.
    pub fn verify(&self, token: &str) -> Result<Token, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm => TokenError::AlgorithmMismatch,
            _ => TokenError::Malformed,
        })?;

        let claims = data.claims;
        match claims.kind {
            TokenKind::Temporary => Ok(Token::Temporary { email: claims.sub }),
            TokenKind::Access => {
                // An access token without its session binding is malformed,
                // signature notwithstanding.
                let session_id = claims.sid.ok_or(TokenError::Malformed)?;
                Ok(Token::Access {
                    email: claims.sub,
                    session_id,
                })
            }
        }
    }

    /// Verify and require a temporary token; returns the embedded email.
    pub fn verify_temporary(&self, token: &str) -> Result<String, TokenError> {
        match self.verify(token)? {
            Token::Temporary { email } => Ok(email),
            Token::Access { .. } => Err(TokenError::WrongType),
        }
    }

    /// Verify and require an access token; returns (email, session id).
    pub fn verify_access(&self, token: &str) -> Result<(String, String), TokenError> {
        match self.verify(token)? {
            Token::Access { email, session_id } => Ok((email, session_id)),
            Token::Temporary { .. } => Err(TokenError::WrongType),
        }
    }
}
