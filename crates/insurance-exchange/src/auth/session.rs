//! Signed session tokens tied to a company id.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::marketplace::domain::CompanyId;

pub const SESSION_COOKIE: &str = "insurex_session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Token handed to the client after login or registration.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("invalid session token: {0}")]
    Invalid(String),
    #[error("session signing failed: {0}")]
    Signing(String),
}

/// Issues and validates HS256 session tokens. Logout revokes a token by its
/// `jti` until the token would have expired anyway.
pub struct SessionService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    revoked: Mutex<HashMap<String, i64>>,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: i64::try_from(config.ttl_secs).unwrap_or(i64::MAX),
            revoked: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        u64::try_from(self.ttl_secs).unwrap_or_default()
    }

    pub fn issue(&self, company_id: CompanyId) -> Result<IssuedSession, SessionError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: company_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| SessionError::Signing(err.to_string()))?;
        Ok(IssuedSession {
            token,
            expires_at: claims.exp,
        })
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(err.to_string()),
            })?;

        let revoked = self
            .revoked
            .lock()
            .map_err(|_| SessionError::Invalid("revocation list unavailable".to_string()))?;
        if revoked.contains_key(&claims.jti) {
            return Err(SessionError::Revoked);
        }
        Ok(claims)
    }

    /// Resolve the company a token was issued to.
    pub fn validate(&self, token: &str) -> Result<CompanyId, SessionError> {
        let claims = self.decode(token)?;
        claims
            .sub
            .parse::<i64>()
            .map(CompanyId)
            .map_err(|_| SessionError::Invalid(format!("unexpected subject '{}'", claims.sub)))
    }

    pub fn revoke(&self, token: &str) -> Result<(), SessionError> {
        let claims = self.decode(token)?;
        let now = Utc::now().timestamp();
        let mut revoked = self
            .revoked
            .lock()
            .map_err(|_| SessionError::Invalid("revocation list unavailable".to_string()))?;
        revoked.retain(|_, expires_at| *expires_at > now);
        revoked.insert(claims.jti, claims.exp);
        Ok(())
    }
}

/// Pull a session token from `Authorization: Bearer` or the session cookie.
pub fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(session: &IssuedSession, ttl_secs: u64) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}",
        session.token
    )
}

pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
