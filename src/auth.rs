// ABOUTME: Caller identity resolution for authenticated and anonymous endpoints
// ABOUTME: Verifies scout session tokens, extracts client IPs, and checks webhook secrets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Scoutline Sports

//! Identity resolution for the relay endpoints.
//!
//! Coach chat requires a verified scout session token (HMAC-signed JWT
//! issued by the portal at sign-in). The anonymous endpoints key their
//! rate limits on a best-effort client network address instead; that
//! identity confers no authorization. The lead intake webhook carries a
//! pre-shared secret checked in constant time before anything else runs.

use crate::config::environment::AuthConfig;
use crate::errors::{AppError, AppResult};
use chrono::{Duration, Utc};
use http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Sentinel identity when no client address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Session token claims for an authenticated scout
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoutClaims {
    /// Scout `ID`
    pub sub: String,
    /// Scout email, when the issuer included it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// A verified caller of an authenticated endpoint
#[derive(Debug, Clone)]
pub struct ScoutIdentity {
    /// Stable scout id, used as ownership and rate-limit key
    pub scout_id: String,
    /// Scout email when present in the token
    pub email: Option<String>,
}

/// Verifies scout session tokens against the shared signing secret
#[derive(Clone)]
pub struct ScoutAuthenticator {
    jwt_secret: Option<String>,
}

impl ScoutAuthenticator {
    /// Create an authenticator with an optional signing secret
    #[must_use]
    pub const fn new(jwt_secret: Option<String>) -> Self {
        Self { jwt_secret }
    }

    /// Create an authenticator from the server auth configuration
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.clone())
    }

    /// Resolve the scout identity from the request's authorization header
    ///
    /// # Errors
    ///
    /// Returns `ServerMisconfigured` when no signing secret is configured,
    /// `AuthRequired` when the header is absent, and `AuthInvalid` for a
    /// malformed scheme, bad signature, or expired token.
    pub fn verify_bearer(&self, headers: &HeaderMap) -> AppResult<ScoutIdentity> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::misconfigured("AUTH_JWT_SECRET is not configured"))?;

        let header_value = headers
            .get("authorization")
            .ok_or_else(AppError::auth_required)?;
        let header_str = header_value
            .to_str()
            .map_err(|_| AppError::auth_invalid("Invalid authorization header"))?;
        let token = header_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Authorization header must use Bearer scheme"))?;

        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<ScoutClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "session token verification failed");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::auth_invalid("Session token has expired")
                }
                _ => AppError::auth_invalid("Invalid session token"),
            }
        })?;

        Ok(ScoutIdentity {
            scout_id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }

    /// Issue a session token for a scout. Used by the portal sign-in
    /// flow and by integration tests.
    ///
    /// # Errors
    ///
    /// Returns `ServerMisconfigured` when no signing secret is configured
    /// or `InternalError` if encoding fails.
    pub fn issue_token(
        &self,
        scout_id: &str,
        email: Option<&str>,
        expiry_hours: i64,
    ) -> AppResult<String> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::misconfigured("AUTH_JWT_SECRET is not configured"))?;

        let now = Utc::now();
        let claims = ScoutClaims {
            sub: scout_id.to_owned(),
            email: email.map(str::to_owned),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("Failed to encode session token: {e}")))
    }
}

impl std::fmt::Debug for ScoutAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoutAuthenticator")
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Best-effort client network address for anonymous rate limiting.
///
/// Prefers the first entry of `x-forwarded-for` (the original client as
/// reported by the fronting proxy), then `x-real-ip`, then the
/// [`UNKNOWN_CLIENT`] sentinel. All anonymous callers behind a proxy that
/// strips both headers share one rate-limit bucket, which fails closed.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_owned();
        }
    }

    UNKNOWN_CLIENT.to_owned()
}

/// Verify the webhook pre-shared secret in constant time.
///
/// # Errors
///
/// Returns `ServerMisconfigured` when the server has no secret configured,
/// `AuthRequired` when the request carries none, and `AuthInvalid` on
/// mismatch. Runs before rate limiting.
pub fn verify_webhook_secret(expected: Option<&str>, provided: Option<&str>) -> AppResult<()> {
    let expected =
        expected.ok_or_else(|| AppError::misconfigured("WEBHOOK_SHARED_SECRET is not configured"))?;
    let provided = provided.ok_or_else(AppError::auth_required)?;

    if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::auth_invalid("Invalid webhook secret"))
    }
}
