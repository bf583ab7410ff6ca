//! Admin bearer-token issuance and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lambda_http::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Admin tokens are valid for this long after issuance.
pub const TOKEN_TTL_MINUTES: i64 = 30;

/// JWT claims carried by admin tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    /// Issued at
    #[serde(default)]
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// A freshly issued admin token.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

/// Sign an admin token valid for [`TOKEN_TTL_MINUTES`] from `now`.
pub fn issue_admin_token(secret: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
    let claims = AdminClaims {
        is_admin: true,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))?;

    Ok(IssuedToken {
        token,
        expires_in: TOKEN_TTL_MINUTES * 60,
    })
}

/// Check a login password and issue a token on match.
pub fn login(password: &str, admin_password: &str, secret: &str) -> Result<IssuedToken> {
    if password != admin_password {
        return Err(Error::Unauthenticated("Invalid password".to_string()));
    }
    issue_admin_token(secret, Utc::now())
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Verify a token's signature, expiry and admin claim.
pub fn verify_admin_token(token: &str, secret: &str) -> Result<AdminClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthenticated("Invalid or expired token".to_string()))?;

    if !token_data.claims.is_admin {
        return Err(Error::Forbidden("Not authorized".to_string()));
    }

    Ok(token_data.claims)
}

/// Gate a request on a valid admin bearer token.
pub fn require_admin(headers: &HeaderMap, secret: &str) -> Result<()> {
    let token = bearer_token(headers)
        .ok_or_else(|| Error::Unauthenticated("Missing token".to_string()))?;
    verify_admin_token(token, secret).map(|_| ())
}
