//! mock bearer token
//!
//! The token is standard base64 over a json object:
//!
//! ```text
//! base64({"sub":"op-1","email":"ops@pipeline.local","name":"Ops","iat":1700000000,"exp":1700003600})
//! ```
//!
//! It is NOT signed. It only carries the operator identity and an expiry so a
//! persisted session can be rejected once it is stale.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::User;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub iat: u64,
    /// expiry, epoch seconds
    pub exp: u64,
}

impl Claims {
    pub fn for_user(user: &User, issued_at: u64, ttl_secs: u64) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is not base64-encoded json")]
    Malformed,
    #[error("token is missing the '{0}' claim")]
    MissingFields(&'static str),
    #[error("token expired at {exp} (now {now})")]
    Expired { exp: u64, now: u64 },
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn issue_token(claims: &Claims) -> String {
    let json = serde_json::to_vec(claims).unwrap_or_default();
    BASE64_STANDARD.encode(json)
}

/// decode `token` and check it is still valid at `now` (epoch seconds)
///
/// valid iff it decodes into a json object carrying an `email` and a numeric
/// `exp` strictly greater than `now`.
pub fn validate_token(token: &str, now: u64) -> Result<Claims, TokenError> {
    let bytes = BASE64_STANDARD
        .decode(token.trim())
        .map_err(|_| TokenError::Malformed)?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)?;
    let object = value.as_object().ok_or(TokenError::Malformed)?;

    let exp = object
        .get("exp")
        .and_then(|v| v.as_u64())
        .ok_or(TokenError::MissingFields("exp"))?;
    if object.get("email").and_then(|v| v.as_str()).is_none() {
        return Err(TokenError::MissingFields("email"));
    }

    let claims: Claims = serde_json::from_value(value).map_err(|_| TokenError::Malformed)?;
    if exp <= now {
        return Err(TokenError::Expired { exp, now });
    }
    Ok(claims)
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_750_000_000;

    fn token_expiring_at(exp: u64) -> String {
        let user = User::new("ops@pipeline.local");
        let mut claims = Claims::for_user(&user, NOW - 10, 0);
        claims.exp = exp;
        issue_token(&claims)
    }

    #[test]
    fn test_valid_token() {
        let user = User {
            id: Some("op-7".into()),
            email: "ops@pipeline.local".into(),
            name: Some("Night Shift".into()),
        };
        let token = issue_token(&Claims::for_user(&user, NOW, 3600));
        let claims = validate_token(&token, NOW).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("op-7"));
        assert_eq!(claims.email, "ops@pipeline.local");
        assert_eq!(claims.exp, NOW + 3600);
    }

    #[test]
    fn test_expiry_is_strict() {
        assert!(validate_token(&token_expiring_at(NOW + 1), NOW).is_ok());
        assert_eq!(
            validate_token(&token_expiring_at(NOW), NOW),
            Err(TokenError::Expired { exp: NOW, now: NOW })
        );
        assert!(matches!(
            validate_token(&token_expiring_at(NOW - 1), NOW),
            Err(TokenError::Expired { .. })
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(validate_token("not base64 !!", NOW), Err(TokenError::Malformed));
        let not_json = BASE64_STANDARD.encode("hello");
        assert_eq!(validate_token(&not_json, NOW), Err(TokenError::Malformed));
        let array = BASE64_STANDARD.encode("[1,2,3]");
        assert_eq!(validate_token(&array, NOW), Err(TokenError::Malformed));
        // three-part dot-separated tokens are not accepted
        assert_eq!(validate_token("aGVhZA.cGF5bG9hZA.c2ln", NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_missing_fields() {
        let no_exp = BASE64_STANDARD.encode(r#"{"email":"ops@pipeline.local"}"#);
        assert_eq!(validate_token(&no_exp, NOW), Err(TokenError::MissingFields("exp")));

        let text_exp = BASE64_STANDARD.encode(r#"{"email":"a@b.c","exp":"soon"}"#);
        assert_eq!(validate_token(&text_exp, NOW), Err(TokenError::MissingFields("exp")));

        let no_email = BASE64_STANDARD.encode(format!(r#"{{"exp":{}}}"#, NOW + 60));
        assert_eq!(validate_token(&no_email, NOW), Err(TokenError::MissingFields("email")));
    }
}
