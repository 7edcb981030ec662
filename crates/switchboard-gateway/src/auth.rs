// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection authentication.
//!
//! A client presents an HS256 JWT either as `?token=` on the upgrade URL or
//! as `Authorization: Bearer <token>`. The query parameter wins when both
//! are present. Verification happens before the upgrade, so a rejected
//! client never reaches the relay.

use axum::http::HeaderMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use switchboard_core::SwitchboardError;

/// Identity carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Principal {
    #[serde(deserialize_with = "id_claim")]
    pub uid: String,
    #[serde(rename = "roleId", default, deserialize_with = "optional_id_claim")]
    pub role_id: Option<String>,
}

impl Principal {
    pub fn user_group(&self) -> String {
        format!("user:{}", self.uid)
    }

    pub fn role_group(&self) -> Option<String> {
        self.role_id.as_ref().map(|role| format!("role:{role}"))
    }
}

fn id_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_claim<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    id_text(Value::deserialize(d)?)
        .ok_or_else(|| serde::de::Error::custom("uid must be a string or number"))
}

fn optional_id_claim<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(id_text(Value::deserialize(d)?))
}

/// Verifies connection tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("key", &"[redacted]")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is honoured when present but not required.
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, SwitchboardError> {
        jsonwebtoken::decode::<Principal>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| SwitchboardError::Auth(format!("invalid token: {e}")))
    }
}

/// Picks the connection token from the query string or the bearer header.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn sign(claims: Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_string_or_numeric_uid() {
        let verifier = TokenVerifier::new(SECRET);

        let principal = verifier
            .verify(&sign(json!({"uid": "u-1", "roleId": 3}), SECRET))
            .unwrap();
        assert_eq!(principal.uid, "u-1");
        assert_eq!(principal.role_group().as_deref(), Some("role:3"));

        let principal = verifier.verify(&sign(json!({"uid": 42}), SECRET)).unwrap();
        assert_eq!(principal.user_group(), "user:42");
        assert!(principal.role_id.is_none());
    }

    #[test]
    fn rejects_wrong_secret_missing_uid_and_expired() {
        let verifier = TokenVerifier::new(SECRET);
        let wrong = verifier.verify(&sign(json!({"uid": 1}), "other"));
        assert!(matches!(wrong, Err(SwitchboardError::Auth(_))));

        assert!(verifier.verify(&sign(json!({"roleId": 1}), SECRET)).is_err());
        assert!(verifier.verify(&sign(json!({"uid": true}), SECRET)).is_err());
        assert!(verifier.verify(&sign(json!({"uid": 1, "exp": 1}), SECRET)).is_err());
        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn token_from_query_then_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, None), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers, None).as_deref(), Some("abc"));
        assert_eq!(extract_token(&headers, Some("xyz")).as_deref(), Some("xyz"));
        assert_eq!(extract_token(&headers, Some("  ")).as_deref(), Some("abc"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers, None), None);
    }

    #[test]
    fn debug_redacts_key() {
        let debug = format!("{:?}", TokenVerifier::new(SECRET));
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("[redacted]"));
    }
}
