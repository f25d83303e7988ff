use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use axum::http::HeaderMap;

use crate::error::AppError;

/// Header the original clients send their key in
pub const API_KEY_HEADER: &str = "x-api-key";

/// A request that presented an accepted key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedClient {
    /// Stable, non-reversible identifier of the key, for logs and rate limits
    pub key_fingerprint: u64,
}

/// Checks presented keys against the configured set
///
/// Every configured key is compared in full, so the time taken does not
/// depend on how much of a key the caller guessed.
#[derive(Clone)]
pub struct ApiKeyVerifier {
    keys: Vec<String>,
}

impl ApiKeyVerifier {
    pub fn new(keys: &[String]) -> Result<Self, AppError> {
        let keys: HashSet<&String> = keys.iter().collect();
        if keys.is_empty() {
            return Err(AppError::Config("no API keys configured".to_string()));
        }
        Ok(Self {
            keys: keys.into_iter().cloned().collect(),
        })
    }

    pub fn verify(&self, key: &str) -> Result<AuthenticatedClient, AppError> {
        let accepted = self.keys.iter().fold(false, |found, known| {
            found | constant_time_eq(known.as_bytes(), key.as_bytes())
        });
        if !accepted {
            return Err(AppError::unauthorized("Invalid API key"));
        }
        Ok(AuthenticatedClient {
            key_fingerprint: fingerprint(key),
        })
    }
}

/// Key from `X-API-Key`, falling back to `Authorization: Bearer <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, AppError> {
    if let Some(value) = headers.get(API_KEY_HEADER) {
        let key = value
            .to_str()
            .map_err(|_| AppError::unauthorized("X-API-Key header is not valid UTF-8"))?
            .trim();
        if key.is_empty() {
            return Err(AppError::unauthorized("X-API-Key header is empty"));
        }
        return Ok(key);
    }

    if headers.contains_key("authorization") {
        return extract_bearer_token(headers);
    }
    Err(AppError::unauthorized("Missing API key"))
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <key>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer key is empty"));
    }
    Ok(token)
}

/// Byte equality without an early exit on the first mismatch; only the length leaks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

pub fn fingerprint(value: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
