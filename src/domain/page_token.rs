use crate::error::{AppError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Opaque pull cursor. Encodes the resume point plus a digest of the filter
/// it was issued under, so a token cannot silently resume a different query.
/// The checksum makes corruption tamper-evident (400, never silent data
/// loss); it is not a cryptographic signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken {
    pub last_version: i64,
    pub filter_digest: String,
    pub limit: i64,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    v: i64,
    f: String,
    l: i64,
    c: String,
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

fn checksum(v: i64, f: &str, l: i64) -> String {
    short_hash(&format!("{v}:{f}:{l}"))
}

impl PageToken {
    /// Digest of a schema-type filter; order-insensitive.
    #[must_use]
    pub fn filter_digest(schema_types: &[String]) -> String {
        let mut sorted: Vec<&str> = schema_types.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        short_hash(&sorted.join("\n"))
    }

    #[must_use]
    pub fn encode(&self) -> String {
        let payload = Payload {
            v: self.last_version,
            f: self.filter_digest.clone(),
            l: self.limit,
            c: checksum(self.last_version, &self.filter_digest, self.limit),
        };
        // Serializing a plain struct cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || AppError::bad_request("INVALID_PAGE_TOKEN", "page token is malformed or corrupted");

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let payload: Payload = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

        if payload.c != checksum(payload.v, &payload.f, payload.l) {
            return Err(invalid());
        }

        Ok(Self { last_version: payload.v, filter_digest: payload.f, limit: payload.l })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let token = PageToken {
            last_version: 42,
            filter_digest: PageToken::filter_digest(&["survey".to_string()]),
            limit: 50,
        };
        let decoded = PageToken::decode(&token.encode()).unwrap();
        assert_eq!(token, decoded);
    }

    #[test]
    fn filter_digest_is_order_insensitive() {
        let a = PageToken::filter_digest(&["survey".to_string(), "checklist".to_string()]);
        let b = PageToken::filter_digest(&["checklist".to_string(), "survey".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, PageToken::filter_digest(&["survey".to_string()]));
    }

    #[test]
    fn garbage_rejected() {
        assert!(PageToken::decode("not a token!").is_err());
        assert!(PageToken::decode("aGVsbG8").is_err());
    }

    #[test]
    fn tampered_payload_rejected() {
        let token =
            PageToken { last_version: 10, filter_digest: PageToken::filter_digest(&[]), limit: 50 }.encode();
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        let tampered = String::from_utf8(bytes).unwrap().replace("\"v\":10", "\"v\":99");
        let tampered = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(tampered);
        assert!(PageToken::decode(&tampered).is_err());
    }
}
