//! JSON Web Token issuance and validation.

use std::collections::HashMap;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, config::JwtConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iat: i64,
    pub exp: i64,
    /// Custom payload data
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Validates raw tokens taken from a request.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, raw_token: &str) -> Result<Claims>;
}

/// HS256 tokens signed with a shared secret.
pub struct JwtService {
    issuer: String,
    ttl: i64,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(issuer: impl Into<String>, secret: &[u8], ttl_secs: u64) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.leeway = 0;

        Self {
            issuer,
            ttl: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.issuer, config.secret.as_bytes(), config.ttl)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a token for `subject` valid for the configured TTL.
    pub fn issue(&self, subject: Option<&str>, extra: HashMap<String, Value>) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.map(str::to_owned),
            iat: now,
            exp: now.saturating_add(self.ttl),
            extra,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }
}

impl TokenValidator for JwtService {
    fn validate(&self, raw_token: &str) -> Result<Claims> {
        let data = decode::<Claims>(raw_token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

/// The authenticated user described by validated claims.
#[derive(Debug, Clone)]
pub struct JwtUser {
    claims: Claims,
}

impl JwtUser {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn is_guest(&self) -> bool {
        false
    }

    pub fn id(&self) -> Option<i64> {
        self.claims.sub.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn name(&self) -> Option<&str> {
        self.claims.extra.get("name").and_then(Value::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.extra.get("email").and_then(Value::as_str)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.claims.extra
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
