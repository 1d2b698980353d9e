//! Shared JWT session utilities.
//!
//! The user directory is external: Circles only needs to know *who* is acting.
//! That identity arrives as a signed access token and is turned into an
//! explicit [`Session`] that handlers pass down to the sharing engine.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Reserved subject of the token a node presents to its own local-delivery
/// endpoint. It never names a user.
pub const LOCAL_DELIVERY_SUBJECT: &str = "circles:local-delivery";

const LOCAL_DELIVERY_TTL_SECS: u64 = 60;

/// JWT claims embedded in access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as issued by the directory)
    pub sub: String,
    /// Display name
    pub name: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// The acting user for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), display_name: display_name.into() }
    }
}

impl From<Claims> for Session {
    fn from(c: Claims) -> Self {
        Self { user_id: c.sub, display_name: c.name }
    }
}

/// Generate a JWT access token.
pub fn generate_access_token(
    user_id: &str,
    display_name: &str,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        name: display_name.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Validate and decode a JWT token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Mint the short-lived token that authorises one local-delivery call.
pub fn generate_local_delivery_token(secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    generate_access_token(LOCAL_DELIVERY_SUBJECT, LOCAL_DELIVERY_SUBJECT, secret, LOCAL_DELIVERY_TTL_SECS)
}

/// Accept only a valid token carrying [`LOCAL_DELIVERY_SUBJECT`]; user tokens fail.
pub fn validate_local_delivery_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = validate_token(token, secret)?;
    if claims.sub != LOCAL_DELIVERY_SUBJECT {
        return Err(ErrorKind::InvalidSubject.into());
    }
    Ok(claims)
}
