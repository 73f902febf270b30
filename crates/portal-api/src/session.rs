use anyhow::{Result, bail};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use portal_types::api::Claims;

const TOKEN_TTL_DAYS: i64 = 30;

/// The caller as resolved from session state.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Mint a session token. The real login flow lives outside the messaging
/// core; this is what it is expected to produce, and what dev seeding and
/// tests use.
pub fn issue_token(secret: &str, user_id: i64, username: &str) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn resolve_identity(secret: &str, token: &str) -> Result<Identity> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    if data.claims.sub <= 0 {
        bail!("token subject {} is not a user id", data.claims.sub);
    }

    Ok(Identity {
        user_id: data.claims.sub,
        username: data.claims.username,
    })
}
