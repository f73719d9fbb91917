//! Authentication service
//!
//! Password hashing, JWT issuance, and cache-backed login sessions. A login
//! stores `session:<id>` -> username with a TTL; the session id rides in the
//! JWT, and authentication requires both a valid token and a live session.
//! There is no logout path: sessions end by TTL expiry only.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use taskhub_core::ports::CacheStore;
use taskhub_core::{keys, Result, TaskhubError, User};
use tracing::info;

use crate::storage::Database;

const ACCESS_EXPIRES_MINUTES: i64 = 30;
const REFRESH_EXPIRES_DAYS: i64 = 14;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TaskhubError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| TaskhubError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub struct AuthService {
    db: Arc<Database>,
    cache: Arc<dyn CacheStore>,
    jwt_secret: String,
    session_ttl: StdDuration,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        cache: Arc<dyn CacheStore>,
        jwt_secret: String,
        session_ttl: StdDuration,
    ) -> Self {
        Self {
            db,
            cache,
            jwt_secret,
            session_ttl,
        }
    }

    /// Verifies credentials, opens a session in the cache, and issues the
    /// token pair. Login fails if the session cannot be stored; a token
    /// without a live session would be rejected on first use anyway.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthTokens> {
        let Some((_, password_hash)) = self.db.get_user_credentials(username).await? else {
            return Err(TaskhubError::InvalidCredentials);
        };
        if !verify_password(password, &password_hash)? {
            return Err(TaskhubError::InvalidCredentials);
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        self.cache
            .set(
                &keys::session(&session_id),
                username.as_bytes().to_vec(),
                self.session_ttl,
            )
            .await?;

        info!("login successful for {username}");
        self.generate_tokens(username, &session_id)
    }

    /// Resolves a bearer token to its user: decode, check the token type,
    /// require the session to still be live, then load the principal.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token)?;
        if claims.token_type != "access" {
            return Err(TaskhubError::InvalidToken);
        }

        match self.cache.get(&keys::session(&claims.sid)).await? {
            Some(owner) if owner == claims.sub.as_bytes() => {}
            Some(_) | None => return Err(TaskhubError::SessionMissing),
        }

        self.db
            .get_user_by_username(&claims.sub)
            .await?
            .ok_or(TaskhubError::InvalidToken)
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| TaskhubError::InvalidToken)
    }

    fn generate_tokens(&self, username: &str, session_id: &str) -> Result<AuthTokens> {
        let now = Utc::now();

        let access_claims = Claims {
            sub: username.to_string(),
            sid: session_id.to_string(),
            exp: (now + Duration::minutes(ACCESS_EXPIRES_MINUTES)).timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };
        let refresh_claims = Claims {
            sub: username.to_string(),
            sid: session_id.to_string(),
            exp: (now + Duration::days(REFRESH_EXPIRES_DAYS)).timestamp(),
            iat: now.timestamp(),
            token_type: "refresh".to_string(),
        };

        let key = EncodingKey::from_secret(self.jwt_secret.as_bytes());
        let access_token = encode(&Header::default(), &access_claims, &key)
            .map_err(|e| TaskhubError::Serialization(e.to_string()))?;
        let refresh_token = encode(&Header::default(), &refresh_claims, &key)
            .map_err(|e| TaskhubError::Serialization(e.to_string()))?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // username
    sid: String, // session id in the cache
    exp: i64,
    iat: i64,
    token_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}
