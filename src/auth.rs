//! Bearer-token issuing and password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Invitado,
}

impl Rol {
    pub const ALL: &'static [&'static str] = &["admin", "invitado"];

    pub fn as_str(self) -> &'static str {
        match self {
            Rol::Admin => "admin",
            Rol::Invitado => "invitado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "admin" => Some(Rol::Admin),
            "invitado" => Some(Rol::Invitado),
            _ => None,
        }
    }
}

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (usuario id)
    pub sub: i64,
    pub email: String,
    pub rol: Rol,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub rol: Rol,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.rol == Rol::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(c: Claims) -> Self {
        Self { id: c.sub, email: c.email, rol: c.rol }
    }
}

pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issues a signed HS256 token for the given user.
    pub fn issue(&self, id: i64, email: &str, rol: Rol) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: id,
            email: email.to_string(),
            rol,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.lifetime_secs)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected token: {}", e);
                AppError::Unauthorized("Token inválido o expirado".to_string())
            })
    }
}

/// Hashes a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))
}

/// Checks a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Runs the Argon2 work on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing task failed: {}", e)))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_roundtrip_keeps_role() {
        let jwt = JwtManager::new("test-secret", 60);
        let token = jwt.issue(7, "ana@xonler.test", Rol::Admin).unwrap();
        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.rol, Rol::Admin);
        assert_eq!(claims.email, "ana@xonler.test");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = JwtManager::new("one", 60).issue(1, "a@b.c", Rol::Invitado).unwrap();
        let err = JwtManager::new("two", 60).verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        // default validation allows 60s leeway
        let jwt = JwtManager::new("s", -120);
        let token = jwt.issue(1, "a@b.c", Rol::Admin).unwrap();
        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correcto-caballo").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correcto-caballo", &hash));
        assert!(!verify_password("otra-clave", &hash));
        assert!(!verify_password("correcto-caballo", "not-a-hash"));
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Rol::parse(" Admin "), Some(Rol::Admin));
        assert_eq!(Rol::parse("invitado"), Some(Rol::Invitado));
        assert_eq!(Rol::parse("root"), None);
    }
}
