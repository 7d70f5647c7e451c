use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;
use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub role: UserRole,
    pub exp: i64, // expiration time
    pub iat: i64, // issued at
}

impl Claims {
    pub fn new(user_id: UserId, role: UserRole, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            user_id,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_access_token(
    user_id: UserId,
    role: UserRole,
    secret: &str,
    expiration_hours: u64,
) -> anyhow::Result<String> {
    let claims = Claims::new(user_id, role, expiration_hours);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn verify_access_token(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_verify_roundtrip() {
        let user_id = UserId::new();
        let token =
            create_access_token(user_id, UserRole::Editor, "secret", 24).expect("create token");
        let claims = verify_access_token(&token, "secret").expect("verify token");
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::Editor);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = create_access_token(UserId::new(), UserRole::Admin, "secret", 1)
            .expect("create token");
        assert!(verify_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let mut claims = Claims::new(UserId::new(), UserRole::Viewer, 1);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .expect("encode");
        assert!(verify_access_token(&token, "secret").is_err());
    }
}
