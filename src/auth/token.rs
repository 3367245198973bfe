use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Member, Role};
use crate::error::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Issues and verifies the bearer credentials handed out at login.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub user: Member,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, member: &Member) -> Result<AccessToken, Error> {
        let now = Utc::now();

        let claims = AccessTokenClaims {
            sub: member.id,
            role: member.role,
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| Error::unexpected_error())?;

        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".into(),
            user: member.clone(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<User, Error> {
        let data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(User::new(data.claims.sub, data.claims.role))
    }
}

#[test]
fn issued_tokens_verify_to_the_same_actor() {
    let issuer = TokenIssuer::new("test-secret", 60);
    let member = Member::new("driver@example.com", "Dan", Role::Driver, None);

    let token = issuer.issue(&member).unwrap();
    assert_eq!(token.token_type, "bearer");

    let user = issuer.verify(&token.access_token).unwrap();
    assert_eq!(user, User::new(member.id, Role::Driver));
}

#[test]
fn foreign_and_expired_tokens_are_refused() {
    let issuer = TokenIssuer::new("test-secret", 60);
    let member = Member::new("client@example.com", "Cat", Role::Client, None);

    let token = TokenIssuer::new("other-secret", 60).issue(&member).unwrap();
    assert!(issuer.verify(&token.access_token).unwrap_err().is_unauthenticated_error());

    let expired = TokenIssuer::new("test-secret", -10).issue(&member).unwrap();
    assert!(issuer.verify(&expired.access_token).is_err());

    assert!(issuer.verify("not-a-token").is_err());
}
