use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::auth::TokenIssuer;
use crate::entities::BasePricing;
use crate::error::Error;

/// Tokens live at most a year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Clone, Debug)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// In-memory store when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub base_pricing: BasePricing,
    pub admin: Option<AdminCredentials>,
}

/// What both engines need besides their store.
#[derive(Clone)]
pub struct Settings {
    pub tokens: TokenIssuer,
    pub base_pricing: BasePricing,
}

impl Config {
    /// Reads the process environment after loading `.env`, if present.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = BasePricing::default();

        let token_ttl_minutes = parse_or(&lookup, "TOKEN_TTL_MINUTES", 24 * 60)?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            return Err(Error::env_var_error("TOKEN_TTL_MINUTES"));
        }

        let admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminCredentials { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            listen_addr: parse_or(
                &lookup,
                "LISTEN_ADDR",
                SocketAddr::from(([127, 0, 0, 1], 3000)),
            )?,
            jwt_secret: lookup("JWT_SECRET")
                .filter(|secret| !secret.is_empty())
                .ok_or_else(|| Error::env_var_error("JWT_SECRET"))?,
            token_ttl_minutes,
            base_pricing: BasePricing {
                pickup_fee: parse_or(&lookup, "BASE_PICKUP_FEE", base.pickup_fee)?,
                price_per_mile: parse_or(&lookup, "BASE_PRICE_PER_MILE", base.price_per_mile)?,
            },
            admin,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            tokens: TokenIssuer::new(self.jwt_secret.clone(), self.token_ttl_minutes),
            base_pricing: self.base_pricing,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value.parse().map_err(|_| Error::env_var_error(name)),
        None => Ok(default),
    }
}

#[test]
fn defaults_apply_when_unset() {
    let config = Config::from_lookup(|name| match name {
        "JWT_SECRET" => Some("secret".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.database_url, None);
    assert_eq!(config.database_max_connections, 5);
    assert_eq!(config.listen_addr.to_string(), "127.0.0.1:3000");
    assert_eq!(config.token_ttl_minutes, 1440);
    assert_eq!(config.base_pricing, BasePricing::default());
    assert!(config.admin.is_none());
}

#[test]
fn missing_secret_and_bad_numbers_are_errors() {
    assert!(Config::from_lookup(|_| None).unwrap_err().is_internal());

    let result = Config::from_lookup(|name| match name {
        "JWT_SECRET" => Some("secret".to_string()),
        "BASE_PICKUP_FEE" => Some("lots".to_string()),
        _ => None,
    });
    assert_eq!(result.unwrap_err().code, 1);
}

#[test]
fn token_lifetime_must_be_positive_and_bounded() {
    let with_ttl = |ttl: &'static str| {
        Config::from_lookup(move |name| match name {
            "JWT_SECRET" => Some("secret".to_string()),
            "TOKEN_TTL_MINUTES" => Some(ttl.to_string()),
            _ => None,
        })
    };

    for ttl in ["0", "-30", "525601", "9223372036854775807"] {
        let err = with_ttl(ttl).unwrap_err();
        assert_eq!(err.message, "environment variable error: TOKEN_TTL_MINUTES");
    }

    assert_eq!(with_ttl("525600").unwrap().token_ttl_minutes, MAX_TOKEN_TTL_MINUTES);
    assert_eq!(with_ttl("15").unwrap().token_ttl_minutes, 15);
}
