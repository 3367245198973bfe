//! In-process engine over a single mutex-guarded store. Every call holds the
//! lock for its whole read-check-write sequence, which gives the same
//! one-winner semantics the PostgreSQL engine gets from row locks.

mod account_api;
mod driver_api;
mod offer_api;
mod request_api;

use std::collections::HashMap;

use oso::ToPolar;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::API;
use crate::auth::{Authorizor, User};
use crate::config::Settings;
use crate::entities::{DriverPricing, DriverProfile, Member, Offer, TowRequest};
use crate::error::Error;

struct Account {
    member: Member,
    password_hash: String,
}

#[derive(Default)]
struct Store {
    accounts: HashMap<Uuid, Account>,
    drivers: HashMap<Uuid, DriverProfile>,
    pricing: HashMap<Uuid, DriverPricing>,
    requests: HashMap<Uuid, TowRequest>,
    /// Newest first per request.
    offers: HashMap<Uuid, Vec<Offer>>,
}

impl Store {
    fn account_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|account| account.member.email == email)
    }

    fn request(&self, id: &Uuid) -> Result<&TowRequest, Error> {
        self.requests
            .get(id)
            .ok_or_else(|| Error::not_found_error("Tow request not found"))
    }

    fn driver_mut(&mut self, user_id: &Uuid) -> Result<&mut DriverProfile, Error> {
        self.drivers
            .get_mut(user_id)
            .ok_or_else(|| Error::not_found_error("Driver profile not found"))
    }
}

pub struct MemoryEngine {
    store: Mutex<Store>,
    authorizor: Authorizor,
    settings: Settings,
}

impl MemoryEngine {
    pub fn new(settings: Settings) -> Result<Self, Error> {
        Ok(Self {
            store: Mutex::new(Store::default()),
            authorizor: Authorizor::new()?,
            settings,
        })
    }

    fn authorize<Resource: ToPolar>(
        &self,
        user: User,
        action: &str,
        resource: Resource,
        denied: &str,
    ) -> Result<(), Error> {
        self.authorizor.authorize(user, action, resource, denied)
    }
}

impl API for MemoryEngine {}

#[cfg(test)]
pub(crate) mod testing {
    use super::MemoryEngine;
    use crate::api::AccountAPI;
    use crate::auth::{TokenIssuer, User};
    use crate::config::Settings;
    use crate::entities::{BasePricing, Registration, Role};

    pub fn engine() -> MemoryEngine {
        MemoryEngine::new(Settings {
            tokens: TokenIssuer::new("memory-test-secret", 60),
            base_pricing: BasePricing::default(),
        })
        .unwrap()
    }

    /// Registers and, where needed, approves a member; returns its actor.
    pub async fn member(engine: &MemoryEngine, email: &str, role: Role) -> User {
        let member = engine
            .register(Registration {
                email: email.into(),
                password: "password123".into(),
                full_name: email.split('@').next().unwrap_or("member").into(),
                role,
                phone: None,
            })
            .await
            .unwrap();

        if member.is_pending_approval() {
            let admin = engine.ensure_admin("admin@towfleets.test", "admin-pass").await.unwrap();
            engine
                .approve_member(User::from(&admin), member.id)
                .await
                .unwrap();
        }

        User::from(&member)
    }
}
