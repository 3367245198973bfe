use super::{Account, MemoryEngine};

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::AccountAPI;
use crate::auth::{hash_password, verify_password, AccessToken, Platform, User};
use crate::entities::{
    normalize_email, DriverPricing, DriverProfile, Member, Registration, Role,
};
use crate::error::Error;

#[async_trait]
impl AccountAPI for MemoryEngine {
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email, role = registration.role.name()))]
    async fn register(&self, registration: Registration) -> Result<Member, Error> {
        registration.validate()?;

        let member = Member::from_registration(&registration);
        let password_hash = hash_password(&registration.password)?;

        let mut store = self.store.lock().await;

        if store.account_by_email(&member.email).is_some() {
            return Err(Error::invalid_input_error("Email already registered"));
        }

        if member.role == Role::Driver {
            store
                .drivers
                .insert(member.id, DriverProfile::new(member.id));
            store.pricing.insert(
                member.id,
                DriverPricing::new(member.id, &self.settings.base_pricing),
            );
        }

        store.accounts.insert(
            member.id,
            Account {
                member: member.clone(),
                password_hash,
            },
        );

        tracing::info!(id = %member.id, "member registered");

        Ok(member)
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AccessToken, Error> {
        let incorrect = || Error::unauthenticated_error("Incorrect email or password");

        let (member, password_hash) = {
            let store = self.store.lock().await;
            let account = store
                .account_by_email(&normalize_email(email))
                .ok_or_else(incorrect)?;

            (account.member.clone(), account.password_hash.clone())
        };

        if !verify_password(password, &password_hash)? {
            return Err(incorrect());
        }

        if !member.is_approved() {
            return Err(Error::unauthorized_error("Account pending approval"));
        }

        self.settings.tokens.issue(&member)
    }

    #[tracing::instrument(skip_all)]
    async fn authenticate(&self, token: &str) -> Result<User, Error> {
        let claimed = self.settings.tokens.verify(token)?;
        let store = self.store.lock().await;

        store
            .accounts
            .get(&claimed.id)
            .map(|account| User::from(&account.member))
            .ok_or_else(|| Error::unauthenticated_error("Could not validate credentials"))
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, user: User) -> Result<Member, Error> {
        let store = self.store.lock().await;

        store
            .accounts
            .get(&user.id)
            .map(|account| account.member.clone())
            .ok_or_else(|| Error::not_found_error("User not found"))
    }

    #[tracing::instrument(skip(self, password))]
    async fn ensure_admin(&self, email: &str, password: &str) -> Result<Member, Error> {
        let member = Member::new(email, "Administrator", Role::Admin, None);
        let password_hash = hash_password(password)?;

        let mut store = self.store.lock().await;

        if let Some(account) = store.account_by_email(&member.email) {
            return account.member.as_admin();
        }

        store.accounts.insert(
            member.id,
            Account {
                member: member.clone(),
                password_hash,
            },
        );

        tracing::info!(id = %member.id, "admin account created");

        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    async fn pending_approvals(&self, user: User) -> Result<Vec<Member>, Error> {
        self.authorize(user, "review_members", Platform::default(), "Admin access required")?;

        let store = self.store.lock().await;

        let mut members: Vec<Member> = store
            .accounts
            .values()
            .map(|account| &account.member)
            .filter(|member| member.is_pending_approval() && member.role.requires_approval())
            .cloned()
            .collect();
        members.sort_by_key(|member| member.created_at);

        Ok(members)
    }

    #[tracing::instrument(skip(self))]
    async fn approve_member(&self, user: User, id: Uuid) -> Result<Member, Error> {
        self.authorize(user, "review_members", Platform::default(), "Admin access required")?;

        let mut store = self.store.lock().await;

        let account = store
            .accounts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found_error("User not found"))?;
        account.member.approve();

        tracing::info!(id = %id, "member approved");

        Ok(account.member.clone())
    }
}

#[test]
fn unapproved_drivers_log_in_after_approval() {
    use super::testing::engine;

    tokio_test::block_on(async {
        let engine = engine();

        let driver = engine
            .register(Registration {
                email: "Dan@Example.com".into(),
                password: "password123".into(),
                full_name: "Dan".into(),
                role: Role::Driver,
                phone: None,
            })
            .await
            .unwrap();

        let err = engine.login("dan@example.com", "password123").await.unwrap_err();
        assert!(err.is_unauthorized_error());
        assert_eq!(err.message, "Account pending approval");

        let admin = engine.ensure_admin("root@example.com", "rootpass").await.unwrap();
        let admin = User::from(&admin);

        let pending = engine.pending_approvals(admin).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, driver.id);

        let err = engine
            .approve_member(User::from(&driver), driver.id)
            .await
            .unwrap_err();
        assert!(err.is_unauthorized_error());

        engine.approve_member(admin, driver.id).await.unwrap();
        assert!(engine.pending_approvals(admin).await.unwrap().is_empty());

        let token = engine.login(" DAN@example.com", "password123").await.unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.user.id, driver.id);

        let user = engine.authenticate(&token.access_token).await.unwrap();
        assert_eq!(user, User::from(&driver));
    });
}

#[test]
fn registration_and_login_failures() {
    use super::testing::engine;

    tokio_test::block_on(async {
        let engine = engine();

        let registration = Registration {
            email: "cat@example.com".into(),
            password: "password123".into(),
            full_name: "Cat".into(),
            role: Role::Client,
            phone: None,
        };
        engine.register(registration.clone()).await.unwrap();

        let err = engine.register(registration).await.unwrap_err();
        assert_eq!(err.message, "Email already registered");

        let err = engine.login("cat@example.com", "wrong-password").await.unwrap_err();
        assert!(err.is_unauthenticated_error());
        assert_eq!(err.message, "Incorrect email or password");

        let err = engine.login("nobody@example.com", "password123").await.unwrap_err();
        assert_eq!(err.message, "Incorrect email or password");

        assert!(engine.authenticate("garbage").await.is_err());
    });
}

#[test]
fn admin_bootstrap_refuses_a_non_admin_email() {
    use super::testing::engine;

    tokio_test::block_on(async {
        let engine = engine();

        engine
            .register(Registration {
                email: "boss@example.com".into(),
                password: "password123".into(),
                full_name: "Boss".into(),
                role: Role::Client,
                phone: None,
            })
            .await
            .unwrap();

        let err = engine
            .ensure_admin("Boss@Example.com", "rootpass")
            .await
            .unwrap_err();
        assert!(err.is_invalid_state_error());

        let admin = engine.ensure_admin("root@example.com", "rootpass").await.unwrap();
        let again = engine.ensure_admin("root@example.com", "other").await.unwrap();
        assert_eq!(again.id, admin.id);
        assert_eq!(again.role, Role::Admin);
    });
}
