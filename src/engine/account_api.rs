use super::helpers::{fetch_member_for_update, update_member, upsert_driver, upsert_pricing};
use super::{Database, Engine};

use async_trait::async_trait;
use sqlx::{types::Json, Acquire, Executor, Row, Transaction};
use uuid::Uuid;

use crate::api::AccountAPI;
use crate::auth::{hash_password, verify_password, AccessToken, Platform, User};
use crate::entities::{
    normalize_email, DriverPricing, DriverProfile, Member, MemberStatus, Registration, Role,
};
use crate::error::Error;

impl Engine {
    /// Inserts `member` unless the email is taken; returns whether it was inserted.
    async fn insert_member(
        &self,
        tx: &mut Transaction<'_, Database>,
        member: &Member,
        password_hash: &str,
    ) -> Result<bool, Error> {
        let result = tx
            .execute(
                sqlx::query("INSERT INTO members (id, email, password_hash, status, data) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (email) DO NOTHING")
                    .bind(&member.id)
                    .bind(&member.email)
                    .bind(password_hash)
                    .bind(member.status.name())
                    .bind(Json(member)),
            )
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_member(&self, id: Uuid) -> Result<Option<Member>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM members WHERE id = $1").bind(&id))
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(member): Json<Member> = result.try_get("data")?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountAPI for Engine {
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email, role = registration.role.name()))]
    async fn register(&self, registration: Registration) -> Result<Member, Error> {
        registration.validate()?;

        let member = Member::from_registration(&registration);
        let password_hash = hash_password(&registration.password)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        if !self.insert_member(&mut tx, &member, &password_hash).await? {
            return Err(Error::invalid_input_error("Email already registered"));
        }

        if member.role == Role::Driver {
            upsert_driver(&mut tx, &DriverProfile::new(member.id)).await?;
            upsert_pricing(
                &mut tx,
                &DriverPricing::new(member.id, &self.settings.base_pricing),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(id = %member.id, "member registered");

        Ok(member)
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AccessToken, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query("SELECT password_hash, data FROM members WHERE email = $1")
                    .bind(normalize_email(email)),
            )
            .await?;

        let incorrect = || Error::unauthenticated_error("Incorrect email or password");

        let result = maybe_result.ok_or_else(incorrect)?;
        let password_hash: String = result.try_get("password_hash")?;
        let Json(member): Json<Member> = result.try_get("data")?;

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

        let member = self
            .fetch_member(claimed.id)
            .await?
            .ok_or_else(|| Error::unauthenticated_error("Could not validate credentials"))?;

        Ok(User::from(&member))
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, user: User) -> Result<Member, Error> {
        self.fetch_member(user.id)
            .await?
            .ok_or_else(|| Error::not_found_error("User not found"))
    }

    #[tracing::instrument(skip(self, password))]
    async fn ensure_admin(&self, email: &str, password: &str) -> Result<Member, Error> {
        let member = Member::new(email, "Administrator", Role::Admin, None);
        let password_hash = hash_password(password)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        if !self.insert_member(&mut tx, &member, &password_hash).await? {
            let result = tx
                .fetch_one(
                    sqlx::query("SELECT data FROM members WHERE email = $1").bind(&member.email),
                )
                .await?;
            let Json(existing): Json<Member> = result.try_get("data")?;

            return existing.as_admin();
        }

        tx.commit().await?;

        tracing::info!(id = %member.id, "admin account created");

        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    async fn pending_approvals(&self, user: User) -> Result<Vec<Member>, Error> {
        self.authorize(user, "review_members", Platform::default(), "Admin access required")?;

        let mut conn = self.pool.acquire().await?;

        let results = conn
            .fetch_all(
                sqlx::query("SELECT data FROM members WHERE status = $1")
                    .bind(MemberStatus::PendingApproval.name()),
            )
            .await?;

        let mut members = vec![];
        for result in results.iter() {
            let Json(member): Json<Member> = result.try_get("data")?;
            if member.role.requires_approval() {
                members.push(member);
            }
        }
        members.sort_by_key(|member| member.created_at);

        Ok(members)
    }

    #[tracing::instrument(skip(self))]
    async fn approve_member(&self, user: User, id: Uuid) -> Result<Member, Error> {
        self.authorize(user, "review_members", Platform::default(), "Admin access required")?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut member = fetch_member_for_update(&mut tx, &id).await?;
        member.approve();
        update_member(&mut tx, &member).await?;

        tx.commit().await?;

        tracing::info!(id = %member.id, "member approved");

        Ok(member)
    }
}
