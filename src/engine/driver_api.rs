use super::helpers::{
    fetch_driver_for_update, fetch_member_for_update, fetch_pricing_for_update, upsert_driver,
    upsert_pricing,
};
use super::Engine;

use async_trait::async_trait;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::api::DriverAPI;
use crate::auth::{Platform, User};
use crate::entities::{
    Coordinates, DriverPricing, DriverProfile, DriverStatus, PricingUpdate, ProfileUpdate, Role,
};
use crate::error::Error;

const DRIVERS_ONLY: &str = "Only drivers can access this endpoint";

impl Engine {
    pub(super) async fn fetch_driver(&self, user_id: Uuid) -> Result<DriverProfile, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(driver): Json<DriverProfile> = conn
            .fetch_optional(
                sqlx::query("SELECT data FROM driver_profiles WHERE user_id = $1").bind(&user_id),
            )
            .await?
            .ok_or_else(|| Error::not_found_error("Driver profile not found"))?
            .try_get("data")?;

        Ok(driver)
    }

    pub(super) async fn fetch_pricing(
        &self,
        driver_id: Uuid,
    ) -> Result<Option<DriverPricing>, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(
                sqlx::query("SELECT data FROM driver_pricing WHERE driver_id = $1")
                    .bind(&driver_id),
            )
            .await?;

        match maybe_result {
            Some(result) => {
                let Json(pricing): Json<DriverPricing> = result.try_get("data")?;
                Ok(Some(pricing))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn find_driver_profile(&self, user: User) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        self.fetch_driver(user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_profile(
        &self,
        user: User,
        update: ProfileUpdate,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        if let Some(company_id) = update.tow_company_id {
            let company = match fetch_member_for_update(&mut tx, &company_id).await {
                Ok(member) => Some(member),
                Err(err) if err.is_not_found_error() => None,
                Err(err) => return Err(err),
            };

            let is_company = company
                .map(|member| member.role == Role::TowCompany && member.is_approved())
                .unwrap_or(false);

            if !is_company {
                return Err(Error::invalid_input_error("Tow company not found"));
            }
        }

        let mut driver = fetch_driver_for_update(&mut tx, &user.id).await?;
        driver.apply(&update);
        upsert_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_status(
        &self,
        user: User,
        status: DriverStatus,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &user.id).await?;
        driver.set_status(status)?;
        upsert_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_location(
        &self,
        user: User,
        coordinates: Coordinates,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &user.id).await?;
        driver.update_location(coordinates)?;
        upsert_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver_pricing(&self, user: User) -> Result<DriverPricing, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        Ok(self
            .fetch_pricing(user.id)
            .await?
            .unwrap_or_else(|| DriverPricing::new(user.id, &self.settings.base_pricing)))
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_pricing(
        &self,
        user: User,
        update: PricingUpdate,
    ) -> Result<DriverPricing, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut pricing = match fetch_pricing_for_update(&mut tx, &user.id).await {
            Ok(pricing) => pricing,
            Err(err) if err.is_not_found_error() => {
                DriverPricing::new(user.id, &self.settings.base_pricing)
            }
            Err(err) => return Err(err),
        };
        pricing.apply(&update)?;
        upsert_pricing(&mut tx, &pricing).await?;

        tx.commit().await?;

        Ok(pricing)
    }
}
