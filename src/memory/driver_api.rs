use super::MemoryEngine;

use async_trait::async_trait;

use crate::api::DriverAPI;
use crate::auth::{Platform, User};
use crate::entities::{
    Coordinates, DriverPricing, DriverProfile, DriverStatus, PricingUpdate, ProfileUpdate, Role,
};
use crate::error::Error;

const DRIVERS_ONLY: &str = "Only drivers can access this endpoint";

#[async_trait]
impl DriverAPI for MemoryEngine {
    #[tracing::instrument(skip(self))]
    async fn find_driver_profile(&self, user: User) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut store = self.store.lock().await;

        Ok(store.driver_mut(&user.id)?.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_profile(
        &self,
        user: User,
        update: ProfileUpdate,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut store = self.store.lock().await;

        if let Some(company_id) = update.tow_company_id {
            let is_company = store
                .accounts
                .get(&company_id)
                .map(|account| {
                    account.member.role == Role::TowCompany && account.member.is_approved()
                })
                .unwrap_or(false);

            if !is_company {
                return Err(Error::invalid_input_error("Tow company not found"));
            }
        }

        let driver = store.driver_mut(&user.id)?;
        driver.apply(&update);

        Ok(driver.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_status(
        &self,
        user: User,
        status: DriverStatus,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut store = self.store.lock().await;

        let driver = store.driver_mut(&user.id)?;
        driver.set_status(status)?;

        Ok(driver.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_location(
        &self,
        user: User,
        coordinates: Coordinates,
    ) -> Result<DriverProfile, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut store = self.store.lock().await;

        let driver = store.driver_mut(&user.id)?;
        driver.update_location(coordinates)?;

        Ok(driver.clone())
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver_pricing(&self, user: User) -> Result<DriverPricing, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let store = self.store.lock().await;

        Ok(store
            .pricing
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| DriverPricing::new(user.id, &self.settings.base_pricing)))
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_pricing(
        &self,
        user: User,
        update: PricingUpdate,
    ) -> Result<DriverPricing, Error> {
        self.authorize(user, "drive", Platform::default(), DRIVERS_ONLY)?;

        let mut store = self.store.lock().await;

        let mut pricing = store
            .pricing
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| DriverPricing::new(user.id, &self.settings.base_pricing));
        pricing.apply(&update)?;
        store.pricing.insert(user.id, pricing.clone());

        Ok(pricing)
    }
}

#[test]
fn drivers_manage_their_own_profile_and_pricing() {
    use super::testing::{engine, member};

    tokio_test::block_on(async {
        let engine = engine();
        let driver = member(&engine, "dan@example.com", Role::Driver).await;
        let client = member(&engine, "cat@example.com", Role::Client).await;

        let err = engine.find_driver_profile(client).await.unwrap_err();
        assert_eq!(err.message, DRIVERS_ONLY);

        let profile = engine
            .update_driver_status(driver, DriverStatus::Available)
            .await
            .unwrap();
        assert_eq!(profile.status, DriverStatus::Available);

        let err = engine
            .update_driver_status(driver, DriverStatus::OnMission)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        let err = engine
            .update_driver_location(driver, Coordinates::new(95.0, 0.0))
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        let err = engine
            .update_driver_profile(
                driver,
                ProfileUpdate {
                    tow_company_id: Some(client.id),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.message, "Tow company not found");

        let pricing = engine.find_driver_pricing(driver).await.unwrap();
        assert!(pricing.is_using_base_pricing);

        let pricing = engine
            .update_driver_pricing(
                driver,
                PricingUpdate {
                    price_per_mile: 3.0,
                    pickup_fee: 40.0,
                    is_using_base_pricing: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(engine.find_driver_pricing(driver).await.unwrap(), pricing);

        let err = engine
            .update_driver_pricing(
                driver,
                PricingUpdate {
                    price_per_mile: f64::NAN,
                    pickup_fee: 40.0,
                    is_using_base_pricing: false,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());
    });
}
