use axum::extract::{Extension, Json, Query};
use serde::{Deserialize, Serialize};

use crate::api::{DriverAPI, DynAPI};
use crate::auth::User;
use crate::entities::{
    Coordinates, DriverPricing, DriverProfile, DriverStatus, PricingUpdate, ProfileUpdate,
};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct StatusParams {
    status: DriverStatus,
}

pub async fn profile(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<DriverProfile>, Error> {
    let driver = api.find_driver_profile(user).await?;

    Ok(driver.into())
}

pub async fn update_profile(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<DriverProfile>, Error> {
    let driver = api.update_driver_profile(user, update).await?;

    Ok(driver.into())
}

pub async fn update_status(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(params): Query<StatusParams>,
) -> Result<Json<DriverProfile>, Error> {
    let driver = api.update_driver_status(user, params.status).await?;

    Ok(driver.into())
}

pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(coordinates): Query<Coordinates>,
) -> Result<Json<DriverProfile>, Error> {
    let driver = api.update_driver_location(user, coordinates).await?;

    Ok(driver.into())
}

pub async fn pricing(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<DriverPricing>, Error> {
    let pricing = api.find_driver_pricing(user).await?;

    Ok(pricing.into())
}

pub async fn update_pricing(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(update): Json<PricingUpdate>,
) -> Result<Json<DriverPricing>, Error> {
    let pricing = api.update_driver_pricing(user, update).await?;

    Ok(pricing.into())
}
