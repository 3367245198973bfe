use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, OfferAPI};
use crate::auth::User;
use crate::entities::{Offer, TowRequest};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct OfferParams {
    amount: f64,
    message: Option<String>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<OfferParams>,
) -> Result<Json<Offer>, Error> {
    let offer = api.make_offer(user, id, params.amount, params.message).await?;

    Ok(offer.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Offer>>, Error> {
    let offers = api.list_offers(user, id).await?;

    Ok(offers.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<TowRequest>, Error> {
    let request = api.accept_offer(user, id).await?;

    Ok(request.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, Error> {
    let offer = api.reject_offer(user, id).await?;

    Ok(offer.into())
}
