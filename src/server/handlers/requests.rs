use axum::extract::{Extension, Json, Path, Query};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, TowRequestAPI};
use crate::auth::User;
use crate::entities::{NearbyQuery, NearbyRequest, NewTowRequest, StatusKind, TowRequest};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct UpdateParams {
    status: StatusKind,
}

#[derive(Serialize, Deserialize)]
pub struct AcceptParams {
    driver_id: Option<Uuid>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<NewTowRequest>,
) -> Result<Json<TowRequest>, Error> {
    let request = api.create_request(user, params).await?;

    Ok(request.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<TowRequest>>, Error> {
    let requests = api.list_requests(user).await?;

    Ok(requests.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<TowRequest>, Error> {
    let request = api.find_request(user, id).await?;

    Ok(request.into())
}

pub async fn update(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateParams>,
) -> Result<Json<TowRequest>, Error> {
    let request = api.update_request(user, id, params.status).await?;

    Ok(request.into())
}

/// Drivers post no body; tow companies name the driver they dispatch.
pub async fn accept(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    params: Option<Json<AcceptParams>>,
) -> Result<Json<TowRequest>, Error> {
    let driver_id = params.and_then(|Json(params)| params.driver_id);
    let request = api.accept_request(user, id, driver_id).await?;

    Ok(request.into())
}

pub async fn nearby(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyRequest>>, Error> {
    let requests = api.nearby_requests(user, query).await?;

    Ok(requests.into())
}
