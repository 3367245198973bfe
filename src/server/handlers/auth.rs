use axum::extract::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::{AccountAPI, DynAPI};
use crate::auth::{AccessToken, User};
use crate::entities::{Member, Registration};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct LoginParams {
    email: String,
    password: String,
}

pub async fn register(
    Extension(api): Extension<DynAPI>,
    Json(registration): Json<Registration>,
) -> Result<Json<Member>, Error> {
    let member = api.register(registration).await?;

    Ok(member.into())
}

pub async fn login(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<LoginParams>,
) -> Result<Json<AccessToken>, Error> {
    let token = api.login(&params.email, &params.password).await?;

    Ok(token.into())
}

pub async fn me(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<Member>, Error> {
    let member = api.find_member(user).await?;

    Ok(member.into())
}
