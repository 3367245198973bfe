use async_trait::async_trait;
use axum::extract::{Extension, FromRequest, RequestParts};
use axum::http::header::AUTHORIZATION;

use crate::api::{AccountAPI, DynAPI};
use crate::auth::User;
use crate::error::Error;

/// Bearer credential resolved to the member behind it.
#[async_trait]
impl<B: Send> FromRequest<B> for User {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(api) = Extension::<DynAPI>::from_request(req)
            .await
            .map_err(|_| Error::unexpected_error())?;

        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .ok_or_else(|| Error::unauthenticated_error("Not authenticated"))?;

        api.authenticate(&token).await
    }
}
