use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::api::{AccountAPI, DynAPI};
use crate::auth::User;
use crate::entities::Member;
use crate::error::Error;

pub async fn pending_approvals(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Vec<Member>>, Error> {
    let members = api.pending_approvals(user).await?;

    Ok(members.into())
}

pub async fn approve_user(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Member>, Error> {
    let member = api.approve_member(user, id).await?;

    Ok(member.into())
}
