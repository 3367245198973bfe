use super::Database;

use futures::TryStreamExt;
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Executor, Row, Transaction};
use uuid::Uuid;

use crate::entities::{DriverPricing, DriverProfile, Member, Offer, TowRequest};
use crate::error::Error;

#[tracing::instrument(skip(tx))]
pub async fn fetch_request_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<TowRequest, Error> {
    let Json(request): Json<TowRequest> = tx
        .fetch_optional(
            sqlx::query("SELECT data FROM tow_requests WHERE id = $1 FOR UPDATE").bind(id),
        )
        .await?
        .ok_or_else(|| Error::not_found_error("Tow request not found"))?
        .try_get("data")?;

    Ok(request)
}

#[tracing::instrument(skip(tx, request), fields(id = %request.id))]
pub async fn insert_request(
    tx: &mut Transaction<'_, Database>,
    request: &TowRequest,
) -> Result<(), Error> {
    let pickup: Geometry<f64> = request.pickup.coordinates.into();

    tx.execute(
        sqlx::query("INSERT INTO tow_requests (id, client_id, assigned_driver_id, status, pickup, data) VALUES ($1, $2, $3, $4, ST_SetSRID($5, 4326), $6)")
            .bind(&request.id)
            .bind(&request.client_id)
            .bind(request.assigned_driver_id())
            .bind(request.status.name())
            .bind(wkb::Encode(pickup))
            .bind(Json(request)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, request), fields(id = %request.id, status = request.status.name()))]
pub async fn update_request(
    tx: &mut Transaction<'_, Database>,
    request: &TowRequest,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "UPDATE tow_requests SET assigned_driver_id = $2, status = $3, data = $4 WHERE id = $1",
        )
        .bind(&request.id)
        .bind(request.assigned_driver_id())
        .bind(request.status.name())
        .bind(Json(request)),
    )
    .await?;

    Ok(())
}

/// Offers of a request, newest first. Callers hold the request row lock.
#[tracing::instrument(skip(tx))]
pub async fn fetch_offers(
    tx: &mut Transaction<'_, Database>,
    request_id: &Uuid,
) -> Result<Vec<Offer>, Error> {
    let mut rows = tx.fetch(
        sqlx::query("SELECT data FROM offers WHERE request_id = $1 ORDER BY created_at DESC")
            .bind(request_id),
    );

    let mut offers = vec![];
    while let Some(row) = rows.try_next().await? {
        let Json(offer): Json<Offer> = row.try_get("data")?;
        offers.push(offer);
    }

    Ok(offers)
}

#[tracing::instrument(skip(tx, offer), fields(id = %offer.id))]
pub async fn insert_offer(tx: &mut Transaction<'_, Database>, offer: &Offer) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO offers (id, request_id, status, created_at, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&offer.id)
        .bind(&offer.request_id)
        .bind(offer.status.name())
        .bind(&offer.created_at)
        .bind(Json(offer)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx, offer), fields(id = %offer.id, status = offer.status.name()))]
pub async fn update_offer(tx: &mut Transaction<'_, Database>, offer: &Offer) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE offers SET status = $2, data = $3 WHERE id = $1")
            .bind(&offer.id)
            .bind(offer.status.name())
            .bind(Json(offer)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_member_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Member, Error> {
    let Json(member): Json<Member> = tx
        .fetch_optional(sqlx::query("SELECT data FROM members WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| Error::not_found_error("User not found"))?
        .try_get("data")?;

    Ok(member)
}

#[tracing::instrument(skip(tx, member), fields(id = %member.id))]
pub async fn update_member(
    tx: &mut Transaction<'_, Database>,
    member: &Member,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE members SET status = $2, data = $3 WHERE id = $1")
            .bind(&member.id)
            .bind(member.status.name())
            .bind(Json(member)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_driver_for_update(
    tx: &mut Transaction<'_, Database>,
    user_id: &Uuid,
) -> Result<DriverProfile, Error> {
    let Json(driver): Json<DriverProfile> = tx
        .fetch_optional(
            sqlx::query("SELECT data FROM driver_profiles WHERE user_id = $1 FOR UPDATE")
                .bind(user_id),
        )
        .await?
        .ok_or_else(|| Error::not_found_error("Driver profile not found"))?
        .try_get("data")?;

    Ok(driver)
}

#[tracing::instrument(skip(tx, driver), fields(user_id = %driver.user_id))]
pub async fn upsert_driver(
    tx: &mut Transaction<'_, Database>,
    driver: &DriverProfile,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query("INSERT INTO driver_profiles (user_id, status, data) VALUES ($1, $2, $3) ON CONFLICT (user_id) DO UPDATE SET status = $2, data = $3")
            .bind(&driver.user_id)
            .bind(driver.status.name())
            .bind(Json(driver)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_pricing_for_update(
    tx: &mut Transaction<'_, Database>,
    driver_id: &Uuid,
) -> Result<DriverPricing, Error> {
    let Json(pricing): Json<DriverPricing> = tx
        .fetch_optional(
            sqlx::query("SELECT data FROM driver_pricing WHERE driver_id = $1 FOR UPDATE")
                .bind(driver_id),
        )
        .await?
        .ok_or_else(|| Error::not_found_error("Driver pricing not found"))?
        .try_get("data")?;

    Ok(pricing)
}

#[tracing::instrument(skip(tx, pricing), fields(driver_id = %pricing.driver_id))]
pub async fn upsert_pricing(
    tx: &mut Transaction<'_, Database>,
    pricing: &DriverPricing,
) -> Result<(), Error> {
    tx.execute(
        sqlx::query("INSERT INTO driver_pricing (driver_id, data) VALUES ($1, $2) ON CONFLICT (driver_id) DO UPDATE SET data = $2")
            .bind(&pricing.driver_id)
            .bind(Json(pricing)),
    )
    .await?;

    Ok(())
}
