use super::helpers::{
    fetch_driver_for_update, fetch_offers, fetch_request_for_update, insert_request,
    update_offer, update_request, upsert_driver,
};
use super::{Database, Engine};

use async_trait::async_trait;
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Acquire, Executor, Row, Transaction};
use uuid::Uuid;

use crate::api::TowRequestAPI;
use crate::auth::{Platform, User};
use crate::entities::{
    DriverPricing, NearbyQuery, NearbyRequest, NewTowRequest, OfferStatus, RequestStatus, Role,
    StatusKind, TowRequest,
};
use crate::error::Error;
use crate::lifecycle::{transition, transition_to, StatusEvent};

impl Engine {
    /// Persists a status produced by the lifecycle together with its driver side effects.
    async fn apply_status(
        &self,
        tx: &mut Transaction<'_, Database>,
        request: &mut TowRequest,
        status: RequestStatus,
        user: User,
    ) -> Result<(), Error> {
        match status {
            RequestStatus::Accepted { driver_id } if user.has_role(Role::TowCompany) => {
                let driver = fetch_driver_for_update(tx, &driver_id).await?;
                if !driver.belongs_to(user.id) {
                    return Err(Error::unauthorized_error(
                        "Driver does not belong to your company",
                    ));
                }
                request.accepted_by_company_id = Some(user.id);
            }
            RequestStatus::OnMission { driver_id } => {
                let mut driver = fetch_driver_for_update(tx, &driver_id).await?;
                driver.begin_mission();
                upsert_driver(tx, &driver).await?;
            }
            RequestStatus::Completed { driver_id } => {
                let mut driver = fetch_driver_for_update(tx, &driver_id).await?;
                driver.finish_mission();
                upsert_driver(tx, &driver).await?;
            }
            // an open offer dies with its request
            RequestStatus::Cancelled => {
                let offers = fetch_offers(tx, &request.id).await?;
                for offer in offers.iter().filter(|offer| offer.is_pending()) {
                    update_offer(tx, &offer.resolved(OfferStatus::Expired)).await?;
                }
            }
            _ => {}
        }

        tracing::info!(
            id = %request.id,
            from = request.status.name(),
            to = status.name(),
            "request status changed"
        );

        request.set_status(status);
        update_request(tx, request).await
    }
}

#[async_trait]
impl TowRequestAPI for Engine {
    #[tracing::instrument(skip(self, params))]
    async fn create_request(&self, user: User, params: NewTowRequest) -> Result<TowRequest, Error> {
        self.authorize(
            user,
            "create_request",
            Platform::default(),
            "Only clients and dealers can create tow requests",
        )?;

        params.validate()?;

        let calculated_price = self
            .settings
            .base_pricing
            .quote(&params.pickup(), &params.dropoff());
        let request = TowRequest::new(user.id, params, Some(calculated_price));

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        insert_request(&mut tx, &request).await?;
        tx.commit().await?;

        tracing::info!(id = %request.id, "tow request created");

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn list_requests(&self, user: User) -> Result<Vec<TowRequest>, Error> {
        let query = match user.role {
            Role::Client | Role::Dealer => {
                sqlx::query("SELECT data FROM tow_requests WHERE client_id = $1").bind(user.id)
            }
            Role::Driver => sqlx::query(
                "SELECT data FROM tow_requests WHERE assigned_driver_id = $1 OR status = 'pending'",
            )
            .bind(user.id),
            Role::TowCompany | Role::Admin => sqlx::query("SELECT data FROM tow_requests"),
        };

        let mut conn = self.pool.acquire().await?;
        let results = conn.fetch_all(query).await?;

        let mut requests = vec![];
        for result in results.iter() {
            let Json(request): Json<TowRequest> = result.try_get("data")?;
            requests.push(request);
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(requests)
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, user: User, id: Uuid) -> Result<TowRequest, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM tow_requests WHERE id = $1").bind(&id))
            .await?;

        let result = maybe_result.ok_or_else(|| Error::not_found_error("Tow request not found"))?;
        let Json(request): Json<TowRequest> = result.try_get("data")?;

        self.authorize(
            user,
            "read",
            request.clone(),
            "Not authorized to view this request",
        )?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_request(
        &self,
        user: User,
        id: Uuid,
        driver_id: Option<Uuid>,
    ) -> Result<TowRequest, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut request = fetch_request_for_update(&mut tx, &id).await?;

        let event = StatusEvent::Accept { driver_id };
        let status = transition(&request, event, user).map_err(|rejection| {
            tracing::info!(%rejection, "accept rejected");
            rejection
        })?;

        self.apply_status(&mut tx, &mut request, status, user).await?;
        tx.commit().await?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn update_request(
        &self,
        user: User,
        id: Uuid,
        status: StatusKind,
    ) -> Result<TowRequest, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut request = fetch_request_for_update(&mut tx, &id).await?;

        let status = transition_to(&request, status, None, user).map_err(|rejection| {
            tracing::info!(%rejection, "status update rejected");
            rejection
        })?;

        self.apply_status(&mut tx, &mut request, status, user).await?;
        tx.commit().await?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn nearby_requests(
        &self,
        user: User,
        query: NearbyQuery,
    ) -> Result<Vec<NearbyRequest>, Error> {
        self.authorize(
            user,
            "drive",
            Platform::default(),
            "Only drivers can view nearby requests",
        )?;

        let driver = self.fetch_driver(user.id).await?;
        let pricing = self
            .fetch_pricing(user.id)
            .await?
            .unwrap_or_else(|| DriverPricing::new(user.id, &self.settings.base_pricing));

        let (origin, max_distance) = query.resolve(driver.location)?;
        let origin: Geometry<f64> = origin.into();

        let query = "
            SELECT
                r.data AS data,
                ST_DistanceSphere(r.pickup, ST_SetSRID($1, 4326)) / 1000.0::float8 AS distance_km
            FROM
                tow_requests r
            WHERE
                r.status = 'pending'
                AND r.assigned_driver_id IS NULL
                AND ST_DistanceSphere(r.pickup, ST_SetSRID($1, 4326)) <= $2 * 1000.0::float8
            ORDER BY
                distance_km ASC
        ";

        let mut conn = self.pool.acquire().await?;
        let results = conn
            .fetch_all(
                sqlx::query(query)
                    .bind(wkb::Encode(origin))
                    .bind(max_distance),
            )
            .await?;

        let mut requests = vec![];
        for result in results.iter() {
            let Json(request): Json<TowRequest> = result.try_get("data")?;
            let distance_km: f64 = result.try_get("distance_km")?;
            let estimated_price =
                pricing.quote(&self.settings.base_pricing, &request.pickup, &request.dropoff);

            requests.push(NearbyRequest {
                request,
                distance_km,
                estimated_price,
            });
        }

        tracing::info!(count = requests.len(), max_distance, "nearby requests found");

        Ok(requests)
    }
}
