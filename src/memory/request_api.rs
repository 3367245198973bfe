use super::{MemoryEngine, Store};

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::TowRequestAPI;
use crate::auth::{Platform, User};
use crate::entities::{
    DriverPricing, NearbyQuery, NearbyRequest, NewTowRequest, OfferStatus, RequestStatus, Role,
    StatusKind, TowRequest,
};
use crate::error::Error;
use crate::lifecycle::{transition, transition_to, StatusEvent};

impl MemoryEngine {
    fn apply_status(
        &self,
        store: &mut Store,
        id: Uuid,
        status: RequestStatus,
        user: User,
    ) -> Result<TowRequest, Error> {
        match status {
            RequestStatus::Accepted { driver_id } if user.has_role(Role::TowCompany) => {
                if !store.driver_mut(&driver_id)?.belongs_to(user.id) {
                    return Err(Error::unauthorized_error(
                        "Driver does not belong to your company",
                    ));
                }
            }
            RequestStatus::OnMission { driver_id } => store.driver_mut(&driver_id)?.begin_mission(),
            RequestStatus::Completed { driver_id } => {
                store.driver_mut(&driver_id)?.finish_mission()
            }
            // an open offer dies with its request
            RequestStatus::Cancelled => {
                if let Some(offers) = store.offers.get_mut(&id) {
                    for offer in offers.iter_mut().filter(|offer| offer.is_pending()) {
                        *offer = offer.resolved(OfferStatus::Expired);
                    }
                }
            }
            _ => {}
        }

        let request = store
            .requests
            .get_mut(&id)
            .ok_or_else(|| Error::not_found_error("Tow request not found"))?;

        tracing::info!(
            id = %request.id,
            from = request.status.name(),
            to = status.name(),
            "request status changed"
        );

        if let RequestStatus::Accepted { .. } = status {
            if user.has_role(Role::TowCompany) {
                request.accepted_by_company_id = Some(user.id);
            }
        }
        request.set_status(status);

        Ok(request.clone())
    }
}

#[async_trait]
impl TowRequestAPI for MemoryEngine {
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

        let mut store = self.store.lock().await;
        store.requests.insert(request.id, request.clone());

        tracing::info!(id = %request.id, "tow request created");

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn list_requests(&self, user: User) -> Result<Vec<TowRequest>, Error> {
        let store = self.store.lock().await;

        let mut requests: Vec<TowRequest> = store
            .requests
            .values()
            .filter(|request| request.is_listed_for(user))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(requests)
    }

    #[tracing::instrument(skip(self))]
    async fn find_request(&self, user: User, id: Uuid) -> Result<TowRequest, Error> {
        let request = self.store.lock().await.request(&id)?.clone();

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
        let mut store = self.store.lock().await;

        let event = StatusEvent::Accept { driver_id };
        let status = transition(store.request(&id)?, event, user).map_err(|rejection| {
            tracing::info!(%rejection, "accept rejected");
            rejection
        })?;

        self.apply_status(&mut store, id, status, user)
    }

    #[tracing::instrument(skip(self))]
    async fn update_request(
        &self,
        user: User,
        id: Uuid,
        status: StatusKind,
    ) -> Result<TowRequest, Error> {
        let mut store = self.store.lock().await;

        let status = transition_to(store.request(&id)?, status, None, user).map_err(|rejection| {
            tracing::info!(%rejection, "status update rejected");
            rejection
        })?;

        self.apply_status(&mut store, id, status, user)
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

        let store = self.store.lock().await;
        let base = &self.settings.base_pricing;

        let driver = store
            .drivers
            .get(&user.id)
            .ok_or_else(|| Error::not_found_error("Driver profile not found"))?;
        let pricing = store
            .pricing
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| DriverPricing::new(user.id, base));

        let (origin, max_distance) = query.resolve(driver.location)?;

        let mut requests: Vec<NearbyRequest> = store
            .requests
            .values()
            .filter(|request| request.is_pending() && request.assigned_driver_id().is_none())
            .map(|request| NearbyRequest {
                distance_km: origin.distance_km(&request.pickup.coordinates),
                estimated_price: pricing.quote(base, &request.pickup, &request.dropoff),
                request: request.clone(),
            })
            .filter(|nearby| nearby.distance_km <= max_distance)
            .collect();
        NearbyRequest::sort(&mut requests);

        tracing::info!(count = requests.len(), max_distance, "nearby requests found");

        Ok(requests)
    }
}

#[cfg(test)]
fn new_request(lat: f64, lng: f64) -> NewTowRequest {
    use crate::entities::{Coordinates, Place};

    NewTowRequest::new(
        Place::new(format!("pickup at {},{}", lat, lng), Coordinates::new(lat, lng)),
        Place::new("Main St Garage", Coordinates::new(40.7357, -74.1724)),
    )
}

#[test]
fn created_requests_round_trip_by_id() {
    use super::testing::{engine, member};

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;

        let mut params = new_request(40.748_417, -73.985_656);
        params.pickup_address = "350 5th Ave, New York, NY".into();
        params.proposed_price = Some(500.0);

        let created = engine.create_request(client, params.clone()).await.unwrap();
        let fetched = engine.find_request(client, created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.pickup, params.pickup());
        assert_eq!(fetched.dropoff, params.dropoff());
        assert_eq!(fetched.status, RequestStatus::Pending);
        assert!(fetched.calculated_price.unwrap() > 25.0);

        let driver = member(&engine, "dan@example.com", Role::Driver).await;
        let err = engine.create_request(driver, new_request(40.0, -74.0)).await.unwrap_err();
        assert!(err.is_unauthorized_error());

        let stranger = member(&engine, "dee@example.com", Role::Dealer).await;
        let err = engine.find_request(stranger, created.id).await.unwrap_err();
        assert_eq!(err.message, "Not authorized to view this request");
    });
}

#[tokio::test]
async fn concurrent_accepts_have_one_winner() {
    use super::testing::{engine, member};
    use std::sync::Arc;

    let engine = Arc::new(engine());
    let client = member(&engine, "cat@example.com", Role::Client).await;
    let first = member(&engine, "first@example.com", Role::Driver).await;
    let second = member(&engine, "second@example.com", Role::Driver).await;

    let request = engine.create_request(client, new_request(40.0, -74.0)).await.unwrap();
    let request_id = request.id;

    let tasks: Vec<_> = [first, second]
        .into_iter()
        .map(|driver| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let result = engine.accept_request(driver, request_id, None).await;
                (driver, result)
            })
        })
        .collect();

    let mut winners = vec![];
    let mut losers = vec![];
    for task in tasks {
        let (driver, result) = task.await.unwrap();
        match result {
            Ok(request) => winners.push((driver, request)),
            Err(err) => losers.push(err),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(losers.len(), 1);

    let (driver, accepted) = &winners[0];
    assert_eq!(accepted.assigned_driver_id(), Some(driver.id));
    assert!(losers[0].is_invalid_state_error());
    assert!(losers[0].message.contains("already been accepted"));
}

#[test]
fn mission_updates_the_driver_profile() {
    use super::testing::{engine, member};
    use crate::api::DriverAPI;
    use crate::entities::DriverStatus;

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;

        let request = engine.create_request(client, new_request(40.0, -74.0)).await.unwrap();
        engine.accept_request(driver, request.id, None).await.unwrap();

        let err = engine
            .update_request(driver, request.id, StatusKind::Completed)
            .await
            .unwrap_err();
        assert!(err.is_invalid_state_error());

        engine
            .update_request(driver, request.id, StatusKind::OnMission)
            .await
            .unwrap();
        let profile = engine.find_driver_profile(driver).await.unwrap();
        assert_eq!(profile.status, DriverStatus::OnMission);

        let done = engine
            .update_request(driver, request.id, StatusKind::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, RequestStatus::Completed { driver_id: driver.id });

        let profile = engine.find_driver_profile(driver).await.unwrap();
        assert_eq!(profile.status, DriverStatus::Available);
        assert_eq!(profile.total_jobs, 1);

        let err = engine
            .update_request(client, request.id, StatusKind::Pending)
            .await
            .unwrap_err();
        assert!(err.is_invalid_state_error());
    });
}

#[test]
fn tow_companies_dispatch_their_own_drivers() {
    use super::testing::{engine, member};
    use crate::api::DriverAPI;
    use crate::entities::ProfileUpdate;

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let company = member(&engine, "fleet@example.com", Role::TowCompany).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;
        let outsider = member(&engine, "ola@example.com", Role::Driver).await;

        engine
            .update_driver_profile(
                driver,
                ProfileUpdate {
                    tow_company_id: Some(company.id),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let request = engine.create_request(client, new_request(40.0, -74.0)).await.unwrap();

        let err = engine.accept_request(company, request.id, None).await.unwrap_err();
        assert!(err.is_invalid_state_error());

        let err = engine
            .accept_request(company, request.id, Some(outsider.id))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized_error());

        let accepted = engine
            .accept_request(company, request.id, Some(driver.id))
            .await
            .unwrap();
        assert_eq!(accepted.assigned_driver_id(), Some(driver.id));
        assert_eq!(accepted.accepted_by_company_id, Some(company.id));

        let cancelled = engine
            .update_request(client, request.id, StatusKind::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.assigned_driver_id(), None);
        assert_eq!(cancelled.accepted_by_company_id, None);
    });
}

#[test]
fn nearby_requests_stay_within_the_radius() {
    use super::testing::{engine, member};
    use crate::api::DriverAPI;
    use crate::entities::Coordinates;

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;
        let other = member(&engine, "ola@example.com", Role::Driver).await;

        // roughly 11 km, 33 km and 111 km north of the driver
        let close = engine.create_request(client, new_request(40.1, -74.0)).await.unwrap();
        let mid = engine.create_request(client, new_request(40.3, -74.0)).await.unwrap();
        let far = engine.create_request(client, new_request(41.0, -74.0)).await.unwrap();
        let taken = engine.create_request(client, new_request(40.05, -74.0)).await.unwrap();
        engine.accept_request(other, taken.id, None).await.unwrap();

        let origin = Coordinates::new(40.0, -74.0);
        let err = engine
            .nearby_requests(driver, NearbyQuery::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());

        engine.update_driver_location(driver, origin).await.unwrap();
        let nearby = engine
            .nearby_requests(driver, NearbyQuery::default())
            .await
            .unwrap();

        let ids: Vec<Uuid> = nearby.iter().map(|n| n.request.id).collect();
        assert_eq!(ids, vec![close.id, mid.id]);
        assert!(!ids.contains(&far.id));

        for entry in nearby.iter() {
            assert!(entry.distance_km >= 0.0 && entry.distance_km <= 50.0);
            assert!(entry.estimated_price >= 25.0);
        }

        let nearby = engine
            .nearby_requests(driver, NearbyQuery::new(20.0, Some(origin)))
            .await
            .unwrap();
        assert_eq!(nearby.len(), 1);

        let err = engine
            .nearby_requests(client, NearbyQuery::new(50.0, Some(origin)))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized_error());
    });
}

#[test]
fn listings_follow_role() {
    use super::testing::{engine, member};

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let dealer = member(&engine, "dee@example.com", Role::Dealer).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;
        let other = member(&engine, "ola@example.com", Role::Driver).await;

        let mine = engine.create_request(client, new_request(40.0, -74.0)).await.unwrap();
        let theirs = engine.create_request(dealer, new_request(40.2, -74.0)).await.unwrap();
        engine.accept_request(other, theirs.id, None).await.unwrap();

        let listed = engine.list_requests(client).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        let listed = engine.list_requests(driver).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        assert_eq!(engine.list_requests(other).await.unwrap().len(), 2);
    });
}

#[test]
fn cancelling_expires_the_open_offer() {
    use super::testing::{engine, member};
    use crate::api::OfferAPI;

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;

        let request = engine
            .create_request(client, new_request(40.7, -74.0))
            .await
            .unwrap();
        engine.make_offer(client, request.id, 150.0, None).await.unwrap();
        engine.accept_request(driver, request.id, None).await.unwrap();
        engine.make_offer(driver, request.id, 190.0, None).await.unwrap();

        engine
            .update_request(client, request.id, StatusKind::Cancelled)
            .await
            .unwrap();

        let offers = engine.list_offers(client, request.id).await.unwrap();
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].amount, 190.0);
        assert_eq!(offers[0].status, OfferStatus::Expired);
        assert!(offers.iter().all(|offer| !offer.is_pending()));

        let err = engine.accept_offer(client, request.id).await.unwrap_err();
        assert!(err.is_invalid_state_error());
    });
}
