use super::MemoryEngine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::{OfferAPI, TowRequestAPI};
use crate::auth::User;
use crate::entities::{Offer, TowRequest};
use crate::error::Error;
use crate::lifecycle::{negotiate, NegotiationEvent, NegotiationStep};

impl MemoryEngine {
    async fn negotiate_locked(
        &self,
        user: User,
        request_id: Uuid,
        event: NegotiationEvent,
    ) -> Result<(TowRequest, NegotiationStep), Error> {
        let mut store = self.store.lock().await;
        let store = &mut *store;

        let request = store
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| Error::not_found_error("Tow request not found"))?;
        let offers = store.offers.entry(request_id).or_default();

        let step = negotiate(request, offers, event, user).map_err(|rejection| {
            tracing::info!(%rejection, "negotiation step rejected");
            rejection
        })?;

        if let Some(resolved) = &step.resolved {
            for offer in offers.iter_mut().filter(|offer| offer.id == resolved.id) {
                *offer = resolved.clone();
            }
        }

        if let Some(offer) = &step.offer {
            offers.insert(0, offer.clone());
        }

        if request.negotiation != step.negotiation {
            tracing::info!(
                id = %request.id,
                negotiation = step.negotiation.kind().name(),
                "negotiation moved"
            );

            request.set_negotiation(step.negotiation);
        }

        Ok((request.clone(), step))
    }
}

#[async_trait]
impl OfferAPI for MemoryEngine {
    #[tracing::instrument(skip(self, message))]
    async fn make_offer(
        &self,
        user: User,
        request_id: Uuid,
        amount: f64,
        message: Option<String>,
    ) -> Result<Offer, Error> {
        let event = NegotiationEvent::MakeOffer { amount, message };
        let (_, step) = self.negotiate_locked(user, request_id, event).await?;

        step.offer.ok_or_else(Error::unexpected_error)
    }

    #[tracing::instrument(skip(self))]
    async fn list_offers(&self, user: User, request_id: Uuid) -> Result<Vec<Offer>, Error> {
        self.find_request(user, request_id).await?;

        let store = self.store.lock().await;

        Ok(store.offers.get(&request_id).cloned().unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    async fn accept_offer(&self, user: User, request_id: Uuid) -> Result<TowRequest, Error> {
        let (request, _) = self
            .negotiate_locked(user, request_id, NegotiationEvent::AcceptOffer)
            .await?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn reject_offer(&self, user: User, request_id: Uuid) -> Result<Offer, Error> {
        let (_, step) = self
            .negotiate_locked(user, request_id, NegotiationEvent::RejectOffer)
            .await?;

        step.resolved.ok_or_else(Error::unexpected_error)
    }
}

#[test]
fn counter_then_accept_agrees_on_the_counter() {
    use super::testing::{engine, member};
    use crate::entities::{
        Coordinates, NegotiationKind, NewTowRequest, OfferStatus, OfferType, Place, Role,
    };

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;

        let mut params = NewTowRequest::new(
            Place::new("Pickup", Coordinates::new(40.0, -74.0)),
            Place::new("Dropoff", Coordinates::new(40.2, -74.1)),
        );
        params.proposed_price = Some(500.0);
        let request = engine.create_request(client, params).await.unwrap();

        // only parties negotiate
        let err = engine.make_offer(driver, request.id, 450.0, None).await.unwrap_err();
        assert!(err.is_unauthorized_error());

        engine.accept_request(driver, request.id, None).await.unwrap();

        let counter = engine
            .make_offer(driver, request.id, 450.0, Some("fuel costs".into()))
            .await
            .unwrap();
        assert_eq!(counter.offer_type, OfferType::DriverCounter);

        let err = engine.accept_offer(driver, request.id).await.unwrap_err();
        assert!(err.is_invalid_state_error());

        let agreed = engine.accept_offer(client, request.id).await.unwrap();
        assert_eq!(agreed.final_agreed_price(), Some(450.0));
        assert_eq!(agreed.negotiation.kind(), NegotiationKind::PriceAgreed);

        let offers = engine.list_offers(client, request.id).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].status, OfferStatus::Accepted);

        let err = engine.make_offer(client, request.id, 400.0, None).await.unwrap_err();
        assert_eq!(err.message, "Price has already been agreed");
    });
}

#[test]
fn one_pending_offer_at_a_time() {
    use super::testing::{engine, member};
    use crate::entities::{Coordinates, NewTowRequest, OfferStatus, OfferType, Place, Role};

    tokio_test::block_on(async {
        let engine = engine();
        let client = member(&engine, "cat@example.com", Role::Client).await;
        let driver = member(&engine, "dan@example.com", Role::Driver).await;

        let params = NewTowRequest::new(
            Place::new("Pickup", Coordinates::new(40.0, -74.0)),
            Place::new("Dropoff", Coordinates::new(40.2, -74.1)),
        );
        let request = engine.create_request(client, params).await.unwrap();

        engine.make_offer(client, request.id, 120.0, None).await.unwrap();
        let err = engine.make_offer(client, request.id, 130.0, None).await.unwrap_err();
        assert_eq!(err.message, "You already have a pending offer");

        engine.accept_request(driver, request.id, None).await.unwrap();
        engine.make_offer(driver, request.id, 180.0, None).await.unwrap();
        engine.make_offer(client, request.id, 150.0, None).await.unwrap();

        let offers = engine.list_offers(driver, request.id).await.unwrap();
        let types: Vec<OfferType> = offers.iter().map(|offer| offer.offer_type).collect();
        assert_eq!(
            types,
            vec![
                OfferType::ClientOffer,
                OfferType::DriverCounter,
                OfferType::ClientOffer
            ]
        );
        assert_eq!(offers.iter().filter(|offer| offer.is_pending()).count(), 1);

        let amounts: Vec<f64> = offers.iter().map(|offer| offer.amount).collect();
        assert_eq!(amounts, vec![150.0, 180.0, 120.0]);

        let rejected = engine.reject_offer(driver, request.id).await.unwrap();
        assert_eq!(rejected.status, OfferStatus::Rejected);

        let request = engine.find_request(client, request.id).await.unwrap();
        assert_eq!(request.final_agreed_price(), None);
    });
}
