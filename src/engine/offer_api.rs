use super::helpers::{
    fetch_offers, fetch_request_for_update, insert_offer, update_offer, update_request,
};
use super::{Database, Engine};

use async_trait::async_trait;
use sqlx::{Acquire, Transaction};
use uuid::Uuid;

use crate::api::{OfferAPI, TowRequestAPI};
use crate::auth::User;
use crate::entities::{Offer, TowRequest};
use crate::error::Error;
use crate::lifecycle::{negotiate, NegotiationEvent, NegotiationStep};

impl Engine {
    /// Runs `event` against the locked request and persists the resulting step.
    async fn negotiate_locked(
        &self,
        tx: &mut Transaction<'_, Database>,
        user: User,
        request_id: Uuid,
        event: NegotiationEvent,
    ) -> Result<(TowRequest, NegotiationStep), Error> {
        let mut request = fetch_request_for_update(tx, &request_id).await?;
        let offers = fetch_offers(tx, &request_id).await?;

        let step = negotiate(&request, &offers, event, user).map_err(|rejection| {
            tracing::info!(%rejection, "negotiation step rejected");
            rejection
        })?;

        // resolve first so the pending-offer index never sees two
        if let Some(resolved) = &step.resolved {
            update_offer(tx, resolved).await?;
        }

        if let Some(offer) = &step.offer {
            insert_offer(tx, offer).await?;
        }

        if request.negotiation != step.negotiation {
            tracing::info!(
                id = %request.id,
                negotiation = step.negotiation.kind().name(),
                "negotiation moved"
            );

            request.set_negotiation(step.negotiation);
            update_request(tx, &request).await?;
        }

        Ok((request, step))
    }
}

#[async_trait]
impl OfferAPI for Engine {
    #[tracing::instrument(skip(self, message))]
    async fn make_offer(
        &self,
        user: User,
        request_id: Uuid,
        amount: f64,
        message: Option<String>,
    ) -> Result<Offer, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let event = NegotiationEvent::MakeOffer { amount, message };
        let (_, step) = self.negotiate_locked(&mut tx, user, request_id, event).await?;

        tx.commit().await?;

        step.offer.ok_or_else(Error::unexpected_error)
    }

    #[tracing::instrument(skip(self))]
    async fn list_offers(&self, user: User, request_id: Uuid) -> Result<Vec<Offer>, Error> {
        self.find_request(user, request_id).await?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;
        let offers = fetch_offers(&mut tx, &request_id).await?;
        tx.commit().await?;

        Ok(offers)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_offer(&self, user: User, request_id: Uuid) -> Result<TowRequest, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let (request, _) = self
            .negotiate_locked(&mut tx, user, request_id, NegotiationEvent::AcceptOffer)
            .await?;

        tx.commit().await?;

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn reject_offer(&self, user: User, request_id: Uuid) -> Result<Offer, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let (_, step) = self
            .negotiate_locked(&mut tx, user, request_id, NegotiationEvent::RejectOffer)
            .await?;

        tx.commit().await?;

        step.resolved.ok_or_else(Error::unexpected_error)
    }
}
