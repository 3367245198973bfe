use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Credential, Poller, TowClient};
use crate::auth::User;
use crate::entities::{Coordinates, NearbyQuery, NearbyRequest, Offer, TowRequest};
use crate::error::Error;
use crate::lifecycle::{available_actions, Actions};

pub const NEARBY_REFRESH: Duration = Duration::from_secs(30);
pub const NEGOTIATION_REFRESH: Duration = Duration::from_secs(10);

/// A driver's live list of nearby pending requests.
pub struct NearbyView {
    client: TowClient,
    credential: Credential,
    query: Arc<Mutex<NearbyQuery>>,
    poller: Poller<Vec<NearbyRequest>>,
}

impl NearbyView {
    pub fn open(
        client: TowClient,
        credential: Credential,
        max_distance: f64,
        origin: Option<Coordinates>,
    ) -> Self {
        Self::open_with_period(client, credential, max_distance, origin, NEARBY_REFRESH)
    }

    pub fn open_with_period(
        client: TowClient,
        credential: Credential,
        max_distance: f64,
        origin: Option<Coordinates>,
        period: Duration,
    ) -> Self {
        let query = Arc::new(Mutex::new(NearbyQuery::new(max_distance, origin)));

        let poller = {
            let (client, credential, query) = (client.clone(), credential.clone(), query.clone());

            Poller::spawn(period, move || {
                let (client, credential) = (client.clone(), credential.clone());
                let query = current(&query);

                async move { client.nearby_requests(&credential, &query?).await }
            })
        };

        Self {
            client,
            credential,
            query,
            poller,
        }
    }

    /// Last known position; used from the next refresh on.
    pub fn update_origin(&self, origin: Coordinates) -> Result<(), Error> {
        origin.validate()?;

        let mut query = self
            .query
            .lock()
            .map_err(|_| Error::unexpected_error())?;
        query.lat = Some(origin.lat);
        query.lng = Some(origin.lng);

        Ok(())
    }

    pub fn requests(&self) -> Option<Result<Vec<NearbyRequest>, Error>> {
        self.poller.latest()
    }

    pub async fn changed(&mut self) -> Result<Option<Result<Vec<NearbyRequest>, Error>>, Error> {
        self.poller.changed().await
    }

    pub async fn accept(&self, request_id: Uuid) -> Result<TowRequest, Error> {
        self.client
            .accept_request(&self.credential, request_id, None)
            .await
    }

    pub fn close(self) {
        self.poller.cancel();
    }
}

fn current(query: &Mutex<NearbyQuery>) -> Result<NearbyQuery, Error> {
    query
        .lock()
        .map(|query| *query)
        .map_err(|_| Error::unexpected_error())
}

/// Everything a negotiation screen renders for one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NegotiationSnapshot {
    pub request: TowRequest,
    pub offers: Vec<Offer>,
    pub actions: Actions,
}

impl NegotiationSnapshot {
    pub fn new(request: TowRequest, offers: Vec<Offer>, actor: User) -> Self {
        let actions = available_actions(&request, &offers, actor);

        Self {
            request,
            offers,
            actions,
        }
    }
}

/// A party's live view of one request's offer history.
pub struct NegotiationView {
    client: TowClient,
    credential: Credential,
    request_id: Uuid,
    poller: Poller<NegotiationSnapshot>,
}

impl NegotiationView {
    pub fn open(client: TowClient, credential: Credential, actor: User, request_id: Uuid) -> Self {
        Self::open_with_period(client, credential, actor, request_id, NEGOTIATION_REFRESH)
    }

    pub fn open_with_period(
        client: TowClient,
        credential: Credential,
        actor: User,
        request_id: Uuid,
        period: Duration,
    ) -> Self {
        let poller = {
            let (client, credential) = (client.clone(), credential.clone());

            Poller::spawn(period, move || {
                let (client, credential) = (client.clone(), credential.clone());

                async move {
                    let request = client.find_request(&credential, request_id).await?;
                    let offers = client.list_offers(&credential, request_id).await?;

                    Ok(NegotiationSnapshot::new(request, offers, actor))
                }
            })
        };

        Self {
            client,
            credential,
            request_id,
            poller,
        }
    }

    pub fn snapshot(&self) -> Option<Result<NegotiationSnapshot, Error>> {
        self.poller.latest()
    }

    pub async fn changed(&mut self) -> Result<Option<Result<NegotiationSnapshot, Error>>, Error> {
        self.poller.changed().await
    }

    pub async fn make_offer(&self, amount: f64, message: Option<&str>) -> Result<Offer, Error> {
        self.client
            .make_offer(&self.credential, self.request_id, amount, message)
            .await
    }

    pub async fn accept_offer(&self) -> Result<TowRequest, Error> {
        self.client
            .accept_offer(&self.credential, self.request_id)
            .await
    }

    pub async fn reject_offer(&self) -> Result<Offer, Error> {
        self.client
            .reject_offer(&self.credential, self.request_id)
            .await
    }

    pub fn close(self) {
        self.poller.cancel();
    }
}

#[test]
fn snapshot_carries_the_actors_actions() {
    use crate::entities::{sample_request, Role};

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let request = sample_request(client.id);

    let snapshot = NegotiationSnapshot::new(request.clone(), vec![], client);
    assert!(snapshot.actions.make_offer && snapshot.actions.cancel);

    let snapshot = NegotiationSnapshot::new(request, vec![], driver);
    assert!(snapshot.actions.accept_request);
    assert!(!snapshot.actions.cancel);
}
