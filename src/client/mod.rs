//! Typed HTTP client for the `/api` surface, plus the polling views screens
//! are built on.

mod poller;
mod views;

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AccessToken;
use crate::entities::{
    Coordinates, DriverPricing, DriverProfile, DriverStatus, Member, NearbyQuery, NearbyRequest,
    NewTowRequest, Offer, PricingUpdate, ProfileUpdate, Registration, StatusKind, TowRequest,
};
use crate::error::Error;

pub use poller::Poller;
pub use views::{
    NearbyView, NegotiationSnapshot, NegotiationView, NEARBY_REFRESH, NEGOTIATION_REFRESH,
};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server root, without the `/api` prefix.
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }
}

/// Bearer credential handed to every authenticated call.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl From<&AccessToken> for Credential {
    fn from(token: &AccessToken) -> Self {
        Self::bearer(token.access_token.clone())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

#[derive(Clone, Debug)]
pub struct TowClient {
    http: reqwest::Client,
    base_url: String,
}

impl TowClient {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let request = self
            .http
            .request(method, format!("{}/api{}", self.base_url, path));

        match credential {
            Some(credential) => request.bearer_auth(&credential.token),
            None => request,
        }
    }

    /// Sends once; a non-success response surfaces the server's `detail`.
    #[tracing::instrument(skip_all)]
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, Error> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(|err| {
                tracing::warn!("undecodable response: {:?}", err);
                Error::upstream_error()
            });
        }

        let err = match response.json::<Error>().await {
            Ok(err) => err,
            Err(_) => Error::upstream_error(),
        };
        tracing::info!(status = status.as_u16(), detail = %err, "call rejected");

        Err(err)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Member, Error> {
        registration.validate()?;

        self.send(
            self.request(Method::POST, "/auth/register", None)
                .json(registration),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken, Error> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::invalid_input_error("Email and password are required"));
        }

        self.send(
            self.request(Method::POST, "/auth/login", None)
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn me(&self, credential: &Credential) -> Result<Member, Error> {
        self.send(self.request(Method::GET, "/auth/me", Some(credential)))
            .await
    }

    pub async fn create_request(
        &self,
        credential: &Credential,
        params: &NewTowRequest,
    ) -> Result<TowRequest, Error> {
        params.validate()?;

        self.send(
            self.request(Method::POST, "/tow-requests", Some(credential))
                .json(params),
        )
        .await
    }

    pub async fn list_requests(&self, credential: &Credential) -> Result<Vec<TowRequest>, Error> {
        self.send(self.request(Method::GET, "/tow-requests", Some(credential)))
            .await
    }

    pub async fn find_request(
        &self,
        credential: &Credential,
        id: Uuid,
    ) -> Result<TowRequest, Error> {
        self.send(self.request(Method::GET, &format!("/tow-requests/{}", id), Some(credential)))
            .await
    }

    pub async fn accept_request(
        &self,
        credential: &Credential,
        id: Uuid,
        driver_id: Option<Uuid>,
    ) -> Result<TowRequest, Error> {
        self.send(
            self.request(
                Method::POST,
                &format!("/tow-requests/{}/accept", id),
                Some(credential),
            )
            .json(&json!({ "driver_id": driver_id })),
        )
        .await
    }

    pub async fn update_request(
        &self,
        credential: &Credential,
        id: Uuid,
        status: StatusKind,
    ) -> Result<TowRequest, Error> {
        self.send(
            self.request(Method::PUT, &format!("/tow-requests/{}", id), Some(credential))
                .json(&json!({ "status": status })),
        )
        .await
    }

    pub async fn nearby_requests(
        &self,
        credential: &Credential,
        query: &NearbyQuery,
    ) -> Result<Vec<NearbyRequest>, Error> {
        self.send(
            self.request(Method::GET, "/tow-requests/nearby", Some(credential))
                .query(query),
        )
        .await
    }

    pub async fn make_offer(
        &self,
        credential: &Credential,
        request_id: Uuid,
        amount: f64,
        message: Option<&str>,
    ) -> Result<Offer, Error> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::invalid_input_error(
                "Offer amount must be a positive number",
            ));
        }

        self.send(
            self.request(
                Method::POST,
                &format!("/tow-requests/{}/offer", request_id),
                Some(credential),
            )
            .json(&json!({ "amount": amount, "message": message })),
        )
        .await
    }

    pub async fn list_offers(
        &self,
        credential: &Credential,
        request_id: Uuid,
    ) -> Result<Vec<Offer>, Error> {
        self.send(self.request(
            Method::GET,
            &format!("/tow-requests/{}/offers", request_id),
            Some(credential),
        ))
        .await
    }

    pub async fn accept_offer(
        &self,
        credential: &Credential,
        request_id: Uuid,
    ) -> Result<TowRequest, Error> {
        self.send(self.request(
            Method::POST,
            &format!("/tow-requests/{}/accept-offer", request_id),
            Some(credential),
        ))
        .await
    }

    pub async fn reject_offer(
        &self,
        credential: &Credential,
        request_id: Uuid,
    ) -> Result<Offer, Error> {
        self.send(self.request(
            Method::POST,
            &format!("/tow-requests/{}/reject-offer", request_id),
            Some(credential),
        ))
        .await
    }

    pub async fn driver_profile(&self, credential: &Credential) -> Result<DriverProfile, Error> {
        self.send(self.request(Method::GET, "/drivers/profile", Some(credential)))
            .await
    }

    pub async fn update_driver_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<DriverProfile, Error> {
        self.send(
            self.request(Method::PUT, "/drivers/profile", Some(credential))
                .json(update),
        )
        .await
    }

    pub async fn update_driver_status(
        &self,
        credential: &Credential,
        status: DriverStatus,
    ) -> Result<DriverProfile, Error> {
        self.send(
            self.request(Method::PUT, "/drivers/status", Some(credential))
                .query(&[("status", status.name())]),
        )
        .await
    }

    pub async fn update_driver_location(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
    ) -> Result<DriverProfile, Error> {
        coordinates.validate()?;

        self.send(
            self.request(Method::PUT, "/drivers/location", Some(credential))
                .query(&coordinates),
        )
        .await
    }

    pub async fn driver_pricing(&self, credential: &Credential) -> Result<DriverPricing, Error> {
        self.send(self.request(Method::GET, "/drivers/pricing", Some(credential)))
            .await
    }

    pub async fn update_driver_pricing(
        &self,
        credential: &Credential,
        update: &PricingUpdate,
    ) -> Result<DriverPricing, Error> {
        update.validate()?;

        self.send(
            self.request(Method::PUT, "/drivers/pricing", Some(credential))
                .json(update),
        )
        .await
    }

    pub async fn pending_approvals(&self, credential: &Credential) -> Result<Vec<Member>, Error> {
        self.send(self.request(Method::GET, "/admin/pending-approvals", Some(credential)))
            .await
    }

    pub async fn approve_user(&self, credential: &Credential, id: Uuid) -> Result<Member, Error> {
        self.send(self.request(
            Method::POST,
            &format!("/admin/approve-user/{}", id),
            Some(credential),
        ))
        .await
    }
}

#[test]
fn local_validation_never_reaches_the_network() {
    use crate::entities::{Coordinates, Place};

    // nothing listens on port 9
    let client = TowClient::new(&ClientConfig::new("http://127.0.0.1:9/")).unwrap();
    let credential = Credential::bearer("token");

    tokio_test::block_on(async {
        let err = client.login("", "secret").await.unwrap_err();
        assert!(err.is_invalid_input_error());

        let params = NewTowRequest::new(
            Place::new("", Coordinates::new(40.0, -74.0)),
            Place::new("Garage", Coordinates::new(40.1, -74.0)),
        );
        let err = client.create_request(&credential, &params).await.unwrap_err();
        assert_eq!(err.message, "Pickup address is required");

        let err = client
            .make_offer(&credential, Uuid::new_v4(), -10.0, None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input_error());
    });
}

#[test]
fn unreachable_server_is_a_network_error() {
    let client = TowClient::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap();

    let err = tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(client.me(&Credential::bearer("token")))
        .unwrap_err();

    assert!(err.is_network_error());
    assert_eq!(err.message, "Network failure, please try again");
}
