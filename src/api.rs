use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AccessToken, User};
use crate::entities::{
    Coordinates, DriverPricing, DriverProfile, DriverStatus, Member, NearbyQuery, NearbyRequest,
    NewTowRequest, Offer, PricingUpdate, ProfileUpdate, Registration, StatusKind, TowRequest,
};
use crate::error::Error;

#[async_trait]
pub trait AccountAPI {
    async fn register(&self, registration: Registration) -> Result<Member, Error>;
    async fn login(&self, email: &str, password: &str) -> Result<AccessToken, Error>;

    /// Resolves a bearer token to the member it was issued for.
    async fn authenticate(&self, token: &str) -> Result<User, Error>;

    async fn find_member(&self, user: User) -> Result<Member, Error>;

    /// Creates the administrator account when it does not exist yet.
    async fn ensure_admin(&self, email: &str, password: &str) -> Result<Member, Error>;

    async fn pending_approvals(&self, user: User) -> Result<Vec<Member>, Error>;
    async fn approve_member(&self, user: User, id: Uuid) -> Result<Member, Error>;
}

#[async_trait]
pub trait TowRequestAPI {
    async fn create_request(&self, user: User, params: NewTowRequest)
        -> Result<TowRequest, Error>;
    async fn list_requests(&self, user: User) -> Result<Vec<TowRequest>, Error>;
    async fn find_request(&self, user: User, id: Uuid) -> Result<TowRequest, Error>;

    async fn accept_request(
        &self,
        user: User,
        id: Uuid,
        driver_id: Option<Uuid>,
    ) -> Result<TowRequest, Error>;

    async fn update_request(
        &self,
        user: User,
        id: Uuid,
        status: StatusKind,
    ) -> Result<TowRequest, Error>;

    async fn nearby_requests(
        &self,
        user: User,
        query: NearbyQuery,
    ) -> Result<Vec<NearbyRequest>, Error>;
}

#[async_trait]
pub trait OfferAPI {
    async fn make_offer(
        &self,
        user: User,
        request_id: Uuid,
        amount: f64,
        message: Option<String>,
    ) -> Result<Offer, Error>;

    /// Newest first.
    async fn list_offers(&self, user: User, request_id: Uuid) -> Result<Vec<Offer>, Error>;

    async fn accept_offer(&self, user: User, request_id: Uuid) -> Result<TowRequest, Error>;
    async fn reject_offer(&self, user: User, request_id: Uuid) -> Result<Offer, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn find_driver_profile(&self, user: User) -> Result<DriverProfile, Error>;

    async fn update_driver_profile(
        &self,
        user: User,
        update: ProfileUpdate,
    ) -> Result<DriverProfile, Error>;

    async fn update_driver_status(
        &self,
        user: User,
        status: DriverStatus,
    ) -> Result<DriverProfile, Error>;

    async fn update_driver_location(
        &self,
        user: User,
        coordinates: Coordinates,
    ) -> Result<DriverProfile, Error>;

    async fn find_driver_pricing(&self, user: User) -> Result<DriverPricing, Error>;

    async fn update_driver_pricing(
        &self,
        user: User,
        update: PricingUpdate,
    ) -> Result<DriverPricing, Error>;
}

pub trait API: AccountAPI + TowRequestAPI + OfferAPI + DriverAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
