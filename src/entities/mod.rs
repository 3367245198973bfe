mod driver;
mod member;
mod nearby;
mod offer;
mod place;
mod pricing;
mod tow_request;

pub use driver::{DriverProfile, ProfileUpdate, Status as DriverStatus};
pub use member::{normalize_email, Member, Registration, Role, Status as MemberStatus};
pub use nearby::{NearbyQuery, NearbyRequest, DEFAULT_MAX_DISTANCE_KM};
pub use offer::{Offer, OfferType, Status as OfferStatus};
pub use place::{Coordinates, Place};
pub use pricing::{round_cents, BasePricing, DriverPricing, PricingUpdate};
pub use tow_request::{
    Negotiation, NegotiationKind, NewTowRequest, Status as RequestStatus, StatusKind,
    TowRequest,
};

#[cfg(test)]
pub use tow_request::sample_request;
