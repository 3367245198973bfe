use std::convert::TryFrom;
use std::fmt;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Coordinates, Place, Role};
use crate::error::Error;

/// Job status. The driver lives inside the variants that require one, so a
/// request is assigned exactly when it is accepted, on mission or completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Accepted { driver_id: Uuid },
    OnMission { driver_id: Uuid },
    Completed { driver_id: Uuid },
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Accepted,
    OnMission,
    Completed,
    Cancelled,
}

impl StatusKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::OnMission => "on_mission",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Status {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Pending => StatusKind::Pending,
            Self::Accepted { .. } => StatusKind::Accepted,
            Self::OnMission { .. } => StatusKind::OnMission,
            Self::Completed { .. } => StatusKind::Completed,
            Self::Cancelled => StatusKind::Cancelled,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            Self::Accepted { driver_id }
            | Self::OnMission { driver_id }
            | Self::Completed { driver_id } => Some(*driver_id),
            Self::Pending | Self::Cancelled => None,
        }
    }

    fn from_parts(kind: StatusKind, driver_id: Option<Uuid>) -> Result<Self, String> {
        match (kind, driver_id) {
            (StatusKind::Pending, None) => Ok(Self::Pending),
            (StatusKind::Cancelled, None) => Ok(Self::Cancelled),
            (StatusKind::Accepted, Some(driver_id)) => Ok(Self::Accepted { driver_id }),
            (StatusKind::OnMission, Some(driver_id)) => Ok(Self::OnMission { driver_id }),
            (StatusKind::Completed, Some(driver_id)) => Ok(Self::Completed { driver_id }),
            (kind, Some(_)) => Err(format!("{} request cannot have an assigned driver", kind)),
            (kind, None) => Err(format!("{} request must have an assigned driver", kind)),
        }
    }
}

/// Offer exchange state; the agreed price exists only once agreed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Negotiation {
    AwaitingDriver,
    Negotiating,
    PriceAgreed { amount: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationKind {
    AwaitingDriver,
    Negotiating,
    PriceAgreed,
}

impl NegotiationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingDriver => "awaiting_driver",
            Self::Negotiating => "negotiating",
            Self::PriceAgreed => "price_agreed",
        }
    }
}

impl Negotiation {
    pub fn kind(&self) -> NegotiationKind {
        match self {
            Self::AwaitingDriver => NegotiationKind::AwaitingDriver,
            Self::Negotiating => NegotiationKind::Negotiating,
            Self::PriceAgreed { .. } => NegotiationKind::PriceAgreed,
        }
    }

    pub fn agreed_price(&self) -> Option<f64> {
        match self {
            Self::PriceAgreed { amount } => Some(*amount),
            _ => None,
        }
    }

    fn from_parts(kind: NegotiationKind, amount: Option<f64>) -> Result<Self, String> {
        match (kind, amount) {
            (NegotiationKind::AwaitingDriver, None) => Ok(Self::AwaitingDriver),
            (NegotiationKind::Negotiating, None) => Ok(Self::Negotiating),
            (NegotiationKind::PriceAgreed, Some(amount)) => Ok(Self::PriceAgreed { amount }),
            (NegotiationKind::PriceAgreed, None) => {
                Err("agreed negotiation must carry a final price".into())
            }
            (kind, Some(_)) => Err(format!(
                "{} negotiation cannot carry a final price",
                kind.name()
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "TowRequestRecord", try_from = "TowRequestRecord")]
pub struct TowRequest {
    pub id: Uuid,
    pub client_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle_info: Option<String>,
    pub notes: Option<String>,
    pub proposed_price: Option<f64>,
    pub calculated_price: Option<f64>,
    pub status: Status,
    pub negotiation: Negotiation,
    pub accepted_by_company_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat wire and storage shape of a tow request.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct TowRequestRecord {
    id: Uuid,
    client_id: Uuid,
    pickup_address: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_address: String,
    dropoff_lat: f64,
    dropoff_lng: f64,
    vehicle_info: Option<String>,
    notes: Option<String>,
    proposed_price: Option<f64>,
    calculated_price: Option<f64>,
    final_agreed_price: Option<f64>,
    status: StatusKind,
    negotiation_status: NegotiationKind,
    assigned_driver_id: Option<Uuid>,
    accepted_by_company_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TowRequest> for TowRequestRecord {
    fn from(request: TowRequest) -> Self {
        Self {
            id: request.id,
            client_id: request.client_id,
            pickup_lat: request.pickup.coordinates.lat,
            pickup_lng: request.pickup.coordinates.lng,
            pickup_address: request.pickup.address,
            dropoff_lat: request.dropoff.coordinates.lat,
            dropoff_lng: request.dropoff.coordinates.lng,
            dropoff_address: request.dropoff.address,
            vehicle_info: request.vehicle_info,
            notes: request.notes,
            proposed_price: request.proposed_price,
            calculated_price: request.calculated_price,
            final_agreed_price: request.negotiation.agreed_price(),
            status: request.status.kind(),
            negotiation_status: request.negotiation.kind(),
            assigned_driver_id: request.status.driver_id(),
            accepted_by_company_id: request.accepted_by_company_id,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

impl TryFrom<TowRequestRecord> for TowRequest {
    type Error = String;

    fn try_from(record: TowRequestRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            client_id: record.client_id,
            pickup: Place::new(
                record.pickup_address,
                Coordinates::new(record.pickup_lat, record.pickup_lng),
            ),
            dropoff: Place::new(
                record.dropoff_address,
                Coordinates::new(record.dropoff_lat, record.dropoff_lng),
            ),
            vehicle_info: record.vehicle_info,
            notes: record.notes,
            proposed_price: record.proposed_price,
            calculated_price: record.calculated_price,
            status: Status::from_parts(record.status, record.assigned_driver_id)?,
            negotiation: Negotiation::from_parts(
                record.negotiation_status,
                record.final_agreed_price,
            )?,
            accepted_by_company_id: record.accepted_by_company_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Body of a create request call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTowRequest {
    pub pickup_address: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub dropoff_address: String,
    pub dropoff_lat: f64,
    pub dropoff_lng: f64,
    pub vehicle_info: Option<String>,
    pub proposed_price: Option<f64>,
    pub notes: Option<String>,
}

impl NewTowRequest {
    pub fn new(pickup: Place, dropoff: Place) -> Self {
        Self {
            pickup_address: pickup.address,
            pickup_lat: pickup.coordinates.lat,
            pickup_lng: pickup.coordinates.lng,
            dropoff_address: dropoff.address,
            dropoff_lat: dropoff.coordinates.lat,
            dropoff_lng: dropoff.coordinates.lng,
            vehicle_info: None,
            proposed_price: None,
            notes: None,
        }
    }

    pub fn pickup(&self) -> Place {
        Place::new(
            self.pickup_address.clone(),
            Coordinates::new(self.pickup_lat, self.pickup_lng),
        )
    }

    pub fn dropoff(&self) -> Place {
        Place::new(
            self.dropoff_address.clone(),
            Coordinates::new(self.dropoff_lat, self.dropoff_lng),
        )
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.pickup().validate("Pickup")?;
        self.dropoff().validate("Dropoff")?;

        if let Some(price) = self.proposed_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(Error::invalid_input_error(
                    "Proposed price must be a positive amount",
                ));
            }
        }

        Ok(())
    }
}

impl TowRequest {
    pub fn new(client_id: Uuid, params: NewTowRequest, calculated_price: Option<f64>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            client_id,
            pickup: params.pickup(),
            dropoff: params.dropoff(),
            vehicle_info: non_empty(params.vehicle_info),
            notes: non_empty(params.notes),
            proposed_price: params.proposed_price,
            calculated_price,
            status: Status::Pending,
            negotiation: Negotiation::AwaitingDriver,
            accepted_by_company_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn assigned_driver_id(&self) -> Option<Uuid> {
        self.status.driver_id()
    }

    pub fn final_agreed_price(&self) -> Option<f64> {
        self.negotiation.agreed_price()
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_assigned_to(&self, user_id: Uuid) -> bool {
        self.assigned_driver_id() == Some(user_id)
    }

    /// Whether the request shows up in `user`'s request list.
    pub fn is_listed_for(&self, user: User) -> bool {
        match user.role {
            Role::Client | Role::Dealer => self.client_id == user.id,
            Role::Driver => self.is_pending() || self.is_assigned_to(user.id),
            Role::TowCompany | Role::Admin => true,
        }
    }

    /// Distance of the tow itself, pickup to dropoff.
    pub fn trip_distance_km(&self) -> f64 {
        self.pickup.coordinates.distance_km(&self.dropoff.coordinates)
    }

    pub fn set_status(&mut self, status: Status) {
        if status == Status::Cancelled {
            self.accepted_by_company_id = None;
        }

        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_negotiation(&mut self, negotiation: Negotiation) {
        self.negotiation = negotiation;
        self.updated_at = Utc::now();
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PolarClass for TowRequest {
    fn get_polar_class_builder() -> oso::ClassBuilder<TowRequest> {
        oso::Class::builder()
            .name("TowRequest")
            .add_attribute_getter("client_id", |recv: &TowRequest| recv.client_id.to_string())
            .add_attribute_getter("assigned_driver_id", |recv: &TowRequest| {
                recv.assigned_driver_id()
                    .map(|id| id.to_string())
                    .unwrap_or_default()
            })
            .add_attribute_getter("status", |recv: &TowRequest| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = TowRequest::get_polar_class_builder();
        builder.build()
    }
}

#[cfg(test)]
pub fn sample_request(client_id: Uuid) -> TowRequest {
    let mut params = NewTowRequest::new(
        Place::new("350 5th Ave, New York", Coordinates::new(40.7484, -73.9857)),
        Place::new("1 Garage Rd, Newark", Coordinates::new(40.7357, -74.1724)),
    );
    params.vehicle_info = Some("Honda Civic 2020, silver".into());

    TowRequest::new(client_id, params, Some(60.0))
}

#[test]
fn wire_format_is_flat_and_round_trips() {
    let mut request = sample_request(Uuid::new_v4());
    let driver_id = Uuid::new_v4();
    request.set_status(Status::Accepted { driver_id });
    request.set_negotiation(Negotiation::PriceAgreed { amount: 450.0 });

    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["status"], "accepted");
    assert_eq!(value["assigned_driver_id"], driver_id.to_string());
    assert_eq!(value["negotiation_status"], "price_agreed");
    assert_eq!(value["final_agreed_price"], 450.0);
    assert_eq!(value["pickup_lat"], 40.7484);

    let decoded: TowRequest = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn records_breaking_the_assignment_invariant_are_refused() {
    let request = sample_request(Uuid::new_v4());
    let mut value = serde_json::to_value(&request).unwrap();

    value["assigned_driver_id"] = serde_json::json!(Uuid::new_v4());
    assert!(serde_json::from_value::<TowRequest>(value.clone()).is_err());

    value["assigned_driver_id"] = serde_json::Value::Null;
    value["status"] = "on_mission".into();
    assert!(serde_json::from_value::<TowRequest>(value.clone()).is_err());

    value["status"] = "pending".into();
    value["final_agreed_price"] = 100.0.into();
    assert!(serde_json::from_value::<TowRequest>(value).is_err());
}

#[test]
fn listing_depends_on_role() {
    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let company = User::new(Uuid::new_v4(), Role::TowCompany);
    let mut request = sample_request(client.id);

    assert!(request.is_listed_for(client));
    assert!(request.is_listed_for(driver));
    assert!(!request.is_listed_for(User::new(Uuid::new_v4(), Role::Dealer)));

    request.set_status(Status::Accepted {
        driver_id: Uuid::new_v4(),
    });
    assert!(!request.is_listed_for(driver));
    assert!(request.is_listed_for(company));
}

#[test]
fn cancelling_clears_the_assignment() {
    let mut request = sample_request(Uuid::new_v4());
    request.set_status(Status::Accepted {
        driver_id: Uuid::new_v4(),
    });
    request.accepted_by_company_id = Some(Uuid::new_v4());

    request.set_status(Status::Cancelled);
    assert_eq!(request.assigned_driver_id(), None);
    assert_eq!(request.accepted_by_company_id, None);
}
