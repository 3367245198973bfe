use serde::{Deserialize, Serialize};

use crate::entities::{Coordinates, TowRequest};
use crate::error::Error;

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

/// Driver-side search; coordinates fall back to the driver's stored location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub max_distance: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NearbyRequest {
    #[serde(flatten)]
    pub request: TowRequest,
    pub distance_km: f64,
    pub estimated_price: f64,
}

impl NearbyRequest {
    /// Orders by pickup distance, closest first.
    pub fn sort(requests: &mut [NearbyRequest]) {
        requests.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    }
}

impl NearbyQuery {
    pub fn new(max_distance: f64, origin: Option<Coordinates>) -> Self {
        Self {
            max_distance: Some(max_distance),
            lat: origin.map(|c| c.lat),
            lng: origin.map(|c| c.lng),
        }
    }

    /// Search origin and radius in kilometres.
    pub fn resolve(&self, stored: Option<Coordinates>) -> Result<(Coordinates, f64), Error> {
        let max_distance = self.max_distance.unwrap_or(DEFAULT_MAX_DISTANCE_KM);
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(Error::invalid_input_error(
                "Max distance must be a positive number",
            ));
        }

        let origin = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
            (None, None) => stored.ok_or_else(|| {
                Error::invalid_input_error("Location is required to find nearby requests")
            })?,
            _ => {
                return Err(Error::invalid_input_error(
                    "Both latitude and longitude are required",
                ))
            }
        };
        origin.validate()?;

        Ok((origin, max_distance))
    }
}

#[test]
fn query_falls_back_to_the_stored_location() {
    let stored = Coordinates::new(40.0, -74.0);

    let (origin, radius) = NearbyQuery::default().resolve(Some(stored)).unwrap();
    assert_eq!(origin, stored);
    assert_eq!(radius, DEFAULT_MAX_DISTANCE_KM);

    let query = NearbyQuery::new(10.0, Some(Coordinates::new(41.0, -73.0)));
    let (origin, radius) = query.resolve(Some(stored)).unwrap();
    assert_eq!(origin, Coordinates::new(41.0, -73.0));
    assert_eq!(radius, 10.0);

    assert!(NearbyQuery::default().resolve(None).is_err());

    let query = NearbyQuery {
        lat: Some(40.0),
        ..NearbyQuery::default()
    };
    assert!(query.resolve(Some(stored)).is_err());
}

#[test]
fn flattened_wire_shape() {
    use crate::entities::sample_request;
    use uuid::Uuid;

    let nearby = NearbyRequest {
        request: sample_request(Uuid::new_v4()),
        distance_km: 3.25,
        estimated_price: 61.5,
    };

    let value = serde_json::to_value(&nearby).unwrap();
    assert_eq!(value["distance_km"], 3.25);
    assert_eq!(value["status"], "pending");

    let decoded: NearbyRequest = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, nearby);
}
