use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

use crate::error::Error;

const EARTH_RADIUS_KM: f64 = 6371.0088;
const MILES_PER_KM: f64 = 0.621_371;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(Error::invalid_input_error("Latitude must be between -90 and 90"));
        }

        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(Error::invalid_input_error(
                "Longitude must be between -180 and 180",
            ));
        }

        Ok(())
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    pub fn distance_miles(&self, other: &Coordinates) -> f64 {
        self.distance_km(other) * MILES_PER_KM
    }
}

impl From<Coordinates> for Geometry<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Geometry::Point(Point::new(coordinates.lng, coordinates.lat))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub coordinates: Coordinates,
}

impl Place {
    pub fn new(address: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            address: address.into(),
            coordinates,
        }
    }

    pub fn validate(&self, label: &str) -> Result<(), Error> {
        if self.address.trim().is_empty() {
            return Err(Error::invalid_input_error(format!(
                "{} address is required",
                label
            )));
        }

        self.coordinates.validate()
    }
}

#[test]
fn distance_between_known_points() {
    // Manhattan to Newark, roughly 14 km
    let manhattan = Coordinates::new(40.7128, -74.0060);
    let newark = Coordinates::new(40.7357, -74.1724);

    let distance = manhattan.distance_km(&newark);
    assert!(distance > 13.0 && distance < 15.0, "{}", distance);
    assert_eq!(manhattan.distance_km(&manhattan), 0.0);
}

#[test]
fn coordinates_outside_range_are_rejected() {
    assert!(Coordinates::new(91.0, 0.0).validate().is_err());
    assert!(Coordinates::new(0.0, f64::NAN).validate().is_err());
    assert!(Coordinates::new(40.0, -74.0).validate().is_ok());

    let place = Place::new("  ", Coordinates::new(40.0, -74.0));
    assert!(place.validate("Pickup").unwrap_err().is_invalid_input_error());
}
