use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Place;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasePricing {
    pub pickup_fee: f64,
    pub price_per_mile: f64,
}

impl Default for BasePricing {
    fn default() -> Self {
        Self {
            pickup_fee: 25.0,
            price_per_mile: 2.5,
        }
    }
}

impl BasePricing {
    pub fn quote(&self, pickup: &Place, dropoff: &Place) -> f64 {
        quote(self.pickup_fee, self.price_per_mile, pickup, dropoff)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverPricing {
    pub driver_id: Uuid,
    pub price_per_mile: f64,
    pub pickup_fee: f64,
    pub is_using_base_pricing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingUpdate {
    pub price_per_mile: f64,
    pub pickup_fee: f64,
    pub is_using_base_pricing: bool,
}

impl PricingUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        for (value, label) in [
            (self.price_per_mile, "Price per mile"),
            (self.pickup_fee, "Pickup fee"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_input_error(format!(
                    "{} must be a non-negative amount",
                    label
                )));
            }
        }

        Ok(())
    }
}

impl DriverPricing {
    pub fn new(driver_id: Uuid, base: &BasePricing) -> Self {
        Self {
            driver_id,
            price_per_mile: base.price_per_mile,
            pickup_fee: base.pickup_fee,
            is_using_base_pricing: true,
        }
    }

    pub fn apply(&mut self, update: &PricingUpdate) -> Result<(), Error> {
        update.validate()?;

        self.price_per_mile = update.price_per_mile;
        self.pickup_fee = update.pickup_fee;
        self.is_using_base_pricing = update.is_using_base_pricing;

        Ok(())
    }

    /// Drivers on base pricing keep their own pickup fee but bill the platform rate.
    pub fn quote(&self, base: &BasePricing, pickup: &Place, dropoff: &Place) -> f64 {
        let rate = match self.is_using_base_pricing {
            true => base.price_per_mile,
            false => self.price_per_mile,
        };

        quote(self.pickup_fee, rate, pickup, dropoff)
    }
}

fn quote(pickup_fee: f64, price_per_mile: f64, pickup: &Place, dropoff: &Place) -> f64 {
    let miles = pickup.coordinates.distance_miles(&dropoff.coordinates);
    round_cents(pickup_fee + price_per_mile * miles)
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[test]
fn quote_uses_platform_rate_on_base_pricing() {
    use crate::entities::Coordinates;

    let pickup = Place::new("a", Coordinates::new(40.0, -74.0));
    let dropoff = Place::new("a", Coordinates::new(40.0, -74.0));

    let base = BasePricing::default();
    assert_eq!(base.quote(&pickup, &dropoff), 25.0);

    let mut pricing = DriverPricing::new(Uuid::new_v4(), &base);
    pricing
        .apply(&PricingUpdate {
            price_per_mile: 4.0,
            pickup_fee: 30.0,
            is_using_base_pricing: false,
        })
        .unwrap();
    assert_eq!(pricing.quote(&base, &pickup, &dropoff), 30.0);

    let far = Place::new("b", Coordinates::new(40.1, -74.0));
    let own_rate = pricing.quote(&base, &pickup, &far);
    pricing.is_using_base_pricing = true;
    let base_rate = pricing.quote(&base, &pickup, &far);
    assert!(own_rate > base_rate);
}

#[test]
fn negative_pricing_is_rejected() {
    let update = PricingUpdate {
        price_per_mile: -1.0,
        pickup_fee: 10.0,
        is_using_base_pricing: false,
    };

    assert!(update.validate().unwrap_err().is_invalid_input_error());
}
