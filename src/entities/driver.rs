use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinates;
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub user_id: Uuid,
    pub license_number: String,
    pub vehicle_info: String,
    pub tow_company_id: Option<Uuid>,
    pub status: Status,
    pub location: Option<Coordinates>,
    pub rating: f64,
    pub total_jobs: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Offline,
    Available,
    OnMission,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Available => "available",
            Self::OnMission => "on_mission",
        }
    }
}

/// Details a driver fills in after registering.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub license_number: Option<String>,
    pub vehicle_info: Option<String>,
    pub tow_company_id: Option<Uuid>,
}

impl DriverProfile {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            license_number: String::new(),
            vehicle_info: String::new(),
            tow_company_id: None,
            status: Status::Offline,
            location: None,
            rating: 5.0,
            total_jobs: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_on_mission(&self) -> bool {
        self.status == Status::OnMission
    }

    pub fn belongs_to(&self, company_id: Uuid) -> bool {
        self.tow_company_id == Some(company_id)
    }

    /// Manual status changes; `on_mission` is owned by the request lifecycle.
    #[tracing::instrument]
    pub fn set_status(&mut self, status: Status) -> Result<(), Error> {
        if status == Status::OnMission {
            return Err(Error::invalid_input_error(
                "On mission status is set when a mission starts",
            ));
        }

        if self.is_on_mission() {
            return Err(Error::invalid_state_error(
                "Cannot change status while on a mission",
            ));
        }

        self.status = status;
        Ok(())
    }

    pub fn update_location(&mut self, coordinates: Coordinates) -> Result<(), Error> {
        coordinates.validate()?;
        self.location = Some(coordinates);
        Ok(())
    }

    /// Fields left out of `update` keep their value.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(license_number) = &update.license_number {
            self.license_number = license_number.trim().to_string();
        }
        if let Some(vehicle_info) = &update.vehicle_info {
            self.vehicle_info = vehicle_info.trim().to_string();
        }
        if update.tow_company_id.is_some() {
            self.tow_company_id = update.tow_company_id;
        }
    }

    #[tracing::instrument]
    pub fn begin_mission(&mut self) {
        self.status = Status::OnMission;
    }

    #[tracing::instrument]
    pub fn finish_mission(&mut self) {
        if self.is_on_mission() {
            self.status = Status::Available;
        }
        self.total_jobs += 1;
    }
}

#[test]
fn on_mission_is_not_set_by_hand() {
    let mut driver = DriverProfile::new(Uuid::new_v4());

    driver.set_status(Status::Available).unwrap();
    assert_eq!(driver.status, Status::Available);

    assert!(driver.set_status(Status::OnMission).is_err());

    driver.begin_mission();
    assert!(driver.set_status(Status::Offline).unwrap_err().is_invalid_state_error());

    driver.finish_mission();
    assert_eq!(driver.status, Status::Available);
    assert_eq!(driver.total_jobs, 1);
}

#[test]
fn profile_update_keeps_missing_fields() {
    let mut driver = DriverProfile::new(Uuid::new_v4());
    let company_id = Uuid::new_v4();

    driver.apply(&ProfileUpdate {
        license_number: Some(" D123 ".into()),
        tow_company_id: Some(company_id),
        ..ProfileUpdate::default()
    });
    driver.apply(&ProfileUpdate {
        vehicle_info: Some("Flatbed".into()),
        ..ProfileUpdate::default()
    });

    assert_eq!(driver.license_number, "D123");
    assert_eq!(driver.vehicle_info, "Flatbed");
    assert!(driver.belongs_to(company_id));
}
