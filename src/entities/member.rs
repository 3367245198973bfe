use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Client,
    Dealer,
    TowCompany,
    Driver,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Dealer => "dealer",
            Self::TowCompany => "tow_company",
            Self::Driver => "driver",
        }
    }

    /// Roles that may open tow requests.
    pub fn is_requester(&self) -> bool {
        matches!(self, Self::Client | Self::Dealer)
    }

    /// Roles that may take tow requests off the board.
    pub fn is_dispatcher(&self) -> bool {
        matches!(self, Self::Driver | Self::TowCompany)
    }

    pub fn requires_approval(&self) -> bool {
        self.is_dispatcher()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    PendingApproval,
    Approved,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub status: Status,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> Result<(), Error> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::invalid_input_error("A valid email is required"));
        }

        if self.password.len() < 6 {
            return Err(Error::invalid_input_error(
                "Password must be at least 6 characters",
            ));
        }

        if self.full_name.trim().is_empty() {
            return Err(Error::invalid_input_error("Full name is required"));
        }

        if self.role == Role::Admin {
            return Err(Error::unauthorized_error(
                "Administrator accounts cannot be self-registered",
            ));
        }

        Ok(())
    }
}

impl Member {
    pub fn new(email: &str, full_name: &str, role: Role, phone: Option<String>) -> Self {
        let now = Utc::now();
        let status = match role.requires_approval() {
            true => Status::PendingApproval,
            false => Status::Approved,
        };

        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            full_name: full_name.trim().to_string(),
            role,
            phone,
            status,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_registration(registration: &Registration) -> Self {
        Self::new(
            &registration.email,
            &registration.full_name,
            registration.role,
            registration.phone.clone(),
        )
    }

    /// This member, if it holds the admin role.
    pub fn as_admin(&self) -> Result<Self, Error> {
        match self.role {
            Role::Admin => Ok(self.clone()),
            _ => Err(Error::invalid_state_error(format!(
                "{} is registered as {}, not as an admin",
                self.email,
                self.role.name()
            ))),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == Status::Approved
    }

    pub fn is_pending_approval(&self) -> bool {
        self.status == Status::PendingApproval
    }

    pub fn approve(&mut self) {
        self.status = Status::Approved;
        self.updated_at = Utc::now();
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[test]
fn dispatchers_start_pending_approval() {
    let driver = Member::new("Driver@Example.com ", "Dan", Role::Driver, None);
    assert!(driver.is_pending_approval());
    assert_eq!(driver.email, "driver@example.com");

    let company = Member::new("fleet@example.com", "Fleet", Role::TowCompany, None);
    assert!(company.is_pending_approval());

    let client = Member::new("client@example.com", "Cat", Role::Client, None);
    assert!(client.is_approved());
}

#[test]
fn admin_registration_is_refused() {
    let registration = Registration {
        email: "root@example.com".into(),
        password: "secret123".into(),
        full_name: "Root".into(),
        role: Role::Admin,
        phone: None,
    };

    assert!(registration.validate().unwrap_err().is_unauthorized_error());
}
