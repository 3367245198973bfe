use oso::{Oso, PolarClass, ToPolar};

use crate::auth::{Platform, User};
use crate::entities::TowRequest;
use crate::error::Error;

/// Role and relationship policy; state-dependent guards live in `lifecycle`.
pub struct Authorizor {
    oso: Oso,
}

impl Authorizor {
    pub fn new() -> Result<Self, Error> {
        let mut oso = Oso::new();

        oso.register_class(Platform::get_polar_class())?;
        oso.register_class(User::get_polar_class())?;
        oso.register_class(TowRequest::get_polar_class())?;

        oso.load_str(include_str!("rules.polar"))?;

        Ok(Self { oso })
    }

    pub fn is_allowed<Resource>(
        &self,
        actor: User,
        action: &str,
        resource: Resource,
    ) -> Result<bool, Error>
    where
        Resource: ToPolar,
    {
        Ok(self.oso.is_allowed(actor, action.to_string(), resource)?)
    }

    /// Fails with `denied` as the caller-facing detail.
    pub fn authorize<Resource>(
        &self,
        actor: User,
        action: &str,
        resource: Resource,
        denied: &str,
    ) -> Result<(), Error>
    where
        Resource: ToPolar,
    {
        if self.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        tracing::info!(actor = %actor.id, action, "authorization denied");

        Err(Error::unauthorized_error(denied))
    }
}

impl std::fmt::Debug for Authorizor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizor").finish()
    }
}

#[test]
fn platform_role_test() {
    use crate::entities::Role;
    use uuid::Uuid;

    let authorizor = Authorizor::new().unwrap();

    let client = User::new(Uuid::new_v4(), Role::Client);
    let dealer = User::new(Uuid::new_v4(), Role::Dealer);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let company = User::new(Uuid::new_v4(), Role::TowCompany);
    let admin = User::new(Uuid::new_v4(), Role::Admin);

    let result = authorizor.oso.query_rule("has_role", (client, "client", Platform::default()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.oso.query_rule("has_role", (client, "driver", Platform::default()));
    assert!(result.unwrap().next().is_none());

    for (user, expected) in [(client, true), (dealer, true), (driver, false), (admin, false)] {
        let result = authorizor.is_allowed(user, "create_request", Platform::default());
        assert_eq!(result.unwrap(), expected);
    }

    for (user, expected) in [(driver, true), (client, false), (admin, false)] {
        let result = authorizor.is_allowed(user, "drive", Platform::default());
        assert_eq!(result.unwrap(), expected);
    }

    let result = authorizor.is_allowed(admin, "review_members", Platform::default());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(company, "drive", Platform::default());
    assert_eq!(result.unwrap(), false);
}

#[test]
fn tow_request_owner_role_test() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let authorizor = Authorizor::new().unwrap();

    let owner = User::new(Uuid::new_v4(), Role::Client);
    let stranger = User::new(Uuid::new_v4(), Role::Client);
    let request = sample_request(owner.id);

    let result = authorizor.oso.query_rule("has_role", (owner, "owner", request.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor.is_allowed(owner, "read", request.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger, "read", request.clone());
    assert_eq!(result.unwrap(), false);

    let err = authorizor
        .authorize(stranger, "read", request, "Not authorized to view this request")
        .unwrap_err();
    assert!(err.is_unauthorized_error());
    assert_eq!(err.message, "Not authorized to view this request");
}

#[test]
fn tow_request_driver_role_test() {
    use crate::entities::{sample_request, RequestStatus, Role};
    use uuid::Uuid;

    let authorizor = Authorizor::new().unwrap();

    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let other_driver = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(Uuid::new_v4());
    let dealer = User::new(Uuid::new_v4(), Role::Dealer);

    // before the driver is assigned

    let result = authorizor
        .oso
        .query_rule("has_role", (driver, "assigned_driver", request.clone()));
    assert!(result.unwrap().next().is_none());

    let result = authorizor.is_allowed(driver, "read", request.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(dealer, "read", request.clone());
    assert_eq!(result.unwrap(), false);

    request.set_status(RequestStatus::Accepted {
        driver_id: driver.id,
    });

    // after the driver is assigned

    let result = authorizor
        .oso
        .query_rule("has_role", (driver, "assigned_driver", request.clone()));
    assert!(result.unwrap().next().unwrap().is_ok());

    let result = authorizor
        .oso
        .query_rule("has_role", (other_driver, "assigned_driver", request.clone()));
    assert!(result.unwrap().next().is_none());

    let result = authorizor.is_allowed(driver, "read", request);
    assert_eq!(result.unwrap(), true);
}

#[test]
fn tow_request_admin_role_test() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let authorizor = Authorizor::new().unwrap();

    let admin = User::new(Uuid::new_v4(), Role::Admin);
    let dealer = User::new(Uuid::new_v4(), Role::Dealer);
    let request = sample_request(Uuid::new_v4());

    let result = authorizor.is_allowed(admin, "read", request.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(dealer, "read", request);
    assert_eq!(result.unwrap(), false);
}
