use uuid::Uuid;

use crate::auth::User;
use crate::entities::{RequestStatus, Role, StatusKind, TowRequest};
use crate::lifecycle::Rejection;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// `driver_id` names the driver a tow company dispatches; drivers may omit it.
    Accept { driver_id: Option<Uuid> },
    StartMission,
    Complete,
    Cancel,
}

impl StatusEvent {
    /// The event that moves a request into `target`; nothing moves a request back to pending.
    pub fn for_target(target: StatusKind, driver_id: Option<Uuid>) -> Option<Self> {
        match target {
            StatusKind::Pending => None,
            StatusKind::Accepted => Some(Self::Accept { driver_id }),
            StatusKind::OnMission => Some(Self::StartMission),
            StatusKind::Completed => Some(Self::Complete),
            StatusKind::Cancelled => Some(Self::Cancel),
        }
    }

    fn target(&self) -> StatusKind {
        match self {
            Self::Accept { .. } => StatusKind::Accepted,
            Self::StartMission => StatusKind::OnMission,
            Self::Complete => StatusKind::Completed,
            Self::Cancel => StatusKind::Cancelled,
        }
    }
}

/// Role and state guard for accepting, independent of which driver is named.
pub fn check_accept(request: &TowRequest, actor: User) -> Result<(), Rejection> {
    if !matches!(actor.role, Role::Driver | Role::TowCompany) {
        return Err(Rejection::NotPermitted(
            "Only drivers and tow companies can accept requests",
        ));
    }

    match request.status {
        RequestStatus::Pending => Ok(()),
        RequestStatus::Cancelled => Err(Rejection::NotPending),
        _ if request.is_assigned_to(actor.id) => Err(Rejection::AlreadyYours),
        _ => Err(Rejection::AlreadyAssigned),
    }
}

pub fn transition(
    request: &TowRequest,
    event: StatusEvent,
    actor: User,
) -> Result<RequestStatus, Rejection> {
    let invalid = || Rejection::InvalidTransition {
        from: request.status.kind(),
        to: event.target(),
    };

    match event {
        StatusEvent::Accept { driver_id } => {
            check_accept(request, actor)?;

            let driver_id = match (actor.role, driver_id) {
                (Role::Driver, None) => actor.id,
                (Role::Driver, Some(id)) if id == actor.id => actor.id,
                (Role::Driver, Some(_)) => {
                    return Err(Rejection::NotPermitted(
                        "Drivers can only accept requests for themselves",
                    ))
                }
                (_, Some(id)) => id,
                (_, None) => return Err(Rejection::DriverRequired),
            };

            Ok(RequestStatus::Accepted { driver_id })
        }
        StatusEvent::StartMission => match request.status {
            RequestStatus::Accepted { driver_id } if driver_id == actor.id => {
                Ok(RequestStatus::OnMission { driver_id })
            }
            RequestStatus::Accepted { .. } => Err(Rejection::NotPermitted(
                "Only the assigned driver can start the mission",
            )),
            _ => Err(invalid()),
        },
        StatusEvent::Complete => match request.status {
            RequestStatus::OnMission { driver_id } if driver_id == actor.id => {
                Ok(RequestStatus::Completed { driver_id })
            }
            RequestStatus::OnMission { .. } => Err(Rejection::NotPermitted(
                "Only the assigned driver can complete the mission",
            )),
            _ => Err(invalid()),
        },
        StatusEvent::Cancel => {
            if actor.id != request.client_id && !actor.is_admin() {
                return Err(Rejection::NotPermitted(
                    "Only the requesting client or an admin can cancel",
                ));
            }

            match request.status {
                RequestStatus::Pending | RequestStatus::Accepted { .. } => {
                    Ok(RequestStatus::Cancelled)
                }
                _ => Err(invalid()),
            }
        }
    }
}

/// Event behind a generic status update of `request` to `target`.
pub fn event_for(
    request: &TowRequest,
    target: StatusKind,
    driver_id: Option<Uuid>,
) -> Result<StatusEvent, Rejection> {
    StatusEvent::for_target(target, driver_id).ok_or(Rejection::InvalidTransition {
        from: request.status.kind(),
        to: target,
    })
}

pub fn transition_to(
    request: &TowRequest,
    target: StatusKind,
    driver_id: Option<Uuid>,
    actor: User,
) -> Result<RequestStatus, Rejection> {
    transition(request, event_for(request, target, driver_id)?, actor)
}

#[test]
fn driver_accepts_a_pending_request_for_themself() {
    use crate::entities::sample_request;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let request = sample_request(client.id);

    let status = transition(&request, StatusEvent::Accept { driver_id: None }, driver).unwrap();
    assert_eq!(status, RequestStatus::Accepted { driver_id: driver.id });

    let event = StatusEvent::Accept {
        driver_id: Some(Uuid::new_v4()),
    };
    let result = transition(&request, event, driver);
    assert!(matches!(result, Err(Rejection::NotPermitted(_))));

    let result = transition(&request, StatusEvent::Accept { driver_id: None }, client);
    assert!(matches!(result, Err(Rejection::NotPermitted(_))));
}

#[test]
fn tow_company_must_name_a_driver() {
    use crate::entities::sample_request;

    let company = User::new(Uuid::new_v4(), Role::TowCompany);
    let driver_id = Uuid::new_v4();
    let request = sample_request(Uuid::new_v4());

    let result = transition(&request, StatusEvent::Accept { driver_id: None }, company);
    assert_eq!(result, Err(Rejection::DriverRequired));

    let event = StatusEvent::Accept {
        driver_id: Some(driver_id),
    };
    let status = transition(&request, event, company).unwrap();
    assert_eq!(status.driver_id(), Some(driver_id));
}

#[test]
fn accepting_twice_reports_the_assignment() {
    use crate::entities::sample_request;

    let first = User::new(Uuid::new_v4(), Role::Driver);
    let second = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(Uuid::new_v4());

    let status = transition(&request, StatusEvent::Accept { driver_id: None }, first).unwrap();
    request.set_status(status);

    let result = transition(&request, StatusEvent::Accept { driver_id: None }, second);
    assert_eq!(result, Err(Rejection::AlreadyAssigned));

    let result = transition(&request, StatusEvent::Accept { driver_id: None }, first);
    assert_eq!(result, Err(Rejection::AlreadyYours));
    assert_eq!(
        Rejection::AlreadyYours.to_string(),
        "You have already accepted this request"
    );

    request.set_status(RequestStatus::Cancelled);
    let result = transition(&request, StatusEvent::Accept { driver_id: None }, second);
    assert_eq!(result, Err(Rejection::NotPending));
}

#[test]
fn pending_only_moves_to_accepted_or_cancelled() {
    use crate::entities::sample_request;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let request = sample_request(client.id);

    for (event, actor) in [
        (StatusEvent::StartMission, driver),
        (StatusEvent::Complete, driver),
    ] {
        let result = transition(&request, event, actor);
        assert!(matches!(
            result,
            Err(Rejection::InvalidTransition {
                from: StatusKind::Pending,
                ..
            })
        ));
    }

    let result = transition_to(&request, StatusKind::Pending, None, client);
    assert!(result.is_err());

    let result = transition_to(&request, StatusKind::Cancelled, None, client);
    assert_eq!(result, Ok(RequestStatus::Cancelled));
}

#[test]
fn the_assigned_driver_runs_the_mission() {
    use crate::entities::sample_request;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let other = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);

    request.set_status(RequestStatus::Accepted { driver_id: driver.id });

    let result = transition(&request, StatusEvent::StartMission, other);
    assert!(matches!(result, Err(Rejection::NotPermitted(_))));

    let status = transition(&request, StatusEvent::StartMission, driver).unwrap();
    assert_eq!(status, RequestStatus::OnMission { driver_id: driver.id });
    request.set_status(status);

    let result = transition(&request, StatusEvent::Cancel, client);
    assert!(matches!(result, Err(Rejection::InvalidTransition { .. })));

    let status = transition(&request, StatusEvent::Complete, driver).unwrap();
    assert_eq!(status, RequestStatus::Completed { driver_id: driver.id });
}

#[test]
fn only_the_creator_or_an_admin_cancels() {
    use crate::entities::sample_request;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let admin = User::new(Uuid::new_v4(), Role::Admin);
    let stranger = User::new(Uuid::new_v4(), Role::Client);
    let mut request = sample_request(client.id);
    request.set_status(RequestStatus::Accepted {
        driver_id: Uuid::new_v4(),
    });

    let result = transition(&request, StatusEvent::Cancel, stranger);
    assert!(matches!(result, Err(Rejection::NotPermitted(_))));

    assert_eq!(
        transition(&request, StatusEvent::Cancel, admin),
        Ok(RequestStatus::Cancelled)
    );
    assert_eq!(
        transition(&request, StatusEvent::Cancel, client),
        Ok(RequestStatus::Cancelled)
    );
}
