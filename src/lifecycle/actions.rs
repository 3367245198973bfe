use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::entities::{Offer, TowRequest};
use crate::lifecycle::{check_accept, check_offer, check_response, transition, StatusEvent};

/// Controls a screen may show for one request; each flag mirrors a transition that would succeed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actions {
    pub accept_request: bool,
    pub start_mission: bool,
    pub complete: bool,
    pub cancel: bool,
    pub make_offer: bool,
    pub accept_offer: bool,
    pub reject_offer: bool,
}

pub fn available_actions(request: &TowRequest, offers: &[Offer], actor: User) -> Actions {
    Actions {
        accept_request: check_accept(request, actor).is_ok(),
        start_mission: transition(request, StatusEvent::StartMission, actor).is_ok(),
        complete: transition(request, StatusEvent::Complete, actor).is_ok(),
        cancel: transition(request, StatusEvent::Cancel, actor).is_ok(),
        make_offer: check_offer(request, offers, actor).is_ok(),
        accept_offer: check_response(request, offers, actor, true).is_ok(),
        reject_offer: check_response(request, offers, actor, false).is_ok(),
    }
}

#[test]
fn actions_follow_role_and_state() {
    use crate::entities::{sample_request, OfferType, RequestStatus, Role};
    use uuid::Uuid;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);

    let actions = available_actions(&request, &[], driver);
    assert_eq!(
        actions,
        Actions {
            accept_request: true,
            ..Actions::default()
        }
    );

    let actions = available_actions(&request, &[], client);
    assert!(actions.cancel && actions.make_offer);
    assert!(!actions.accept_request && !actions.accept_offer);

    request.set_status(RequestStatus::Accepted { driver_id: driver.id });
    let offers = vec![Offer::new(
        request.id,
        client.id,
        OfferType::ClientOffer,
        250.0,
        None,
        None,
    )];

    let actions = available_actions(&request, &offers, driver);
    assert!(actions.start_mission && actions.make_offer);
    assert!(actions.accept_offer && actions.reject_offer);
    assert!(!actions.cancel && !actions.complete);

    let actions = available_actions(&request, &offers, client);
    assert!(!actions.make_offer && !actions.accept_offer);
    assert!(actions.reject_offer && actions.cancel);
}
