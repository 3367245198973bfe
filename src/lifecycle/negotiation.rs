use crate::auth::User;
use crate::entities::{Negotiation, Offer, OfferStatus, OfferType, RequestStatus, TowRequest};
use crate::lifecycle::Rejection;

#[derive(Clone, Debug, PartialEq)]
pub enum NegotiationEvent {
    MakeOffer {
        amount: f64,
        message: Option<String>,
    },
    AcceptOffer,
    RejectOffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party {
    Client,
    Driver,
}

impl Party {
    fn offer_type(&self) -> OfferType {
        match self {
            Self::Client => OfferType::ClientOffer,
            Self::Driver => OfferType::DriverCounter,
        }
    }
}

/// What a negotiation event produced; engines persist every part of it.
#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationStep {
    /// Newly submitted offer.
    pub offer: Option<Offer>,
    /// Previously pending offer, now accepted or rejected.
    pub resolved: Option<Offer>,
    pub negotiation: Negotiation,
}

pub fn party(request: &TowRequest, actor: User) -> Result<Party, Rejection> {
    if actor.id == request.client_id {
        Ok(Party::Client)
    } else if request.is_assigned_to(actor.id) {
        Ok(Party::Driver)
    } else {
        Err(Rejection::NotPermitted(
            "Only the client or the assigned driver can negotiate",
        ))
    }
}

fn check_open(request: &TowRequest) -> Result<(), Rejection> {
    if let Negotiation::PriceAgreed { .. } = request.negotiation {
        return Err(Rejection::NegotiationClosed);
    }

    match request.status {
        RequestStatus::Pending | RequestStatus::Accepted { .. } => Ok(()),
        _ => Err(Rejection::NegotiationUnavailable),
    }
}

/// Whose move it is; `offers` is newest first.
pub fn check_offer(
    request: &TowRequest,
    offers: &[Offer],
    actor: User,
) -> Result<Party, Rejection> {
    check_open(request)?;
    let party = party(request, actor)?;
    let head = offers.first();

    if let Some(head) = head {
        if head.is_pending() && head.offer_type == party.offer_type() {
            return Err(Rejection::OfferPending);
        }
    }

    let allowed = match (party, head) {
        (Party::Client, None) => true,
        (Party::Client, Some(head)) => head.offer_type == OfferType::DriverCounter,
        // the proposed price is the client's standing ask
        (Party::Driver, None) => request.proposed_price.is_some(),
        // a rejected client offer still awaits the driver's answer
        (Party::Driver, Some(head)) => {
            head.offer_type == OfferType::ClientOffer && head.status != OfferStatus::Accepted
        }
    };

    match allowed {
        true => Ok(party),
        false => Err(Rejection::OfferOutOfTurn),
    }
}

/// Guard for accepting (`accept = true`) or rejecting the head offer.
pub fn check_response<'a>(
    request: &TowRequest,
    offers: &'a [Offer],
    actor: User,
    accept: bool,
) -> Result<&'a Offer, Rejection> {
    check_open(request)?;
    let party = party(request, actor)?;

    let head = offers
        .first()
        .filter(|head| head.is_pending())
        .ok_or(Rejection::NoPendingOffer)?;

    let addressee = match head.offer_type {
        OfferType::ClientOffer => Party::Driver,
        OfferType::DriverCounter | OfferType::SystemCalculated => Party::Client,
    };

    if accept && party != addressee {
        return Err(Rejection::NotAddressee);
    }

    Ok(head)
}

pub fn negotiate(
    request: &TowRequest,
    offers: &[Offer],
    event: NegotiationEvent,
    actor: User,
) -> Result<NegotiationStep, Rejection> {
    match event {
        NegotiationEvent::MakeOffer { amount, message } => {
            let party = check_offer(request, offers, actor)?;

            if !amount.is_finite() || amount <= 0.0 {
                return Err(Rejection::InvalidAmount);
            }

            let head = offers.first();
            let resolved = head
                .filter(|head| head.is_pending())
                .map(|head| head.resolved(OfferStatus::Rejected));

            let offer = Offer::new(
                request.id,
                actor.id,
                party.offer_type(),
                amount,
                message,
                head,
            );

            Ok(NegotiationStep {
                offer: Some(offer),
                resolved,
                negotiation: Negotiation::Negotiating,
            })
        }
        NegotiationEvent::AcceptOffer => {
            let head = check_response(request, offers, actor, true)?;

            Ok(NegotiationStep {
                offer: None,
                resolved: Some(head.resolved(OfferStatus::Accepted)),
                negotiation: Negotiation::PriceAgreed {
                    amount: head.amount,
                },
            })
        }
        NegotiationEvent::RejectOffer => {
            let head = check_response(request, offers, actor, false)?;

            Ok(NegotiationStep {
                offer: None,
                resolved: Some(head.resolved(OfferStatus::Rejected)),
                negotiation: request.negotiation,
            })
        }
    }
}

#[cfg(test)]
fn apply(request: &mut TowRequest, offers: &mut Vec<Offer>, step: NegotiationStep) {
    if let Some(resolved) = step.resolved {
        for offer in offers.iter_mut() {
            if offer.id == resolved.id {
                *offer = resolved.clone();
            }
        }
    }

    if let Some(offer) = step.offer {
        offers.insert(0, offer);
    }

    request.set_negotiation(step.negotiation);
}

#[cfg(test)]
fn offer(amount: f64) -> NegotiationEvent {
    NegotiationEvent::MakeOffer {
        amount,
        message: None,
    }
}

#[test]
fn driver_counters_the_proposed_price_and_client_accepts() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);
    request.proposed_price = Some(500.0);
    request.set_status(RequestStatus::Accepted { driver_id: driver.id });
    let mut offers = vec![];

    let step = negotiate(&request, &offers, offer(450.0), driver).unwrap();
    assert_eq!(step.offer.as_ref().unwrap().offer_type, OfferType::DriverCounter);
    assert_eq!(step.negotiation, Negotiation::Negotiating);
    apply(&mut request, &mut offers, step);

    let result = negotiate(&request, &offers, NegotiationEvent::AcceptOffer, driver);
    assert_eq!(result, Err(Rejection::NotAddressee));

    let step = negotiate(&request, &offers, NegotiationEvent::AcceptOffer, client).unwrap();
    assert_eq!(step.resolved.as_ref().unwrap().status, OfferStatus::Accepted);
    apply(&mut request, &mut offers, step);

    assert_eq!(request.final_agreed_price(), Some(450.0));
    assert_eq!(request.negotiation, Negotiation::PriceAgreed { amount: 450.0 });
    assert_eq!(offers[0].status, OfferStatus::Accepted);

    let result = negotiate(&request, &offers, offer(400.0), client);
    assert_eq!(result, Err(Rejection::NegotiationClosed));
}

#[test]
fn client_offers_only_on_an_empty_list_or_after_a_counter() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);
    request.set_status(RequestStatus::Accepted { driver_id: driver.id });
    let mut offers = vec![];

    // without a proposed price the client opens
    let result = negotiate(&request, &offers, offer(300.0), driver);
    assert_eq!(result, Err(Rejection::OfferOutOfTurn));

    let step = negotiate(&request, &offers, offer(300.0), client).unwrap();
    apply(&mut request, &mut offers, step);

    let result = negotiate(&request, &offers, offer(320.0), client);
    assert_eq!(result, Err(Rejection::OfferPending));

    // counter rejects the pending client offer in the same step
    let step = negotiate(&request, &offers, offer(380.0), driver).unwrap();
    assert_eq!(step.resolved.as_ref().unwrap().status, OfferStatus::Rejected);
    apply(&mut request, &mut offers, step);
    assert_eq!(offers.iter().filter(|o| o.is_pending()).count(), 1);

    let step = negotiate(&request, &offers, offer(340.0), client).unwrap();
    apply(&mut request, &mut offers, step);
    assert_eq!(offers.len(), 3);
    assert_eq!(offers.iter().filter(|o| o.is_pending()).count(), 1);
    assert_eq!(offers[0].amount, 340.0);
}

#[test]
fn rejecting_keeps_the_negotiation_open() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);
    request.set_status(RequestStatus::Accepted { driver_id: driver.id });
    let mut offers = vec![];

    let step = negotiate(&request, &offers, offer(200.0), client).unwrap();
    apply(&mut request, &mut offers, step);

    let step = negotiate(&request, &offers, NegotiationEvent::RejectOffer, driver).unwrap();
    assert_eq!(step.negotiation, Negotiation::Negotiating);
    apply(&mut request, &mut offers, step);
    assert_eq!(request.final_agreed_price(), None);

    let result = negotiate(&request, &offers, NegotiationEvent::RejectOffer, client);
    assert_eq!(result, Err(Rejection::NoPendingOffer));

    // a rejected client offer is answered by the driver, never re-sent
    let result = negotiate(&request, &offers, offer(210.0), client);
    assert_eq!(result, Err(Rejection::OfferOutOfTurn));

    let step = negotiate(&request, &offers, offer(260.0), driver).unwrap();
    assert_eq!(step.resolved, None);
    assert_eq!(step.offer.as_ref().unwrap().offer_type, OfferType::DriverCounter);
    apply(&mut request, &mut offers, step);

    // and the client may then answer the counter
    assert!(check_offer(&request, &offers, client).is_ok());
}

#[test]
fn outsiders_and_closed_requests_are_refused() {
    use crate::entities::{sample_request, Role};
    use uuid::Uuid;

    let client = User::new(Uuid::new_v4(), Role::Client);
    let driver = User::new(Uuid::new_v4(), Role::Driver);
    let stranger = User::new(Uuid::new_v4(), Role::Driver);
    let mut request = sample_request(client.id);

    let result = negotiate(&request, &[], offer(100.0), stranger);
    assert!(matches!(result, Err(Rejection::NotPermitted(_))));

    for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let result = negotiate(&request, &[], offer(amount), client);
        assert_eq!(result, Err(Rejection::InvalidAmount));
    }

    request.set_status(RequestStatus::OnMission { driver_id: driver.id });
    let result = negotiate(&request, &[], offer(100.0), client);
    assert_eq!(result, Err(Rejection::NegotiationUnavailable));
}
