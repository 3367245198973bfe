//! Pure transition functions for the two status axes of a tow request.
//!
//! Nothing here touches storage: engines lock the request, call into this
//! module and persist whatever comes back. A `Rejection` leaves the request
//! untouched.

mod actions;
mod negotiation;
mod status;

use std::fmt;

use crate::entities::StatusKind;

pub use actions::{available_actions, Actions};
pub use negotiation::{
    check_offer, check_response, negotiate, party, NegotiationEvent, NegotiationStep, Party,
};
pub use status::{check_accept, event_for, transition, transition_to, StatusEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    NotPermitted(&'static str),
    NotPending,
    AlreadyAssigned,
    AlreadyYours,
    InvalidTransition { from: StatusKind, to: StatusKind },
    DriverRequired,
    NegotiationClosed,
    NegotiationUnavailable,
    OfferOutOfTurn,
    OfferPending,
    NoPendingOffer,
    NotAddressee,
    InvalidAmount,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPermitted(reason) => f.write_str(reason),
            Self::NotPending => f.write_str("Request is not pending"),
            Self::AlreadyAssigned => {
                f.write_str("Request has already been accepted by another driver")
            }
            Self::AlreadyYours => f.write_str("You have already accepted this request"),
            Self::InvalidTransition { from, to } => {
                write!(f, "Cannot change status from {} to {}", from, to)
            }
            Self::DriverRequired => f.write_str("A driver must be selected to accept this request"),
            Self::NegotiationClosed => f.write_str("Price has already been agreed"),
            Self::NegotiationUnavailable => {
                f.write_str("Offers can only be made while the request is pending or accepted")
            }
            Self::OfferOutOfTurn => f.write_str("It is not your turn to make an offer"),
            Self::OfferPending => f.write_str("You already have a pending offer"),
            Self::NoPendingOffer => f.write_str("There is no pending offer"),
            Self::NotAddressee => f.write_str("You cannot respond to your own offer"),
            Self::InvalidAmount => f.write_str("Offer amount must be a positive number"),
        }
    }
}

impl std::error::Error for Rejection {}
