use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferType {
    ClientOffer,
    DriverCounter,
    SystemCalculated,
}

impl OfferType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientOffer => "client_offer",
            Self::DriverCounter => "driver_counter",
            Self::SystemCalculated => "system_calculated",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub request_id: Uuid,
    pub created_by: Uuid,
    pub offer_type: OfferType,
    pub amount: f64,
    pub message: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// `previous` is the newest existing offer; the new one is always strictly later.
    pub fn new(
        request_id: Uuid,
        created_by: Uuid,
        offer_type: OfferType,
        amount: f64,
        message: Option<String>,
        previous: Option<&Offer>,
    ) -> Self {
        // storage keeps microseconds
        let mut created_at = Utc::now().trunc_subsecs(6);
        if let Some(previous) = previous {
            let floor = previous.created_at + Duration::microseconds(1);
            if created_at < floor {
                created_at = floor;
            }
        }

        Self {
            id: Uuid::new_v4(),
            request_id,
            created_by,
            offer_type,
            amount,
            message: message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            status: Status::Pending,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    /// Copy of this offer in a resolved state; callers check it is still pending.
    pub fn resolved(&self, status: Status) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

#[test]
fn offers_are_strictly_time_ordered() {
    let request_id = Uuid::new_v4();
    let author = Uuid::new_v4();

    let mut first = Offer::new(request_id, author, OfferType::ClientOffer, 100.0, None, None);
    first.created_at = first.created_at + Duration::seconds(5);

    let second = Offer::new(
        request_id,
        author,
        OfferType::DriverCounter,
        90.0,
        Some("  ".into()),
        Some(&first),
    );

    assert!(second.created_at > first.created_at);
    assert_eq!(second.message, None);
}
