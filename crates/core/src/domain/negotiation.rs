use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::customer::CustomerId;

/// Consecutive rejections that trip the automatic block.
pub const REJECTION_BLOCK_THRESHOLD: u32 = 5;
/// Length of the automatic block window, in days.
pub const BLOCK_WINDOW_DAYS: i64 = 7;

const AUTO_BLOCK_REASON: &str = "excessive consecutive rejections";

/// Outcome of a single negotiation attempt. `OfferMade`/`NoOffer` are
/// recorded at negotiation time; `Accepted`/`Rejected` are recorded later,
/// when an issued coupon is redeemed or expires unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationOutcome {
    Accepted,
    Rejected,
    OfferMade,
    NoOffer,
}

impl NegotiationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::OfferMade => "offer_made",
            Self::NoOffer => "no_offer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "offer_made" => Some(Self::OfferMade),
            "no_offer" => Some(Self::NoOffer),
            _ => None,
        }
    }
}

/// Per-customer abuse and rate-limit state. Created lazily on the first
/// negotiation attempt, mutated after every attempt, never deleted.
///
/// The block lifecycle is a two-state machine: `Active -> Blocked` fires on
/// the rejection-threshold edge, and `Blocked -> Active` happens lazily when
/// an expired window is observed. A `None` `block_until_date` while blocked
/// means an indefinite block that only an operator can lift.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationProfile {
    pub customer_id: CustomerId,
    pub negotiation_style: String,
    pub negotiation_attempts: u32,
    pub monthly_negotiation_count: u32,
    pub last_monthly_reset: Option<DateTime<Utc>>,
    pub last_negotiation_date: Option<DateTime<Utc>>,
    pub last_outcome: Option<NegotiationOutcome>,
    pub consecutive_rejections: u32,
    pub consecutive_acceptances: u32,
    pub blocked_from_negotiation: bool,
    pub block_reason: Option<String>,
    pub block_until_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NegotiationProfile {
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            negotiation_style: "reasonable".to_string(),
            negotiation_attempts: 0,
            monthly_negotiation_count: 0,
            last_monthly_reset: Some(month_start(now)),
            last_negotiation_date: None,
            last_outcome: None,
            consecutive_rejections: 0,
            consecutive_acceptances: 0,
            blocked_from_negotiation: false,
            block_reason: None,
            block_until_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Zeroes the monthly counter the first time it is called after a
    /// calendar-month boundary. Idempotent within a month. Must run before
    /// every capability calculation and before every read of
    /// `monthly_negotiation_count`. Returns whether a reset happened.
    pub fn reset_monthly_count_if_needed(&mut self, now: DateTime<Utc>) -> bool {
        let boundary = month_start(now);
        match self.last_monthly_reset {
            Some(reset) if reset >= boundary => false,
            _ => {
                self.monthly_negotiation_count = 0;
                self.last_monthly_reset = Some(boundary);
                self.updated_at = now;
                true
            }
        }
    }

    /// Called exactly once per negotiation request, regardless of outcome.
    pub fn increment_attempt(&mut self, now: DateTime<Utc>) {
        self.negotiation_attempts += 1;
        self.monthly_negotiation_count += 1;
        self.last_negotiation_date = Some(now);
        self.updated_at = now;
    }

    /// Updates the run-length counters. Accepted and rejected are mutually
    /// exclusive (recording one resets the other); any other outcome resets
    /// both. Crossing `REJECTION_BLOCK_THRESHOLD` while active trips the
    /// automatic block; further rejections inside an existing window leave
    /// the window untouched.
    pub fn record_outcome(&mut self, outcome: NegotiationOutcome, now: DateTime<Utc>) {
        self.clear_expired_block(now);
        match outcome {
            NegotiationOutcome::Accepted => {
                self.consecutive_acceptances += 1;
                self.consecutive_rejections = 0;
            }
            NegotiationOutcome::Rejected => {
                self.consecutive_rejections += 1;
                self.consecutive_acceptances = 0;
                if self.consecutive_rejections >= REJECTION_BLOCK_THRESHOLD
                    && !self.blocked_from_negotiation
                {
                    self.blocked_from_negotiation = true;
                    self.block_reason = Some(AUTO_BLOCK_REASON.to_string());
                    self.block_until_date = Some(now + Duration::days(BLOCK_WINDOW_DAYS));
                }
            }
            NegotiationOutcome::OfferMade | NegotiationOutcome::NoOffer => {
                self.consecutive_acceptances = 0;
                self.consecutive_rejections = 0;
            }
        }
        self.last_outcome = Some(outcome);
        self.updated_at = now;
    }

    /// Lazy-unblock read: an expired window reads as unblocked without any
    /// explicit state change.
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_from_negotiation && self.block_until_date.map_or(true, |until| now < until)
    }

    /// Opportunistically clears an expired block window. Returns whether
    /// anything changed. Indefinite blocks are never cleared here.
    pub fn clear_expired_block(&mut self, now: DateTime<Utc>) -> bool {
        match self.block_until_date {
            Some(until) if self.blocked_from_negotiation && now >= until => {
                self.blocked_from_negotiation = false;
                self.block_reason = None;
                self.block_until_date = None;
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }
}

/// First instant of the calendar month containing `now`.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    first.and_time(NaiveTime::MIN).and_utc()
}
