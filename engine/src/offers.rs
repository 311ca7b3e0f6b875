// Copyright 2024 Jurimatch AG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The offer lifecycle.
//!
//! An offer is a persisted, time-bounded invitation of one lawyer to one
//! case. It starts out `pending` and moves through the state machine below,
//! the terminal states are absorbing:
//!
//! ```text
//!     pending --(interested)--> interested --(contract)--> closed
//!        |                          |
//!        +--(declined)--> declined  +--(timeout)--> expired
//!        +--(timeout)--> expired    +--(sibling accepted)--> closed
//!        +--(sibling accepted)--> closed
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jurimatch_scoring::{CaseId, LawyerId, MatchBreakdown};

use crate::utils::serde_duration_as_hours;

/// A unique identifier of an [`Offer`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct OfferId(Uuid);

impl OfferId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// The lifecycle state of an offer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[derive(sqlx::Type)]
#[sqlx(type_name = "offer_state", rename_all = "snake_case")]
pub enum OfferState {
    Pending,
    Interested,
    Declined,
    Expired,
    Closed,
}

impl OfferState {
    /// Terminal states are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::Expired | Self::Closed)
    }
}

impl sqlx::postgres::PgHasArrayType for OfferState {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("_offer_state")
    }
}

/// A lawyer's reply to a pending offer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferResponse {
    Interested,
    Declined,
}

impl OfferResponse {
    pub(crate) fn target_state(self) -> OfferState {
        match self {
            Self::Interested => OfferState::Interested,
            Self::Declined => OfferState::Declined,
        }
    }
}

/// A persisted offer with the score breakdown captured at creation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Offer {
    pub id: OfferId,
    pub case_id: CaseId,
    pub lawyer_id: LawyerId,
    pub state: OfferState,
    pub breakdown: MatchBreakdown,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// An offer to be upserted from a ranking result.
#[derive(Clone, Debug)]
pub struct NewOffer {
    pub case_id: CaseId,
    pub lawyer_id: LawyerId,
    pub breakdown: MatchBreakdown,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The offers of one case as seen by the owning client.
#[derive(Clone, Debug, Serialize)]
pub struct CaseOffers {
    pub case_id: CaseId,
    pub offers: Vec<Offer>,
    pub total: usize,
    pub pending_count: usize,
    pub interested_count: usize,
}

/// Per-state counts of the offers of one case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct OfferStats {
    pub total: usize,
    pub pending: usize,
    pub interested: usize,
    pub declined: usize,
    pub expired: usize,
    pub closed: usize,
    /// Share of offers answered by the lawyer, in percent.
    pub response_rate: f32,
}

impl OfferStats {
    pub(crate) fn count(offers: &[Offer]) -> Self {
        let mut stats = Self {
            total: offers.len(),
            ..Self::default()
        };
        for offer in offers {
            match offer.state {
                OfferState::Pending => stats.pending += 1,
                OfferState::Interested => stats.interested += 1,
                OfferState::Declined => stats.declined += 1,
                OfferState::Expired => stats.expired += 1,
                OfferState::Closed => stats.closed += 1,
            }
        }
        if stats.total > 0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = (stats.interested + stats.declined) as f32 / stats.total as f32;
            stats.response_rate = (rate * 10_000.).round() / 100.;
        }

        stats
    }
}

/// Configurations of the offer lifecycle.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[must_use]
pub struct Config {
    /// How long a pending offer stays open.
    #[serde(default = "default_validity")]
    #[serde(with = "serde_duration_as_hours")]
    pub(crate) validity: Duration,
}

fn default_validity() -> Duration {
    Duration::from_secs(60 * 60 * 24)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validity: default_validity(),
        }
    }
}
