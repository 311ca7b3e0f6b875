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

//! Durable state behind the engine.
//!
//! Offer mutations and their audit records form one atomic boundary: each
//! method that changes offers takes the audit sink and either persists both
//! the state change and its records or neither.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jurimatch_scoring::{Case, CaseId, ClientId, LawyerId};

use crate::{
    audit::{AuditRecord, AuditSink, FeedbackLabel},
    error::{PersistenceError, SetupError},
    offers::{NewOffer, Offer, OfferId, OfferState},
};

/// The persistence capability set of the offer manager.
#[async_trait]
pub trait OfferStorage: Send + Sync {
    /// Persists a ranking outcome.
    ///
    /// Upserts one pending offer per entry keyed by (case, lawyer), records
    /// the case ownership, stamps the lawyers' `last_offered_at` and appends
    /// the recommend audit records. All of it or nothing.
    async fn persist_ranking(
        &self,
        case: &Case,
        offers: Vec<NewOffer>,
        records: Vec<AuditRecord>,
        audit: &dyn AuditSink,
    ) -> Result<Vec<OfferId>, PersistenceError>;

    async fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, PersistenceError>;

    /// Conditionally transitions an offer and appends the feedback record.
    ///
    /// Returns `None` without side effects if the offer is missing or not in
    /// one of the `from` states.
    #[allow(clippy::too_many_arguments)]
    async fn transition_offer(
        &self,
        id: &OfferId,
        from: &[OfferState],
        to: OfferState,
        responded_at: Option<DateTime<Utc>>,
        label: FeedbackLabel,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<Option<Offer>, PersistenceError>;

    /// Closes all other open offers of the case, idempotent.
    ///
    /// Appends a `lost` feedback record per closed offer and returns how many
    /// were closed.
    async fn close_siblings(
        &self,
        case_id: &CaseId,
        keep: &OfferId,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError>;

    /// Expires due pending offers, idempotent and batchable.
    ///
    /// Appends an `expired` feedback record per offer and returns how many
    /// were moved.
    async fn expire_due(
        &self,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError>;

    /// The offers of a case, best fair score first.
    async fn offers_for_case(&self, case_id: &CaseId) -> Result<Vec<Offer>, PersistenceError>;

    /// The offers of a lawyer, most recent first, optionally filtered by state.
    async fn offers_for_lawyer(
        &self,
        lawyer_id: &LawyerId,
        state: Option<OfferState>,
    ) -> Result<Vec<Offer>, PersistenceError>;

    /// The client owning the case, if the case is known.
    async fn case_owner(&self, case_id: &CaseId) -> Result<Option<ClientId>, PersistenceError>;
}

#[async_trait]
impl<T> OfferStorage for std::sync::Arc<T>
where
    T: OfferStorage + ?Sized,
{
    async fn persist_ranking(
        &self,
        case: &Case,
        offers: Vec<NewOffer>,
        records: Vec<AuditRecord>,
        audit: &dyn AuditSink,
    ) -> Result<Vec<OfferId>, PersistenceError> {
        (**self).persist_ranking(case, offers, records, audit).await
    }

    async fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, PersistenceError> {
        (**self).get_offer(id).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn transition_offer(
        &self,
        id: &OfferId,
        from: &[OfferState],
        to: OfferState,
        responded_at: Option<DateTime<Utc>>,
        label: FeedbackLabel,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<Option<Offer>, PersistenceError> {
        (**self)
            .transition_offer(id, from, to, responded_at, label, now, audit)
            .await
    }

    async fn close_siblings(
        &self,
        case_id: &CaseId,
        keep: &OfferId,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        (**self).close_siblings(case_id, keep, now, audit).await
    }

    async fn expire_due(
        &self,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        (**self).expire_due(now, audit).await
    }

    async fn offers_for_case(&self, case_id: &CaseId) -> Result<Vec<Offer>, PersistenceError> {
        (**self).offers_for_case(case_id).await
    }

    async fn offers_for_lawyer(
        &self,
        lawyer_id: &LawyerId,
        state: Option<OfferState>,
    ) -> Result<Vec<Offer>, PersistenceError> {
        (**self).offers_for_lawyer(lawyer_id, state).await
    }

    async fn case_owner(&self, case_id: &CaseId) -> Result<Option<ClientId>, PersistenceError> {
        (**self).case_owner(case_id).await
    }
}

pub(crate) fn feedback_for(
    offer: &Offer,
    label: FeedbackLabel,
    now: DateTime<Utc>,
) -> AuditRecord {
    AuditRecord::Feedback(crate::audit::FeedbackRecord {
        case_id: offer.case_id.clone(),
        lawyer_id: offer.lawyer_id.clone(),
        label,
        raw: offer.breakdown.raw,
        fair: offer.breakdown.fair,
        timestamp: now,
    })
}

/// Configurations of the durable storage.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub(crate) postgres: postgres::Config,
}

impl Config {
    pub(crate) async fn setup(&self) -> Result<Box<dyn OfferStorage>, SetupError> {
        Ok(Box::new(self.postgres.setup_database().await?))
    }
}
