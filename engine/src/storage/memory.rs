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

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tokio::sync::RwLock;

use jurimatch_scoring::{Case, CaseId, ClientId, LawyerId};

use crate::{
    audit::{AuditRecord, AuditSink, FeedbackLabel},
    error::PersistenceError,
    offers::{NewOffer, Offer, OfferId, OfferState},
    storage::{feedback_for, OfferStorage},
};

/// An in-memory storage, used in tests.
///
/// Mutations snapshot the state before applying and restore it if the audit
/// append fails, which keeps the atomic boundary of the trait.
#[derive(Debug, Default)]
pub struct Storage {
    state: RwLock<State>,
}

#[derive(Clone, Debug, Default)]
struct State {
    offers: HashMap<OfferId, Offer>,
    cases: HashMap<CaseId, ClientId>,
    last_offered: HashMap<LawyerId, DateTime<Utc>>,
}

impl Storage {
    /// The recorded `last_offered_at` of a lawyer, for assertions in tests.
    pub async fn last_offered_at(&self, lawyer_id: &LawyerId) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .last_offered
            .get(lawyer_id)
            .copied()
    }
}

#[async_trait]
impl OfferStorage for Storage {
    async fn persist_ranking(
        &self,
        case: &Case,
        offers: Vec<NewOffer>,
        records: Vec<AuditRecord>,
        audit: &dyn AuditSink,
    ) -> Result<Vec<OfferId>, PersistenceError> {
        let mut state = self.state.write().await;
        let rollback = state.clone();

        state
            .cases
            .insert(case.id.clone(), case.client_id.clone());

        let mut ids = Vec::with_capacity(offers.len());
        for offer in offers {
            let existing = state
                .offers
                .values()
                .find(|candidate| {
                    candidate.case_id == offer.case_id && candidate.lawyer_id == offer.lawyer_id
                })
                .map(|candidate| candidate.id);
            let id = existing.unwrap_or_else(OfferId::new);

            state
                .last_offered
                .insert(offer.lawyer_id.clone(), offer.sent_at);
            state.offers.insert(
                id,
                Offer {
                    id,
                    case_id: offer.case_id,
                    lawyer_id: offer.lawyer_id,
                    state: OfferState::Pending,
                    breakdown: offer.breakdown,
                    sent_at: offer.sent_at,
                    responded_at: None,
                    expires_at: offer.expires_at,
                },
            );
            ids.push(id);
        }

        if let Err(error) = audit.append(&records).await {
            *state = rollback;
            return Err(error);
        }

        Ok(ids)
    }

    async fn get_offer(&self, id: &OfferId) -> Result<Option<Offer>, PersistenceError> {
        Ok(self.state.read().await.offers.get(id).cloned())
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
        let mut state = self.state.write().await;
        let rollback = state.clone();

        let Some(offer) = state.offers.get_mut(id) else {
            return Ok(None);
        };
        if !from.contains(&offer.state) {
            return Ok(None);
        }

        offer.state = to;
        if responded_at.is_some() {
            offer.responded_at = responded_at;
        }
        let updated = offer.clone();

        if let Err(error) = audit.append(&[feedback_for(&updated, label, now)]).await {
            *state = rollback;
            return Err(error);
        }

        Ok(Some(updated))
    }

    async fn close_siblings(
        &self,
        case_id: &CaseId,
        keep: &OfferId,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        let mut state = self.state.write().await;
        let rollback = state.clone();

        let mut closed = state
            .offers
            .values_mut()
            .filter(|offer| {
                offer.case_id == *case_id
                    && offer.id != *keep
                    && matches!(offer.state, OfferState::Pending | OfferState::Interested)
            })
            .map(|offer| {
                offer.state = OfferState::Closed;
                offer.clone()
            })
            .collect_vec();
        closed.sort_unstable_by(|o1, o2| o1.lawyer_id.cmp(&o2.lawyer_id));

        let records = closed
            .iter()
            .map(|offer| feedback_for(offer, FeedbackLabel::Lost, now))
            .collect_vec();
        if let Err(error) = audit.append(&records).await {
            *state = rollback;
            return Err(error);
        }

        #[allow(clippy::cast_possible_truncation)]
        Ok(closed.len() as u32)
    }

    async fn expire_due(
        &self,
        now: DateTime<Utc>,
        audit: &dyn AuditSink,
    ) -> Result<u32, PersistenceError> {
        let mut state = self.state.write().await;
        let rollback = state.clone();

        let mut expired = state
            .offers
            .values_mut()
            .filter(|offer| offer.state == OfferState::Pending && offer.expires_at <= now)
            .map(|offer| {
                offer.state = OfferState::Expired;
                offer.clone()
            })
            .collect_vec();
        expired.sort_unstable_by(|o1, o2| o1.lawyer_id.cmp(&o2.lawyer_id));

        let records = expired
            .iter()
            .map(|offer| feedback_for(offer, FeedbackLabel::Expired, now))
            .collect_vec();
        if let Err(error) = audit.append(&records).await {
            *state = rollback;
            return Err(error);
        }

        #[allow(clippy::cast_possible_truncation)]
        Ok(expired.len() as u32)
    }

    async fn offers_for_case(&self, case_id: &CaseId) -> Result<Vec<Offer>, PersistenceError> {
        let offers = self
            .state
            .read()
            .await
            .offers
            .values()
            .filter(|offer| offer.case_id == *case_id)
            .cloned()
            .sorted_unstable_by(|o1, o2| {
                o2.breakdown
                    .fair
                    .total_cmp(&o1.breakdown.fair)
                    .then_with(|| o1.lawyer_id.cmp(&o2.lawyer_id))
            })
            .collect_vec();

        Ok(offers)
    }

    async fn offers_for_lawyer(
        &self,
        lawyer_id: &LawyerId,
        state: Option<OfferState>,
    ) -> Result<Vec<Offer>, PersistenceError> {
        let offers = self
            .state
            .read()
            .await
            .offers
            .values()
            .filter(|offer| {
                offer.lawyer_id == *lawyer_id
                    && state.map_or(true, |state| offer.state == state)
            })
            .cloned()
            .sorted_unstable_by(|o1, o2| {
                o2.sent_at
                    .cmp(&o1.sent_at)
                    .then_with(|| o1.case_id.cmp(&o2.case_id))
            })
            .collect_vec();

        Ok(offers)
    }

    async fn case_owner(&self, case_id: &CaseId) -> Result<Option<ClientId>, PersistenceError> {
        Ok(self.state.read().await.cases.get(case_id).cloned())
    }
}
