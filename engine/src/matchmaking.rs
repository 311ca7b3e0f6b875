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

//! The matchmaking engine.
//!
//! Orchestrates weight resolution, the static feature cache, the pure
//! scoring core, offer persistence and the audit log into the `rank` entry
//! point, and exposes the offer lifecycle and operational controls around it.

use chrono::Utc;
use futures_util::future::join_all;
use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use jurimatch_scoring::{
    Case,
    CaseId,
    ClientId,
    FeatureVector,
    Lawyer,
    LawyerId,
    Preset,
    RankedMatch,
    System,
    WeightVector,
};

use crate::{
    audit::{AuditRecord, AuditSink, FeedbackLabel, RecommendRecord},
    cache::StaticFeatureCache,
    config::Config,
    error::{Error, InvalidInput, SetupError},
    offers::{
        CaseOffers,
        NewOffer,
        Offer,
        OfferId,
        OfferResponse,
        OfferState,
        OfferStats,
    },
    storage::OfferStorage,
    weights::SnapshotStore,
};

/// The outcome of a rank call.
///
/// Exposes the ranked lawyers and the emitted offer ids so a downstream
/// notification service can apply its per-lawyer throttle.
#[derive(Debug)]
pub struct RankOutcome {
    pub case_id: CaseId,
    pub matches: Vec<RankedMatch>,
    pub offer_ids: Vec<OfferId>,
}

impl RankOutcome {
    pub fn lawyer_ids(&self) -> Vec<&LawyerId> {
        self.matches.iter().map(|ranked| &ranked.lawyer_id).collect()
    }

    fn empty(case_id: CaseId) -> Self {
        Self {
            case_id,
            matches: Vec::new(),
            offer_ids: Vec::new(),
        }
    }
}

/// The matchmaking engine.
pub struct Engine {
    system: System,
    weights: SnapshotStore,
    cache: Box<dyn StaticFeatureCache>,
    storage: Box<dyn OfferStorage>,
    audit: Box<dyn AuditSink>,
    offers: crate::offers::Config,
}

impl Engine {
    /// Sets the engine up from the configuration.
    pub async fn new(config: &Config) -> Result<Self, SetupError> {
        let cache = config.cache.setup().await?;
        let storage = config.storage.setup().await?;
        let audit = config.audit.setup()?;

        Ok(Self::with_components(config, cache, storage, audit))
    }

    /// Assembles the engine from already set up components.
    pub fn with_components(
        config: &Config,
        cache: Box<dyn StaticFeatureCache>,
        storage: Box<dyn OfferStorage>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        Self {
            system: config.scoring.clone().build(),
            weights: SnapshotStore::new(&config.weights),
            cache,
            storage,
            audit,
            offers: config.offers.clone(),
        }
    }

    /// Ranks the candidates for the case and persists the offer set.
    ///
    /// The returned sequence is totally ordered by (descending fair score,
    /// `last_offered_at`, lawyer id). Offers, `last_offered_at` stamps and
    /// audit records are persisted atomically; on cancellation nothing
    /// durable happens (cache writes may have occurred, they are idempotent
    /// and bounded).
    #[instrument(skip(self, case, candidates, cancel), fields(case_id = %case.id, candidates = candidates.len()))]
    pub async fn rank(
        &self,
        case: &Case,
        candidates: &[Lawyer],
        top_n: usize,
        preset: &str,
        cancel: &CancellationToken,
    ) -> Result<RankOutcome, Error> {
        validate(case, candidates)?;
        if candidates.is_empty() {
            return Ok(RankOutcome::empty(case.id.clone()));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let preset = Preset::from_name(preset);
        let snapshot = self.weights.active();
        let weights = snapshot.resolve(preset, case.complexity);

        let features = join_all(
            candidates
                .iter()
                .map(|lawyer| self.features_for(case, lawyer)),
        )
        .await;
        let scored = candidates.iter().zip(features).collect_vec();

        let ranked = self.system.rank(
            &scored,
            &weights,
            preset,
            case.complexity,
            top_n,
        );
        if ranked.is_empty() {
            return Ok(RankOutcome::empty(case.id.clone()));
        }

        // nothing durable may happen for a cancelled call
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.offers.validity).unwrap(/* fits */);
        let offers = ranked
            .iter()
            .map(|ranked| NewOffer {
                case_id: case.id.clone(),
                lawyer_id: ranked.lawyer_id.clone(),
                breakdown: ranked.breakdown.clone(),
                sent_at: now,
                expires_at,
            })
            .collect_vec();
        let records = ranked
            .iter()
            .map(|ranked| {
                let breakdown = &ranked.breakdown;
                let lawyer = candidates
                    .iter()
                    .find(|lawyer| lawyer.id == ranked.lawyer_id)
                    .unwrap(/* ranked lawyers come from the candidates */);
                AuditRecord::Recommend(RecommendRecord {
                    case_id: case.id.clone(),
                    lawyer_id: ranked.lawyer_id.clone(),
                    features: breakdown.features,
                    delta: breakdown.delta,
                    raw: breakdown.raw,
                    fair: breakdown.fair,
                    equity: breakdown.equity,
                    diversity_boost: breakdown.diversity_boost,
                    weights_used: breakdown.weights_used,
                    preset: breakdown.preset,
                    complexity: breakdown.complexity,
                    success_status: lawyer.kpi.success_status,
                    timestamp: now,
                })
            })
            .collect_vec();

        let offer_ids = self
            .storage
            .persist_ranking(case, offers, records, self.audit.as_ref())
            .await?;
        info!(offers = offer_ids.len(), "ranking persisted");

        Ok(RankOutcome {
            case_id: case.id.clone(),
            matches: ranked,
            offer_ids,
        })
    }

    /// Reads the features of one candidate through the cache.
    ///
    /// A cache miss computes the full vector and writes the static subset
    /// back, an unreachable cache degrades to recomputation.
    async fn features_for(&self, case: &Case, lawyer: &Lawyer) -> FeatureVector {
        let cached = match self.cache.get(&lawyer.id).await {
            Ok(cached) => cached,
            Err(error) => {
                debug!(%error, lawyer_id = %lawyer.id, "cache read failed, treating as miss");
                None
            }
        };

        match cached {
            Some(statics) => self.system.dynamic_features(case, lawyer, statics),
            None => {
                let features = self.system.features(case, lawyer);
                if let Err(error) = self
                    .cache
                    .put(&lawyer.id, features.static_subset())
                    .await
                {
                    debug!(%error, lawyer_id = %lawyer.id, "cache write failed, continuing");
                }
                features
            }
        }
    }

    /// A lawyer replies to a pending offer.
    ///
    /// Only the lawyer named on the offer may respond, and only while the
    /// offer is pending.
    pub async fn respond_to_offer(
        &self,
        id: &OfferId,
        actor: &LawyerId,
        response: OfferResponse,
    ) -> Result<Offer, Error> {
        let offer = self
            .storage
            .get_offer(id)
            .await?
            .ok_or(Error::OfferNotFound(*id))?;
        if offer.lawyer_id != *actor {
            return Err(Error::Forbidden);
        }
        if offer.state != OfferState::Pending {
            return Err(Error::OfferNotPending {
                id: *id,
                state: offer.state,
            });
        }

        let label = match response {
            OfferResponse::Interested => FeedbackLabel::Accepted,
            OfferResponse::Declined => FeedbackLabel::Declined,
        };
        let now = Utc::now();
        self.storage
            .transition_offer(
                id,
                &[OfferState::Pending],
                response.target_state(),
                Some(now),
                label,
                now,
                self.audit.as_ref(),
            )
            .await?
            .ok_or_else(|| raced_transition(id, &offer))
    }

    /// A contract was signed on the offer, its siblings lose the case.
    ///
    /// Moves the interested offer to closed and closes every other open offer
    /// of the same case. Idempotent: an already closed offer only re-closes
    /// the remaining siblings. Returns the number of closed siblings.
    pub async fn contract_signed(&self, id: &OfferId) -> Result<u32, Error> {
        let offer = self
            .storage
            .get_offer(id)
            .await?
            .ok_or(Error::OfferNotFound(*id))?;
        let now = Utc::now();

        match offer.state {
            OfferState::Interested => {
                self.storage
                    .transition_offer(
                        id,
                        &[OfferState::Interested],
                        OfferState::Closed,
                        None,
                        FeedbackLabel::Won,
                        now,
                        self.audit.as_ref(),
                    )
                    .await?
                    .ok_or_else(|| raced_transition(id, &offer))?;
            }
            OfferState::Closed => {}
            state => {
                return Err(Error::OfferNotPending { id: *id, state });
            }
        }

        self.storage
            .close_siblings(&offer.case_id, id, now, self.audit.as_ref())
            .await
            .map_err(Into::into)
    }

    /// The offers of a case, visible only to the owning client.
    pub async fn offers_for_case(
        &self,
        case_id: &CaseId,
        client: &ClientId,
    ) -> Result<CaseOffers, Error> {
        self.authorize_client(case_id, client).await?;

        let offers = self.storage.offers_for_case(case_id).await?;
        let stats = OfferStats::count(&offers);

        Ok(CaseOffers {
            case_id: case_id.clone(),
            total: stats.total,
            pending_count: stats.pending,
            interested_count: stats.interested,
            offers,
        })
    }

    /// The per-state offer counts of a case, visible only to the owning client.
    pub async fn offer_stats(
        &self,
        case_id: &CaseId,
        client: &ClientId,
    ) -> Result<OfferStats, Error> {
        self.authorize_client(case_id, client).await?;

        let offers = self.storage.offers_for_case(case_id).await?;

        Ok(OfferStats::count(&offers))
    }

    /// The offers sent to a lawyer, most recent first.
    pub async fn offers_for_lawyer(
        &self,
        lawyer_id: &LawyerId,
        state: Option<OfferState>,
    ) -> Result<Vec<Offer>, Error> {
        self.storage
            .offers_for_lawyer(lawyer_id, state)
            .await
            .map_err(Into::into)
    }

    /// Expires due pending offers, returns the number moved.
    pub async fn expire_pending_offers(&self) -> Result<u32, Error> {
        let expired = self
            .storage
            .expire_due(Utc::now(), self.audit.as_ref())
            .await?;
        if expired > 0 {
            info!(expired, "pending offers expired");
        }

        Ok(expired)
    }

    /// Reloads the weight snapshot, returns the now active vector.
    pub fn reload_weights(&self) -> WeightVector {
        *self.weights.reload()
    }

    /// Drops the cached static features of a lawyer.
    ///
    /// To be called by every writer of lawyer state.
    pub async fn invalidate_cache(&self, lawyer_id: &LawyerId) -> Result<(), Error> {
        self.cache.invalidate(lawyer_id).await.map_err(Into::into)
    }

    async fn authorize_client(
        &self,
        case_id: &CaseId,
        client: &ClientId,
    ) -> Result<(), Error> {
        match self.storage.case_owner(case_id).await? {
            Some(owner) if owner == *client => Ok(()),
            _ => Err(Error::Forbidden),
        }
    }
}

// the conditional update lost a race, report the state we saw
fn raced_transition(id: &OfferId, before: &Offer) -> Error {
    Error::OfferNotPending {
        id: *id,
        state: before.state,
    }
}

fn validate(case: &Case, candidates: &[Lawyer]) -> Result<(), InvalidInput> {
    case.validate()?;

    let expected = case.summary_embedding.len();
    for lawyer in candidates {
        for embedding in &lawyer.historical_embeddings {
            if embedding.len() != expected {
                return Err(InvalidInput::EmbeddingDimension {
                    lawyer_id: lawyer.id.clone(),
                    got: embedding.len(),
                    expected,
                });
            }
        }
    }

    Ok(())
}
