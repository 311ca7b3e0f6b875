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

mod common;

use tokio_util::sync::CancellationToken;

use jurimatch_engine::{
    audit::{AuditRecord, FeedbackLabel},
    offers::{OfferId, OfferResponse, OfferState},
    storage::OfferStorage,
    Config,
    Error,
    RankOutcome,
};
use jurimatch_scoring::{ClientId, LawyerId};

use crate::common::{case, engine, engine_with, lawyer, TestEngine};

async fn rank_three(setup: &TestEngine) -> RankOutcome {
    setup
        .engine
        .rank(
            &case("case_1"),
            &[lawyer("adv_1"), lawyer("adv_2"), lawyer("adv_3")],
            3,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap()
}

fn feedback_labels(records: &[AuditRecord]) -> Vec<FeedbackLabel> {
    records
        .iter()
        .filter_map(|record| match record {
            AuditRecord::Feedback(record) => Some(record.label),
            AuditRecord::Recommend(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_rank_creates_pending_offers() {
    let setup = engine();
    let outcome = rank_three(&setup).await;

    assert_eq!(outcome.offer_ids.len(), 3);
    for id in &outcome.offer_ids {
        let offer = setup.storage.get_offer(id).await.unwrap().unwrap();
        assert_eq!(offer.state, OfferState::Pending);
        assert!(offer.responded_at.is_none());
        assert!(offer.expires_at > offer.sent_at);
    }
}

#[tokio::test]
async fn test_reranking_upserts_instead_of_duplicating() {
    let setup = engine();
    let first = rank_three(&setup).await;
    let second = rank_three(&setup).await;

    let mut first_ids = first.offer_ids.clone();
    let mut second_ids = second.offer_ids.clone();
    first_ids.sort_unstable();
    second_ids.sort_unstable();
    assert_eq!(first_ids, second_ids);

    let offers = setup
        .engine
        .offers_for_case(&case("case_1").id, &ClientId::from("client_1"))
        .await
        .unwrap();
    assert_eq!(offers.total, 3);
    assert_eq!(offers.pending_count, 3);
}

#[tokio::test]
async fn test_lawyer_responds_interested() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let id = outcome.offer_ids[0];
    let lawyer_id = outcome.matches[0].lawyer_id.clone();

    let offer = setup
        .engine
        .respond_to_offer(&id, &lawyer_id, OfferResponse::Interested)
        .await
        .unwrap();

    assert_eq!(offer.state, OfferState::Interested);
    assert!(offer.responded_at.is_some());
    assert_eq!(
        feedback_labels(&setup.audit.records()),
        [FeedbackLabel::Accepted],
    );
}

#[tokio::test]
async fn test_lawyer_declines() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let id = outcome.offer_ids[1];
    let lawyer_id = outcome.matches[1].lawyer_id.clone();

    let offer = setup
        .engine
        .respond_to_offer(&id, &lawyer_id, OfferResponse::Declined)
        .await
        .unwrap();

    assert_eq!(offer.state, OfferState::Declined);
    assert_eq!(
        feedback_labels(&setup.audit.records()),
        [FeedbackLabel::Declined],
    );
}

#[tokio::test]
async fn test_only_the_named_lawyer_may_respond() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let id = outcome.offer_ids[0];

    let result = setup
        .engine
        .respond_to_offer(&id, &LawyerId::from("adv_999"), OfferResponse::Interested)
        .await;

    assert!(matches!(result, Err(Error::Forbidden)));
    let offer = setup.storage.get_offer(&id).await.unwrap().unwrap();
    assert_eq!(offer.state, OfferState::Pending);
    assert!(feedback_labels(&setup.audit.records()).is_empty());
}

#[tokio::test]
async fn test_terminal_states_are_absorbing() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let id = outcome.offer_ids[0];
    let lawyer_id = outcome.matches[0].lawyer_id.clone();

    setup
        .engine
        .respond_to_offer(&id, &lawyer_id, OfferResponse::Declined)
        .await
        .unwrap();

    let result = setup
        .engine
        .respond_to_offer(&id, &lawyer_id, OfferResponse::Interested)
        .await;
    assert!(matches!(result, Err(Error::OfferNotPending { .. })));

    let offer = setup.storage.get_offer(&id).await.unwrap().unwrap();
    assert_eq!(offer.state, OfferState::Declined);
}

#[tokio::test]
async fn test_missing_offer_is_reported() {
    let setup = engine();
    let result = setup
        .engine
        .respond_to_offer(
            &OfferId::new(),
            &LawyerId::from("adv_1"),
            OfferResponse::Interested,
        )
        .await;

    assert!(matches!(result, Err(Error::OfferNotFound(_))));
}

#[tokio::test]
async fn test_contract_closes_winner_and_siblings() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let winner = outcome.offer_ids[0];
    let winner_lawyer = outcome.matches[0].lawyer_id.clone();

    setup
        .engine
        .respond_to_offer(&winner, &winner_lawyer, OfferResponse::Interested)
        .await
        .unwrap();
    let closed = setup.engine.contract_signed(&winner).await.unwrap();
    assert_eq!(closed, 2);

    for id in &outcome.offer_ids {
        let offer = setup.storage.get_offer(id).await.unwrap().unwrap();
        assert_eq!(offer.state, OfferState::Closed);
    }

    let labels = feedback_labels(&setup.audit.records());
    assert_eq!(labels[0], FeedbackLabel::Accepted);
    assert_eq!(labels[1], FeedbackLabel::Won);
    assert_eq!(labels[2..], [FeedbackLabel::Lost, FeedbackLabel::Lost]);
}

#[tokio::test]
async fn test_sibling_close_is_idempotent() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let winner = outcome.offer_ids[0];
    let winner_lawyer = outcome.matches[0].lawyer_id.clone();

    setup
        .engine
        .respond_to_offer(&winner, &winner_lawyer, OfferResponse::Interested)
        .await
        .unwrap();
    setup.engine.contract_signed(&winner).await.unwrap();

    let states_before = offer_states(&setup, &outcome).await;
    let closed_again = setup.engine.contract_signed(&winner).await.unwrap();
    assert_eq!(closed_again, 0);
    assert_eq!(offer_states(&setup, &outcome).await, states_before);

    // no duplicate feedback for the second call
    assert_eq!(feedback_labels(&setup.audit.records()).len(), 4);
}

async fn offer_states(setup: &TestEngine, outcome: &RankOutcome) -> Vec<OfferState> {
    let mut states = Vec::new();
    for id in &outcome.offer_ids {
        states.push(setup.storage.get_offer(id).await.unwrap().unwrap().state);
    }
    states
}

#[tokio::test]
async fn test_contract_on_pending_offer_fails() {
    let setup = engine();
    let outcome = rank_three(&setup).await;

    let result = setup.engine.contract_signed(&outcome.offer_ids[0]).await;
    assert!(matches!(result, Err(Error::OfferNotPending { .. })));
}

#[tokio::test]
async fn test_pending_offers_expire() {
    let config = toml::from_str::<Config>("[offers]\nvalidity = 0").unwrap();
    let setup = engine_with(config);
    let outcome = rank_three(&setup).await;

    let expired = setup.engine.expire_pending_offers().await.unwrap();
    assert_eq!(expired, 3);

    for id in &outcome.offer_ids {
        let offer = setup.storage.get_offer(id).await.unwrap().unwrap();
        assert_eq!(offer.state, OfferState::Expired);
    }
    assert_eq!(
        feedback_labels(&setup.audit.records()),
        [
            FeedbackLabel::Expired,
            FeedbackLabel::Expired,
            FeedbackLabel::Expired,
        ],
    );

    // idempotent and batchable
    assert_eq!(setup.engine.expire_pending_offers().await.unwrap(), 0);
    assert_eq!(feedback_labels(&setup.audit.records()).len(), 3);
}

#[tokio::test]
async fn test_expired_offers_reject_responses() {
    let config = toml::from_str::<Config>("[offers]\nvalidity = 0").unwrap();
    let setup = engine_with(config);
    let outcome = rank_three(&setup).await;
    setup.engine.expire_pending_offers().await.unwrap();

    let result = setup
        .engine
        .respond_to_offer(
            &outcome.offer_ids[0],
            &outcome.matches[0].lawyer_id,
            OfferResponse::Interested,
        )
        .await;
    assert!(matches!(result, Err(Error::OfferNotPending { .. })));
}

#[tokio::test]
async fn test_case_offers_are_visible_to_the_owner_only() {
    let setup = engine();
    rank_three(&setup).await;
    let case_id = case("case_1").id;

    let result = setup
        .engine
        .offers_for_case(&case_id, &ClientId::from("client_999"))
        .await;
    assert!(matches!(result, Err(Error::Forbidden)));

    let offers = setup
        .engine
        .offers_for_case(&case_id, &ClientId::from("client_1"))
        .await
        .unwrap();
    assert_eq!(offers.total, 3);
    assert_eq!(offers.pending_count, 3);
    assert_eq!(offers.interested_count, 0);
    // ordered by fair score, ties by lawyer id
    assert!(offers
        .offers
        .windows(2)
        .all(|pair| pair[0].breakdown.fair >= pair[1].breakdown.fair));
}

#[tokio::test]
async fn test_offer_stats() {
    let setup = engine();
    let outcome = rank_three(&setup).await;

    setup
        .engine
        .respond_to_offer(
            &outcome.offer_ids[0],
            &outcome.matches[0].lawyer_id,
            OfferResponse::Interested,
        )
        .await
        .unwrap();
    setup
        .engine
        .respond_to_offer(
            &outcome.offer_ids[1],
            &outcome.matches[1].lawyer_id,
            OfferResponse::Declined,
        )
        .await
        .unwrap();

    let stats = setup
        .engine
        .offer_stats(&case("case_1").id, &ClientId::from("client_1"))
        .await
        .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.interested, 1);
    assert_eq!(stats.declined, 1);
    assert!((stats.response_rate - 66.67).abs() < 0.01);

    let result = setup
        .engine
        .offer_stats(&case("case_1").id, &ClientId::from("client_999"))
        .await;
    assert!(matches!(result, Err(Error::Forbidden)));
}

#[tokio::test]
async fn test_lawyer_offer_listing_with_filter() {
    let setup = engine();
    let outcome = rank_three(&setup).await;
    let lawyer_id = outcome.matches[0].lawyer_id.clone();

    let pending = setup
        .engine
        .offers_for_lawyer(&lawyer_id, Some(OfferState::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    setup
        .engine
        .respond_to_offer(&outcome.offer_ids[0], &lawyer_id, OfferResponse::Declined)
        .await
        .unwrap();

    let pending = setup
        .engine
        .offers_for_lawyer(&lawyer_id, Some(OfferState::Pending))
        .await
        .unwrap();
    assert!(pending.is_empty());

    let all = setup
        .engine
        .offers_for_lawyer(&lawyer_id, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].state, OfferState::Declined);
}
