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

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use jurimatch_engine::{audit::AuditRecord, Error, InvalidInput};
use jurimatch_scoring::{Complexity, DiversityMeta};
use jurimatch_test_utils::assert_approx_eq;

use crate::common::{case, engine, lawyer, perfect_lawyer};

#[tokio::test]
async fn test_empty_candidates_return_empty() {
    let setup = engine();
    let outcome = setup
        .engine
        .rank(&case("case_1"), &[], 5, "balanced", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.matches.is_empty());
    assert!(outcome.offer_ids.is_empty());
    assert!(setup.audit.records().is_empty());
}

#[tokio::test]
async fn test_single_perfect_match() {
    let setup = engine();
    let candidate = perfect_lawyer("adv_1");

    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &[candidate],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.matches.len(), 1);
    let breakdown = &outcome.matches[0].breakdown;
    assert_approx_eq!(f32, breakdown.features.a, 1.);
    assert!(breakdown.fair >= 0.7, "fair score too low: {}", breakdown.fair);
    // a singleton elite fully represents its own group
    assert_approx_eq!(f32, breakdown.diversity_boost, 0.);

    assert_eq!(outcome.offer_ids.len(), 1);
    let records = setup.audit.records();
    assert_eq!(records.len(), 1);
    assert!(matches!(&records[0], AuditRecord::Recommend(record)
        if record.lawyer_id == outcome.matches[0].lawyer_id));
    assert!(setup
        .storage
        .last_offered_at(&outcome.matches[0].lawyer_id)
        .await
        .is_some());
}

#[tokio::test]
async fn test_tie_broken_by_last_offered_at() {
    let setup = engine();
    let mut older = lawyer("adv_b");
    older.last_offered_at = Utc.timestamp_opt(1_000, 0).unwrap();
    let mut newer = lawyer("adv_a");
    newer.last_offered_at = Utc.timestamp_opt(2_000, 0).unwrap();

    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &[newer.clone(), older.clone()],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.matches[0].lawyer_id, older.id);
    assert_eq!(outcome.matches[1].lawyer_id, newer.id);
}

#[tokio::test]
async fn test_tie_broken_by_id() {
    let setup = engine();
    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &[lawyer("adv_2"), lawyer("adv_1")],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.matches[0].lawyer_id.as_str(), "adv_1");
    assert_eq!(outcome.matches[1].lawyer_id.as_str(), "adv_2");
}

#[tokio::test]
async fn test_diversity_boost_in_mixed_elite() {
    let setup = engine();
    let with_gender = |id: &str, gender: &str| {
        let mut lawyer = lawyer(id);
        lawyer.diversity = Some(DiversityMeta {
            gender: Some(gender.into()),
            ..DiversityMeta::default()
        });
        lawyer
    };
    let candidates = [
        with_gender("adv_1", "F"),
        with_gender("adv_2", "M"),
        with_gender("adv_3", "M"),
        with_gender("adv_4", "M"),
    ];

    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &candidates,
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.matches.len(), 4);
    for ranked in &outcome.matches {
        let expected = if ranked.lawyer_id.as_str() == "adv_1" {
            0.05
        } else {
            0.
        };
        assert_approx_eq!(f32, ranked.breakdown.diversity_boost, expected);
    }
    assert_eq!(outcome.matches[0].lawyer_id.as_str(), "adv_1");
}

#[tokio::test]
async fn test_high_complexity_shifts_weights() {
    let setup = engine();
    let candidates = [lawyer("adv_1")];

    let mut medium_case = case("case_1");
    medium_case.complexity = Complexity::Medium;
    let medium = setup
        .engine
        .rank(
            &medium_case,
            &candidates,
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let mut high_case = case("case_2");
    high_case.complexity = Complexity::High;
    let high = setup
        .engine
        .rank(
            &high_case,
            &candidates,
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let medium = &medium.matches[0].breakdown.weights_used;
    let high = &high.matches[0].breakdown.weights_used;
    assert!(high.q > medium.q);
    assert!(high.t > medium.t);
    assert!(high.u < medium.u);
    assert_approx_eq!(f32, high.sum(), 1., epsilon = 1e-6);
}

#[tokio::test]
async fn test_cache_staleness_is_isolated_to_dynamic_features() {
    let setup = engine();
    let candidate = lawyer("adv_1");

    let first = setup
        .engine
        .rank(
            &case("case_1"),
            &[candidate.clone()],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let first = &first.matches[0].breakdown.features;

    // KPI sync without cache invalidation: U reacts, R stays cached
    let mut mutated = candidate.clone();
    mutated.kpi.response_time_h = 24;
    mutated.kpi.avg_rating = 2.5;

    let stale = setup
        .engine
        .rank(
            &case("case_1"),
            &[mutated.clone()],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let stale_features = &stale.matches[0].breakdown.features;

    assert_approx_eq!(f32, stale_features.u, 1. - 24. / 48.);
    assert!(stale_features.u != first.u);
    assert_approx_eq!(f32, stale_features.r, first.r);
    assert_approx_eq!(f32, stale_features.t, first.t);
    assert_approx_eq!(f32, stale_features.g, first.g);
    assert_approx_eq!(f32, stale_features.q, first.q);

    setup.engine.invalidate_cache(&candidate.id).await.unwrap();

    let fresh = setup
        .engine
        .rank(
            &case("case_1"),
            &[mutated],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let fresh = &fresh.matches[0].breakdown.features;
    assert!(fresh.r != first.r);
    assert_approx_eq!(f32, fresh.r, 2.5 / 5. * (1. / 5.));
}

#[tokio::test]
async fn test_rank_is_deterministic_with_same_cache_state() {
    let setup = engine();
    let candidates = [lawyer("adv_3"), lawyer("adv_1"), lawyer("adv_2")];

    let first = setup
        .engine
        .rank(
            &case("case_1"),
            &candidates,
            5,
            "expert",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let second = setup
        .engine
        .rank(
            &case("case_1"),
            &candidates,
            5,
            "expert",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(first.matches.len(), second.matches.len());
    for (one, two) in first.matches.iter().zip(&second.matches) {
        assert_eq!(one.lawyer_id, two.lawyer_id);
        assert_eq!(one.breakdown, two.breakdown);
    }
}

#[tokio::test]
async fn test_unknown_preset_falls_back_to_balanced() {
    let setup = engine();
    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &[lawyer("adv_1")],
            5,
            "turbo",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.matches[0].breakdown.preset,
        jurimatch_scoring::Preset::Balanced,
    );
}

#[tokio::test]
async fn test_cancellation_leaves_no_durable_state() {
    let setup = engine();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = setup
        .engine
        .rank(&case("case_1"), &[lawyer("adv_1")], 5, "balanced", &cancel)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(setup.audit.records().is_empty());
    assert!(setup
        .storage
        .last_offered_at(&lawyer("adv_1").id)
        .await
        .is_none());
}

#[tokio::test]
async fn test_mismatched_embedding_dimension_is_invalid_input() {
    let setup = engine();
    let mut candidate = lawyer("adv_1");
    candidate.historical_embeddings = vec![[1., 0.].try_into().unwrap()];

    let result = setup
        .engine
        .rank(
            &case("case_1"),
            &[candidate],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(Error::InvalidInput(InvalidInput::EmbeddingDimension { .. })),
    ));
    assert!(setup.audit.records().is_empty());
}

#[tokio::test]
async fn test_audit_records_follow_result_order() {
    let setup = engine();
    let candidates = [lawyer("adv_2"), lawyer("adv_1"), lawyer("adv_3")];

    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &candidates,
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let recorded = setup
        .audit
        .records()
        .into_iter()
        .map(|record| match record {
            AuditRecord::Recommend(record) => record.lawyer_id,
            AuditRecord::Feedback(_) => panic!("no feedback expected"),
        })
        .collect::<Vec<_>>();
    let returned = outcome
        .matches
        .iter()
        .map(|ranked| ranked.lawyer_id.clone())
        .collect::<Vec<_>>();
    assert_eq!(recorded, returned);
}

#[tokio::test]
async fn test_outcome_exposes_lawyers_and_offers_for_notification() {
    let setup = engine();
    let outcome = setup
        .engine
        .rank(
            &case("case_1"),
            &[lawyer("adv_2"), lawyer("adv_1"), lawyer("adv_3")],
            5,
            "balanced",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // the notification service throttles per lawyer, keyed by these ids
    let lawyer_ids = outcome.lawyer_ids();
    assert_eq!(lawyer_ids.len(), outcome.offer_ids.len());
    assert_eq!(
        lawyer_ids.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        ["adv_1", "adv_2", "adv_3"],
    );
}

#[tokio::test]
async fn test_reload_weights_without_snapshot_keeps_default() {
    let setup = engine();
    assert_eq!(
        setup.engine.reload_weights(),
        jurimatch_scoring::WeightVector::default(),
    );
}
