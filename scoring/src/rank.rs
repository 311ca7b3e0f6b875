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

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    case::{Case, Complexity},
    config::Config,
    features::{FeatureCalculator, FeatureVector, StaticFeatures},
    id::LawyerId,
    lawyer::{Kpi, Lawyer},
    weights::{Preset, WeightVector},
};

/// The matchmaking system.
pub struct System {
    pub(crate) config: Config,
}

/// The full score breakdown of one ranked lawyer.
///
/// Exposed for audit records and human explanations; sufficient to
/// reconstruct a learning-to-rank training example.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MatchBreakdown {
    pub features: FeatureVector,
    pub delta: FeatureVector,
    pub raw: f32,
    pub equity: f32,
    pub diversity_boost: f32,
    pub fair: f32,
    pub weights_used: WeightVector,
    pub preset: Preset,
    pub complexity: Complexity,
}

/// One entry of a ranking result.
///
/// Carries the lawyer id and the attached breakdown instead of mutating the
/// input lawyer.
#[derive(Clone, Debug, Serialize)]
pub struct RankedMatch {
    pub lawyer_id: LawyerId,
    pub breakdown: MatchBreakdown,
}

impl System {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Computes the full feature vector of one (case, lawyer) pair.
    pub fn features(&self, case: &Case, lawyer: &Lawyer) -> FeatureVector {
        FeatureCalculator::new(case, lawyer, &self.config).all()
    }

    /// Computes only the case-dependent features, merging cached static ones.
    pub fn dynamic_features(
        &self,
        case: &Case,
        lawyer: &Lawyer,
        cached: StaticFeatures,
    ) -> FeatureVector {
        FeatureCalculator::new(case, lawyer, &self.config).dynamic(cached)
    }

    /// The workload equity of a lawyer, in `[overload_floor, 1]`.
    pub fn equity(&self, kpi: &Kpi) -> f32 {
        if kpi.monthly_capacity > kpi.cases_30d {
            #[allow(clippy::cast_precision_loss)]
            let utilization = kpi.cases_30d as f32 / kpi.monthly_capacity as f32;
            1. - utilization
        } else {
            self.config.overload_floor()
        }
    }

    /// Ranks scored candidates into the final fair order.
    ///
    /// Applies the epsilon cluster over raw scores, blends in workload equity
    /// and the diversity boost, and sorts by descending fair score with
    /// `last_offered_at` and the lawyer id as deterministic tiebreakers.
    /// Returns at most `top_n` (lawyer id, breakdown) pairs.
    #[instrument(skip_all, fields(candidates = candidates.len(), top_n))]
    pub fn rank(
        &self,
        candidates: &[(&Lawyer, FeatureVector)],
        weights: &WeightVector,
        preset: Preset,
        complexity: Complexity,
        top_n: usize,
    ) -> Vec<RankedMatch> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let scored = candidates
            .iter()
            .map(|(lawyer, features)| {
                let delta = features.delta(weights);
                let raw = delta.sum();
                (*lawyer, *features, delta, raw)
            })
            .collect_vec();

        let best = scored
            .iter()
            .map(|(_, _, _, raw)| *raw)
            .fold(f32::MIN, f32::max);
        let epsilon = self
            .config
            .min_epsilon()
            .max(self.config.epsilon_factor() * best);
        let elite = scored
            .into_iter()
            .filter(|(_, _, _, raw)| *raw >= best - epsilon)
            .collect_vec();
        if elite.is_empty() {
            return Vec::new();
        }

        #[allow(clippy::cast_precision_loss)]
        let elite_size = elite.len() as f32;
        let mut groups = HashMap::<&str, usize>::new();
        for (lawyer, ..) in &elite {
            *groups.entry(lawyer.group_key()).or_default() += 1;
        }
        let representation = groups
            .into_iter()
            .map(|(group, count)| {
                #[allow(clippy::cast_precision_loss)]
                let share = count as f32 / elite_size;
                (group, share)
            })
            .collect::<HashMap<_, _>>();

        let mut elite = elite
            .into_iter()
            .map(|(lawyer, features, delta, raw)| {
                let equity = self.equity(&lawyer.kpi);
                let diversity_boost = self.diversity_boost(lawyer, &representation);
                let beta = self.config.equity_share();
                let fair = (1. - beta) * raw + beta * equity + diversity_boost;
                (
                    lawyer,
                    MatchBreakdown {
                        features,
                        delta,
                        raw,
                        equity,
                        diversity_boost,
                        fair,
                        weights_used: *weights,
                        preset,
                        complexity,
                    },
                )
            })
            .collect_vec();

        elite.sort_unstable_by(|(l1, b1), (l2, b2)| {
            b2.fair
                .total_cmp(&b1.fair)
                .then_with(|| l1.last_offered_at.cmp(&l2.last_offered_at))
                .then_with(|| l1.id.cmp(&l2.id))
        });

        elite
            .into_iter()
            .take(top_n)
            .map(|(lawyer, breakdown)| RankedMatch {
                lawyer_id: lawyer.id.clone(),
                breakdown,
            })
            .collect()
    }

    fn diversity_boost(&self, lawyer: &Lawyer, representation: &HashMap<&str, f32>) -> f32 {
        let share = representation
            .get(lawyer.group_key())
            .copied()
            .unwrap_or(1.);
        if share < self.config.diversity_threshold() {
            self.config.diversity_boost()
        } else {
            0.
        }
    }
}
