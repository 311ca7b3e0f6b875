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

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    case::Case,
    config::Config,
    geo::haversine_km,
    lawyer::{DegreeLevel, Lawyer},
    weights::WeightVector,
};

/// The eight fit features between a case and a lawyer, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FeatureVector {
    /// Area match.
    #[serde(rename = "A")]
    pub a: f32,
    /// Historical case similarity.
    #[serde(rename = "S")]
    pub s: f32,
    /// Verified success rate.
    #[serde(rename = "T")]
    pub t: f32,
    /// Geographic proximity.
    #[serde(rename = "G")]
    pub g: f32,
    /// Qualification.
    #[serde(rename = "Q")]
    pub q: f32,
    /// Urgency capacity.
    #[serde(rename = "U")]
    pub u: f32,
    /// Trust-weighted review score.
    #[serde(rename = "R")]
    pub r: f32,
    /// Soft skills.
    #[serde(rename = "C")]
    pub c: f32,
}

impl FeatureVector {
    /// The per-feature contributions under the given weights.
    pub fn delta(&self, weights: &WeightVector) -> Self {
        Self {
            a: self.a * weights.a,
            s: self.s * weights.s,
            t: self.t * weights.t,
            g: self.g * weights.g,
            q: self.q * weights.q,
            u: self.u * weights.u,
            r: self.r * weights.r,
            c: self.c * weights.c,
        }
    }

    pub fn sum(&self) -> f32 {
        self.a + self.s + self.t + self.g + self.q + self.u + self.r + self.c
    }

    /// The case-independent subset worth caching.
    pub fn static_subset(&self) -> StaticFeatures {
        StaticFeatures {
            t: self.t,
            g: self.g,
            q: self.q,
            r: self.r,
        }
    }
}

/// The cached, case-independent features of a lawyer.
///
/// T is cached even though it depends on the case area, a deliberate
/// staleness trade-off covered by the Bayesian smoothing and the low area
/// churn per lawyer.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct StaticFeatures {
    #[serde(rename = "T")]
    pub t: f32,
    #[serde(rename = "G")]
    pub g: f32,
    #[serde(rename = "Q")]
    pub q: f32,
    #[serde(rename = "R")]
    pub r: f32,
}

/// Derives the features of one (case, lawyer) pair.
///
/// All functions are pure and deterministic, there are no time-dependent or
/// random terms.
pub(crate) struct FeatureCalculator<'a> {
    case: &'a Case,
    lawyer: &'a Lawyer,
    config: &'a Config,
}

impl<'a> FeatureCalculator<'a> {
    pub(crate) fn new(case: &'a Case, lawyer: &'a Lawyer, config: &'a Config) -> Self {
        Self {
            case,
            lawyer,
            config,
        }
    }

    /// A: 1 if the case area is among the lawyer's expertise tags.
    fn area_match(&self) -> f32 {
        if self.lawyer.tags_expertise.contains(&self.case.area) {
            1.
        } else {
            0.
        }
    }

    /// S: outcome-weighted mean cosine similarity to historical cases.
    ///
    /// Wins weigh 1.0, losses 0.8; without aligned outcomes the plain mean is
    /// used, without history the feature is zero.
    fn case_similarity(&self) -> f32 {
        if self.lawyer.historical_embeddings.is_empty() {
            return 0.;
        }

        let similarities = self
            .lawyer
            .historical_embeddings
            .iter()
            .map(|embedding| self.case.summary_embedding.dot_product(embedding));

        let outcomes = &self.lawyer.case_outcomes;
        let similarity = if !outcomes.is_empty()
            && outcomes.len() == self.lawyer.historical_embeddings.len()
        {
            let mut weighted = 0.;
            let mut total = 0.;
            for (similarity, won) in similarities.zip(outcomes) {
                let weight = if *won { 1.0 } else { 0.8 };
                weighted += similarity * weight;
                total += weight;
            }
            weighted / total
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = self.lawyer.historical_embeddings.len() as f32;
            similarities.sum::<f32>() / count
        };

        similarity.clamp(0., 1.)
    }

    /// T: Bayesian-smoothed success rate scaled by the verification status.
    ///
    /// Uses the granular area/subarea rate when present, otherwise the overall
    /// one, with Laplace smoothing (alpha = beta = 1) over the last thirty
    /// days of cases.
    fn success_rate(&self) -> f32 {
        let kpi = &self.lawyer.kpi;
        #[allow(clippy::cast_precision_loss)]
        let total = kpi.cases_30d.max(1) as f32;
        let rate = self
            .lawyer
            .kpi_subarea
            .get(&self.case.subarea_key())
            .copied()
            .unwrap_or(kpi.success_rate);
        let wins = (rate * total).round();
        let base = (wins + 1.) / (total + 2.);

        (base * kpi.success_status.multiplier()).clamp(0., 1.)
    }

    /// G: linear decay of the haversine distance over the configured radius.
    fn geo_score(&self) -> f32 {
        let distance = haversine_km(self.case.coords, self.lawyer.geo_latlon);
        #[allow(clippy::cast_possible_truncation)]
        let score = (1. - distance / self.config.geo_radius_km()) as f32;

        score.clamp(0., 1.)
    }

    /// Q: blended experience, matching-area titles, publications and CV score.
    fn qualification(&self) -> f32 {
        let curriculum = &self.lawyer.curriculum;
        #[allow(clippy::cast_precision_loss)]
        let experience = (curriculum.years_experience as f32 / 25.).min(1.);

        let area = self.case.area.to_lowercase();
        let (mut lato, mut mestrado, mut doutorado) = (0_u32, 0, 0);
        for degree in &curriculum.post_degrees {
            if degree.area.to_lowercase().contains(&area) {
                match degree.level {
                    DegreeLevel::Lato => lato += 1,
                    DegreeLevel::Mestrado => mestrado += 1,
                    DegreeLevel::Doutorado => doutorado += 1,
                }
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let titles = 0.1 * lato.min(2) as f32 / 2.
            + 0.2 * mestrado.min(2) as f32 / 2.
            + 0.3 * doutorado.min(2) as f32 / 2.;

        #[allow(clippy::cast_precision_loss)]
        let publications =
            ((curriculum.publication_count as f32).ln_1p() / 10_f32.ln_1p()).min(1.);

        let base = 0.4 * experience + 0.4 * titles + 0.2 * publications;

        0.8 * base + 0.2 * self.lawyer.kpi.cv_score
    }

    /// U: capacity to respond within the case urgency window.
    fn urgency_capacity(&self) -> f32 {
        if self.case.urgency_h == 0 {
            return 0.;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.lawyer.kpi.response_time_h as f32 / self.case.urgency_h as f32;

        (1. - ratio).clamp(0., 1.)
    }

    /// R: average rating scaled by a review trust factor.
    ///
    /// Only reviews of at least twenty characters with a type-token ratio
    /// above 0.2 count towards trust, five trusted reviews reach full trust.
    fn review_score(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let trusted = self
            .lawyer
            .review_texts
            .iter()
            .filter(|text| is_trusted_review(text))
            .count() as f32;
        let trust = (trusted / 5.).min(1.);

        (self.lawyer.kpi.avg_rating / 5. * trust).clamp(0., 1.)
    }

    /// C: externally scored soft skills.
    fn soft_skill(&self) -> f32 {
        self.lawyer.kpi_softskill.clamp(0., 1.)
    }

    /// Computes the full feature vector.
    pub(crate) fn all(&self) -> FeatureVector {
        FeatureVector {
            a: self.area_match(),
            s: self.case_similarity(),
            t: self.success_rate(),
            g: self.geo_score(),
            q: self.qualification(),
            u: self.urgency_capacity(),
            r: self.review_score(),
            c: self.soft_skill(),
        }
    }

    /// Computes only the case-dependent features, merging in cached ones.
    pub(crate) fn dynamic(&self, cached: StaticFeatures) -> FeatureVector {
        FeatureVector {
            a: self.area_match(),
            s: self.case_similarity(),
            t: cached.t,
            g: cached.g,
            q: cached.q,
            u: self.urgency_capacity(),
            r: cached.r,
            c: self.soft_skill(),
        }
    }
}

fn is_trusted_review(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < 20 {
        return false;
    }

    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return false;
    }
    let unique = words.iter().copied().collect::<BTreeSet<_>>();
    #[allow(clippy::cast_precision_loss)]
    let ratio = unique.len() as f32 / words.len() as f32;

    ratio > 0.2
}
