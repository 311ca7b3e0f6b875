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

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jurimatch_embedding::NormalizedEmbedding;

use crate::{geo::GeoPoint, id::LawyerId};

/// External verification status of a lawyer's success-rate figures.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "success_status")
)]
pub enum SuccessStatus {
    /// Verified by the third-party ingestion.
    V,
    /// Partially verified.
    P,
    /// Not verified.
    #[default]
    N,
}

impl SuccessStatus {
    /// The multiplier applied to the smoothed success rate.
    pub(crate) fn multiplier(self) -> f32 {
        match self {
            Self::V => 1.0,
            Self::P => 0.4,
            Self::N => 0.0,
        }
    }
}

/// Operational KPIs synced by external jobs.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Kpi {
    /// Overall success rate in `[0, 1]`.
    pub success_rate: f32,
    /// Cases taken in the last thirty days.
    pub cases_30d: u32,
    /// Monthly case capacity, always positive.
    pub monthly_capacity: u32,
    /// Average client rating in `[0, 5]`.
    pub avg_rating: f32,
    /// Typical first-response time in hours, always positive.
    pub response_time_h: u32,
    /// Externally scored CV quality in `[0, 1]`.
    pub cv_score: f32,
    pub success_status: SuccessStatus,
}

/// The level of a post-graduate degree.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DegreeLevel {
    Lato,
    Mestrado,
    Doutorado,
}

/// A post-graduate degree with the area it was taken in.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PostDegree {
    pub level: DegreeLevel,
    pub area: String,
}

/// Structured curriculum data.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Curriculum {
    pub years_experience: u32,
    #[serde(default)]
    pub post_degrees: Vec<PostDegree>,
    #[serde(default)]
    pub publication_count: u32,
}

/// Self-declared diversity attributes, present only with consent.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DiversityMeta {
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub pcd: Option<bool>,
    pub consent_ts: Option<DateTime<Utc>>,
}

/// A candidate lawyer.
///
/// Mutable only by external writers (KPI sync, profile edits); a single rank
/// call treats it as a read-only snapshot.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Lawyer {
    pub id: LawyerId,
    pub tags_expertise: BTreeSet<String>,
    pub geo_latlon: GeoPoint,
    pub curriculum: Curriculum,
    pub kpi: Kpi,
    /// Success rate per "area/subarea" key, overrides the overall rate.
    #[serde(default)]
    pub kpi_subarea: HashMap<String, f32>,
    #[serde(default)]
    pub kpi_softskill: f32,
    /// Outcomes aligned with `historical_embeddings`, or empty.
    #[serde(default)]
    pub case_outcomes: Vec<bool>,
    #[serde(default)]
    pub historical_embeddings: Vec<NormalizedEmbedding>,
    #[serde(default)]
    pub review_texts: Vec<String>,
    pub diversity: Option<DiversityMeta>,
    /// Updated by the offer manager after an offer was emitted.
    pub last_offered_at: DateTime<Utc>,
}

impl Lawyer {
    /// The diversity group used for representation counting.
    pub fn group_key(&self) -> &str {
        self.diversity
            .as_ref()
            .and_then(|diversity| diversity.gender.as_deref())
            .unwrap_or("UNK")
    }
}
