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

//! The pure matchmaking core.
//!
//! Computes the eight fit features between a case and a lawyer, resolves the
//! active weight vector and turns raw weighted scores into a fair, fully
//! deterministic ranking. No I/O happens in this crate; caching, persistence
//! and audit live in the engine crate on top of it.

mod case;
mod config;
mod features;
mod geo;
mod id;
mod lawyer;
mod rank;
mod weights;

pub use crate::{
    case::{Case, Complexity, InvalidCase},
    config::{Config, Error as ConfigError},
    features::{FeatureVector, StaticFeatures},
    geo::{haversine_km, GeoPoint},
    id::{CaseId, ClientId, LawyerId},
    lawyer::{Curriculum, DegreeLevel, DiversityMeta, Kpi, Lawyer, PostDegree, SuccessStatus},
    rank::{MatchBreakdown, RankedMatch, System},
    weights::{Preset, WeightVector},
};
