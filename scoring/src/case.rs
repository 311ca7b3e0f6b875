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

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jurimatch_embedding::NormalizedEmbedding;

use crate::{geo::GeoPoint, id::{CaseId, ClientId}};

/// The triaged complexity of a case.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "case_complexity", rename_all = "UPPERCASE")
)]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

/// A triaged legal case.
///
/// Immutable for the duration of a ranking. The summary embedding is produced
/// by the external triage pipeline and L2-normalized on ingest.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Case {
    pub id: CaseId,
    pub client_id: ClientId,
    pub area: String,
    pub subarea: String,
    /// Hours until the case needs a response, `0` means no urgency signal.
    pub urgency_h: u32,
    pub coords: GeoPoint,
    pub complexity: Complexity,
    pub summary_embedding: NormalizedEmbedding,
}

/// Errors of an invalid case input.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum InvalidCase {
    /// Empty case summary embedding
    EmptyEmbedding,
    /// Empty case area
    EmptyArea,
}

impl Case {
    /// Checks the parts of a case the type system can't enforce.
    pub fn validate(&self) -> Result<(), InvalidCase> {
        if self.summary_embedding.is_empty() {
            return Err(InvalidCase::EmptyEmbedding);
        }
        if self.area.trim().is_empty() {
            return Err(InvalidCase::EmptyArea);
        }

        Ok(())
    }

    /// The granularity key used for subarea success rates.
    pub fn subarea_key(&self) -> String {
        format!("{}/{}", self.area, self.subarea)
    }
}
