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

//! The matchmaking engine around the pure scoring core.
//!
//! Owns the static feature cache, the offer lifecycle, the audit log, the
//! active weight snapshot and the durable storage behind all of them. The
//! HTTP surface, authentication, triage and notification delivery are
//! external collaborators of this crate.

pub mod audit;
pub mod cache;
mod config;
mod error;
mod load_config;
pub mod logging;
mod ltr;
mod matchmaking;
pub mod offers;
pub mod storage;
mod utils;
mod weights;

pub use crate::{
    config::Config,
    error::{CacheError, Error, InvalidInput, PersistenceError, SetupError, WeightLoadError},
    ltr::{export_dataset, ExportError},
    matchmaking::{Engine, RankOutcome},
    weights::Config as WeightsConfig,
};
