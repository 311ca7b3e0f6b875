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
use thiserror::Error;

use jurimatch_scoring::{InvalidCase, LawyerId};

use crate::offers::{OfferId, OfferState};

/// An error while setting the engine up.
pub type SetupError = anyhow::Error;

/// Errors surfaced to callers of the engine.
///
/// Feature, weight and cache problems are recovered internally and never show
/// up here; authorization and persistence problems always do.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// Invalid input: {0}
    InvalidInput(#[from] InvalidInput),
    /// Offer {id} is not pending (state: {state:?})
    OfferNotPending { id: OfferId, state: OfferState },
    /// Offer {0} does not exist
    OfferNotFound(OfferId),
    /// The actor is not authorized for this operation
    Forbidden,
    /// The rank call was cancelled before its results were persisted
    Cancelled,
    /// The static feature cache is unavailable: {0}
    CacheUnavailable(#[from] CacheError),
    /// Persisting state failed: {0}
    Persistence(#[from] PersistenceError),
}

/// Errors of malformed rank inputs, surfaced without side effects.
#[derive(Debug, Display, Error)]
pub enum InvalidInput {
    /// {0}
    Case(#[from] InvalidCase),
    /// Historical embedding of lawyer {lawyer_id} has dimension {got}, expected {expected}
    EmbeddingDimension {
        lawyer_id: LawyerId,
        got: usize,
        expected: usize,
    },
}

/// A durable store write or read failed.
#[derive(Debug, Display, Error)]
/// {0}
pub struct PersistenceError(#[source] pub(crate) anyhow::Error);

macro_rules! impl_from_std_error {
    ($wrapper:ident: $($error:ty,)*) => {$(
        impl From<$error> for $wrapper {
            fn from(error: $error) -> Self {
                Self(anyhow::Error::new(error))
            }
        }
    )*};
}

impl_from_std_error!(
    PersistenceError:
    sqlx::Error,
    std::io::Error,
    serde_json::Error,
);

/// The cache read, write or invalidation failed.
///
/// Recovered on the rank path by degrading to a miss or no-op.
#[derive(Debug, Display, Error)]
#[ignore_extra_doc_attributes]
/// {0}
pub struct CacheError(#[source] pub(crate) anyhow::Error);

impl_from_std_error!(
    CacheError:
    redis::RedisError,
    serde_json::Error,
);

/// The weight snapshot could not be loaded.
///
/// Recovered by keeping the previously active vector.
#[derive(Debug, Display, Error)]
pub enum WeightLoadError {
    /// Reading the snapshot artifact failed: {0}
    Io(#[from] std::io::Error),
    /// The snapshot artifact is malformed: {0}
    Malformed(#[from] serde_json::Error),
    /// The snapshot has no positive components
    Degenerate,
    /// No snapshot location is configured
    Unconfigured,
}
