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

//! The static feature cache.
//!
//! Memoizes the case-independent feature subset {T, G, Q, R} per lawyer with
//! a bounded TTL. Writers of lawyer state (KPI sync, profile updates, review
//! submission) invalidate the lawyer's entry. An unreachable cache degrades
//! ranking to full recomputation, it never fails it.

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use jurimatch_scoring::{LawyerId, StaticFeatures};

use crate::{
    error::{CacheError, SetupError},
    utils::serde_duration_as_seconds,
};

/// The capability set of the static feature cache.
#[async_trait]
pub trait StaticFeatureCache: Send + Sync {
    /// Reads the cached features, a miss is not an error.
    async fn get(&self, id: &LawyerId) -> Result<Option<StaticFeatures>, CacheError>;

    /// Writes the features with the configured TTL, overwrite permitted.
    async fn put(&self, id: &LawyerId, features: StaticFeatures) -> Result<(), CacheError>;

    /// Drops the entry, idempotent.
    async fn invalidate(&self, id: &LawyerId) -> Result<(), CacheError>;
}

#[async_trait]
impl<T> StaticFeatureCache for std::sync::Arc<T>
where
    T: StaticFeatureCache + ?Sized,
{
    async fn get(&self, id: &LawyerId) -> Result<Option<StaticFeatures>, CacheError> {
        (**self).get(id).await
    }

    async fn put(&self, id: &LawyerId, features: StaticFeatures) -> Result<(), CacheError> {
        (**self).put(id, features).await
    }

    async fn invalidate(&self, id: &LawyerId) -> Result<(), CacheError> {
        (**self).invalidate(id).await
    }
}

/// Configurations of the static feature cache.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Redis connection url, an in-process cache is used if unset.
    pub url: Option<String>,
    /// Time to live of one entry.
    #[serde(with = "serde_duration_as_seconds")]
    pub ttl: Duration,
    /// Namespace prefix of the cache keys.
    pub key_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            ttl: Duration::from_secs(60 * 60 * 24),
            key_prefix: "match:cache".into(),
        }
    }
}

impl Config {
    pub(crate) async fn setup(&self) -> Result<Box<dyn StaticFeatureCache>, SetupError> {
        Ok(match &self.url {
            Some(url) => Box::new(redis::Cache::connect(url, self).await?),
            None => Box::new(memory::Cache::new(self.ttl)),
        })
    }
}
