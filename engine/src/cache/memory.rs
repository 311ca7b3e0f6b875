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

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use jurimatch_scoring::{LawyerId, StaticFeatures};

use crate::{cache::StaticFeatureCache, error::CacheError};

/// An in-process TTL cache, used in tests and as single-node fallback.
#[derive(Debug)]
pub struct Cache {
    ttl: Duration,
    entries: RwLock<HashMap<LawyerId, (StaticFeatures, Instant)>>,
}

impl Cache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StaticFeatureCache for Cache {
    async fn get(&self, id: &LawyerId) -> Result<Option<StaticFeatures>, CacheError> {
        let features = self
            .entries
            .read()
            .await
            .get(id)
            .filter(|(_, written)| written.elapsed() < self.ttl)
            .map(|(features, _)| *features);

        Ok(features)
    }

    async fn put(&self, id: &LawyerId, features: StaticFeatures) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(id.clone(), (features, Instant::now()));

        Ok(())
    }

    async fn invalidate(&self, id: &LawyerId) -> Result<(), CacheError> {
        self.entries.write().await.remove(id);

        Ok(())
    }
}
