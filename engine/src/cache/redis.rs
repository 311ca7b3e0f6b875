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

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use jurimatch_scoring::{LawyerId, StaticFeatures};

use crate::{
    cache::{Config, StaticFeatureCache},
    error::{CacheError, SetupError},
};

/// The Redis-backed production cache, entries expire server-side.
pub struct Cache {
    connection: ConnectionManager,
    ttl_seconds: u64,
    key_prefix: String,
}

impl Cache {
    pub async fn connect(url: &str, config: &Config) -> Result<Self, SetupError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            connection,
            ttl_seconds: config.ttl.as_secs(),
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn key(&self, id: &LawyerId) -> String {
        format!("{}:{id}", self.key_prefix)
    }
}

#[async_trait]
impl StaticFeatureCache for Cache {
    async fn get(&self, id: &LawyerId) -> Result<Option<StaticFeatures>, CacheError> {
        let raw = self
            .connection
            .clone()
            .get::<_, Option<String>>(self.key(id))
            .await?;

        raw.as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(Into::into)
    }

    async fn put(&self, id: &LawyerId, features: StaticFeatures) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&features)?;
        self.connection
            .clone()
            .set_ex::<_, _, ()>(self.key(id), raw, self.ttl_seconds)
            .await
            .map_err(Into::into)
    }

    async fn invalidate(&self, id: &LawyerId) -> Result<(), CacheError> {
        self.connection
            .clone()
            .del::<_, ()>(self.key(id))
            .await
            .map_err(Into::into)
    }
}
