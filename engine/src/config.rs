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

use serde::{Deserialize, Serialize};

use crate::{audit, cache, load_config::load_config, logging, offers, storage, weights};

/// The engine configuration tree.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
#[cfg_attr(test, serde(deny_unknown_fields))]
pub struct Config {
    pub logging: logging::Config,
    pub scoring: jurimatch_scoring::Config,
    pub weights: weights::Config,
    pub cache: cache::Config,
    pub storage: storage::Config,
    pub offers: offers::Config,
    pub audit: audit::Config,
}

impl Config {
    /// Loads the configuration from `config.toml`, dotenv files and the
    /// process environment.
    pub fn load() -> Result<Self, figment::Error> {
        load_config(None)
    }

    /// Loads the configuration from the given toml file instead.
    pub fn load_from(config_file: &std::path::Path) -> Result<Self, figment::Error> {
        load_config(Some(config_file))
    }
}
