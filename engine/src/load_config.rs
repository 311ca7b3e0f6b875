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

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::de::DeserializeOwned;

/// Load the configuration into given type.
///
/// # Load order/priority
///
/// This will by ascending priority load:
///
/// 1. `./config.toml` or the specified toml config file
/// 2. `./.env`
/// 3. `./.env.local`
/// 4. process environment
///
/// Config values loaded from higher priority sources override such from lower
/// priority sources.
///
/// `.env` is included to avoid confusion with env variables missing when
/// calling cargo directly instead of indirectly through `just`.
///
/// `.env.local` is a semi-standard way to add temporary local overrides that
/// you don't want to commit.
///
/// # Env and .env
///
/// Environment variables from `.env` and `.env.local` will be loaded into the
/// process environment if they don't already exist there (keeping priority as
/// described above).
///
/// When creating the config type instance, only environment variables with
/// the `JURIMATCH__` prefix will be considered and the prefix is stripped.
///
/// Env variables are split at `__`. I.e. `JURIMATCH__CACHE__TTL=60` will be
/// treated like the json `{ "cache": { "ttl": 60 } }` wrt. deserializing the
/// config.
pub(crate) fn load_config<C>(config_file: Option<&Path>) -> Result<C, figment::Error>
where
    C: DeserializeOwned,
{
    // the order must be from highest to lowest priority
    // or else it won't work correctly
    load_dotenv(".env.local")?;
    load_dotenv(".env")?;

    let mut figment = Figment::new().join(Env::prefixed("JURIMATCH__").split("__"));

    let file = config_file.unwrap_or_else(|| Path::new("config.toml"));
    if file.exists() {
        figment = figment.join(Toml::file(file));
    }

    figment.extract().map_err(Into::into)
}

fn load_dotenv(file_name: &str) -> Result<(), figment::Error> {
    match dotenvy::from_filename(file_name) {
        Err(error) if !error.not_found() => {
            Err(figment::Error::from(error.to_string()).with_path(file_name))
        }
        _ => Ok(()),
    }
}
