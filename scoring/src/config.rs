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

use crate::rank::System;

/// Configurations of the matchmaking system.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[must_use]
pub struct Config {
    #[serde(default = "default_geo_radius_km")]
    geo_radius_km: f64,
    #[serde(default = "default_min_epsilon")]
    min_epsilon: f32,
    #[serde(default = "default_epsilon_factor")]
    epsilon_factor: f32,
    #[serde(default = "default_equity_share")]
    equity_share: f32,
    #[serde(default = "default_overload_floor")]
    overload_floor: f32,
    #[serde(default = "default_diversity_threshold")]
    diversity_threshold: f32,
    #[serde(default = "default_diversity_boost")]
    diversity_boost: f32,
}

fn default_geo_radius_km() -> f64 {
    50.
}

fn default_min_epsilon() -> f32 {
    0.05
}

fn default_epsilon_factor() -> f32 {
    0.10
}

fn default_equity_share() -> f32 {
    0.30
}

fn default_overload_floor() -> f32 {
    0.05
}

fn default_diversity_threshold() -> f32 {
    0.30
}

fn default_diversity_boost() -> f32 {
    0.05
}

// the float fields are never NaN by construction
impl Eq for Config {}

impl Default for Config {
    fn default() -> Self {
        Self {
            geo_radius_km: default_geo_radius_km(),
            min_epsilon: default_min_epsilon(),
            epsilon_factor: default_epsilon_factor(),
            equity_share: default_equity_share(),
            overload_floor: default_overload_floor(),
            diversity_threshold: default_diversity_threshold(),
            diversity_boost: default_diversity_boost(),
        }
    }
}

/// Errors of the matchmaking system configuration.
#[derive(Copy, Clone, Debug, Display, Error)]
pub enum Error {
    /// Invalid geo radius, expected positive value
    GeoRadius,
    /// Invalid epsilon cluster bound, expected non-negative value
    Epsilon,
    /// Invalid fairness share, expected value from the unit interval
    FairnessShare,
}

impl Config {
    /// The radius in km beyond which the geo feature bottoms out.
    pub fn geo_radius_km(&self) -> f64 {
        self.geo_radius_km
    }

    /// Sets the geo radius.
    ///
    /// # Errors
    /// Fails if the radius is not positive.
    pub fn with_geo_radius_km(mut self, geo_radius_km: f64) -> Result<Self, Error> {
        if geo_radius_km > 0. {
            self.geo_radius_km = geo_radius_km;
            Ok(self)
        } else {
            Err(Error::GeoRadius)
        }
    }

    /// The lower bound of the elite cluster width.
    pub fn min_epsilon(&self) -> f32 {
        self.min_epsilon
    }

    /// The share of the best raw score used as elite cluster width.
    pub fn epsilon_factor(&self) -> f32 {
        self.epsilon_factor
    }

    /// Sets the elite cluster bounds.
    ///
    /// # Errors
    /// Fails if either value is negative.
    pub fn with_epsilon(mut self, min_epsilon: f32, epsilon_factor: f32) -> Result<Self, Error> {
        if min_epsilon >= 0. && epsilon_factor >= 0. {
            self.min_epsilon = min_epsilon;
            self.epsilon_factor = epsilon_factor;
            Ok(self)
        } else {
            Err(Error::Epsilon)
        }
    }

    /// The share of the fair score taken from workload equity.
    pub fn equity_share(&self) -> f32 {
        self.equity_share
    }

    /// Sets the equity share.
    ///
    /// # Errors
    /// Fails if the share is outside of the unit interval.
    pub fn with_equity_share(mut self, equity_share: f32) -> Result<Self, Error> {
        if (0. ..=1.).contains(&equity_share) {
            self.equity_share = equity_share;
            Ok(self)
        } else {
            Err(Error::FairnessShare)
        }
    }

    /// The equity assigned to lawyers at or over capacity.
    pub fn overload_floor(&self) -> f32 {
        self.overload_floor
    }

    /// The representation share below which a group counts as under-represented.
    pub fn diversity_threshold(&self) -> f32 {
        self.diversity_threshold
    }

    /// The additive boost for under-represented groups.
    pub fn diversity_boost(&self) -> f32 {
        self.diversity_boost
    }

    /// Sets the diversity fairness parameters.
    ///
    /// # Errors
    /// Fails if the threshold is outside of the unit interval or the boost is
    /// negative.
    pub fn with_diversity(mut self, threshold: f32, boost: f32) -> Result<Self, Error> {
        if (0. ..=1.).contains(&threshold) && boost >= 0. {
            self.diversity_threshold = threshold;
            self.diversity_boost = boost;
            Ok(self)
        } else {
            Err(Error::FairnessShare)
        }
    }

    /// Creates a matchmaking system.
    pub fn build(self) -> System {
        System { config: self }
    }
}
