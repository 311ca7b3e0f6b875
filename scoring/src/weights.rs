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

use crate::case::Complexity;

/// A weight per fit feature.
///
/// Resolved vectors are normalized: all components non-negative and summing
/// to one. Persisted learning-to-rank snapshots use the same shape but are
/// only normalized during resolution.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeightVector {
    #[serde(rename = "A")]
    pub a: f32,
    #[serde(rename = "S")]
    pub s: f32,
    #[serde(rename = "T")]
    pub t: f32,
    #[serde(rename = "G")]
    pub g: f32,
    #[serde(rename = "Q")]
    pub q: f32,
    #[serde(rename = "U")]
    pub u: f32,
    #[serde(rename = "R")]
    pub r: f32,
    #[serde(rename = "C")]
    pub c: f32,
}

/// The built-in default, also the "balanced" preset.
pub(crate) const DEFAULT_WEIGHTS: WeightVector = WeightVector {
    a: 0.30,
    s: 0.25,
    t: 0.15,
    g: 0.10,
    q: 0.10,
    u: 0.05,
    r: 0.05,
    c: 0.03,
};

impl Default for WeightVector {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

impl WeightVector {
    pub fn sum(&self) -> f32 {
        self.a + self.s + self.t + self.g + self.q + self.u + self.r + self.c
    }

    /// A snapshot is usable if all components are finite and non-negative
    /// and at least one is positive.
    pub fn is_valid_snapshot(&self) -> bool {
        let components = [
            self.a, self.s, self.t, self.g, self.q, self.u, self.r, self.c,
        ];
        components.iter().all(|w| w.is_finite() && *w >= 0.)
            && components.iter().any(|w| *w > 0.)
    }

    fn clamp_non_negative(mut self) -> Self {
        self.a = self.a.max(0.);
        self.s = self.s.max(0.);
        self.t = self.t.max(0.);
        self.g = self.g.max(0.);
        self.q = self.q.max(0.);
        self.u = self.u.max(0.);
        self.r = self.r.max(0.);
        self.c = self.c.max(0.);
        self
    }

    fn scale(mut self, factor: f32) -> Self {
        self.a *= factor;
        self.s *= factor;
        self.t *= factor;
        self.g *= factor;
        self.q *= factor;
        self.u *= factor;
        self.r *= factor;
        self.c *= factor;
        self
    }

    /// Resolves the effective weights for a rank call.
    ///
    /// Starts from `self` (the active snapshot or the default), overlays the
    /// preset and applies the complexity deltas, then clamps each component to
    /// zero and normalizes the sum to one. A degenerate zero sum falls back to
    /// the normalized default.
    pub fn resolve(&self, preset: Preset, complexity: Complexity) -> Self {
        // Presets define every component, so the overlay replaces the snapshot
        // wholesale. The snapshot remains the base swapped by reloads and the
        // merge target for any future partial preset.
        let mut weights = preset.weights();

        match complexity {
            Complexity::High => {
                weights.q += 0.05;
                weights.t += 0.05;
                weights.u -= 0.05;
                weights.c += 0.02;
            }
            Complexity::Medium => {}
            Complexity::Low => {
                weights.u += 0.05;
                weights.g += 0.03;
                weights.q -= 0.05;
                weights.t -= 0.03;
            }
        }

        let weights = weights.clamp_non_negative();
        let sum = weights.sum();
        if sum > 0. {
            weights.scale(1. / sum)
        } else {
            DEFAULT_WEIGHTS.scale(1. / DEFAULT_WEIGHTS.sum())
        }
    }
}

/// A named starting weight vector.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Fast,
    Expert,
    #[default]
    Balanced,
}

impl Preset {
    /// Parses a preset name, unknown names fall back to the default.
    pub fn from_name(name: &str) -> Self {
        match name {
            "fast" => Self::Fast,
            "expert" => Self::Expert,
            _ => Self::Balanced,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Expert => "expert",
            Self::Balanced => "balanced",
        }
    }

    pub(crate) fn weights(self) -> WeightVector {
        match self {
            Self::Fast => WeightVector {
                a: 0.40,
                s: 0.15,
                t: 0.20,
                g: 0.15,
                q: 0.05,
                u: 0.03,
                r: 0.02,
                c: 0.00,
            },
            Self::Expert => WeightVector {
                a: 0.25,
                s: 0.30,
                t: 0.15,
                g: 0.05,
                q: 0.15,
                u: 0.05,
                r: 0.03,
                c: 0.02,
            },
            Self::Balanced => DEFAULT_WEIGHTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use jurimatch_test_utils::assert_approx_eq;

    use super::*;

    #[test]
    fn test_resolved_weights_are_normalized() {
        for preset in [Preset::Fast, Preset::Expert, Preset::Balanced] {
            for complexity in [Complexity::Low, Complexity::Medium, Complexity::High] {
                let weights = WeightVector::default().resolve(preset, complexity);
                assert!(
                    (weights.sum() - 1.).abs() < 1e-6,
                    "{preset:?}/{complexity:?} sums to {}",
                    weights.sum(),
                );
                assert!(weights.is_valid_snapshot());
            }
        }
    }

    #[test]
    fn test_high_complexity_shifts_towards_expertise() {
        let base = WeightVector::default();
        let medium = base.resolve(Preset::Balanced, Complexity::Medium);
        let high = base.resolve(Preset::Balanced, Complexity::High);

        assert!(high.q > medium.q);
        assert!(high.t > medium.t);
        assert!(high.u < medium.u);
        assert_approx_eq!(f32, high.sum(), 1., epsilon = 1e-6);
    }

    #[test]
    fn test_low_complexity_shifts_towards_availability() {
        let base = WeightVector::default();
        let medium = base.resolve(Preset::Balanced, Complexity::Medium);
        let low = base.resolve(Preset::Balanced, Complexity::Low);

        assert!(low.u > medium.u);
        assert!(low.g > medium.g);
        assert!(low.q < medium.q);
        assert!(low.t < medium.t);
    }

    #[test]
    fn test_negative_components_are_clamped() {
        // fast preset has U = 0.03, the HIGH delta pushes it below zero
        let weights = WeightVector::default().resolve(Preset::Fast, Complexity::High);
        assert!(weights.u >= 0.);
        assert_approx_eq!(f32, weights.sum(), 1., epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_preset_name_falls_back() {
        assert_eq!(Preset::from_name("fast"), Preset::Fast);
        assert_eq!(Preset::from_name("expert"), Preset::Expert);
        assert_eq!(Preset::from_name("balanced"), Preset::Balanced);
        assert_eq!(Preset::from_name("unheard-of"), Preset::Balanced);
    }

    #[test]
    fn test_snapshot_validity() {
        assert!(WeightVector::default().is_valid_snapshot());

        let zeros = WeightVector {
            a: 0.,
            s: 0.,
            t: 0.,
            g: 0.,
            q: 0.,
            u: 0.,
            r: 0.,
            c: 0.,
        };
        assert!(!zeros.is_valid_snapshot());

        let negative = WeightVector { a: -0.1, ..zeros };
        assert!(!negative.is_valid_snapshot());

        let nan = WeightVector {
            a: f32::NAN,
            ..zeros
        };
        assert!(!nan.is_valid_snapshot());
    }

    #[test]
    fn test_serde_uses_feature_letters() {
        let json = serde_json::to_value(WeightVector::default()).unwrap();
        assert_eq!(json["A"], serde_json::json!(0.30_f32));
        assert_eq!(json["C"], serde_json::json!(0.03_f32));
    }
}
