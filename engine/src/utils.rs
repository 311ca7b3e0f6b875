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

pub(crate) const SECONDS_PER_HOUR: u64 = 60 * 60;

/// Serde of a duration as full hours (rounds down).
pub(crate) mod serde_duration_as_hours {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::utils::SECONDS_PER_HOUR;

    pub(crate) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_secs() / SECONDS_PER_HOUR).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(|hours| Duration::from_secs(SECONDS_PER_HOUR * hours))
    }
}

/// Serde of a duration as seconds.
pub(crate) mod serde_duration_as_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(crate) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, time::Duration};

    use serde::{Deserialize, Serialize};
    use serde_json::{from_str, to_string};

    use super::*;

    #[derive(Deserialize, Serialize)]
    struct Hours(#[serde(with = "serde_duration_as_hours")] Duration);

    #[test]
    fn test_hours_roundtrip() -> Result<(), Box<dyn Error>> {
        let serialized = to_string(&Hours(Duration::from_secs(SECONDS_PER_HOUR * 24)))?;
        assert_eq!(serialized, "24");
        let deserialized = from_str::<Hours>(&serialized)?.0;
        assert_eq!(deserialized, Duration::from_secs(SECONDS_PER_HOUR * 24));
        Ok(())
    }

    #[test]
    fn test_partial_hours_round_down() -> Result<(), Box<dyn Error>> {
        let serialized = to_string(&Hours(Duration::from_secs(SECONDS_PER_HOUR + 1)))?;
        assert_eq!(serialized, "1");
        Ok(())
    }
}
