use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event targeted when nothing else is configured
pub const DEFAULT_EVENT_ID: i64 = 1;

/// Which booking implementation the run is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Row-locking implementation
    #[default]
    Safe,
    /// Check-then-act implementation without locking
    Unsafe,
}

impl Mode {
    /// Path of the booking route for this mode
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Safe => "/book/safe",
            Self::Unsafe => "/book/unsafe",
        }
    }

    /// Only the exact value `unsafe` selects the unsafe endpoint.
    pub fn from_env_value(value: &str) -> Self {
        if value == "unsafe" {
            Self::Unsafe
        } else {
            Self::Safe
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Safe => "safe",
            Self::Unsafe => "unsafe",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Mode {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_env_value(s))
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ModeVisitor;

        // Environment values arrive loosely typed; anything that is not the
        // string "unsafe" falls back to the safe endpoint.
        impl<'de> Visitor<'de> for ModeVisitor {
            type Value = Mode;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an endpoint mode")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Mode, E> {
                Ok(Mode::from_env_value(v))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_none<E: de::Error>(self) -> Result<Mode, E> {
                Ok(Mode::Safe)
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Mode, D::Error> {
                Mode::deserialize(deserializer)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Mode, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(Mode::Safe)
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Mode, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(Mode::Safe)
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}

/// Body of a booking POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub event_id: i64,
    pub user_id: String,
}

impl BookingRequest {
    /// Payload sent by virtual user `vu` on iteration `iteration`
    pub fn for_iteration(event_id: i64, vu: u32, iteration: u32) -> Self {
        Self {
            event_id,
            user_id: user_id_for(vu, iteration),
        }
    }
}

/// Unique user id for a (virtual user, iteration) pair
pub fn user_id_for(vu: u32, iteration: u32) -> String {
    format!("user-{vu}-{iteration}")
}

/// Event as returned by `GET /events/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub total_tickets: i64,
}
