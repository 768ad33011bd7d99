//! The fixed grid of bookable half-hour markers.
//!
//! Slots run from 9:30 AM to 10:00 PM and are exchanged with the backend as `section1` to
//! `section26`.

use core::fmt::{self, Display};
use core::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const SLOT_COUNT: u8 = 26;
const FIRST_SLOT_MINUTES: u32 = 9 * 60 + 30;
const SLOT_LENGTH_MINUTES: u32 = 30;
const SECTION_PREFIX: &str = "section";

/// One of the 26 fixed slots, stored as its 1-based section number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot(u8);

impl TimeSlot {
    #[must_use]
    pub const fn from_section(section: u8) -> Option<Self> {
        if section >= 1 && section <= SLOT_COUNT {
            Some(Self(section))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn section(self) -> u8 {
        self.0
    }

    /// Every slot in grid order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=SLOT_COUNT).map(Self)
    }

    #[must_use]
    pub fn section_id(self) -> String {
        format!("{SECTION_PREFIX}{}", self.0)
    }

    /// Parses `sectionN`. Only the canonical spelling is accepted.
    #[must_use]
    pub fn from_section_id(input: &str) -> Option<Self> {
        let digits = input.strip_prefix(SECTION_PREFIX)?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|byte| byte.is_ascii_digit())
        {
            return None;
        }
        Self::from_section(digits.parse().ok()?)
    }

    #[must_use]
    pub fn start(self) -> NaiveTime {
        let minutes = FIRST_SLOT_MINUTES + u32::from(self.0 - 1) * SLOT_LENGTH_MINUTES;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or_default()
    }

    /// 12-hour clock label such as `9:30 AM` or `12:00 PM`.
    #[must_use]
    pub fn label(self) -> String {
        self.start().format("%-I:%M %p").to_string()
    }

    #[must_use]
    pub fn from_label(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::all().find(|slot| slot.label().eq_ignore_ascii_case(input))
    }
}

impl Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("{0:?} is neither a time slot label like \"9:30 AM\" nor a section like \"section1\"")]
pub struct UnknownTimeSlot(pub String);

impl FromStr for TimeSlot {
    type Err = UnknownTimeSlot;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::from_section_id(input.trim())
            .or_else(|| Self::from_label(input))
            .ok_or_else(|| UnknownTimeSlot(input.to_owned()))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.section_id())
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        Self::from_section_id(&input)
            .ok_or_else(|| serde::de::Error::custom(UnknownTimeSlot(input)))
    }
}
