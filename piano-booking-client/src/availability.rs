//! Which of the fixed time slots can still be booked for a (type, district, date) triple.

use std::collections::BTreeSet;

use piano_booking_http::Transport;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::BookingApi;
use crate::model::{BookingDate, District, LessonType};
use crate::session::Session;
use crate::time_slot::TimeSlot;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
    pub district: District,
    pub date: BookingDate,
}

const fn date_available_by_default() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    #[serde(default = "date_available_by_default")]
    pub is_date_available: bool,
    #[serde(default)]
    pub un_available_slots: Vec<String>,
}

impl AvailabilityResponse {
    /// Maps the blocked `sectionN` identifiers back onto the slot table.
    #[must_use]
    pub fn into_availability(self) -> SlotAvailability {
        if !self.is_date_available {
            return SlotAvailability::DateUnavailable;
        }
        let blocked = self
            .un_available_slots
            .iter()
            .filter_map(|section| {
                let slot = TimeSlot::from_section_id(section);
                if slot.is_none() {
                    warn!("ignoring unknown section {section:?} in availability response");
                }
                slot
            })
            .collect();
        SlotAvailability::Blocked(blocked)
    }
}

/// Availability of the time grid.
///
/// Every state except [`SlotAvailability::Blocked`] disables the whole grid, so nothing can be
/// picked until the backend has explicitly answered for the current selection. An empty blocked
/// set is a fully available day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SlotAvailability {
    /// No answer yet for the current combination, or the combination is incomplete.
    #[default]
    NotQueried,
    /// The query failed in transport or could not be parsed.
    Failed,
    /// `isDateAvailable: false`
    DateUnavailable,
    Blocked(BTreeSet<TimeSlot>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotView {
    pub slot: TimeSlot,
    pub enabled: bool,
}

impl SlotAvailability {
    #[must_use]
    pub fn is_enabled(&self, slot: TimeSlot) -> bool {
        match self {
            Self::Blocked(blocked) => !blocked.contains(&slot),
            Self::NotQueried | Self::Failed | Self::DateUnavailable => false,
        }
    }

    /// All 26 slots in order with their enablement.
    #[must_use]
    pub fn grid(&self) -> Vec<SlotView> {
        TimeSlot::all()
            .map(|slot| SlotView {
                slot,
                enabled: self.is_enabled(slot),
            })
            .collect()
    }

    pub fn enabled_slots(&self) -> impl Iterator<Item = TimeSlot> + '_ {
        TimeSlot::all().filter(|slot| self.is_enabled(*slot))
    }
}

/// Asks the backend for the blocked sections of `query`.
///
/// Failures never reach the caller; they degrade to [`SlotAvailability::Failed`].
pub async fn fetch_availability<T: Transport>(
    api: &BookingApi<T>,
    session: &Session,
    query: &AvailabilityQuery,
) -> SlotAvailability {
    let result = match session.bearer_token() {
        Ok(token) => api.availability_slots(token, query).await,
        Err(error) => Err(error),
    };
    match result {
        Ok(response) => {
            let availability = response.into_availability();
            debug!(?availability, "availability resolved");
            availability
        }
        Err(error) => {
            warn!("availability query failed: {error}");
            SlotAvailability::Failed
        }
    }
}
