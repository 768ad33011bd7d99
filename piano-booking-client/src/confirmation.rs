//! Turning a complete selection into a booking request.

use piano_booking_http::Transport;
use rand::{thread_rng, Rng as _};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::BookingApi;
use crate::error::{ClientError, ConfirmError};
use crate::model::{BookingDate, District, LessonType, PianoRoom, RecordId, Studio};
use crate::role::UserRole;
use crate::selection::ResolvedSelection;
use crate::session::Session;
use crate::time_slot::TimeSlot;

/// Body of the candidate room lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomQuery {
    pub section: TimeSlot,
    pub district: District,
    pub date: BookingDate,
    #[serde(rename = "type")]
    pub lesson_type: LessonType,
}

impl From<&ResolvedSelection> for RoomQuery {
    fn from(selection: &ResolvedSelection) -> Self {
        Self {
            section: selection.time,
            district: selection.district.clone(),
            date: selection.date,
            lesson_type: selection.lesson_type,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Requested,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    pub studio_id: RecordId,
    pub room_id: RecordId,
    pub date: BookingDate,
    pub time_slot_section: TimeSlot,
    /// The lesson type as free text.
    pub section_description: LessonType,
    pub status: BookingStatus,
    pub remark: String,
    pub student_id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub updates: Vec<BookingUpdate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmPhase {
    LoadingRooms,
    Ready,
    Submitting,
    Confirmed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedBooking {
    /// Where the front end continues, e.g. `/student/booking-confirmed`.
    pub route: String,
    pub booking: BookingUpdate,
}

#[must_use]
pub fn confirmation_route(role: UserRole) -> String {
    format!("{}/booking-confirmed", role.route_prefix())
}

const IDEMPOTENCY_KEY_LENGTH: usize = 30;

fn idempotency_key() -> String {
    thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(IDEMPOTENCY_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// One confirmation page.
///
/// All submission attempts of the page share one idempotency key, so the backend can collapse a
/// retry that races a slow earlier attempt.
#[derive(Debug)]
pub struct BookingConfirmation {
    selection: ResolvedSelection,
    remark: String,
    rooms: Vec<PianoRoom>,
    room: Option<usize>,
    studio: Option<usize>,
    phase: ConfirmPhase,
    failure: Option<String>,
    idempotency_key: String,
}

impl BookingConfirmation {
    pub fn new(selection: ResolvedSelection, remark: impl Into<String>) -> Self {
        Self {
            selection,
            remark: remark.into(),
            rooms: Vec::new(),
            room: None,
            studio: None,
            phase: ConfirmPhase::LoadingRooms,
            failure: None,
            idempotency_key: idempotency_key(),
        }
    }

    #[must_use]
    pub const fn selection(&self) -> &ResolvedSelection {
        &self.selection
    }

    #[must_use]
    pub const fn phase(&self) -> ConfirmPhase {
        self.phase
    }

    #[must_use]
    pub fn rooms(&self) -> &[PianoRoom] {
        &self.rooms
    }

    /// Message of the last failed attempt, cleared by the next one.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    #[must_use]
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    #[must_use]
    pub fn room_query(&self) -> RoomQuery {
        RoomQuery::from(&self.selection)
    }

    #[must_use]
    pub fn selected_room(&self) -> Option<&PianoRoom> {
        self.rooms.get(self.room?)
    }

    #[must_use]
    pub fn selected_studio(&self) -> Option<&Studio> {
        self.selected_room()?.studios.get(self.studio?)
    }

    /// Replaces the candidates and pre-selects the first room and its first studio.
    ///
    /// Refused once a submission has started, so a reload cannot reopen the page.
    pub fn set_rooms(&mut self, rooms: Vec<PianoRoom>) -> Result<(), ConfirmError> {
        self.ensure_not_submitted()?;
        self.room = if rooms.is_empty() { None } else { Some(0) };
        self.studio = rooms
            .first()
            .filter(|room| !room.studios.is_empty())
            .map(|_| 0);
        self.rooms = rooms;
        self.phase = ConfirmPhase::Ready;
        Ok(())
    }

    /// Fetches the candidate rooms for the selected slot.
    ///
    /// A failed lookup leaves the page without candidates; calling this again retries.
    #[instrument(skip_all)]
    pub async fn load_rooms<T: Transport>(
        &mut self,
        api: &BookingApi<T>,
        session: &Session,
    ) -> Result<&[PianoRoom], ConfirmError> {
        self.ensure_not_submitted()?;
        self.phase = ConfirmPhase::LoadingRooms;
        let query = self.room_query();
        let result = match session.bearer_token() {
            Ok(token) => api.rooms(token, &query).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(rooms) => {
                self.failure = None;
                self.set_rooms(rooms)?;
                Ok(&self.rooms)
            }
            Err(error) => {
                warn!("loading rooms failed: {error}");
                let message = error.user_message();
                self.failure = Some(message.clone());
                self.set_rooms(Vec::new())?;
                Err(ConfirmError::RoomLookupFailed(message))
            }
        }
    }

    fn ensure_not_submitted(&self) -> Result<(), ConfirmError> {
        match self.phase {
            ConfirmPhase::Submitting => Err(ConfirmError::SubmissionInFlight),
            ConfirmPhase::Confirmed => Err(ConfirmError::AlreadyConfirmed),
            ConfirmPhase::LoadingRooms | ConfirmPhase::Ready => Ok(()),
        }
    }

    fn ensure_editable(&self) -> Result<(), ConfirmError> {
        match self.phase {
            ConfirmPhase::LoadingRooms => Err(ConfirmError::RoomsLoading),
            ConfirmPhase::Submitting => Err(ConfirmError::SubmissionInFlight),
            ConfirmPhase::Confirmed => Err(ConfirmError::AlreadyConfirmed),
            ConfirmPhase::Ready => Ok(()),
        }
    }

    /// Switches to another candidate room and to its first studio.
    pub fn select_room(&mut self, id: &RecordId) -> Result<&PianoRoom, ConfirmError> {
        self.ensure_editable()?;
        let index = self
            .rooms
            .iter()
            .position(|room| &room.id == id)
            .ok_or_else(|| ConfirmError::UnknownRoom(id.clone()))?;
        let room = &self.rooms[index];
        self.room = Some(index);
        self.studio = if room.studios.is_empty() { None } else { Some(0) };
        Ok(room)
    }

    pub fn select_studio(&mut self, id: &RecordId) -> Result<&Studio, ConfirmError> {
        self.ensure_editable()?;
        let room = self.room.ok_or(ConfirmError::NoRoomAvailable)?;
        let studios = &self.rooms[room].studios;
        let index = studios
            .iter()
            .position(|studio| &studio.id == id)
            .ok_or_else(|| ConfirmError::UnknownStudio(id.clone()))?;
        self.studio = Some(index);
        Ok(&studios[index])
    }

    #[must_use]
    pub fn can_confirm(&self) -> bool {
        self.phase == ConfirmPhase::Ready && self.selected_studio().is_some()
    }

    /// Moves to [`ConfirmPhase::Submitting`] and builds the request, or explains why not.
    pub fn begin_submission(&mut self) -> Result<BookingRequest, ConfirmError> {
        self.ensure_editable()?;
        let room = self.selected_room().ok_or(ConfirmError::NoRoomAvailable)?;
        let studio = self.selected_studio().ok_or(ConfirmError::NoRoomAvailable)?;
        let update = BookingUpdate {
            studio_id: studio.id.clone(),
            room_id: room.id.clone(),
            date: self.selection.date,
            time_slot_section: self.selection.time,
            section_description: self.selection.lesson_type,
            status: BookingStatus::Requested,
            remark: self.remark.clone(),
            student_id: self.selection.student.id.clone(),
        };
        self.phase = ConfirmPhase::Submitting;
        self.failure = None;
        Ok(BookingRequest {
            updates: vec![update],
        })
    }

    /// Records the outcome of the attempt started by [`Self::begin_submission`].
    ///
    /// A failure returns the page to [`ConfirmPhase::Ready`] so the user can retry.
    pub fn finish_submission(
        &mut self,
        role: UserRole,
        request: BookingRequest,
        outcome: Result<(), ClientError>,
    ) -> Result<ConfirmedBooking, ConfirmError> {
        match self.phase {
            ConfirmPhase::Submitting => {}
            ConfirmPhase::Confirmed => return Err(ConfirmError::AlreadyConfirmed),
            ConfirmPhase::LoadingRooms | ConfirmPhase::Ready => {
                return Err(ConfirmError::NothingSubmitted);
            }
        }
        match outcome {
            Ok(()) => {
                self.phase = ConfirmPhase::Confirmed;
                let route = confirmation_route(role);
                info!(%route, "booking requested");
                let booking = request
                    .updates
                    .into_iter()
                    .next()
                    .ok_or(ConfirmError::NoRoomAvailable)?;
                Ok(ConfirmedBooking { route, booking })
            }
            Err(error) => {
                warn!("booking failed: {error}");
                let message = error.user_message();
                self.phase = ConfirmPhase::Ready;
                self.failure = Some(message.clone());
                Err(ConfirmError::Rejected(message))
            }
        }
    }

    #[instrument(skip_all, fields(idempotency_key = %self.idempotency_key))]
    pub async fn confirm<T: Transport>(
        &mut self,
        api: &BookingApi<T>,
        session: &Session,
    ) -> Result<ConfirmedBooking, ConfirmError> {
        let request = self.begin_submission()?;
        let outcome = match session.bearer_token() {
            Ok(token) => {
                api.make_booking(token, &self.idempotency_key, &request)
                    .await
            }
            Err(error) => Err(error),
        };
        self.finish_submission(session.role(), request, outcome)
    }
}
