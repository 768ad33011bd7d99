//! The search form: student → type → district → date → time.
//!
//! Each change of an upstream field invalidates the time and issues a new
//! [`AvailabilityTicket`]. Only the answer to the newest ticket is ever applied, so a slow answer
//! for an old combination cannot overwrite the grid of the current one.

use piano_booking_http::Transport;
use tracing::{debug, instrument};

use crate::api::BookingApi;
use crate::availability::{fetch_availability, AvailabilityQuery, SlotAvailability, SlotView};
use crate::error::SelectionError;
use crate::model::{BookingDate, District, LessonType, StudentRef};
use crate::session::Session;
use crate::time_slot::TimeSlot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Student,
    Type,
    District,
    Date,
    Time,
}

impl Field {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Student => "學生",
            Self::Type => "課堂類型",
            Self::District => "地區",
            Self::Date => "日期",
            Self::Time => "時間",
        }
    }

    /// Fields that have to be filled before this one can be used, in form order.
    #[must_use]
    pub const fn prerequisites(self) -> &'static [Self] {
        match self {
            Self::Student | Self::District | Self::Date => &[],
            Self::Type => &[Self::Student],
            Self::Time => &[Self::Student, Self::Type, Self::District, Self::Date],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingSelection {
    pub student: Option<StudentRef>,
    pub lesson_type: Option<LessonType>,
    pub district: Option<District>,
    pub date: Option<BookingDate>,
    pub time: Option<TimeSlot>,
}

/// A selection with every field filled, ready for the confirmation step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub student: StudentRef,
    pub lesson_type: LessonType,
    pub district: District,
    pub date: BookingDate,
    pub time: TimeSlot,
}

impl BookingSelection {
    #[must_use]
    pub const fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Student => self.student.is_some(),
            Field::Type => self.lesson_type.is_some(),
            Field::District => self.district.is_some(),
            Field::Date => self.date.is_some(),
            Field::Time => self.time.is_some(),
        }
    }

    /// Unset prerequisites of `field`, in form order.
    #[must_use]
    pub fn missing_for(&self, field: Field) -> Vec<Field> {
        field
            .prerequisites()
            .iter()
            .copied()
            .filter(|prerequisite| !self.is_set(*prerequisite))
            .collect()
    }

    #[must_use]
    pub fn is_enabled(&self, field: Field) -> bool {
        self.missing_for(field).is_empty()
    }

    #[must_use]
    pub fn can_open_time(&self) -> bool {
        self.is_enabled(Field::Time)
    }

    /// `None` while type, district or date is missing.
    #[must_use]
    pub fn availability_query(&self) -> Option<AvailabilityQuery> {
        self.student.as_ref()?;
        Some(AvailabilityQuery {
            lesson_type: self.lesson_type?,
            district: self.district.clone()?,
            date: self.date?,
        })
    }

    pub fn resolve(&self) -> Result<ResolvedSelection, SelectionError> {
        match (
            &self.student,
            self.lesson_type,
            &self.district,
            self.date,
            self.time,
        ) {
            (Some(student), Some(lesson_type), Some(district), Some(date), Some(time)) => {
                Ok(ResolvedSelection {
                    student: student.clone(),
                    lesson_type,
                    district: district.clone(),
                    date,
                    time,
                })
            }
            _ => Err(SelectionError::MissingPrerequisites(
                [Field::Student, Field::Type, Field::District, Field::Date, Field::Time]
                    .into_iter()
                    .filter(|field| !self.is_set(*field))
                    .collect(),
            )),
        }
    }
}

/// Handle for one availability lookup. Resolve it and hand the result back to
/// [`FieldDependencyController::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct AvailabilityTicket {
    pub sequence: u64,
    /// `None` when the selection is incomplete and no request needs to be made.
    pub query: Option<AvailabilityQuery>,
}

impl AvailabilityTicket {
    pub async fn resolve<T: Transport>(
        &self,
        api: &BookingApi<T>,
        session: &Session,
    ) -> SlotAvailability {
        match &self.query {
            Some(query) => fetch_availability(api, session, query).await,
            None => SlotAvailability::NotQueried,
        }
    }
}

#[derive(Debug, Default)]
pub struct FieldDependencyController {
    selection: BookingSelection,
    availability: SlotAvailability,
    issued: u64,
}

impl FieldDependencyController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn selection(&self) -> &BookingSelection {
        &self.selection
    }

    #[must_use]
    pub const fn availability(&self) -> &SlotAvailability {
        &self.availability
    }

    /// Lesson types on offer for the selected student, empty while no student is selected.
    #[must_use]
    pub fn type_options(&self) -> &'static [LessonType] {
        match &self.selection.student {
            Some(student) => LessonType::options_for(student),
            None => &[],
        }
    }

    /// Clears the time and the grid, then hands out the ticket for the new combination.
    fn requery(&mut self) -> AvailabilityTicket {
        self.selection.time = None;
        self.availability = SlotAvailability::NotQueried;
        self.issued += 1;
        let ticket = AvailabilityTicket {
            sequence: self.issued,
            query: self.selection.availability_query(),
        };
        debug!(sequence = ticket.sequence, query = ?ticket.query, "availability requested");
        ticket
    }

    /// Always clears the lesson type, even when the same student is picked again.
    pub fn select_student(&mut self, student: StudentRef) -> AvailabilityTicket {
        self.selection.student = Some(student);
        self.selection.lesson_type = None;
        self.requery()
    }

    pub fn select_type(
        &mut self,
        lesson_type: LessonType,
    ) -> Result<AvailabilityTicket, SelectionError> {
        let Some(student) = &self.selection.student else {
            return Err(SelectionError::MissingPrerequisites(
                self.selection.missing_for(Field::Type),
            ));
        };
        if !LessonType::options_for(student).contains(&lesson_type) {
            return Err(SelectionError::TypeNotOffered {
                lesson_type,
                student: student.name.clone(),
            });
        }
        self.selection.lesson_type = Some(lesson_type);
        Ok(self.requery())
    }

    pub fn select_district(&mut self, district: District) -> AvailabilityTicket {
        self.selection.district = Some(district);
        self.requery()
    }

    pub fn select_date(&mut self, date: BookingDate) -> AvailabilityTicket {
        self.selection.date = Some(date);
        self.requery()
    }

    /// The slot grid, or the labels of what still has to be picked first.
    pub fn open_time(&self) -> Result<Vec<SlotView>, SelectionError> {
        let missing = self.selection.missing_for(Field::Time);
        if !missing.is_empty() {
            return Err(SelectionError::MissingPrerequisites(missing));
        }
        Ok(self.availability.grid())
    }

    pub fn select_time(&mut self, slot: TimeSlot) -> Result<(), SelectionError> {
        self.open_time()?;
        if !self.availability.is_enabled(slot) {
            return Err(SelectionError::SlotUnavailable(slot));
        }
        self.selection.time = Some(slot);
        Ok(())
    }

    /// Stores `availability` if `ticket` is still the newest one. Returns whether it was applied.
    pub fn apply(&mut self, ticket: &AvailabilityTicket, availability: SlotAvailability) -> bool {
        if ticket.sequence != self.issued {
            debug!(
                sequence = ticket.sequence,
                newest = self.issued,
                "discarding stale availability"
            );
            return false;
        }
        self.availability = availability;
        true
    }

    /// Resolves `ticket` and applies the answer.
    #[instrument(skip_all, fields(sequence = ticket.sequence))]
    pub async fn refresh<T: Transport>(
        &mut self,
        api: &BookingApi<T>,
        session: &Session,
        ticket: AvailabilityTicket,
    ) -> bool {
        let availability = ticket.resolve(api, session).await;
        self.apply(&ticket, availability)
    }
}
