use piano_booking_http::{HttpError, StatusCode};

use crate::model::{LessonType, RecordId};
use crate::role::UserRole;
use crate::selection::Field;
use crate::time_slot::TimeSlot;

/// Shown whenever the backend gives us nothing better to say.
pub const GENERIC_FAILURE_MESSAGE: &str = "發生錯誤，請稍後再試";
/// Shown when saving a change failed.
pub const UPDATE_FAILURE_MESSAGE: &str = "更新失敗，請重試";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Parse(#[from] serde_path_to_error::Error<serde_json::Error>),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("not signed in as {0}")]
    NotAuthenticated(UserRole),
    #[error("backend answered {status}{}", .message.as_ref().map(|message| format!(": {message}")).unwrap_or_default())]
    Api {
        status: StatusCode,
        message: Option<String>,
    },
}

impl ClientError {
    /// What the user gets to read. Only messages the backend wrote for humans pass through.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_owned(),
        }
    }
}

fn field_labels(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join("、")
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("請先選擇：{}", field_labels(.0))]
    MissingPrerequisites(Vec<Field>),
    #[error("{lesson_type} is not offered to {student}")]
    TypeNotOffered {
        lesson_type: LessonType,
        student: String,
    },
    #[error("{0} is not available")]
    SlotUnavailable(TimeSlot),
    #[error("no student with id {0} in this account")]
    UnknownStudent(RecordId),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfirmError {
    #[error("rooms are still loading")]
    RoomsLoading,
    #[error("the booking is already being submitted")]
    SubmissionInFlight,
    #[error("the booking was already confirmed")]
    AlreadyConfirmed,
    #[error("no room is available for this time slot")]
    NoRoomAvailable,
    #[error("room {0} is not among the candidates")]
    UnknownRoom(RecordId),
    #[error("studio {0} does not belong to the selected room")]
    UnknownStudio(RecordId),
    #[error("no booking submission is in flight")]
    NothingSubmitted,
    #[error("{0}")]
    RoomLookupFailed(String),
    #[error("{0}")]
    Rejected(String),
}
