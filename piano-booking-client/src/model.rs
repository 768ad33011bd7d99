use core::fmt::{self, Display};
use core::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a backend record. The backend uses both numeric and string ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => Display::fmt(number, f),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl FromStr for RecordId {
    type Err = core::convert::Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(input
            .parse()
            .map_or_else(|_| Self::Text(input.to_owned()), Self::Number))
    }
}

fn grade_from_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Grade {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Grade>::deserialize(deserializer)?.map(|grade| match grade {
        Grade::Text(text) => text,
        Grade::Number(number) => number.to_string(),
    }))
}

/// A student of the signed in account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default, deserialize_with = "grade_from_string_or_number")]
    pub grade: Option<String>,
}

impl StudentRef {
    /// Students without a grade have not been assessed yet.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.grade
            .as_deref()
            .is_some_and(|grade| !grade.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, alias = "_id")]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub students: Vec<StudentRef>,
}

impl Profile {
    #[must_use]
    pub fn student(&self, id: &RecordId) -> Option<&StudentRef> {
        self.students.iter().find(|student| &student.id == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LessonType {
    #[serde(rename = "上課")]
    Lesson,
    #[serde(rename = "練琴")]
    Practice,
    #[serde(rename = "評估")]
    Assessment,
}

impl LessonType {
    const GRADED: &'static [Self] = &[Self::Lesson, Self::Practice];
    const UNGRADED: &'static [Self] = &[Self::Assessment];

    /// Lesson types a student may book.
    #[must_use]
    pub fn options_for(student: &StudentRef) -> &'static [Self] {
        if student.is_graded() {
            Self::GRADED
        } else {
            Self::UNGRADED
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lesson => "上課",
            Self::Practice => "練琴",
            Self::Assessment => "評估",
        }
    }
}

impl Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown lesson type {0:?}, expected 上課, 練琴 or 評估")]
pub struct UnknownLessonType(pub String);

impl FromStr for LessonType {
    type Err = UnknownLessonType;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "上課" | "lesson" => Ok(Self::Lesson),
            "練琴" | "practice" => Ok(Self::Practice),
            "評估" | "assessment" => Ok(Self::Assessment),
            other => Err(UnknownLessonType(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct District(String);

impl District {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for District {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("district must not be empty")]
pub struct EmptyDistrict;

impl FromStr for District {
    type Err = EmptyDistrict;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            Err(EmptyDistrict)
        } else {
            Ok(Self(input.to_owned()))
        }
    }
}

impl From<District> for String {
    fn from(value: District) -> Self {
        value.0
    }
}

impl TryFrom<String> for District {
    type Error = EmptyDistrict;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A calendar date as experienced in UTC+8, where all the studios are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BookingDate(NaiveDate);

impl BookingDate {
    const WIRE_FORMAT: &'static str = "%Y-%m-%d";
    const UTC_OFFSET_HOURS: i64 = 8;

    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The UTC+8 calendar date of an instant picked in any time zone.
    #[must_use]
    pub fn from_picked<Tz: TimeZone>(picked: &DateTime<Tz>) -> Self {
        let shifted = picked.with_timezone(&Utc) + Duration::hours(Self::UTC_OFFSET_HOURS);
        Self(shifted.date_naive())
    }

    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// `YYYY-MM-DD`
    #[must_use]
    pub fn wire(self) -> String {
        self.0.format(Self::WIRE_FORMAT).to_string()
    }
}

impl Display for BookingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

impl FromStr for BookingDate {
    type Err = chrono::ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(input.trim(), Self::WIRE_FORMAT).map(Self)
    }
}

impl From<BookingDate> for String {
    fn from(value: BookingDate) -> Self {
        value.wire()
    }
}

impl TryFrom<String> for BookingDate {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Studio {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PianoRoom {
    #[serde(alias = "_id")]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub studios: Vec<Studio>,
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn student(grade: Option<&str>) -> StudentRef {
        StudentRef {
            id: RecordId::Number(1),
            name: "小明".to_owned(),
            grade: grade.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn graded_students_get_lessons_and_practice() {
        assert_eq!(
            LessonType::options_for(&student(Some("5"))),
            [LessonType::Lesson, LessonType::Practice]
        );
        let labels: Vec<&str> = LessonType::options_for(&student(Some("5")))
            .iter()
            .map(|lesson_type| lesson_type.label())
            .collect();
        assert_eq!(labels, ["上課", "練琴"]);
    }

    #[test]
    fn ungraded_students_get_assessment_only() {
        assert_eq!(LessonType::options_for(&student(None)), [LessonType::Assessment]);
        assert_eq!(LessonType::options_for(&student(Some("  "))), [LessonType::Assessment]);
    }

    #[test]
    fn student_grade_may_be_numeric() {
        let parsed: StudentRef =
            serde_json::from_str(r#"{"_id":"s-1","name":"小明","grade":5}"#).unwrap();
        assert_eq!(parsed.id, RecordId::Text("s-1".to_owned()));
        assert_eq!(parsed.grade.as_deref(), Some("5"));

        let parsed: StudentRef = serde_json::from_str(r#"{"id":7,"name":"小華"}"#).unwrap();
        assert_eq!(parsed.id, RecordId::Number(7));
        assert!(!parsed.is_graded());

        let parsed: StudentRef =
            serde_json::from_str(r#"{"id":8,"name":"小美","grade":null}"#).unwrap();
        assert_eq!(parsed.grade, None);
    }

    #[test]
    fn lesson_types_travel_as_chinese_text() {
        assert_eq!(serde_json::to_string(&LessonType::Practice).unwrap(), r#""練琴""#);
        assert_eq!("評估".parse::<LessonType>(), Ok(LessonType::Assessment));
        assert_eq!("lesson".parse::<LessonType>(), Ok(LessonType::Lesson));
    }

    #[test]
    fn picked_date_is_the_utc_plus_eight_calendar_date() {
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let hong_kong = FixedOffset::east_opt(8 * 3600).unwrap();

        // 20:00 on the 4th in New York is already 09:00 on the 5th in Hong Kong.
        let picked = new_york.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        assert_eq!(BookingDate::from_picked(&picked).wire(), "2024-03-05");

        // Midnight on the 5th in Tokyo is still 23:00 on the 4th in Hong Kong.
        let picked = tokyo.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(BookingDate::from_picked(&picked).wire(), "2024-03-04");

        for hour in 0..24 {
            let picked = hong_kong.with_ymd_and_hms(2024, 12, 31, hour, 59, 59).unwrap();
            assert_eq!(BookingDate::from_picked(&picked).wire(), "2024-12-31");
        }

        let picked = Utc.with_ymd_and_hms(2024, 12, 31, 16, 0, 0).unwrap();
        assert_eq!(BookingDate::from_picked(&picked).wire(), "2025-01-01");
    }

    #[test]
    fn booking_dates_round_trip_through_text() {
        let date: BookingDate = "2024-02-29".parse().unwrap();
        assert_eq!(serde_json::to_string(&date).unwrap(), r#""2024-02-29""#);
        assert!("2023-02-29".parse::<BookingDate>().is_err());
        assert!(serde_json::from_str::<BookingDate>(r#""29/02/2024""#).is_err());
    }

    #[test]
    fn rooms_accept_mongo_style_ids() {
        let room: PianoRoom = serde_json::from_str(
            r#"{"_id":"r1","name":"Room A","district":"沙田","studios":[{"_id":"s9","name":"Studio 9"}]}"#,
        )
        .unwrap();
        assert_eq!(room.id, RecordId::Text("r1".to_owned()));
        assert_eq!(room.studios[0].id, RecordId::Text("s9".to_owned()));
        assert_eq!(room.address, "");
    }

    #[test]
    fn districts_are_trimmed_and_never_empty() {
        let district: District = serde_json::from_str(r#"" 沙田 ""#).unwrap();
        assert_eq!(district.as_str(), "沙田");
        assert_eq!(serde_json::to_string(&district).unwrap(), r#""沙田""#);
        assert!(serde_json::from_str::<District>(r#""""#).is_err());
        assert!(serde_json::from_str::<District>(r#""   ""#).is_err());
        assert_eq!("  ".parse::<District>(), Err(EmptyDistrict));
    }

    #[test]
    fn record_ids_parse_numbers_first() {
        assert_eq!("42".parse::<RecordId>(), Ok(RecordId::Number(42)));
        assert_eq!("abc".parse::<RecordId>(), Ok(RecordId::Text("abc".to_owned())));
        assert_eq!(RecordId::Number(42).to_string(), "42");
    }
}
