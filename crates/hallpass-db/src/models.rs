use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where an allocation sits in its lifecycle.
///
/// Not stored: derived from whether `hall_id`/`seat_number` are set. The
/// schema guarantees the two columns are either both null or both present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    /// Registered against the schedule, no seat yet.
    AwaitingSeat,
    /// Hall and seat assigned.
    Seated,
}

impl fmt::Display for AllocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingSeat => "awaiting_seat",
            Self::Seated => "seated",
        };
        f.write_str(s)
    }
}

impl FromStr for AllocationState {
    type Err = AllocationStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_seat" => Ok(Self::AwaitingSeat),
            "seated" => Ok(Self::Seated),
            other => Err(AllocationStateParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`AllocationState`] string.
#[derive(Debug, Clone)]
pub struct AllocationStateParseError(pub String);

impl fmt::Display for AllocationStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid allocation state: {:?}", self.0)
    }
}

impl std::error::Error for AllocationStateParseError {}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row in the `students` table. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: String,
    pub roll_no: String,
    pub name: String,
    pub student_class: String,
    pub created_at: DateTime<Utc>,
}

/// A row in the `subjects` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub subject_id: i32,
    pub subject_code: String,
    pub subject_name: String,
}

/// A row in the `exam_halls` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExamHall {
    pub hall_id: i32,
    pub hall_name: String,
    pub capacity: i32,
}

/// A row in the `examinations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Examination {
    pub exam_id: i32,
    pub exam_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A row in the `exam_schedule` table: one sitting of one subject within an
/// examination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExamSchedule {
    pub schedule_id: i32,
    pub exam_id: i32,
    pub subject_id: i32,
    pub exam_date: NaiveDate,
    pub start_time: NaiveTime,
}

/// A row in the `student_allocations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Allocation {
    pub allocation_id: i32,
    pub student_id: String,
    pub schedule_id: i32,
    pub hall_id: Option<i32>,
    pub seat_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    pub fn state(&self) -> AllocationState {
        if self.hall_id.is_some() && self.seat_number.is_some() {
            AllocationState::Seated
        } else {
            AllocationState::AwaitingSeat
        }
    }

    /// The `(hall_id, seat_number)` pair when seated.
    pub fn seat(&self) -> Option<(i32, &str)> {
        match (self.hall_id, self.seat_number.as_deref()) {
            (Some(hall), Some(seat)) => Some((hall, seat)),
            _ => None,
        }
    }
}
