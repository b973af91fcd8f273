//! Failure taxonomy for allocation operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::proposer::ProposalError;

/// Everything an allocation operation can fail with.
///
/// Store and transport failures collapse into [`AllocationError::Internal`];
/// the remaining variants are conditions the caller can act on.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("plan item {index} is malformed: {reason} (item: {item})")]
    MalformedPlanItem {
        index: usize,
        reason: String,
        item: String,
    },

    #[error(
        "plan items {first_index} and {index} both target seat {seat:?} in hall {hall_id}"
    )]
    DuplicateSeatInPlan {
        index: usize,
        first_index: usize,
        hall_id: i32,
        seat: String,
    },

    #[error("plan items {first_index} and {index} both seat student {student_id:?}")]
    DuplicateStudentInPlan {
        index: usize,
        first_index: usize,
        student_id: String,
    },

    #[error(
        "seat {seat:?} in hall {hall_id} is already occupied{}; cannot seat student {student_id:?}",
        OccupantSuffix(.occupant.as_deref())
    )]
    SeatAlreadyOccupied {
        hall_id: i32,
        seat: String,
        student_id: String,
        /// `None` when the conflict was only detected by the store's unique
        /// index and the occupying row could not be read back.
        occupant: Option<String>,
    },

    #[error("student {student_id:?} is not registered for schedule {schedule_id}")]
    AllocationNotFound { student_id: String, schedule_id: i32 },

    #[error(
        "already registered for schedule {schedule_id}: {}",
        .student_ids.join(", ")
    )]
    DuplicateRegistration {
        schedule_id: i32,
        student_ids: Vec<String>,
    },

    #[error("proposal could not be parsed: {0}")]
    ProposalUnparseable(#[from] ProposalError),

    #[error("proposal generator timed out after {}s", .0.as_secs())]
    ProposalTimeout(Duration),

    #[error("proposal generator failed: {0}")]
    ProposalFailed(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid scan payload: {0}")]
    InvalidScanPayload(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AllocationError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPlanItem { .. } => "malformed_plan_item",
            Self::DuplicateSeatInPlan { .. } => "duplicate_seat_in_plan",
            Self::DuplicateStudentInPlan { .. } => "duplicate_student_in_plan",
            Self::SeatAlreadyOccupied { .. } => "seat_already_occupied",
            Self::AllocationNotFound { .. } => "allocation_not_found",
            Self::DuplicateRegistration { .. } => "duplicate_registration",
            Self::ProposalUnparseable(_) => "proposal_unparseable",
            Self::ProposalTimeout(_) => "proposal_timeout",
            Self::ProposalFailed(_) => "proposal_failed",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidScanPayload(_) => "invalid_scan_payload",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn malformed(index: usize, reason: impl Into<String>, item: &serde_json::Value) -> Self {
        Self::MalformedPlanItem {
            index,
            reason: reason.into(),
            item: item.to_string(),
        }
    }
}

struct OccupantSuffix<'a>(Option<&'a str>);

impl fmt::Display for OccupantSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(occupant) => write!(f, " by student {occupant:?}"),
            None => Ok(()),
        }
    }
}
