//! Structural checks over a raw plan.
//!
//! A plan arrives as untyped JSON, either from the proposer or from an
//! admin editing one. Each item is turned into a [`PlanItem`] here or the
//! whole plan is rejected with the first offending index.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AllocationError;
use crate::seat::{SeatLabel, json_type_name};

/// One normalized assignment: seat `student_id` at `seat` in `hall_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub student_id: String,
    pub hall_id: i32,
    #[serde(rename = "seat_number")]
    pub seat: SeatLabel,
}

/// Keys accepted for the seat label, in lookup order.
const SEAT_KEYS: [&str; 2] = ["seat_number", "seat_label"];

/// Normalize every item, failing on the first malformed one.
///
/// `known_halls` is the set of hall ids currently in the store.
pub fn parse_plan(
    raw: &[Value],
    known_halls: &HashSet<i32>,
) -> Result<Vec<PlanItem>, AllocationError> {
    if raw.is_empty() {
        return Err(AllocationError::InvalidInput(
            "plan must contain at least one item".to_owned(),
        ));
    }

    raw.iter()
        .enumerate()
        .map(|(index, value)| parse_item(index, value, known_halls))
        .collect()
}

fn parse_item(
    index: usize,
    value: &Value,
    known_halls: &HashSet<i32>,
) -> Result<PlanItem, AllocationError> {
    let Some(fields) = value.as_object() else {
        return Err(AllocationError::malformed(
            index,
            format!("expected an object, got {}", json_type_name(value)),
            value,
        ));
    };

    let malformed = |reason: String| AllocationError::malformed(index, reason, value);

    let student_id = student_id(fields).map_err(malformed)?;
    let hall_id = hall_id(fields).map_err(malformed)?;
    if !known_halls.contains(&hall_id) {
        return Err(AllocationError::malformed(
            index,
            format!("hall_id {hall_id} does not reference a known hall"),
            value,
        ));
    }

    let seat_value = SEAT_KEYS
        .iter()
        .find_map(|key| fields.get(*key))
        .unwrap_or(&Value::Null);
    let seat = SeatLabel::from_json(seat_value)
        .map_err(|err| malformed(err.to_string()))?;

    Ok(PlanItem {
        student_id,
        hall_id,
        seat,
    })
}

fn student_id(fields: &Map<String, Value>) -> Result<String, String> {
    match fields.get("student_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
        Some(Value::String(_)) => Err("student_id is empty".to_owned()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        None | Some(Value::Null) => Err("student_id is missing".to_owned()),
        Some(other) => Err(format!(
            "student_id must be a string, got {}",
            json_type_name(other)
        )),
    }
}

fn hall_id(fields: &Map<String, Value>) -> Result<i32, String> {
    let parsed = match fields.get("hall_id") {
        None | Some(Value::Null) => return Err("hall_id is missing".to_owned()),
        Some(Value::Number(n)) => n.as_i64().and_then(|id| i32::try_from(id).ok()),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        Some(other) => {
            return Err(format!(
                "hall_id must be an integer, got {}",
                json_type_name(other)
            ));
        }
    };
    parsed.ok_or_else(|| "hall_id must be an integer".to_owned())
}

/// Reject plans that seat two students at one seat or one student twice.
pub fn check_internal_uniqueness(items: &[PlanItem]) -> Result<(), AllocationError> {
    let mut seats: HashMap<(i32, &SeatLabel), usize> = HashMap::new();
    let mut students: HashMap<&str, usize> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        if let Some(&first_index) = seats.get(&(item.hall_id, &item.seat)) {
            return Err(AllocationError::DuplicateSeatInPlan {
                index,
                first_index,
                hall_id: item.hall_id,
                seat: item.seat.to_string(),
            });
        }
        seats.insert((item.hall_id, &item.seat), index);

        if let Some(&first_index) = students.get(item.student_id.as_str()) {
            return Err(AllocationError::DuplicateStudentInPlan {
                index,
                first_index,
                student_id: item.student_id.clone(),
            });
        }
        students.insert(&item.student_id, index);
    }

    Ok(())
}
