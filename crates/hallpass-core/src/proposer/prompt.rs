//! Prompt construction for the seating proposer. Pure string assembly.

use serde_json::json;

use hallpass_db::models::ExamHall;
use hallpass_db::queries::allocations::{OccupiedSeat, UnallocatedStudent};

use crate::seat::MAX_SEAT_LABEL_LEN;

/// Everything the proposer is told about a schedule.
#[derive(Debug, Clone, Copy)]
pub struct ProposalInput<'a> {
    pub unallocated: &'a [UnallocatedStudent],
    pub halls: &'a [ExamHall],
    pub occupied: &'a [OccupiedSeat],
    /// Free-text instructions from the administrator.
    pub instructions: &'a str,
}

const OUTPUT_CONTRACT: &str = r#"## Output

Respond with a single JSON object and nothing else. Do not wrap it in
markdown code fences.

{
  "reasoning": "one or two sentences explaining the seating",
  "plan": [
    {"student_id": "S001", "hall_id": 1, "seat_number": "A1"},
    {"student_id": "S002", "hall_id": 1, "seat_number": "A2"}
  ]
}

Rules for every plan item:
- "student_id" is a string copied exactly from the student list.
- "hall_id" is an integer taken from the hall list.
- "seat_number" is a string such as "A1" or "B15"."#;

/// Build the full prompt text.
pub fn build_prompt(input: &ProposalInput<'_>) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("# Examination Seating Planner\n\n");
    prompt.push_str(
        "You are planning seats for an examination sitting. Every student \
         below is registered for the sitting but has no seat yet. Assign \
         each of them a hall and a seat.\n\n",
    );

    prompt.push_str("## Students awaiting a seat\n\n");
    for student in input.unallocated {
        let line = json!({
            "student_id": student.student_id,
            "roll_no": student.roll_no,
            "name": student.name,
            "student_class": student.student_class,
        });
        prompt.push_str(&format!("- {line}\n"));
    }

    prompt.push_str("\n## Exam halls\n\n");
    for hall in input.halls {
        let line = json!({
            "hall_id": hall.hall_id,
            "hall_name": hall.hall_name,
            "capacity": hall.capacity,
        });
        prompt.push_str(&format!("- {line}\n"));
    }

    prompt.push_str("\n## Seats already occupied (never assign these)\n\n");
    if input.occupied.is_empty() {
        prompt.push_str("None. Every seat is available.\n");
    } else {
        for seat in input.occupied {
            let line = json!({
                "hall_id": seat.hall_id,
                "seat_number": seat.seat_number,
            });
            prompt.push_str(&format!("- {line}\n"));
        }
    }

    prompt.push_str("\n## Instructions from the administrator\n\n");
    prompt.push_str(input.instructions.trim());
    prompt.push_str("\n\n");

    prompt.push_str(OUTPUT_CONTRACT);
    prompt.push('\n');
    prompt.push_str(&format!(
        "- \"seat_number\" is at most {MAX_SEAT_LABEL_LEN} characters long.\n"
    ));
    prompt.push_str("- A seat_number is used at most once per hall.\n");
    prompt.push_str("- Never use a seat from the occupied list.\n");
    prompt.push_str("- Stay within each hall's capacity.\n");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str) -> UnallocatedStudent {
        UnallocatedStudent {
            allocation_id: 1,
            student_id: id.to_owned(),
            roll_no: format!("R-{id}"),
            name: format!("Student {id}"),
            student_class: "XII-A".to_owned(),
        }
    }

    fn hall() -> ExamHall {
        ExamHall {
            hall_id: 4,
            hall_name: "North Wing".to_owned(),
            capacity: 30,
        }
    }

    #[test]
    fn lists_students_halls_and_instructions() {
        let students = [student("S1"), student("S2")];
        let halls = [hall()];
        let prompt = build_prompt(&ProposalInput {
            unallocated: &students,
            halls: &halls,
            occupied: &[],
            instructions: "  keep classes together ",
        });

        assert!(prompt.contains(r#""student_id":"S1""#));
        assert!(prompt.contains(r#""student_id":"S2""#));
        assert!(prompt.contains(r#""hall_name":"North Wing""#));
        assert!(prompt.contains(r#""capacity":30"#));
        assert!(prompt.contains("\nkeep classes together\n"));
        assert!(prompt.contains("None. Every seat is available."));
        assert!(prompt.contains("at most 10 characters"));
    }

    #[test]
    fn lists_occupied_seats_without_student_ids() {
        let students = [student("S1")];
        let halls = [hall()];
        let occupied = [OccupiedSeat {
            hall_id: 4,
            seat_number: "A1".to_owned(),
            student_id: "X".to_owned(),
        }];
        let prompt = build_prompt(&ProposalInput {
            unallocated: &students,
            halls: &halls,
            occupied: &occupied,
            instructions: "fill front rows first",
        });

        assert!(prompt.contains(r#"{"hall_id":4,"seat_number":"A1"}"#));
        assert!(!prompt.contains("None. Every seat is available."));
        assert!(!prompt.contains(r#""student_id":"X""#));
    }
}
