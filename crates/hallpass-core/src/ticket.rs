//! Hall tickets: a student's seated sittings grouped by examination.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::PgPool;

use hallpass_db::queries::allocations::{self, SeatedSitting};

use crate::error::AllocationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HallTicket {
    pub student_id: String,
    #[serde(rename = "studentDetails")]
    pub student_details: StudentDetails,
    pub examinations: Vec<ExaminationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentDetails {
    pub name: String,
    pub roll_no: String,
    pub student_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExaminationEntry {
    pub exam_id: i32,
    pub exam_name: String,
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectEntry {
    pub subject_code: String,
    pub subject_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub hall: String,
    pub seat: String,
}

/// Group flat sitting rows into a ticket.
///
/// Examinations keep the order in which they first appear in `rows`.
/// Returns `None` when there are no rows.
pub fn group_sittings(student_id: &str, rows: Vec<SeatedSitting>) -> Option<HallTicket> {
    let first = rows.first()?;
    let student_details = StudentDetails {
        name: first.student_name.clone(),
        roll_no: first.roll_no.clone(),
        student_class: first.student_class.clone(),
    };

    let mut examinations: Vec<ExaminationEntry> = Vec::new();
    for row in rows {
        let subject = SubjectEntry {
            subject_code: row.subject_code,
            subject_name: row.subject_name,
            date: row.exam_date,
            time: row.start_time,
            hall: row.hall_name,
            seat: row.seat_number,
        };
        match examinations.iter_mut().find(|e| e.exam_id == row.exam_id) {
            Some(entry) => entry.subjects.push(subject),
            None => examinations.push(ExaminationEntry {
                exam_id: row.exam_id,
                exam_name: row.exam_name,
                subjects: vec![subject],
            }),
        }
    }

    Some(HallTicket {
        student_id: student_id.to_owned(),
        student_details,
        examinations,
    })
}

/// Assemble the hall ticket for a student.
///
/// Fails with [`AllocationError::NotFound`] if the student holds no seat.
pub async fn hall_ticket(pool: &PgPool, student_id: &str) -> Result<HallTicket, AllocationError> {
    let student_id = student_id.trim();
    let rows = allocations::list_seated_sittings(pool, student_id).await?;
    group_sittings(student_id, rows).ok_or_else(|| AllocationError::not_found("hall ticket", student_id))
}

/// A student's seated sittings, flat.
pub async fn student_allocations(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<SeatedSitting>, AllocationError> {
    Ok(allocations::list_seated_sittings(pool, student_id.trim()).await?)
}
