//! Students, subjects, halls, examinations and schedules.
//!
//! Plain create/list operations with input checks, plus the dashboard
//! snapshot the admin console loads on start.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use hallpass_db::models::{Allocation, ExamHall, ExamSchedule, Examination, Student, Subject};
use hallpass_db::queries::students::NewStudent;
use hallpass_db::queries::{
    allocations, examinations, halls, is_foreign_key_violation, is_unique_violation, schedules,
    students, subjects,
};

use crate::error::AllocationError;

#[derive(Debug, Clone, Deserialize)]
pub struct StudentInput {
    pub student_id: String,
    pub roll_no: String,
    pub name: String,
    pub student_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectInput {
    pub subject_code: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HallInput {
    pub hall_name: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExaminationInput {
    pub exam_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleInput {
    pub exam_id: i32,
    pub subject_id: i32,
    pub exam_date: NaiveDate,
    pub start_time: NaiveTime,
}

/// Trim `value` and check it is non-empty and fits `max` characters.
fn required<'a>(field: &str, value: &'a str, max: usize) -> Result<&'a str, AllocationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AllocationError::InvalidInput(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(AllocationError::InvalidInput(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value)
}

fn conflict_or_internal(err: anyhow::Error, entity: &'static str, id: &str) -> AllocationError {
    if is_unique_violation(&err) {
        AllocationError::AlreadyExists {
            entity,
            id: id.to_owned(),
        }
    } else {
        AllocationError::Internal(err)
    }
}

pub async fn create_student(pool: &PgPool, input: &StudentInput) -> Result<Student, AllocationError> {
    let new = NewStudent {
        student_id: required("student_id", &input.student_id, 50)?,
        roll_no: required("roll_no", &input.roll_no, 50)?,
        name: required("name", &input.name, 100)?,
        student_class: required("student_class", &input.student_class, 50)?,
    };
    let student = students::insert_student(pool, &new)
        .await
        .map_err(|err| conflict_or_internal(err, "student", new.student_id))?;
    info!(student_id = %student.student_id, "student created");
    Ok(student)
}

pub async fn create_subject(pool: &PgPool, input: &SubjectInput) -> Result<Subject, AllocationError> {
    let code = required("subject_code", &input.subject_code, 20)?;
    let name = required("subject_name", &input.subject_name, 100)?;
    let subject = subjects::insert_subject(pool, code, name)
        .await
        .map_err(|err| conflict_or_internal(err, "subject", code))?;
    info!(subject_id = subject.subject_id, code, "subject created");
    Ok(subject)
}

pub async fn create_hall(pool: &PgPool, input: &HallInput) -> Result<ExamHall, AllocationError> {
    let name = required("hall_name", &input.hall_name, 100)?;
    if input.capacity <= 0 {
        return Err(AllocationError::InvalidInput(format!(
            "capacity must be positive, got {}",
            input.capacity
        )));
    }
    let hall = halls::insert_hall(pool, name, input.capacity)
        .await
        .map_err(|err| conflict_or_internal(err, "hall", name))?;
    info!(hall_id = hall.hall_id, capacity = hall.capacity, "hall created");
    Ok(hall)
}

pub async fn create_examination(
    pool: &PgPool,
    input: &ExaminationInput,
) -> Result<Examination, AllocationError> {
    let name = required("exam_name", &input.exam_name, 100)?;
    if input.start_date > input.end_date {
        return Err(AllocationError::InvalidInput(format!(
            "start_date {} is after end_date {}",
            input.start_date, input.end_date
        )));
    }
    let exam = examinations::insert_examination(pool, name, input.start_date, input.end_date).await?;
    info!(exam_id = exam.exam_id, "examination created");
    Ok(exam)
}

pub async fn create_schedule(
    pool: &PgPool,
    input: &ScheduleInput,
) -> Result<ExamSchedule, AllocationError> {
    if examinations::get_examination(pool, input.exam_id).await?.is_none() {
        return Err(AllocationError::not_found("examination", input.exam_id));
    }
    if subjects::get_subject(pool, input.subject_id).await?.is_none() {
        return Err(AllocationError::not_found("subject", input.subject_id));
    }

    let schedule = schedules::insert_schedule(
        pool,
        input.exam_id,
        input.subject_id,
        input.exam_date,
        input.start_time,
    )
    .await
    .map_err(|err| {
        // Parent deleted after the checks above.
        if is_foreign_key_violation(&err) {
            AllocationError::not_found("examination or subject", input.exam_id)
        } else {
            AllocationError::Internal(err)
        }
    })?;
    info!(schedule_id = schedule.schedule_id, exam_id = schedule.exam_id, "schedule created");
    Ok(schedule)
}

pub async fn list_students(pool: &PgPool) -> Result<Vec<Student>, AllocationError> {
    Ok(students::list_students(pool).await?)
}

pub async fn list_subjects(pool: &PgPool) -> Result<Vec<Subject>, AllocationError> {
    Ok(subjects::list_subjects(pool).await?)
}

pub async fn list_halls(pool: &PgPool) -> Result<Vec<ExamHall>, AllocationError> {
    Ok(halls::list_halls(pool).await?)
}

pub async fn list_examinations(pool: &PgPool) -> Result<Vec<Examination>, AllocationError> {
    Ok(examinations::list_examinations(pool).await?)
}

pub async fn list_schedules(pool: &PgPool) -> Result<Vec<ExamSchedule>, AllocationError> {
    Ok(schedules::list_schedules(pool).await?)
}

/// Every table at once.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    #[serde(rename = "exam_halls")]
    pub halls: Vec<ExamHall>,
    pub examinations: Vec<Examination>,
    pub schedules: Vec<ExamSchedule>,
    pub allocations: Vec<Allocation>,
}

pub async fn dashboard(pool: &PgPool) -> Result<Dashboard, AllocationError> {
    let (students, subjects, halls, examinations, schedules, allocations) = tokio::try_join!(
        students::list_students(pool),
        subjects::list_subjects(pool),
        halls::list_halls(pool),
        examinations::list_examinations(pool),
        schedules::list_schedules(pool),
        allocations::list_allocations(pool),
    )?;

    Ok(Dashboard {
        students,
        subjects,
        halls,
        examinations,
        schedules,
        allocations,
    })
}
