//! Database query functions for the `student_allocations` table.
//!
//! Functions taking a `&PgPool` run as standalone statements. Functions
//! taking a `&mut PgConnection` are meant to run inside a caller-owned
//! transaction (`&mut *tx`), so the caller decides commit or rollback.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use crate::models::Allocation;

/// A registered student still waiting for a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UnallocatedStudent {
    pub allocation_id: i32,
    pub student_id: String,
    pub roll_no: String,
    pub name: String,
    pub student_class: String,
}

/// A seat taken within one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OccupiedSeat {
    pub hall_id: i32,
    pub seat_number: String,
    pub student_id: String,
}

/// One seated sitting, flattened across the examination/subject/hall joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SeatedSitting {
    pub allocation_id: i32,
    pub student_name: String,
    pub roll_no: String,
    pub student_class: String,
    pub exam_id: i32,
    pub exam_name: String,
    pub subject_code: String,
    pub subject_name: String,
    pub exam_date: NaiveDate,
    pub start_time: NaiveTime,
    pub hall_name: String,
    pub seat_number: String,
}

// -----------------------------------------------------------------------
// Pool queries
// -----------------------------------------------------------------------

/// Fetch an allocation by id.
pub async fn get_allocation(pool: &PgPool, allocation_id: i32) -> Result<Option<Allocation>> {
    let alloc = sqlx::query_as::<_, Allocation>(
        "SELECT * FROM student_allocations WHERE allocation_id = $1",
    )
    .bind(allocation_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch allocation")?;

    Ok(alloc)
}

/// List every allocation, ordered by id.
pub async fn list_allocations(pool: &PgPool) -> Result<Vec<Allocation>> {
    let allocs =
        sqlx::query_as::<_, Allocation>("SELECT * FROM student_allocations ORDER BY allocation_id")
            .fetch_all(pool)
            .await
            .context("failed to list allocations")?;

    Ok(allocs)
}

/// List every allocation registered against a schedule, seated or not.
pub async fn list_allocations_for_schedule(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<Vec<Allocation>> {
    let allocs = sqlx::query_as::<_, Allocation>(
        "SELECT * FROM student_allocations WHERE schedule_id = $1 ORDER BY allocation_id",
    )
    .bind(schedule_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list allocations for schedule {schedule_id}"))?;

    Ok(allocs)
}

/// Students registered for the schedule that have no hall yet.
pub async fn list_unallocated(pool: &PgPool, schedule_id: i32) -> Result<Vec<UnallocatedStudent>> {
    let rows = sqlx::query_as::<_, UnallocatedStudent>(
        "SELECT sa.allocation_id, s.student_id, s.roll_no, s.name, s.student_class \
         FROM student_allocations sa \
         JOIN students s ON s.student_id = sa.student_id \
         WHERE sa.schedule_id = $1 AND sa.hall_id IS NULL \
         ORDER BY s.roll_no",
    )
    .bind(schedule_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list unallocated students for schedule {schedule_id}"))?;

    Ok(rows)
}

/// Seat labels already taken in one hall for one schedule, sorted.
pub async fn list_occupied_seats(
    pool: &PgPool,
    schedule_id: i32,
    hall_id: i32,
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT seat_number FROM student_allocations \
         WHERE schedule_id = $1 AND hall_id = $2 AND seat_number IS NOT NULL \
         ORDER BY seat_number",
    )
    .bind(schedule_id)
    .bind(hall_id)
    .fetch_all(pool)
    .await
    .context("failed to list occupied seats")?;

    Ok(rows.into_iter().map(|(seat,)| seat).collect())
}

/// Every taken seat in a schedule, across all halls.
pub async fn list_occupied_for_schedule(
    pool: &PgPool,
    schedule_id: i32,
) -> Result<Vec<OccupiedSeat>> {
    let rows = sqlx::query_as::<_, OccupiedSeat>(
        "SELECT hall_id, seat_number, student_id FROM student_allocations \
         WHERE schedule_id = $1 AND hall_id IS NOT NULL AND seat_number IS NOT NULL \
         ORDER BY hall_id, seat_number",
    )
    .bind(schedule_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list occupied seats for schedule {schedule_id}"))?;

    Ok(rows)
}

/// Delete an allocation. Returns the number of rows removed (0 or 1).
pub async fn delete_allocation(pool: &PgPool, allocation_id: i32) -> Result<u64> {
    let result = sqlx::query("DELETE FROM student_allocations WHERE allocation_id = $1")
        .bind(allocation_id)
        .execute(pool)
        .await
        .context("failed to delete allocation")?;

    Ok(result.rows_affected())
}

/// All seated sittings for a student, ordered by examination name, then
/// date and start time.
pub async fn list_seated_sittings(pool: &PgPool, student_id: &str) -> Result<Vec<SeatedSitting>> {
    let rows = sqlx::query_as::<_, SeatedSitting>(
        "SELECT sa.allocation_id, \
                s.name AS student_name, s.roll_no, s.student_class, \
                e.exam_id, e.exam_name, \
                sub.subject_code, sub.subject_name, \
                sch.exam_date, sch.start_time, \
                h.hall_name, sa.seat_number \
         FROM student_allocations sa \
         JOIN students s ON s.student_id = sa.student_id \
         JOIN exam_schedule sch ON sch.schedule_id = sa.schedule_id \
         JOIN examinations e ON e.exam_id = sch.exam_id \
         JOIN subjects sub ON sub.subject_id = sch.subject_id \
         JOIN exam_halls h ON h.hall_id = sa.hall_id \
         WHERE sa.student_id = $1 AND sa.seat_number IS NOT NULL \
         ORDER BY e.exam_name, e.exam_id, sch.exam_date, sch.start_time",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list seated sittings for student {student_id:?}"))?;

    Ok(rows)
}

// -----------------------------------------------------------------------
// Transaction-scoped queries
// -----------------------------------------------------------------------

/// Which of `student_ids` are already registered against the schedule.
pub async fn find_registered(
    conn: &mut PgConnection,
    schedule_id: i32,
    student_ids: &[String],
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT student_id FROM student_allocations \
         WHERE schedule_id = $1 AND student_id = ANY($2) \
         ORDER BY student_id",
    )
    .bind(schedule_id)
    .bind(student_ids)
    .fetch_all(conn)
    .await
    .context("failed to check existing registrations")?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Insert one unseated allocation per student in a single statement.
pub async fn insert_registrations(
    conn: &mut PgConnection,
    schedule_id: i32,
    student_ids: &[String],
) -> Result<Vec<Allocation>> {
    let allocs = sqlx::query_as::<_, Allocation>(
        "INSERT INTO student_allocations (student_id, schedule_id) \
         SELECT sid, $2 FROM UNNEST($1::text[]) AS sid \
         RETURNING *",
    )
    .bind(student_ids)
    .bind(schedule_id)
    .fetch_all(conn)
    .await
    .with_context(|| format!("failed to register students for schedule {schedule_id}"))?;

    Ok(allocs)
}

/// Read every allocation of a schedule and lock the rows until the
/// enclosing transaction ends. Concurrent commits against the same
/// schedule queue behind this lock.
pub async fn lock_schedule_allocations(
    conn: &mut PgConnection,
    schedule_id: i32,
) -> Result<Vec<Allocation>> {
    let allocs = sqlx::query_as::<_, Allocation>(
        "SELECT * FROM student_allocations \
         WHERE schedule_id = $1 \
         ORDER BY allocation_id \
         FOR UPDATE",
    )
    .bind(schedule_id)
    .fetch_all(conn)
    .await
    .with_context(|| format!("failed to lock allocations for schedule {schedule_id}"))?;

    Ok(allocs)
}

/// Seat the `(student, schedule)` allocation. Returns rows affected; 0 means
/// the student is not registered for the schedule.
pub async fn assign_seat(
    conn: &mut PgConnection,
    schedule_id: i32,
    student_id: &str,
    hall_id: i32,
    seat_number: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE student_allocations \
         SET hall_id = $1, seat_number = $2, updated_at = now() \
         WHERE student_id = $3 AND schedule_id = $4",
    )
    .bind(hall_id)
    .bind(seat_number)
    .bind(student_id)
    .bind(schedule_id)
    .execute(conn)
    .await
    .with_context(|| {
        format!("failed to seat student {student_id:?} at hall {hall_id} seat {seat_number:?}")
    })?;

    Ok(result.rows_affected())
}

/// Seat an allocation by id, returning the updated row.
pub async fn assign_seat_by_id(
    conn: &mut PgConnection,
    allocation_id: i32,
    hall_id: i32,
    seat_number: &str,
) -> Result<Option<Allocation>> {
    let alloc = sqlx::query_as::<_, Allocation>(
        "UPDATE student_allocations \
         SET hall_id = $1, seat_number = $2, updated_at = now() \
         WHERE allocation_id = $3 \
         RETURNING *",
    )
    .bind(hall_id)
    .bind(seat_number)
    .bind(allocation_id)
    .fetch_optional(conn)
    .await
    .with_context(|| format!("failed to reassign allocation {allocation_id}"))?;

    Ok(alloc)
}
