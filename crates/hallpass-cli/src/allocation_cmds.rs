//! CLI handlers for registration, plan validation and execution, and
//! single-seat edits.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use sqlx::PgPool;

use hallpass_core::plan::{self, PlanVerdict};
use hallpass_core::{SeatLabel, registry};

/// Read a plan file: either a JSON array of items or an object with a
/// `plan` array (the shape `hallpass propose --output` writes).
pub fn read_plan_file(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read plan file {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("plan file {} is not valid JSON", path.display()))?;
    plan_items(value).with_context(|| format!("unexpected shape in plan file {}", path.display()))
}

fn plan_items(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("plan") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => bail!("\"plan\" must be an array"),
            None => bail!("object has no \"plan\" array"),
        },
        _ => bail!("expected an array of plan items or an object with a \"plan\" array"),
    }
}

pub async fn cmd_register(pool: &PgPool, schedule_id: i32, student_ids: &[String]) -> Result<()> {
    let report = registry::register_students(pool, schedule_id, student_ids)
        .await
        .with_context(|| format!("failed to register students for schedule {schedule_id}"))?;
    println!(
        "Registered {} student(s) for schedule {}:",
        report.count(),
        report.schedule_id
    );
    for allocation in &report.registered {
        println!("  {:<20} allocation {}", allocation.student_id, allocation.allocation_id);
    }
    Ok(())
}

pub async fn cmd_unallocated(pool: &PgPool, schedule_id: i32) -> Result<()> {
    let students = registry::list_unallocated(pool, schedule_id).await?;
    if students.is_empty() {
        println!("Every registered student in schedule {schedule_id} has a seat.");
        return Ok(());
    }
    println!("{} student(s) awaiting a seat:", students.len());
    println!("{:>10}  {:<20}  {:<12}  NAME", "ALLOCATION", "STUDENT", "CLASS");
    for s in &students {
        println!(
            "{:>10}  {:<20}  {:<12}  {}",
            s.allocation_id, s.student_id, s.student_class, s.name
        );
    }
    Ok(())
}

pub async fn cmd_occupied(pool: &PgPool, schedule_id: i32, hall_id: i32) -> Result<()> {
    let seats = registry::list_occupied_seats(pool, schedule_id, hall_id).await?;
    if seats.is_empty() {
        println!("No seats taken in hall {hall_id} for schedule {schedule_id}.");
    } else {
        println!("{} seat(s) taken: {}", seats.len(), seats.join(", "));
    }
    Ok(())
}

pub async fn cmd_validate(pool: &PgPool, schedule_id: i32, plan_file: &Path) -> Result<()> {
    let raw = read_plan_file(plan_file)?;
    let result = plan::validate_plan(pool, schedule_id, &raw).await;
    let verdict = PlanVerdict::from_result(&result);
    match result {
        Ok(items) => {
            println!("Plan is valid: {} item(s).", items.len());
            for item in &items {
                println!("  {:<20} hall {:>4}  seat {}", item.student_id, item.hall_id, item.seat);
            }
            Ok(())
        }
        Err(err) => bail!(
            "plan is invalid ({}): {}",
            verdict.kind.unwrap_or("unknown"),
            err
        ),
    }
}

pub async fn cmd_execute(pool: &PgPool, schedule_id: i32, plan_file: &Path) -> Result<()> {
    let raw = read_plan_file(plan_file)?;
    let report = plan::execute_plan(pool, schedule_id, &raw)
        .await
        .with_context(|| format!("plan for schedule {schedule_id} was not applied"))?;
    println!(
        "Allocated seats for {} student(s) in schedule {}.",
        report.updated_count, report.schedule_id
    );
    Ok(())
}

pub async fn cmd_reassign(pool: &PgPool, allocation_id: i32, hall_id: i32, seat: &str) -> Result<()> {
    let seat = SeatLabel::parse(seat)?;
    let allocation = plan::reassign_seat(pool, allocation_id, hall_id, &seat)
        .await
        .with_context(|| format!("failed to reassign allocation {allocation_id}"))?;
    println!(
        "Allocation {} ({}) now in hall {} seat {}.",
        allocation.allocation_id, allocation.student_id, hall_id, seat
    );
    Ok(())
}

pub async fn cmd_remove(pool: &PgPool, allocation_id: i32) -> Result<()> {
    registry::remove_allocation(pool, allocation_id)
        .await
        .with_context(|| format!("failed to remove allocation {allocation_id}"))?;
    println!("Allocation {allocation_id} removed.");
    Ok(())
}
