//! CLI handlers for `hallpass student|subject|hall|exam|schedule`.

use anyhow::Result;
use sqlx::PgPool;

use hallpass_core::catalog::{
    self, ExaminationInput, HallInput, ScheduleInput, StudentInput, SubjectInput,
};

use crate::{ExamCommands, HallCommands, ScheduleCommands, StudentCommands, SubjectCommands};

pub async fn run_student_command(command: StudentCommands, pool: &PgPool) -> Result<()> {
    match command {
        StudentCommands::Add {
            student_id,
            roll_no,
            name,
            student_class,
        } => {
            let input = StudentInput {
                student_id,
                roll_no,
                name,
                student_class,
            };
            let student = catalog::create_student(pool, &input).await?;
            println!("Student created:");
            println!("  ID:      {}", student.student_id);
            println!("  Roll no: {}", student.roll_no);
            println!("  Name:    {}", student.name);
            println!("  Class:   {}", student.student_class);
            Ok(())
        }
        StudentCommands::List => {
            let students = catalog::list_students(pool).await?;
            if students.is_empty() {
                println!("No students found. Use `hallpass student add` to create one.");
                return Ok(());
            }
            let id_w = width(students.iter().map(|s| s.student_id.len()), "ID");
            let roll_w = width(students.iter().map(|s| s.roll_no.len()), "ROLL NO");
            let name_w = width(students.iter().map(|s| s.name.len()), "NAME");
            println!("{:<id_w$}  {:<roll_w$}  {:<name_w$}  CLASS", "ID", "ROLL NO", "NAME");
            for s in &students {
                println!(
                    "{:<id_w$}  {:<roll_w$}  {:<name_w$}  {}",
                    s.student_id, s.roll_no, s.name, s.student_class
                );
            }
            Ok(())
        }
    }
}

pub async fn run_subject_command(command: SubjectCommands, pool: &PgPool) -> Result<()> {
    match command {
        SubjectCommands::Add { code, name } => {
            let input = SubjectInput {
                subject_code: code,
                subject_name: name,
            };
            let subject = catalog::create_subject(pool, &input).await?;
            println!(
                "Subject {} created: {} {}",
                subject.subject_id, subject.subject_code, subject.subject_name
            );
            Ok(())
        }
        SubjectCommands::List => {
            let subjects = catalog::list_subjects(pool).await?;
            if subjects.is_empty() {
                println!("No subjects found. Use `hallpass subject add` to create one.");
                return Ok(());
            }
            let code_w = width(subjects.iter().map(|s| s.subject_code.len()), "CODE");
            println!("{:>5}  {:<code_w$}  NAME", "ID", "CODE");
            for s in &subjects {
                println!("{:>5}  {:<code_w$}  {}", s.subject_id, s.subject_code, s.subject_name);
            }
            Ok(())
        }
    }
}

pub async fn run_hall_command(command: HallCommands, pool: &PgPool) -> Result<()> {
    match command {
        HallCommands::Add { name, capacity } => {
            let input = HallInput {
                hall_name: name,
                capacity,
            };
            let hall = catalog::create_hall(pool, &input).await?;
            println!(
                "Hall {} created: {} (capacity {})",
                hall.hall_id, hall.hall_name, hall.capacity
            );
            Ok(())
        }
        HallCommands::List => {
            let halls = catalog::list_halls(pool).await?;
            if halls.is_empty() {
                println!("No halls found. Use `hallpass hall add` to create one.");
                return Ok(());
            }
            let name_w = width(halls.iter().map(|h| h.hall_name.len()), "NAME");
            println!("{:>5}  {:<name_w$}  {:>8}", "ID", "NAME", "CAPACITY");
            for h in &halls {
                println!("{:>5}  {:<name_w$}  {:>8}", h.hall_id, h.hall_name, h.capacity);
            }
            Ok(())
        }
    }
}

pub async fn run_exam_command(command: ExamCommands, pool: &PgPool) -> Result<()> {
    match command {
        ExamCommands::Add { name, start, end } => {
            let input = ExaminationInput {
                exam_name: name,
                start_date: start,
                end_date: end,
            };
            let exam = catalog::create_examination(pool, &input).await?;
            println!(
                "Examination {} created: {} ({} to {})",
                exam.exam_id, exam.exam_name, exam.start_date, exam.end_date
            );
            Ok(())
        }
        ExamCommands::List => {
            let exams = catalog::list_examinations(pool).await?;
            if exams.is_empty() {
                println!("No examinations found. Use `hallpass exam add` to create one.");
                return Ok(());
            }
            let name_w = width(exams.iter().map(|e| e.exam_name.len()), "NAME");
            println!("{:>5}  {:<name_w$}  {:<10}  END", "ID", "NAME", "START");
            for e in &exams {
                println!(
                    "{:>5}  {:<name_w$}  {:<10}  {}",
                    e.exam_id, e.exam_name, e.start_date, e.end_date
                );
            }
            Ok(())
        }
    }
}

pub async fn run_schedule_command(command: ScheduleCommands, pool: &PgPool) -> Result<()> {
    match command {
        ScheduleCommands::Add {
            exam,
            subject,
            date,
            time,
        } => {
            let input = ScheduleInput {
                exam_id: exam,
                subject_id: subject,
                exam_date: date,
                start_time: time,
            };
            let schedule = catalog::create_schedule(pool, &input).await?;
            println!(
                "Schedule {} created: exam {} subject {} on {} at {}",
                schedule.schedule_id,
                schedule.exam_id,
                schedule.subject_id,
                schedule.exam_date,
                schedule.start_time.format("%H:%M")
            );
            Ok(())
        }
        ScheduleCommands::List => {
            let schedules = catalog::list_schedules(pool).await?;
            if schedules.is_empty() {
                println!("No schedules found. Use `hallpass schedule add` to create one.");
                return Ok(());
            }
            println!("{:>5}  {:>5}  {:>7}  {:<10}  TIME", "ID", "EXAM", "SUBJECT", "DATE");
            for s in &schedules {
                println!(
                    "{:>5}  {:>5}  {:>7}  {:<10}  {}",
                    s.schedule_id,
                    s.exam_id,
                    s.subject_id,
                    s.exam_date,
                    s.start_time.format("%H:%M")
                );
            }
            Ok(())
        }
    }
}

/// Column width: the longest value, never narrower than the header.
fn width(lengths: impl Iterator<Item = usize>, header: &str) -> usize {
    lengths.max().unwrap_or(0).max(header.len())
}
