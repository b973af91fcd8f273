//! `hallpass ticket` and `hallpass scan`.

use anyhow::{Context, Result};
use sqlx::PgPool;

use hallpass_core::scan;
use hallpass_core::ticket::{self, HallTicket};

pub async fn cmd_ticket(pool: &PgPool, student_id: &str, as_json: bool) -> Result<()> {
    let ticket = ticket::hall_ticket(pool, student_id).await?;
    print_ticket(&ticket, as_json)
}

pub async fn cmd_scan(pool: &PgPool, decoded_text: &str, as_json: bool) -> Result<()> {
    let ticket = scan::scan_hall_ticket(pool, decoded_text).await?;
    print_ticket(&ticket, as_json)
}

fn print_ticket(ticket: &HallTicket, as_json: bool) -> Result<()> {
    if as_json {
        let out = serde_json::to_string_pretty(ticket).context("failed to serialize hall ticket")?;
        println!("{out}");
    } else {
        print!("{}", render_ticket(ticket));
    }
    Ok(())
}

fn render_ticket(ticket: &HallTicket) -> String {
    let details = &ticket.student_details;
    let mut out = String::new();
    out.push_str("HALL TICKET\n");
    out.push_str(&format!("  Register no: {}\n", ticket.student_id));
    out.push_str(&format!("  Name:        {}\n", details.name));
    out.push_str(&format!("  Roll no:     {}\n", details.roll_no));
    out.push_str(&format!("  Class:       {}\n", details.student_class));

    for exam in &ticket.examinations {
        out.push('\n');
        out.push_str(&format!("{}\n", exam.exam_name));
        let hall_w = exam
            .subjects
            .iter()
            .map(|s| s.hall.len())
            .max()
            .unwrap_or(0)
            .max(4);
        for s in &exam.subjects {
            out.push_str(&format!(
                "  {}  {}  {:<10}  {:<hall_w$}  seat {}  {}\n",
                s.date,
                s.time.format("%H:%M"),
                s.subject_code,
                s.hall,
                s.seat,
                s.subject_name,
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use hallpass_core::ticket::{ExaminationEntry, StudentDetails, SubjectEntry};

    use super::*;

    #[test]
    fn renders_one_line_per_subject() {
        let ticket = HallTicket {
            student_id: "21CS042".to_owned(),
            student_details: StudentDetails {
                name: "Asha Rao".to_owned(),
                roll_no: "R-042".to_owned(),
                student_class: "CSE-B".to_owned(),
            },
            examinations: vec![ExaminationEntry {
                exam_id: 1,
                exam_name: "Finals".to_owned(),
                subjects: vec![SubjectEntry {
                    subject_code: "MA101".to_owned(),
                    subject_name: "Calculus".to_owned(),
                    date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
                    time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                    hall: "Main Hall".to_owned(),
                    seat: "A1".to_owned(),
                }],
            }],
        };

        let text = render_ticket(&ticket);
        assert!(text.contains("Register no: 21CS042"));
        assert!(text.contains("Finals\n"));
        assert!(text.contains("2025-11-03  09:30  MA101       Main Hall  seat A1  Calculus"));
    }
}
