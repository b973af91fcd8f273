//! Shared test utilities for hallpass integration tests.
//!
//! Provides a PostgreSQL instance shared across tests. Each test gets its
//! own database within the instance.
//!
//! Two modes:
//! - **`HALLPASS_TEST_PG_URL`** set: use that server directly.
//! - **No env var**: spin up a container via testcontainers, shared per
//!   test binary through a `OnceCell`.
//!
//! Also carries small seeding helpers so allocation tests can build a
//! schedule with halls and students in one call.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use hallpass_db::models::{ExamHall, ExamSchedule, Student};
use hallpass_db::pool;
use hallpass_db::queries::students::NewStudent;
use hallpass_db::queries::{examinations, halls, schedules, students, subjects};

/// Shared server state: base URL and optional container handle (kept alive).
struct SharedPg {
    base_url: String,
    /// `None` when using an external URL.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("HALLPASS_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_owned(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Base URL for the shared PostgreSQL (server root, no database name).
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

async fn maintenance_pool() -> PgPool {
    let base_url = pg_url().await;
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{base_url}/postgres"))
        .await
        .expect("failed to connect to maintenance database")
}

/// Create a temporary database with migrations applied.
///
/// Returns `(pool, db_name)`. Call [`drop_test_db`] with the returned
/// `db_name` when the test is done.
pub async fn create_test_db() -> (PgPool, String) {
    let base_url = pg_url().await;

    let maint_pool = maintenance_pool().await;
    let db_name = format!("hallpass_test_{}", Uuid::new_v4().simple());
    let stmt = format!("CREATE DATABASE {db_name}");
    maint_pool
        .execute(stmt.as_str())
        .await
        .unwrap_or_else(|e| panic!("failed to create temp database {db_name}: {e}"));
    maint_pool.close().await;

    let temp_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&format!("{base_url}/{db_name}"))
        .await
        .unwrap_or_else(|e| panic!("failed to connect to temp database {db_name}: {e}"));

    pool::run_migrations(&temp_pool)
        .await
        .expect("migrations should succeed");

    (temp_pool, db_name)
}

/// Drop a temporary database, terminating any connections still open.
pub async fn drop_test_db(db_name: &str) {
    let maint_pool = maintenance_pool().await;

    let terminate = format!(
        "SELECT pg_terminate_backend(pid) \
         FROM pg_stat_activity \
         WHERE datname = '{db_name}' AND pid <> pg_backend_pid()"
    );
    let _ = maint_pool.execute(terminate.as_str()).await;

    let stmt = format!("DROP DATABASE IF EXISTS {db_name}");
    let _ = maint_pool.execute(stmt.as_str()).await;
    maint_pool.close().await;
}

// -----------------------------------------------------------------------
// Seeding
// -----------------------------------------------------------------------

/// A schedule with halls and students, ready for registration.
pub struct Fixture {
    pub schedule: ExamSchedule,
    pub halls: Vec<ExamHall>,
    pub students: Vec<Student>,
}

/// Insert one examination, one subject, one sitting, a hall per entry of
/// `hall_capacities`, and students with ids from `student_ids`.
pub async fn seed_schedule(
    pool: &PgPool,
    hall_capacities: &[i32],
    student_ids: &[&str],
) -> Fixture {
    let exam = examinations::insert_examination(
        pool,
        "Semester Finals",
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
        NaiveDate::from_ymd_opt(2025, 11, 14).unwrap(),
    )
    .await
    .expect("insert examination");

    let subject = subjects::insert_subject(pool, &format!("SUB{}", exam.exam_id), "Mathematics")
        .await
        .expect("insert subject");

    let schedule = schedules::insert_schedule(
        pool,
        exam.exam_id,
        subject.subject_id,
        NaiveDate::from_ymd_opt(2025, 11, 4).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    )
    .await
    .expect("insert schedule");

    let mut seeded_halls = Vec::with_capacity(hall_capacities.len());
    for (i, capacity) in hall_capacities.iter().enumerate() {
        let hall = halls::insert_hall(pool, &format!("Hall {}", i + 1), *capacity)
            .await
            .expect("insert hall");
        seeded_halls.push(hall);
    }

    let mut seeded_students = Vec::with_capacity(student_ids.len());
    for id in student_ids {
        let roll_no = format!("R-{id}");
        let name = format!("Student {id}");
        let student = students::insert_student(
            pool,
            &NewStudent {
                student_id: id,
                roll_no: &roll_no,
                name: &name,
                student_class: "XII-A",
            },
        )
        .await
        .expect("insert student");
        seeded_students.push(student);
    }

    Fixture {
        schedule,
        halls: seeded_halls,
        students: seeded_students,
    }
}
