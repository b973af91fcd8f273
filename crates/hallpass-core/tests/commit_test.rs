//! Integration tests for plan validation, plan execution and reassignment.

use serde_json::{Value, json};
use sqlx::PgPool;

use hallpass_core::plan::{self, execute_plan, reassign_seat, validate_plan};
use hallpass_core::{AllocationError, SeatLabel, registry};
use hallpass_db::models::Allocation;
use hallpass_db::queries::allocations;
use hallpass_db::queries::students::{NewStudent, insert_student};
use hallpass_test_utils::{Fixture, create_test_db, drop_test_db, seed_schedule};

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

fn seat(student: &str, hall_id: i32, label: impl Into<Value>) -> Value {
    json!({"student_id": student, "hall_id": hall_id, "seat_number": label.into()})
}

/// Seed one schedule, register every student, and return the fixture.
async fn registered(pool: &PgPool, halls: &[i32], students: &[&str]) -> Fixture {
    let fx = seed_schedule(pool, halls, students).await;
    registry::register_students(pool, fx.schedule.schedule_id, &ids(students))
        .await
        .expect("register");
    fx
}

async fn rows(pool: &PgPool, schedule_id: i32) -> Vec<Allocation> {
    allocations::list_allocations_for_schedule(pool, schedule_id)
        .await
        .unwrap()
}

fn seat_of<'a>(rows: &'a [Allocation], student: &str) -> Option<(i32, &'a str)> {
    rows.iter()
        .find(|a| a.student_id == student)
        .and_then(Allocation::seat)
}

#[tokio::test]
async fn occupied_seat_is_refused_and_free_seat_is_taken() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[2], &["X", "Y"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;

    execute_plan(&pool, sid, &[seat("X", hall, "A1")])
        .await
        .expect("seat X");

    let err = execute_plan(&pool, sid, &[seat("Y", hall, "A1")])
        .await
        .expect_err("A1 is taken");
    match err {
        AllocationError::SeatAlreadyOccupied {
            hall_id,
            seat,
            student_id,
            occupant,
        } => {
            assert_eq!(hall_id, hall);
            assert_eq!(seat, "A1");
            assert_eq!(student_id, "Y");
            assert_eq!(occupant.as_deref(), Some("X"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let report = execute_plan(&pool, sid, &[seat("Y", hall, "A2")])
        .await
        .expect("A2 is free");
    assert_eq!(report.updated_count, 1);

    let after = rows(&pool, sid).await;
    assert_eq!(seat_of(&after, "X"), Some((hall, "A1")));
    assert_eq!(seat_of(&after, "Y"), Some((hall, "A2")));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn valid_plan_seats_everyone() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[2, 2], &["S1", "S2", "S3"]).await;
    let sid = fx.schedule.schedule_id;
    let (h1, h2) = (fx.halls[0].hall_id, fx.halls[1].hall_id);

    let plan = [seat("S1", h1, "A1"), seat("S2", h1, "A2"), seat("S3", h2, "A1")];
    let report = execute_plan(&pool, sid, &plan).await.unwrap();
    assert_eq!(report.updated_count, 3);
    assert_eq!(report.schedule_id, sid);

    let after = rows(&pool, sid).await;
    assert_eq!(seat_of(&after, "S1"), Some((h1, "A1")));
    assert_eq!(seat_of(&after, "S2"), Some((h1, "A2")));
    assert_eq!(seat_of(&after, "S3"), Some((h2, "A1")));
    assert!(registry::list_unallocated(&pool, sid).await.unwrap().is_empty());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_seat_in_plan_mutates_nothing() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1", "S2", "S3"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;
    let before = rows(&pool, sid).await;

    let plan = [seat("S1", hall, "A1"), seat("S2", hall, "B1"), seat("S3", hall, "A1")];
    let err = execute_plan(&pool, sid, &plan).await.unwrap_err();
    match err {
        AllocationError::DuplicateSeatInPlan {
            index, first_index, ..
        } => assert_eq!((index, first_index), (2, 0)),
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(rows(&pool, sid).await, before);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn late_failure_rolls_back_earlier_items() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1", "S2"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;
    let before = rows(&pool, sid).await;

    // W exists nowhere, so the last item has no allocation row.
    let plan = [seat("S1", hall, "A1"), seat("S2", hall, "A2"), seat("W", hall, "A3")];
    let err = execute_plan(&pool, sid, &plan).await.unwrap_err();
    match err {
        AllocationError::AllocationNotFound {
            student_id,
            schedule_id,
        } => {
            assert_eq!(student_id, "W");
            assert_eq!(schedule_id, sid);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(rows(&pool, sid).await, before);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn numeric_and_string_labels_name_the_same_seat() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1", "S2"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;

    execute_plan(&pool, sid, &[seat("S1", hall, 7)]).await.unwrap();
    let seats = registry::list_occupied_seats(&pool, sid, hall).await.unwrap();
    assert_eq!(seats, ["7"]);

    let err = execute_plan(&pool, sid, &[seat("S2", hall, "7")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "seat_already_occupied");

    let err = execute_plan(&pool, sid, &[seat("S2", hall, " 7 ")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "seat_already_occupied");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plan_can_move_a_student_and_reuse_the_seat() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["X", "Y"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;

    execute_plan(&pool, sid, &[seat("X", hall, "A1")]).await.unwrap();

    let plan = [seat("X", hall, "B1"), seat("Y", hall, "A1")];
    execute_plan(&pool, sid, &plan).await.expect("swap out then in");

    let after = rows(&pool, sid).await;
    assert_eq!(seat_of(&after, "X"), Some((hall, "B1")));
    assert_eq!(seat_of(&after, "Y"), Some((hall, "A1")));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn validation_is_repeatable_and_read_only() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["X", "Y"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;
    execute_plan(&pool, sid, &[seat("X", hall, "A1")]).await.unwrap();
    let before = rows(&pool, sid).await;

    let good = [seat("Y", hall, "A2")];
    let first = validate_plan(&pool, sid, &good).await.unwrap();
    let second = validate_plan(&pool, sid, &good).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].seat, SeatLabel::parse("A2").unwrap());

    let bad = [seat("Y", hall, "A1")];
    let first = plan::PlanVerdict::from_result(&validate_plan(&pool, sid, &bad).await);
    let second = plan::PlanVerdict::from_result(&validate_plan(&pool, sid, &bad).await);
    assert_eq!(first, second);
    assert!(!first.valid);

    assert_eq!(rows(&pool, sid).await, before);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn malformed_and_unknown_inputs() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;

    let err = execute_plan(&pool, sid, &[seat("S1", hall, "ABCDEFGHIJK")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "malformed_plan_item");

    let err = execute_plan(&pool, sid, &[seat("S1", hall + 100, "A1")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "malformed_plan_item");

    let err = execute_plan(&pool, sid + 100, &[seat("S1", hall, "A1")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = execute_plan(&pool, sid, &[]).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_commits_for_one_seat_have_one_winner() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1", "S2"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;

    let plan_one = [seat("S1", hall, "A1")];
    let plan_two = [seat("S2", hall, "A1")];
    let (one, two) = tokio::join!(
        execute_plan(&pool, sid, &plan_one),
        execute_plan(&pool, sid, &plan_two),
    );

    let outcomes = [one, two];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one commit should win: {outcomes:?}");
    let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), "seat_already_occupied");

    let seats = registry::list_occupied_seats(&pool, sid, hall).await.unwrap();
    assert_eq!(seats, ["A1"]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn seat_taken_by_a_row_inserted_mid_commit_rolls_back() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5], &["S1", "S2"]).await;
    let sid = fx.schedule.schedule_id;
    let hall = fx.halls[0].hall_id;
    let extra = unregistered_students(&pool, &["S3"]).await;
    let before = rows(&pool, sid).await;

    // A fresh row is not covered by the schedule lock, so the commit below
    // only learns about it from the unique seat index.
    let mut rival = pool.begin().await.unwrap();
    allocations::insert_registrations(&mut *rival, sid, &extra)
        .await
        .unwrap();
    allocations::assign_seat(&mut *rival, sid, "S3", hall, "A1")
        .await
        .unwrap();

    let commit = {
        let pool = pool.clone();
        let plan = [seat("S2", hall, "B1"), seat("S1", hall, "A1")];
        tokio::spawn(async move { execute_plan(&pool, sid, &plan).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    rival.commit().await.unwrap();

    match commit.await.unwrap().unwrap_err() {
        AllocationError::SeatAlreadyOccupied {
            hall_id,
            seat,
            student_id,
            occupant,
        } => {
            assert_eq!((hall_id, seat.as_str(), student_id.as_str()), (hall, "A1", "S1"));
            assert_eq!(occupant, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // S2's write to B1 went with the rollback.
    let after: Vec<Allocation> = rows(&pool, sid)
        .await
        .into_iter()
        .filter(|a| a.student_id != "S3")
        .collect();
    assert_eq!(after, before);

    pool.close().await;
    drop_test_db(&db_name).await;
}

/// Insert students that are not yet registered anywhere.
async fn unregistered_students(pool: &PgPool, students: &[&str]) -> Vec<String> {
    for id in students {
        let roll_no = format!("late-{id}");
        let new = NewStudent {
            student_id: id,
            roll_no: &roll_no,
            name: id,
            student_class: "X",
        };
        insert_student(pool, &new).await.expect("insert student");
    }
    ids(students)
}

#[tokio::test]
async fn reassign_moves_one_allocation() {
    let (pool, db_name) = create_test_db().await;
    let fx = registered(&pool, &[5, 5], &["X", "Y"]).await;
    let sid = fx.schedule.schedule_id;
    let (h1, h2) = (fx.halls[0].hall_id, fx.halls[1].hall_id);

    execute_plan(&pool, sid, &[seat("X", h1, "A1"), seat("Y", h1, "A2")])
        .await
        .unwrap();
    let before = rows(&pool, sid).await;
    let y = before.iter().find(|a| a.student_id == "Y").unwrap().clone();

    let err = reassign_seat(&pool, y.allocation_id, h1, &SeatLabel::parse("A1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "seat_already_occupied");
    assert_eq!(rows(&pool, sid).await, before);

    // Keeping the same seat is allowed.
    reassign_seat(&pool, y.allocation_id, h1, &SeatLabel::parse("A2").unwrap())
        .await
        .expect("same seat");

    let moved = reassign_seat(&pool, y.allocation_id, h2, &SeatLabel::parse("A1").unwrap())
        .await
        .expect("move to other hall");
    assert_eq!(moved.seat(), Some((h2, "A1")));
    assert!(moved.updated_at >= y.updated_at);

    let err = reassign_seat(&pool, y.allocation_id + 100, h2, &SeatLabel::parse("B1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("allocation not found: {}", y.allocation_id + 100));

    let err = reassign_seat(&pool, y.allocation_id, h2 + 100, &SeatLabel::parse("B1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("hall not found: {}", h2 + 100));

    pool.close().await;
    drop_test_db(&db_name).await;
}
