//! `hallpass serve`: the REST API behind the admin console and the scanner.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use hallpass_core::catalog::{
    self, ExaminationInput, HallInput, ScheduleInput, StudentInput, SubjectInput,
};
use hallpass_core::plan::{self, PlanVerdict};
use hallpass_core::proposer::{self, TextGenerator};
use hallpass_core::{AllocationError, SeatLabel, registry, scan, ticket};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// `None` when no proposer command is configured.
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub proposal_timeout: Duration,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

fn status_for(err: &AllocationError) -> StatusCode {
    match err {
        AllocationError::MalformedPlanItem { .. }
        | AllocationError::DuplicateSeatInPlan { .. }
        | AllocationError::DuplicateStudentInPlan { .. }
        | AllocationError::InvalidInput(_)
        | AllocationError::InvalidScanPayload(_) => StatusCode::BAD_REQUEST,
        AllocationError::NotFound { .. } | AllocationError::AllocationNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        AllocationError::SeatAlreadyOccupied { .. }
        | AllocationError::DuplicateRegistration { .. }
        | AllocationError::AlreadyExists { .. } => StatusCode::CONFLICT,
        AllocationError::ProposalUnparseable(_) | AllocationError::ProposalFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        AllocationError::ProposalTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AllocationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::warn!(kind = err.kind(), error = %format!("{err:#}"), "request failed");
        }
        let message = match &err {
            AllocationError::Internal(inner) => format!("{inner:#}"),
            other => other.to_string(),
        };
        Self {
            status,
            kind: err.kind(),
            message,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_input",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, AppError>;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub schedule_id: i32,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub schedule_id: i32,
    /// Free-text instructions for the proposer.
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub schedule_id: i32,
    pub plan: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub hall_id: i32,
    /// String or number, normalized like a plan item's seat.
    #[serde(default)]
    pub seat_number: Value,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub decoded_text: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard-data", get(dashboard_data))
        .route("/api/students", post(create_student))
        .route("/api/subjects", post(create_subject))
        .route("/api/halls", post(create_hall))
        .route("/api/examinations", post(create_examination))
        .route("/api/exam-schedule", post(create_schedule))
        .route("/api/student/{student_id}/allocations", get(student_allocations))
        .route("/api/register-students", post(register_students))
        .route("/api/schedules/{schedule_id}/unallocated", get(unallocated))
        .route(
            "/api/schedules/{schedule_id}/occupied-seats",
            get(schedule_occupancy),
        )
        .route(
            "/api/schedules/{schedule_id}/halls/{hall_id}/occupied-seats",
            get(occupied_seats),
        )
        .route("/api/generate-allocation-plan", post(generate_plan))
        .route("/api/validate-allocation-plan", post(validate_plan))
        .route("/api/execute-allocation-plan", post(execute_plan))
        .route(
            "/api/allocations/{allocation_id}",
            put(reassign_allocation).delete(remove_allocation),
        )
        .route("/api/hallticket/{student_id}", get(hall_ticket))
        .route("/api/scan", post(scan_ticket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Serve until `cancel` fires.
pub async fn run_serve(state: AppState, bind: &str, port: u16, cancel: CancellationToken) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("hallpass serve listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;
    tracing::info!("hallpass serve shut down");
    Ok(())
}

/// Cancel `cancel` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                cancel.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "failed to listen for Ctrl-C"),
        }
    });
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn dashboard_data(State(state): State<AppState>) -> ApiResult {
    let snapshot = catalog::dashboard(&state.pool).await?;
    Ok(Json(snapshot).into_response())
}

async fn create_student(
    State(state): State<AppState>,
    body: Result<Json<StudentInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body?;
    let student = catalog::create_student(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(student)).into_response())
}

async fn create_subject(
    State(state): State<AppState>,
    body: Result<Json<SubjectInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body?;
    let subject = catalog::create_subject(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(subject)).into_response())
}

async fn create_hall(
    State(state): State<AppState>,
    body: Result<Json<HallInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body?;
    let hall = catalog::create_hall(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(hall)).into_response())
}

async fn create_examination(
    State(state): State<AppState>,
    body: Result<Json<ExaminationInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body?;
    let exam = catalog::create_examination(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(exam)).into_response())
}

async fn create_schedule(
    State(state): State<AppState>,
    body: Result<Json<ScheduleInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = body?;
    let schedule = catalog::create_schedule(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(schedule)).into_response())
}

async fn student_allocations(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult {
    let rows = ticket::student_allocations(&state.pool, &student_id).await?;
    Ok(Json(rows).into_response())
}

async fn register_students(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let report = registry::register_students(&state.pool, req.schedule_id, &req.student_ids).await?;
    let body = json!({
        "message": format!("Registered {} students.", report.count()),
        "schedule_id": report.schedule_id,
        "registered": report.registered,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn unallocated(State(state): State<AppState>, Path(schedule_id): Path<i32>) -> ApiResult {
    let students = registry::list_unallocated(&state.pool, schedule_id).await?;
    Ok(Json(students).into_response())
}

async fn occupied_seats(
    State(state): State<AppState>,
    Path((schedule_id, hall_id)): Path<(i32, i32)>,
) -> ApiResult {
    let seats = registry::list_occupied_seats(&state.pool, schedule_id, hall_id).await?;
    Ok(Json(seats).into_response())
}

async fn schedule_occupancy(
    State(state): State<AppState>,
    Path(schedule_id): Path<i32>,
) -> ApiResult {
    let seats = registry::list_schedule_occupancy(&state.pool, schedule_id).await?;
    Ok(Json(seats).into_response())
}

async fn generate_plan(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let Some(generator) = state.generator.as_deref() else {
        return Err(AllocationError::ProposalFailed(
            "no proposer command is configured".to_owned(),
        )
        .into());
    };
    let review = proposer::propose_plan(
        &state.pool,
        generator,
        req.schedule_id,
        &req.prompt,
        state.proposal_timeout,
    )
    .await?;
    Ok(Json(review).into_response())
}

async fn validate_plan(
    State(state): State<AppState>,
    body: Result<Json<PlanRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let result = plan::validate_plan(&state.pool, req.schedule_id, &req.plan).await;
    let verdict = PlanVerdict::from_result(&result);
    match result {
        Ok(items) => Ok(Json(json!({ "validation": verdict, "plan": items })).into_response()),
        Err(err) => Err(err.into()),
    }
}

async fn execute_plan(
    State(state): State<AppState>,
    body: Result<Json<PlanRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let report = plan::execute_plan(&state.pool, req.schedule_id, &req.plan).await?;
    let body = json!({
        "message": format!("Allocated seats for {} students.", report.updated_count),
        "schedule_id": report.schedule_id,
        "updated_count": report.updated_count,
    });
    Ok(Json(body).into_response())
}

async fn reassign_allocation(
    State(state): State<AppState>,
    Path(allocation_id): Path<i32>,
    body: Result<Json<ReassignRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let seat = SeatLabel::from_json(&req.seat_number)
        .map_err(|err| AllocationError::InvalidInput(err.to_string()))?;
    let allocation = plan::reassign_seat(&state.pool, allocation_id, req.hall_id, &seat).await?;
    Ok(Json(allocation).into_response())
}

async fn remove_allocation(
    State(state): State<AppState>,
    Path(allocation_id): Path<i32>,
) -> ApiResult {
    registry::remove_allocation(&state.pool, allocation_id).await?;
    Ok(Json(json!({ "message": "Student removed from schedule." })).into_response())
}

async fn hall_ticket(State(state): State<AppState>, Path(student_id): Path<String>) -> ApiResult {
    let ticket = ticket::hall_ticket(&state.pool, &student_id).await?;
    Ok(Json(ticket).into_response())
}

async fn scan_ticket(
    State(state): State<AppState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let ticket = scan::scan_hall_ticket(&state.pool, &req.decoded_text).await?;
    Ok(Json(ticket).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use tower::ServiceExt;

    use hallpass_core::proposer::TextGenerator;
    use hallpass_test_utils::{create_test_db, drop_test_db, seed_schedule};

    use super::AppState;

    struct CannedGenerator(String);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    fn state(pool: PgPool, generator: Option<Arc<dyn TextGenerator>>) -> AppState {
        AppState {
            pool,
            generator,
            proposal_timeout: Duration::from_secs(5),
        }
    }

    async fn send(
        state: AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let app = super::build_router(state);
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        app.oneshot(request).await.unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_reports_ok() {
        let (pool, db_name) = create_test_db().await;

        let resp = send(state(pool.clone(), None), Method::GET, "/health", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "status": "ok" }));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn dashboard_starts_empty() {
        let (pool, db_name) = create_test_db().await;

        let resp = send(state(pool.clone(), None), Method::GET, "/api/dashboard-data", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let tables = ["students", "subjects", "exam_halls", "examinations", "schedules", "allocations"];
        for table in tables {
            assert_eq!(json[table], json!([]), "{table} should be empty");
        }

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn catalog_create_and_conflict() {
        let (pool, db_name) = create_test_db().await;
        let app_state = state(pool.clone(), None);

        let student = json!({
            "student_id": "21CS042",
            "roll_no": "R-042",
            "name": "Asha Rao",
            "student_class": "CSE-B",
        });
        let resp = send(app_state.clone(), Method::POST, "/api/students", Some(student.clone())).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await["student_id"], "21CS042");

        let resp = send(app_state.clone(), Method::POST, "/api/students", Some(student)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "already_exists");

        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/halls",
            Some(json!({ "hall_name": "Annex", "capacity": 0 })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "invalid_input");

        let resp = send(
            app_state,
            Method::POST,
            "/api/exam-schedule",
            Some(json!({
                "exam_id": 999,
                "subject_id": 1,
                "exam_date": "2025-11-03",
                "start_time": "09:30:00",
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request_with_kind() {
        let (pool, db_name) = create_test_db().await;

        let resp = send(
            state(pool.clone(), None),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": "one" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["kind"], "invalid_input");
        assert!(json["error"].is_string());

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn register_validate_execute_and_ticket() {
        let (pool, db_name) = create_test_db().await;
        let fixture = seed_schedule(&pool, &[30], &["S1", "S2"]).await;
        let schedule_id = fixture.schedule.schedule_id;
        let hall_id = fixture.halls[0].hall_id;
        let app_state = state(pool.clone(), None);

        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": schedule_id, "student_ids": ["S1", "S2"] })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await["registered"].as_array().unwrap().len(), 2);

        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": schedule_id, "student_ids": ["S2"] })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "duplicate_registration");

        let uri = format!("/api/schedules/{schedule_id}/unallocated");
        let resp = send(app_state.clone(), Method::GET, &uri, None).await;
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 2);

        let plan = json!([
            { "student_id": "S1", "hall_id": hall_id, "seat_number": "A1" },
            { "student_id": "S2", "hall_id": hall_id, "seat_number": 7 },
        ]);
        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/validate-allocation-plan",
            Some(json!({ "schedule_id": schedule_id, "plan": plan })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["validation"]["valid"], true);
        assert_eq!(json["plan"][1]["seat_number"], "7");

        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/execute-allocation-plan",
            Some(json!({ "schedule_id": schedule_id, "plan": plan })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["updated_count"], 2);

        let uri = format!("/api/schedules/{schedule_id}/halls/{hall_id}/occupied-seats");
        let resp = send(app_state.clone(), Method::GET, &uri, None).await;
        assert_eq!(body_json(resp).await, json!(["7", "A1"]));

        let uri = format!("/api/schedules/{schedule_id}/occupied-seats");
        let resp = send(app_state.clone(), Method::GET, &uri, None).await;
        let json = body_json(resp).await;
        assert_eq!(json[0]["student_id"], "S2");
        assert_eq!(json[1]["hall_id"], hall_id);

        let resp = send(app_state.clone(), Method::GET, "/api/hallticket/S1", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["studentDetails"]["name"], "Student S1");
        assert!(json.get("student_details").is_none());
        assert_eq!(json["examinations"][0]["subjects"][0]["seat"], "A1");

        let resp = send(app_state.clone(), Method::GET, "/api/student/S2/allocations", None).await;
        assert_eq!(body_json(resp).await[0]["seat_number"], "7");

        let resp = send(
            app_state,
            Method::POST,
            "/api/scan",
            Some(json!({ "decoded_text": "https://exams.test/ticket?RegisterNo=S2" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["student_id"], "S2");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn conflicting_plan_is_rejected_with_409() {
        let (pool, db_name) = create_test_db().await;
        let fixture = seed_schedule(&pool, &[30], &["X", "Y"]).await;
        let schedule_id = fixture.schedule.schedule_id;
        let hall_id = fixture.halls[0].hall_id;
        let app_state = state(pool.clone(), None);

        send(
            app_state.clone(),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": schedule_id, "student_ids": ["X", "Y"] })),
        )
        .await;
        send(
            app_state.clone(),
            Method::POST,
            "/api/execute-allocation-plan",
            Some(json!({
                "schedule_id": schedule_id,
                "plan": [{ "student_id": "X", "hall_id": hall_id, "seat_number": "A1" }],
            })),
        )
        .await;

        let take_a1 = json!({
            "schedule_id": schedule_id,
            "plan": [{ "student_id": "Y", "hall_id": hall_id, "seat_number": "A1" }],
        });
        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/validate-allocation-plan",
            Some(take_a1.clone()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = send(app_state, Method::POST, "/api/execute-allocation-plan", Some(take_a1)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert_eq!(json["kind"], "seat_already_occupied");
        assert!(json["error"].as_str().unwrap().contains("\"X\""));

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn reassign_and_remove() {
        let (pool, db_name) = create_test_db().await;
        let fixture = seed_schedule(&pool, &[30, 20], &["S1"]).await;
        let schedule_id = fixture.schedule.schedule_id;
        let app_state = state(pool.clone(), None);

        let resp = send(
            app_state.clone(),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": schedule_id, "student_ids": ["S1"] })),
        )
        .await;
        let allocation_id = body_json(resp).await["registered"][0]["allocation_id"]
            .as_i64()
            .unwrap();

        let uri = format!("/api/allocations/{allocation_id}");
        let resp = send(
            app_state.clone(),
            Method::PUT,
            &uri,
            Some(json!({ "hall_id": fixture.halls[1].hall_id, "seat_number": " B4 " })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["seat_number"], "B4");
        assert_eq!(json["hall_id"], fixture.halls[1].hall_id);

        let resp = send(
            app_state.clone(),
            Method::PUT,
            &uri,
            Some(json!({ "hall_id": fixture.halls[1].hall_id, "seat_number": "" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(app_state.clone(), Method::DELETE, &uri, None).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(app_state, Method::DELETE, &uri, None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn generate_returns_plan_with_verdict() {
        let (pool, db_name) = create_test_db().await;
        let fixture = seed_schedule(&pool, &[30], &["S1"]).await;
        let schedule_id = fixture.schedule.schedule_id;
        let hall_id = fixture.halls[0].hall_id;

        let no_generator = state(pool.clone(), None);
        send(
            no_generator.clone(),
            Method::POST,
            "/api/register-students",
            Some(json!({ "schedule_id": schedule_id, "student_ids": ["S1"] })),
        )
        .await;

        let request = json!({ "schedule_id": schedule_id, "prompt": "front rows first" });
        let resp = send(
            no_generator,
            Method::POST,
            "/api/generate-allocation-plan",
            Some(request.clone()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let reply = format!(
            "```json\n{{\"reasoning\": \"front row\", \"plan\": [{{\"student_id\": \"S1\", \"hall_id\": {hall_id}, \"seat_number\": \"A1\"}}]}}\n```"
        );
        let generator: Arc<dyn TextGenerator> = Arc::new(CannedGenerator(reply));
        let resp = send(
            state(pool.clone(), Some(generator)),
            Method::POST,
            "/api/generate-allocation-plan",
            Some(request.clone()),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["reasoning"], "front row");
        assert_eq!(json["validation"]["valid"], true);
        assert_eq!(json["plan"][0]["seat_number"], "A1");

        let garbage: Arc<dyn TextGenerator> = Arc::new(CannedGenerator("no idea".to_owned()));
        let resp = send(
            state(pool.clone(), Some(garbage)),
            Method::POST,
            "/api/generate-allocation-plan",
            Some(request),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(resp).await["kind"], "proposal_unparseable");

        pool.close().await;
        drop_test_db(&db_name).await;
    }

    #[tokio::test]
    async fn unknown_ticket_and_bad_scan() {
        let (pool, db_name) = create_test_db().await;
        let app_state = state(pool.clone(), None);

        let resp = send(app_state.clone(), Method::GET, "/api/hallticket/NOBODY", None).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(
            app_state,
            Method::POST,
            "/api/scan",
            Some(json!({ "decoded_text": "21CS042" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "invalid_scan_payload");

        pool.close().await;
        drop_test_db(&db_name).await;
    }
}
