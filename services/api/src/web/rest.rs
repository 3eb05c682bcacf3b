//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::codes::{generate_join_code, normalize_join_code};
use crate::web::feed::ResponseEvent;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use talenthub_core::domain::{Answers, Cycle, Session, StudentResponse};
use talenthub_core::ports::PortError;
use talenthub_core::report::generate_session_report;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_cycles_handler,
        list_sessions_handler,
        create_session_handler,
        get_session_handler,
        list_responses_handler,
        session_report_handler,
        verify_join_handler,
        submit_join_handler,
        analyze_handler,
    ),
    components(
        schemas(
            ErrorBody,
            CyclePayload,
            SessionPayload,
            CreateSessionRequest,
            AnswersPayload,
            ResponsePayload,
            JoinSubmission,
            JoinSessionPayload,
            ReportPayload,
            ReportViewPayload,
            AnalyzeRequest,
            AnalyzeResponsePayload,
            AnalyzeResult,
        )
    ),
    tags(
        (name = "TalentHub API", description = "API endpoints for the classroom engagement tool.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// The tuple every handler uses to signal a failure.
pub type ErrorResponse = (StatusCode, Json<ErrorBody>);

fn reject(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn port_error_response(e: PortError) -> ErrorResponse {
    match e {
        PortError::NotFound(msg) => reject(StatusCode::NOT_FOUND, msg),
        PortError::Invalid(msg) => reject(StatusCode::BAD_REQUEST, msg),
        PortError::Unexpected(msg) => {
            error!("Unexpected port error: {}", msg);
            reject(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

/// A curriculum cycle, for the session-creation form.
#[derive(Serialize, ToSchema)]
pub struct CyclePayload {
    pub id: Uuid,
    pub name: String,
}

impl From<Cycle> for CyclePayload {
    fn from(cycle: Cycle) -> Self {
        Self {
            id: cycle.id,
            name: cycle.name,
        }
    }
}

/// A session as shown on the teacher dashboard.
#[derive(Serialize, ToSchema)]
pub struct SessionPayload {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub join_code: String,
    pub title: Option<String>,
    pub status: String,
    pub cycle_id: Uuid,
    pub cycle_name: String,
    pub has_report: bool,
}

impl SessionPayload {
    fn from_session(session: Session, cycle_name: String) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            join_code: session.join_code,
            title: session.title,
            status: session.status.as_str().to_string(),
            cycle_id: session.cycle_id,
            cycle_name,
            has_report: session.report.is_some(),
        }
    }
}

/// The payload sent to create a new session.
#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub title: String,
    pub cycle_id: Uuid,
}

/// The three free-text answers of one submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswersPayload {
    pub achievement: String,
    pub skill: String,
    pub lesson: String,
}

impl AnswersPayload {
    fn to_domain(&self) -> Answers {
        Answers {
            achievement: self.achievement.trim().to_string(),
            skill: self.skill.trim().to_string(),
            lesson: self.lesson.trim().to_string(),
        }
    }
}

impl From<Answers> for AnswersPayload {
    fn from(answers: Answers) -> Self {
        Self {
            achievement: answers.achievement,
            skill: answers.skill,
            lesson: answers.lesson,
        }
    }
}

/// One submitted response, as shown in the dashboard feed.
#[derive(Serialize, ToSchema)]
pub struct ResponsePayload {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_name: String,
    pub answers: AnswersPayload,
    pub created_at: DateTime<Utc>,
}

impl From<StudentResponse> for ResponsePayload {
    fn from(response: StudentResponse) -> Self {
        Self {
            id: response.id,
            session_id: response.session_id,
            student_name: response.student_name,
            answers: response.answers.into(),
            created_at: response.created_at,
        }
    }
}

/// The join form submission: a code, a display name and three answers.
#[derive(Deserialize, ToSchema)]
pub struct JoinSubmission {
    pub code: String,
    pub full_name: String,
    pub answers: AnswersPayload,
}

/// What a student sees after their join code is verified.
#[derive(Serialize, ToSchema)]
pub struct JoinSessionPayload {
    pub session_id: Uuid,
    pub title: Option<String>,
    pub status: String,
}

/// The persisted report document.
#[derive(Serialize, ToSchema)]
pub struct ReportPayload {
    pub markdown: String,
    pub generated_at: DateTime<Utc>,
}

/// The report viewer payload. `report` is null until one has been generated.
#[derive(Serialize, ToSchema)]
pub struct ReportViewPayload {
    pub session_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cycle_name: String,
    pub report: Option<ReportPayload>,
}

/// One response in the analyze request body.
#[derive(Deserialize, ToSchema)]
pub struct AnalyzeResponsePayload {
    pub answers: AnswersPayload,
}

/// The analyze request. Every field is required; absence is a client error
/// rather than a deserialization failure.
#[derive(Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub session_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
    pub responses: Option<Vec<AnalyzeResponsePayload>>,
}

/// The analyze response: the generated report text.
#[derive(Serialize, ToSchema)]
pub struct AnalyzeResult {
    pub analysis: String,
}

//=========================================================================================
// Reference Data and Dashboard Handlers
//=========================================================================================

/// List all curriculum cycles.
#[utoipa::path(
    get,
    path = "/api/cycles",
    responses(
        (status = 200, description = "All cycles", body = [CyclePayload]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_cycles_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<CyclePayload>>, ErrorResponse> {
    let cycles = app_state
        .store
        .list_cycles()
        .await
        .map_err(port_error_response)?;
    Ok(Json(cycles.into_iter().map(CyclePayload::from).collect()))
}

/// List all sessions, most recently created first.
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "All sessions, newest first", body = [SessionPayload]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionPayload>>, ErrorResponse> {
    let sessions = app_state
        .store
        .list_sessions()
        .await
        .map_err(port_error_response)?;
    let cycle_names: HashMap<Uuid, String> = app_state
        .store
        .list_cycles()
        .await
        .map_err(port_error_response)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let payloads = sessions
        .into_iter()
        .map(|s| {
            let name = cycle_names.get(&s.cycle_id).cloned().unwrap_or_default();
            SessionPayload::from_session(s, name)
        })
        .collect();
    Ok(Json(payloads))
}

/// Create a new session with a freshly drawn join code.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionPayload),
        (status = 400, description = "Missing title", body = ErrorBody),
        (status = 404, description = "Unknown cycle", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionPayload>), ErrorResponse> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "A session title is required"));
    }

    let cycle = app_state
        .store
        .get_cycle(body.cycle_id)
        .await
        .map_err(port_error_response)?;

    let join_code = generate_join_code();
    let session = app_state
        .store
        .create_session(cycle.id, title, &join_code)
        .await
        .map_err(port_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionPayload::from_session(session, cycle.name)),
    ))
}

/// Fetch a single session.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "The session id")),
    responses(
        (status = 200, description = "The session", body = SessionPayload),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionPayload>, ErrorResponse> {
    let session = app_state
        .store
        .get_session(id)
        .await
        .map_err(port_error_response)?;
    let cycle = app_state
        .store
        .get_cycle(session.cycle_id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SessionPayload::from_session(session, cycle.name)))
}

/// List a session's responses in submission order.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/responses",
    params(("id" = Uuid, Path, description = "The session id")),
    responses(
        (status = 200, description = "Responses in submission order", body = [ResponsePayload]),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_responses_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResponsePayload>>, ErrorResponse> {
    // Resolve the session first so an unknown id is a 404, not an empty list.
    app_state
        .store
        .get_session(id)
        .await
        .map_err(port_error_response)?;
    let responses = app_state
        .store
        .list_responses(id)
        .await
        .map_err(port_error_response)?;
    Ok(Json(
        responses.into_iter().map(ResponsePayload::from).collect(),
    ))
}

/// Fetch the report viewer payload for a session.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/report",
    params(("id" = Uuid, Path, description = "The session id")),
    responses(
        (status = 200, description = "The session's report view; report is null when not yet generated", body = ReportViewPayload),
        (status = 404, description = "Unknown session", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn session_report_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportViewPayload>, ErrorResponse> {
    let session = app_state
        .store
        .get_session(id)
        .await
        .map_err(port_error_response)?;
    let cycle = app_state
        .store
        .get_cycle(session.cycle_id)
        .await
        .map_err(port_error_response)?;

    Ok(Json(ReportViewPayload {
        session_id: session.id,
        title: session.title,
        created_at: session.created_at,
        cycle_name: cycle.name,
        report: session.report.map(|r| ReportPayload {
            markdown: r.markdown,
            generated_at: r.generated_at,
        }),
    }))
}

//=========================================================================================
// Join Flow Handlers
//=========================================================================================

/// Verify a join code. Phase one of the join flow: nothing is created.
#[utoipa::path(
    get,
    path = "/api/join/{code}",
    params(("code" = String, Path, description = "The join code entered by the student")),
    responses(
        (status = 200, description = "The code resolves to a session", body = JoinSessionPayload),
        (status = 404, description = "Unknown join code", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn verify_join_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<JoinSessionPayload>, ErrorResponse> {
    let code = normalize_join_code(&code);
    let session = app_state
        .store
        .find_session_by_code(&code)
        .await
        .map_err(port_error_response)?;

    Ok(Json(JoinSessionPayload {
        session_id: session.id,
        title: session.title,
        status: session.status.as_str().to_string(),
    }))
}

/// Submit the join form. Creates one student row and one response row, then
/// publishes the new response to the live feed. Resubmission creates duplicates.
#[utoipa::path(
    post,
    path = "/api/join",
    request_body = JoinSubmission,
    responses(
        (status = 201, description = "Response recorded", body = ResponsePayload),
        (status = 400, description = "A required field is blank", body = ErrorBody),
        (status = 404, description = "Unknown join code", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn submit_join_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<JoinSubmission>,
) -> Result<(StatusCode, Json<ResponsePayload>), ErrorResponse> {
    let code = normalize_join_code(&body.code);
    let full_name = body.full_name.trim();
    let answers = body.answers.to_domain();

    // Presence-only validation, checked before anything is written.
    if code.is_empty()
        || full_name.is_empty()
        || answers.achievement.is_empty()
        || answers.skill.is_empty()
        || answers.lesson.is_empty()
    {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "code, full_name and all three answers are required",
        ));
    }

    let session = app_state
        .store
        .find_session_by_code(&code)
        .await
        .map_err(port_error_response)?;

    let student = app_state
        .store
        .create_student(full_name)
        .await
        .map_err(port_error_response)?;
    let response = app_state
        .store
        .create_response(session.id, student.id, &answers)
        .await
        .map_err(port_error_response)?;

    app_state.feed.publish(ResponseEvent {
        id: response.id,
        session_id: response.session_id,
        student_name: response.student_name.clone(),
        answers: response.answers.clone().into(),
        created_at: response.created_at,
    });

    Ok((StatusCode::CREATED, Json(ResponsePayload::from(response))))
}

//=========================================================================================
// Report Generation Handler
//=========================================================================================

/// Generate a report for a session from a batch of responses.
///
/// Runs the whole pipeline: embed the combined answers, retrieve curriculum
/// fragments, prompt the model, persist the report. A persistence failure
/// after successful generation is logged and the text is still returned.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "The generated report text", body = AnalyzeResult),
        (status = 400, description = "Missing session_id, cycle_id or responses", body = ErrorBody),
        (status = 500, description = "A pipeline dependency failed", body = ErrorBody)
    )
)]
pub async fn analyze_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResult>, ErrorResponse> {
    let (session_id, cycle_id, responses) = match (body.session_id, body.cycle_id, body.responses) {
        (Some(session_id), Some(cycle_id), Some(responses)) if !responses.is_empty() => {
            (session_id, cycle_id, responses)
        }
        _ => {
            return Err(reject(
                StatusCode::BAD_REQUEST,
                "session_id, cycle_id and a non-empty responses list are required",
            ))
        }
    };

    let answers: Vec<Answers> = responses.iter().map(|r| r.answers.to_domain()).collect();

    let analysis = generate_session_report(
        app_state.store.as_ref(),
        app_state.embedder.as_ref(),
        app_state.curriculum.as_ref(),
        app_state.report_generator.as_ref(),
        session_id,
        cycle_id,
        &answers,
    )
    .await
    .map_err(|e| {
        if e.is_validation() {
            reject(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            error!("Report pipeline failed for session {}: {}", session_id, e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;

    Ok(Json(AnalyzeResult { analysis }))
}

//=========================================================================================
// Tests
//=========================================================================================
