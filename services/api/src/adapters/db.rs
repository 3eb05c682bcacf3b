//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionStore` and `CurriculumSearch` ports from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use talenthub_core::domain::{
    Answers, CurriculumMatch, Cycle, ReportDocument, Session, SessionStatus, Student,
    StudentResponse,
};
use talenthub_core::ports::{CurriculumSearch, PortError, PortResult, SessionStore};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionStore` and `CurriculumSearch` ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Renders an embedding as the pgvector text literal, e.g. `[0.1,0.2,0.3]`,
/// for binding through a `$n::vector` cast.
fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Serializes a report document into the `ai_report` jsonb column shape.
fn report_to_json(report: &ReportDocument) -> serde_json::Value {
    serde_json::json!({
        "markdown": report.markdown,
        "generated_at": report.generated_at.to_rfc3339(),
    })
}

/// Parses the `ai_report` jsonb column back into a domain document. Malformed
/// payloads are treated as no report.
fn report_from_json(value: &serde_json::Value) -> Option<ReportDocument> {
    let markdown = value.get("markdown")?.as_str()?.to_string();
    let generated_at = value
        .get("generated_at")?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))?;
    Some(ReportDocument {
        markdown,
        generated_at,
    })
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    join_code: String,
    title: Option<String>,
    status: String,
    cycle_id: Uuid,
    ai_report: Option<serde_json::Value>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            created_at: self.created_at,
            join_code: self.join_code,
            title: self.title,
            status: SessionStatus::from_str_or_active(&self.status),
            cycle_id: self.cycle_id,
            report: self.ai_report.as_ref().and_then(report_from_json),
        }
    }
}

const SESSION_COLUMNS: &str = "id, created_at, join_code, title, status, cycle_id, ai_report";

#[derive(FromRow)]
struct CycleRecord {
    id: Uuid,
    name: String,
}
impl CycleRecord {
    fn to_domain(self) -> Cycle {
        Cycle {
            id: self.id,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct StudentRecord {
    id: Uuid,
    full_name: String,
}
impl StudentRecord {
    fn to_domain(self) -> Student {
        Student {
            id: self.id,
            full_name: self.full_name,
        }
    }
}

#[derive(FromRow)]
struct ResponseRecord {
    id: Uuid,
    session_id: Uuid,
    student_id: Uuid,
    full_name: String,
    answers: serde_json::Value,
    created_at: DateTime<Utc>,
}
impl ResponseRecord {
    fn to_domain(self) -> StudentResponse {
        let answers = Answers {
            achievement: json_str(&self.answers, "achievement"),
            skill: json_str(&self.answers, "skill"),
            lesson: json_str(&self.answers, "lesson"),
        };
        StudentResponse {
            id: self.id,
            session_id: self.session_id,
            student_id: self.student_id,
            student_name: self.full_name,
            answers,
            created_at: self.created_at,
        }
    }
}

fn json_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn answers_to_json(answers: &Answers) -> serde_json::Value {
    serde_json::json!({
        "achievement": answers.achievement,
        "skill": answers.skill,
        "lesson": answers.lesson,
    })
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for PgStore {
    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_session(
        &self,
        cycle_id: Uuid,
        title: &str,
        join_code: &str,
    ) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, cycle_id, title, join_code, status) \
             VALUES ($1, $2, $3, $4, 'active') RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(cycle_id)
        .bind(title)
        .bind(join_code)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Session {} not found", session_id))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn find_session_by_code(&self, code: &str) -> PortResult<Session> {
        // Codes are stored uppercase and callers normalize first, so an exact
        // match is a case-insensitive lookup.
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE join_code = $1"
        ))
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("No session with join code {}", code))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn list_cycles(&self) -> PortResult<Vec<Cycle>> {
        let records =
            sqlx::query_as::<_, CycleRecord>("SELECT id, name FROM cycles ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_cycle(&self, cycle_id: Uuid) -> PortResult<Cycle> {
        let record = sqlx::query_as::<_, CycleRecord>("SELECT id, name FROM cycles WHERE id = $1")
            .bind(cycle_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Cycle {} not found", cycle_id))
                }
                _ => unexpected(e),
            })?;

        Ok(record.to_domain())
    }

    async fn create_student(&self, full_name: &str) -> PortResult<Student> {
        let record = sqlx::query_as::<_, StudentRecord>(
            "INSERT INTO students (id, full_name) VALUES ($1, $2) RETURNING id, full_name",
        )
        .bind(Uuid::new_v4())
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn create_response(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        answers: &Answers,
    ) -> PortResult<StudentResponse> {
        let record = sqlx::query_as::<_, ResponseRecord>(
            "WITH inserted AS ( \
                INSERT INTO responses (id, session_id, student_id, answers) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, session_id, student_id, answers, created_at \
             ) \
             SELECT i.id, i.session_id, i.student_id, s.full_name, i.answers, i.created_at \
             FROM inserted i JOIN students s ON s.id = i.student_id",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(student_id)
        .bind(answers_to_json(answers))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn list_responses(&self, session_id: Uuid) -> PortResult<Vec<StudentResponse>> {
        let records = sqlx::query_as::<_, ResponseRecord>(
            "SELECT r.id, r.session_id, r.student_id, s.full_name, r.answers, r.created_at \
             FROM responses r JOIN students s ON s.id = r.student_id \
             WHERE r.session_id = $1 ORDER BY r.created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_report(&self, session_id: Uuid, report: &ReportDocument) -> PortResult<()> {
        // Unconditional: an existing report is overwritten, last write wins.
        sqlx::query("UPDATE sessions SET ai_report = $1, status = 'closed' WHERE id = $2")
            .bind(report_to_json(report))
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(())
    }
}

//=========================================================================================
// `CurriculumSearch` Trait Implementation
//=========================================================================================

#[derive(FromRow)]
struct MatchRecord {
    id: Uuid,
    item_type: String,
    description: String,
    similarity: f64,
}

#[async_trait]
impl CurriculumSearch for PgStore {
    async fn match_items(
        &self,
        embedding: &[f32],
        threshold: f32,
        count: i32,
    ) -> PortResult<Vec<CurriculumMatch>> {
        let records = sqlx::query_as::<_, MatchRecord>(
            "SELECT id, item_type, description, similarity \
             FROM match_curriculum_items($1::vector, $2, $3)",
        )
        .bind(vector_literal(embedding))
        .bind(threshold as f64)
        .bind(count)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records
            .into_iter()
            .map(|r| CurriculumMatch {
                id: r.id,
                item_type: r.item_type,
                description: r.description,
                similarity: r.similarity,
            })
            .collect())
    }
}
