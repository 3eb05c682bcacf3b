//! crates/talenthub_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The lifecycle status of a session. A session starts `Active` and moves to
/// `Closed` once a report has been generated for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed,
}

impl SessionStatus {
    /// The string code stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }

    /// Parses a stored status code. Unknown codes fall back to `Active`.
    pub fn from_str_or_active(s: &str) -> Self {
        match s {
            "closed" => SessionStatus::Closed,
            _ => SessionStatus::Active,
        }
    }
}

/// One instance of the classroom activity, identified by a short join code.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Six uppercase alphanumeric characters. Stored uppercase; lookups
    /// normalize the incoming code first.
    pub join_code: String,
    pub title: Option<String>,
    pub status: SessionStatus,
    pub cycle_id: Uuid,
    /// Present once a report has been generated. Overwritten on regeneration.
    pub report: Option<ReportDocument>,
}

/// A curriculum cycle (course of study). Read-only reference data.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub id: Uuid,
    pub name: String,
}

/// A participant. One row is created per join submission; repeated joins by
/// the same person create new rows.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
}

/// The three free-text answers collected by the join form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answers {
    pub achievement: String,
    pub skill: String,
    pub lesson: String,
}

/// One participant's three-answer submission tied to a session. Immutable
/// once created.
#[derive(Debug, Clone)]
pub struct StudentResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub answers: Answers,
    pub created_at: DateTime<Utc>,
}

/// A curriculum fragment returned by the similarity search, ranked by the
/// backend.
#[derive(Debug, Clone)]
pub struct CurriculumMatch {
    pub id: Uuid,
    pub item_type: String,
    pub description: String,
    pub similarity: f64,
}

/// The persisted AI-generated summary attached to a session.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub markdown: String,
    pub generated_at: DateTime<Utc>,
}
