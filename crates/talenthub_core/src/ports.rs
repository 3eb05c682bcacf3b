//! crates/talenthub_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Answers, CurriculumMatch, Cycle, ReportDocument, Session, Student, StudentResponse,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SessionStore: Send + Sync {
    // --- Session Management ---

    /// Lists all sessions, most recently created first.
    async fn list_sessions(&self) -> PortResult<Vec<Session>>;

    /// Creates a session in the `active` state with the given join code.
    async fn create_session(
        &self,
        cycle_id: Uuid,
        title: &str,
        join_code: &str,
    ) -> PortResult<Session>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    /// Resolves a normalized (trimmed, uppercased) join code to its session.
    /// Returns `NotFound` for unknown codes; never creates anything.
    async fn find_session_by_code(&self, code: &str) -> PortResult<Session>;

    // --- Reference Data ---
    async fn list_cycles(&self) -> PortResult<Vec<Cycle>>;

    async fn get_cycle(&self, cycle_id: Uuid) -> PortResult<Cycle>;

    // --- Join Flow ---

    /// Creates a participant row. No deduplication: repeated joins create
    /// new rows.
    async fn create_student(&self, full_name: &str) -> PortResult<Student>;

    async fn create_response(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        answers: &Answers,
    ) -> PortResult<StudentResponse>;

    /// Responses for a session in submission order (oldest first).
    async fn list_responses(&self, session_id: Uuid) -> PortResult<Vec<StudentResponse>>;

    // --- Report Persistence ---

    /// Writes the report document onto the session row and marks the session
    /// `closed`. Unconditional: an existing report is overwritten.
    async fn save_report(&self, session_id: Uuid, report: &ReportDocument) -> PortResult<()>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Produces one semantic vector for the given text.
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

#[async_trait]
pub trait CurriculumSearch: Send + Sync {
    /// Returns curriculum fragments whose similarity to `embedding` passes
    /// `threshold`, at most `count` of them. Ranking is delegated to the
    /// search backend.
    async fn match_items(
        &self,
        embedding: &[f32],
        threshold: f32,
        count: i32,
    ) -> PortResult<Vec<CurriculumMatch>>;
}

#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generates unstructured text from a natural-language prompt.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}
