pub mod domain;
pub mod ports;
pub mod report;

pub use domain::{
    Answers, CurriculumMatch, Cycle, ReportDocument, Session, SessionStatus, Student,
    StudentResponse,
};
pub use ports::{
    CurriculumSearch, EmbeddingService, PortError, PortResult, ReportGenerator, SessionStore,
};
pub use report::{generate_session_report, ReportError, MATCH_COUNT, MATCH_THRESHOLD};
