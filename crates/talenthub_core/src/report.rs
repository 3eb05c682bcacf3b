//! crates/talenthub_core/src/report.rs
//!
//! The report-generation pipeline: turns a batch of student answers into a
//! persisted natural-language report by embedding the combined text, retrieving
//! the closest curriculum fragments, and prompting a text-generation model.
//!
//! The pipeline is written against the ports in [`crate::ports`], so it can be
//! exercised in tests without a database or any external API.

use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use crate::domain::{Answers, CurriculumMatch, ReportDocument};
use crate::ports::{CurriculumSearch, EmbeddingService, PortError, ReportGenerator, SessionStore};

/// Minimum similarity a curriculum fragment must reach to be retrieved.
pub const MATCH_THRESHOLD: f32 = 0.75;

/// Maximum number of curriculum fragments retrieved per report.
pub const MATCH_COUNT: i32 = 10;

//=========================================================================================
// Pipeline Error Type
//=========================================================================================

/// Errors that abort report generation. A persistence failure after successful
/// generation is deliberately absent: it is logged and the report is still
/// returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Cannot generate a report without any responses")]
    EmptyResponses,
    #[error("Embedding failed: {0}")]
    Embedding(PortError),
    #[error("Curriculum search failed: {0}")]
    Search(PortError),
    #[error("Report generation failed: {0}")]
    Generation(PortError),
}

impl ReportError {
    /// Whether the error was caused by invalid input rather than a dependency.
    pub fn is_validation(&self) -> bool {
        matches!(self, ReportError::EmptyResponses)
    }
}

//=========================================================================================
// Text Assembly
//=========================================================================================

/// Concatenates every response's three answers, in input order, into the single
/// text blob that gets embedded.
pub fn combined_answer_text(responses: &[Answers]) -> String {
    responses
        .iter()
        .map(|a| {
            format!(
                "Achievement: {}. Skill: {}. Lesson: {}.",
                a.achievement, a.skill, a.lesson
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the generation prompt. Deterministic for a given input: a fixed
/// pedagogy preamble, the retrieved fragments as a bulleted list, and the
/// responses rendered per-participant but anonymized (no names reach the
/// generation model).
pub fn build_prompt(cycle_id: Uuid, items: &[CurriculumMatch], responses: &[Answers]) -> String {
    let fragments = items
        .iter()
        .map(|item| format!("- ({}) {}", item.item_type, item.description))
        .collect::<Vec<_>>()
        .join("\n");

    let answers = responses
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "Student {}:\n- Achievement: {}\n- Skill: {}\n- Lesson: {}\n",
                i + 1,
                a.achievement,
                a.skill,
                a.lesson
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"**Role and Objective:**
You are an expert in vocational-training pedagogy and competency analysis. Your goal is to analyze the responses from a start-of-course icebreaker activity for a group of students. Provide the teacher with a concise, practical and optimistic report that helps them get to know the group and focus their classes.

**Course Context:**
- The analysis is for the training cycle with ID: {cycle_id}.
- Analyze the students' responses and relate them to the following key fragments of the official curriculum, which were identified as the most relevant to this conversation.

**Relevant Fragments of the Official Curriculum (Source of Truth):**
{fragments}

**Student Responses (Anonymous):**
{answers}

**Analysis Instructions and Output Format (use Markdown):**
Generate a report with a warm, motivating tone, structured EXACTLY in these sections:

### Group Summary
A short paragraph (3-4 lines) capturing the "personality" of the class. Are they creative, resourceful, technical? What energy do they give off?

### Key Competencies Detected
Use a bulleted list. For 3-4 transversal competencies (e.g. "Initiative and Leadership", "Autonomous Digital Learning", "Resilience and Emotional Maturity"), describe how they show up in the group, quoting anonymous, literal examples from the responses.

### Direct Connection to the Curriculum
This is the most important part. Write 2-3 bullet points directly connecting what you observed in the students with the curriculum fragments provided. Be very practical and direct.

### Practical Suggestion for the Teacher
Finish with one concrete, actionable idea for the first week of class that builds on the strengths detected.
"#
    )
}

//=========================================================================================
// The Pipeline
//=========================================================================================

/// Runs the full pipeline for one session and returns the generated markdown.
///
/// Any failure of the embedding, search or generation calls aborts the whole
/// operation; a failure while persisting the finished report is logged and the
/// text is still returned. There is no retry and no guard against a concurrent
/// invocation for the same session (last write wins).
pub async fn generate_session_report(
    store: &dyn SessionStore,
    embedder: &dyn EmbeddingService,
    search: &dyn CurriculumSearch,
    generator: &dyn ReportGenerator,
    session_id: Uuid,
    cycle_id: Uuid,
    responses: &[Answers],
) -> Result<String, ReportError> {
    if responses.is_empty() {
        return Err(ReportError::EmptyResponses);
    }

    let combined = combined_answer_text(responses);
    let embedding = embedder
        .embed(&combined)
        .await
        .map_err(ReportError::Embedding)?;

    let items = search
        .match_items(&embedding, MATCH_THRESHOLD, MATCH_COUNT)
        .await
        .map_err(ReportError::Search)?;

    let prompt = build_prompt(cycle_id, &items, responses);
    let markdown = generator
        .generate(&prompt)
        .await
        .map_err(ReportError::Generation)?;

    let report = ReportDocument {
        markdown: markdown.clone(),
        generated_at: Utc::now(),
    };
    if let Err(e) = store.save_report(session_id, &report).await {
        // The report was generated; losing the write must not lose the text.
        error!("Failed to save report for session {}: {}", session_id, e);
    }

    Ok(markdown)
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cycle, ReportDocument, Session, Student, StudentResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn answers(n: u32) -> Answers {
        Answers {
            achievement: format!("organized a trip {n}"),
            skill: format!("learned canva {n}"),
            lesson: format!("plan ahead {n}"),
        }
    }

    fn fragment(desc: &str) -> CurriculumMatch {
        CurriculumMatch {
            id: Uuid::new_v4(),
            item_type: "RA".to_string(),
            description: desc.to_string(),
            similarity: 0.9,
        }
    }

    /// Records save attempts; optionally fails them.
    struct FakeStore {
        saves: Mutex<Vec<(Uuid, ReportDocument)>>,
        fail_save: bool,
    }

    impl FakeStore {
        fn new(fail_save: bool) -> Self {
            Self {
                saves: Mutex::new(Vec::new()),
                fail_save,
            }
        }

        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SessionStore for FakeStore {
        async fn list_sessions(&self) -> crate::ports::PortResult<Vec<Session>> {
            unimplemented!("not used by the pipeline")
        }
        async fn create_session(
            &self,
            _cycle_id: Uuid,
            _title: &str,
            _join_code: &str,
        ) -> crate::ports::PortResult<Session> {
            unimplemented!("not used by the pipeline")
        }
        async fn get_session(&self, _session_id: Uuid) -> crate::ports::PortResult<Session> {
            unimplemented!("not used by the pipeline")
        }
        async fn find_session_by_code(&self, _code: &str) -> crate::ports::PortResult<Session> {
            unimplemented!("not used by the pipeline")
        }
        async fn list_cycles(&self) -> crate::ports::PortResult<Vec<Cycle>> {
            unimplemented!("not used by the pipeline")
        }
        async fn get_cycle(&self, _cycle_id: Uuid) -> crate::ports::PortResult<Cycle> {
            unimplemented!("not used by the pipeline")
        }
        async fn create_student(&self, _full_name: &str) -> crate::ports::PortResult<Student> {
            unimplemented!("not used by the pipeline")
        }
        async fn create_response(
            &self,
            _session_id: Uuid,
            _student_id: Uuid,
            _answers: &Answers,
        ) -> crate::ports::PortResult<StudentResponse> {
            unimplemented!("not used by the pipeline")
        }
        async fn list_responses(
            &self,
            _session_id: Uuid,
        ) -> crate::ports::PortResult<Vec<StudentResponse>> {
            unimplemented!("not used by the pipeline")
        }
        async fn save_report(
            &self,
            session_id: Uuid,
            report: &ReportDocument,
        ) -> crate::ports::PortResult<()> {
            self.saves
                .lock()
                .unwrap()
                .push((session_id, report.clone()));
            if self.fail_save {
                Err(PortError::Unexpected("disk on fire".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct FakeEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed(&self, _text: &str) -> crate::ports::PortResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PortError::Unexpected("embedding backend down".to_string()))
            } else {
                Ok(vec![0.1, 0.2, 0.3])
            }
        }
    }

    struct FakeSearch {
        items: Vec<CurriculumMatch>,
        fail: bool,
        seen: Mutex<Vec<(f32, i32)>>,
    }

    #[async_trait]
    impl CurriculumSearch for FakeSearch {
        async fn match_items(
            &self,
            _embedding: &[f32],
            threshold: f32,
            count: i32,
        ) -> crate::ports::PortResult<Vec<CurriculumMatch>> {
            self.seen.lock().unwrap().push((threshold, count));
            if self.fail {
                Err(PortError::Unexpected("rpc failed".to_string()))
            } else {
                Ok(self.items.clone())
            }
        }
    }

    struct FakeGenerator {
        fail: bool,
    }

    #[async_trait]
    impl ReportGenerator for FakeGenerator {
        async fn generate(&self, _prompt: &str) -> crate::ports::PortResult<String> {
            if self.fail {
                Err(PortError::Unexpected("model overloaded".to_string()))
            } else {
                Ok("### Group Summary\nA lively class.".to_string())
            }
        }
    }

    fn ok_embedder() -> FakeEmbedder {
        FakeEmbedder {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn ok_search(items: Vec<CurriculumMatch>) -> FakeSearch {
        FakeSearch {
            items,
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn empty_responses_fail_validation_without_side_effects() {
        let store = FakeStore::new(false);
        let embedder = ok_embedder();
        let search = ok_search(vec![]);
        let generator = FakeGenerator { fail: false };

        let result = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[],
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ReportError::EmptyResponses));
        assert!(err.is_validation());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn happy_path_saves_once_and_returns_text() {
        let store = FakeStore::new(false);
        let embedder = ok_embedder();
        let search = ok_search(vec![fragment("Plans the execution of activities")]);
        let generator = FakeGenerator { fail: false };
        let session_id = Uuid::new_v4();

        let markdown = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            session_id,
            Uuid::new_v4(),
            &[answers(1), answers(2)],
        )
        .await
        .unwrap();

        assert!(markdown.contains("Group Summary"));
        assert_eq!(store.save_count(), 1);
        let saves = store.saves.lock().unwrap();
        assert_eq!(saves[0].0, session_id);
        assert_eq!(saves[0].1.markdown, markdown);

        // The fixed retrieval parameters are passed through unchanged.
        let seen = search.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(MATCH_THRESHOLD, MATCH_COUNT)]);
    }

    #[tokio::test]
    async fn save_failure_is_swallowed_and_text_still_returned() {
        let store = FakeStore::new(true);
        let embedder = ok_embedder();
        let search = ok_search(vec![fragment("Uses digital design tools")]);
        let generator = FakeGenerator { fail: false };

        let markdown = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[answers(1)],
        )
        .await
        .unwrap();

        assert!(!markdown.is_empty());
        // Exactly one attempt was made even though it failed.
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_before_any_save() {
        let store = FakeStore::new(false);
        let embedder = FakeEmbedder {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let search = ok_search(vec![]);
        let generator = FakeGenerator { fail: false };

        let result = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[answers(1)],
        )
        .await;

        assert!(matches!(result, Err(ReportError::Embedding(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn search_failure_aborts_before_any_save() {
        let store = FakeStore::new(false);
        let embedder = ok_embedder();
        let search = FakeSearch {
            items: vec![],
            fail: true,
            seen: Mutex::new(Vec::new()),
        };
        let generator = FakeGenerator { fail: false };

        let result = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[answers(1)],
        )
        .await;

        assert!(matches!(result, Err(ReportError::Search(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn generation_failure_aborts_before_any_save() {
        let store = FakeStore::new(false);
        let embedder = ok_embedder();
        let search = ok_search(vec![fragment("Communicates in a professional context")]);
        let generator = FakeGenerator { fail: true };

        let result = generate_session_report(
            &store,
            &embedder,
            &search,
            &generator,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[answers(1)],
        )
        .await;

        assert!(matches!(result, Err(ReportError::Generation(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn combined_text_preserves_input_order() {
        let text = combined_answer_text(&[answers(1), answers(2)]);
        let first = text.find("organized a trip 1").unwrap();
        let second = text.find("organized a trip 2").unwrap();
        assert!(first < second);
        assert!(text.contains("Achievement: organized a trip 1."));
        assert!(text.contains("Skill: learned canva 2."));
        assert!(text.contains("Lesson: plan ahead 1."));
    }

    #[test]
    fn prompt_contains_fragments_and_answers_but_no_names() {
        let cycle_id = Uuid::new_v4();
        let items = vec![
            fragment("Plans the execution of activities"),
            fragment("Solves unforeseen incidents"),
        ];
        let batch = [answers(1), answers(2)];

        let prompt = build_prompt(cycle_id, &items, &batch);

        assert!(prompt.contains(&cycle_id.to_string()));
        for item in &items {
            assert!(prompt.contains(&item.description));
            assert!(prompt.contains("- (RA)"));
        }
        for a in &batch {
            assert!(prompt.contains(&a.achievement));
            assert!(prompt.contains(&a.skill));
            assert!(prompt.contains(&a.lesson));
        }
        // Participants are rendered positionally, never by name.
        assert!(prompt.contains("Student 1:"));
        assert!(prompt.contains("Student 2:"));
        assert!(!prompt.contains("full_name"));

        // Deterministic for the same input.
        assert_eq!(prompt, build_prompt(cycle_id, &items, &batch));
    }
}
