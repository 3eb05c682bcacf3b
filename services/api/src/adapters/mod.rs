pub mod db;
pub mod embedding;
pub mod report_llm;

pub use db::PgStore;
pub use embedding::OpenAiEmbeddingAdapter;
pub use report_llm::OpenAiReportAdapter;
