pub mod db;
pub mod export;
pub mod vibe_llm;

pub use db::PgDraftStore;
pub use export::FsExporter;
pub use vibe_llm::OpenAiVibeAdapter;
