pub mod domain;
pub mod passage;
pub mod ports;
pub mod session;
pub mod streak;
pub mod vibe;

pub use domain::{
    AuthSession, Draft, DraftMetadata, DraftSummary, ExportFormat, FocusSettings,
    FocusSettingsPatch, ReadingModeSettings, ReadingModeSettingsPatch, RestoredFrom, SessionStats,
    StreakState, User, UserCredentials, VersionInfo, VibeAnalysis, VibePoint, VibeRecord,
    WritingMode,
};
pub use ports::{AnalysisOutcome, DraftExporter, DraftStore, PortError, PortResult, VibeAnalyzer};
pub use session::EditorSession;
