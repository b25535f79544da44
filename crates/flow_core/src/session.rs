//! crates/flow_core/src/session.rs
//!
//! The editing session's state container. One of these exists per open
//! editing session; the service owns it behind a lock and every mutation
//! goes through the methods here so the contracts (vibe-history dedup,
//! saved-baseline comparison, all-or-nothing reset) hold in one place.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Draft, DraftMetadata, FocusSettings, FocusSettingsPatch, ReadingModeSettings,
    ReadingModeSettingsPatch, SessionStats, VibeAnalysis, VibePoint, VibeRecord, WritingMode,
};
use crate::passage::{strip_tags, word_count};
use crate::vibe::{is_flow, SCORE_EPSILON};

/// Vibe history keeps at most this many records, newest first.
const VIBE_HISTORY_CAP: usize = 10;

/// All mutable state of one editing session.
#[derive(Debug, Clone)]
pub struct EditorSession {
    content: String,
    current_draft_id: Option<Uuid>,
    metadata: DraftMetadata,
    vibe: Option<VibeAnalysis>,
    vibe_history: Vec<VibeRecord>,
    writing_mode: WritingMode,
    last_saved_content: String,
    last_saved_at: Option<DateTime<Utc>>,
    focus_settings: FocusSettings,
    reading_mode_settings: ReadingModeSettings,
    session_stats: Option<SessionStats>,
}

impl EditorSession {
    /// A fresh session editing nothing.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            content: String::new(),
            current_draft_id: None,
            metadata: DraftMetadata::untitled(now),
            vibe: None,
            vibe_history: Vec::new(),
            writing_mode: WritingMode::Vibe,
            last_saved_content: String::new(),
            last_saved_at: None,
            focus_settings: FocusSettings::default(),
            reading_mode_settings: ReadingModeSettings::default(),
            session_stats: None,
        }
    }

    /// A session populated from a loaded draft. The loaded content becomes
    /// the saved baseline, and the draft's last vibe (when present) seeds the
    /// meter until the scheduled re-analysis lands.
    pub fn from_draft(draft: Draft, now: DateTime<Utc>) -> Self {
        let vibe = draft.metadata.last_vibe.map(|score| VibeAnalysis {
            score,
            reason: "Analyzing your writing...".to_string(),
        });
        Self {
            last_saved_content: draft.content.clone(),
            last_saved_at: Some(now),
            vibe_history: draft.metadata.vibe_history.clone(),
            vibe,
            content: draft.content,
            current_draft_id: Some(draft.id),
            metadata: draft.metadata,
            writing_mode: WritingMode::Vibe,
            focus_settings: FocusSettings::default(),
            reading_mode_settings: ReadingModeSettings::default(),
            session_stats: None,
        }
    }

    // --- Read access ---

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn current_draft_id(&self) -> Option<Uuid> {
        self.current_draft_id
    }

    pub fn metadata(&self) -> &DraftMetadata {
        &self.metadata
    }

    pub fn vibe(&self) -> Option<&VibeAnalysis> {
        self.vibe.as_ref()
    }

    pub fn vibe_history(&self) -> &[VibeRecord] {
        &self.vibe_history
    }

    pub fn writing_mode(&self) -> WritingMode {
        self.writing_mode
    }

    pub fn focus_settings(&self) -> &FocusSettings {
        &self.focus_settings
    }

    pub fn reading_mode_settings(&self) -> &ReadingModeSettings {
        &self.reading_mode_settings
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn stats(&self) -> Option<&SessionStats> {
        self.session_stats.as_ref()
    }

    /// Pure comparison against the saved baseline; there is no separate
    /// dirty flag.
    pub fn has_unsaved_changes(&self) -> bool {
        self.content != self.last_saved_content
    }

    // --- Mutation ---

    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub fn set_draft_id(&mut self, id: Uuid) {
        self.current_draft_id = Some(id);
    }

    pub fn set_title(&mut self, title: String, now: DateTime<Utc>) {
        self.metadata.title = title;
        self.metadata.updated_at = now;
    }

    pub fn set_writing_mode(&mut self, mode: WritingMode) {
        self.writing_mode = mode;
    }

    pub fn merge_focus_settings(&mut self, patch: FocusSettingsPatch) {
        self.focus_settings.merge(patch);
    }

    pub fn merge_reading_mode_settings(&mut self, patch: ReadingModeSettingsPatch) {
        self.reading_mode_settings.merge(patch);
    }

    /// Applies a completed analysis. The history gains a record only when it
    /// is empty or the score moved by more than the epsilon since the last
    /// recorded one, so near-identical repeated scores do not flood it. The
    /// session's vibe progression follows the same rule.
    pub fn set_vibe(&mut self, vibe: VibeAnalysis, now: DateTime<Utc>) {
        let materially_different = self
            .vibe_history
            .first()
            .map(|last| (last.score - vibe.score).abs() > SCORE_EPSILON)
            .unwrap_or(true);

        if materially_different {
            self.vibe_history.insert(
                0,
                VibeRecord {
                    timestamp: now,
                    score: vibe.score,
                    reason: vibe.reason.clone(),
                },
            );
            self.vibe_history.truncate(VIBE_HISTORY_CAP);
            self.metadata.vibe_history = self.vibe_history.clone();
        }

        self.metadata.last_vibe = Some(vibe.score);
        self.metadata.updated_at = now;
        self.record_vibe_point(vibe.score, now);
        self.vibe = Some(vibe);
    }

    fn record_vibe_point(&mut self, score: f64, now: DateTime<Utc>) {
        let Some(stats) = self.session_stats.as_mut() else {
            return;
        };

        let moved = stats
            .vibe_progression
            .last()
            .map(|p| (p.score - score).abs() > SCORE_EPSILON)
            .unwrap_or(true);
        if !moved {
            return;
        }

        if is_flow(score) {
            let since = stats
                .vibe_progression
                .last()
                .map(|p| p.time)
                .unwrap_or(stats.start_time);
            stats.flow_duration += (now - since).num_milliseconds() as f64 / 60_000.0;
        }

        stats.vibe_progression.push(VibePoint { time: now, score });
        let total: f64 = stats.vibe_progression.iter().map(|p| p.score).sum();
        stats.average_vibe = total / stats.vibe_progression.len() as f64;
    }

    /// Marks `saved_content` as the new saved baseline after a successful
    /// save (or a restore, which counts as one).
    pub fn mark_saved(&mut self, saved_content: &str, now: DateTime<Utc>) {
        self.last_saved_content = saved_content.to_string();
        self.last_saved_at = Some(now);
    }

    /// Overwrites content and metadata with a restored version snapshot and
    /// treats it as already saved server-side.
    pub fn restore_version(&mut self, draft: Draft, now: DateTime<Utc>) {
        self.content = draft.content;
        self.vibe_history = draft.metadata.vibe_history.clone();
        self.vibe = draft.metadata.last_vibe.map(|score| VibeAnalysis {
            score,
            reason: "Restored from previous version".to_string(),
        });
        self.metadata = draft.metadata;
        self.mark_saved(&self.content.clone(), now);
    }

    // --- Session statistics lifecycle ---

    /// Begins tracking statistics for this editing session. The word count
    /// baseline is taken from the current content.
    pub fn start_session(&mut self, now: DateTime<Utc>) {
        let initial = word_count(&strip_tags(&self.content));
        self.session_stats = Some(SessionStats::begin(initial, now));
    }

    /// Finalizes the session's statistics and returns them.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> Option<SessionStats> {
        if let Some(stats) = self.session_stats.as_mut() {
            stats.end_time = Some(now);
        }
        self.session_stats.clone()
    }

    /// Updates the words-written delta from the current editor word count.
    pub fn update_word_count(&mut self, current_words: usize) {
        if let Some(stats) = self.session_stats.as_mut() {
            stats.word_count = current_words as i64 - stats.initial_word_count as i64;
        }
    }

    /// Restores every field to its initial value. This is the only way to go
    /// from editing one draft to editing nothing or another draft; partial
    /// resets would leak state between drafts.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = EditorSession::new(now);
    }
}
