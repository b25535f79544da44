//! services/api/src/adapters/export.rs
//!
//! This module contains the adapter for exporting drafts to disk.
//! It implements the `DraftExporter` port from the `core` crate.

use async_trait::async_trait;
use flow_core::domain::{Draft, ExportFormat};
use flow_core::passage::strip_tags;
use flow_core::ports::{DraftExporter, PortError, PortResult};
use std::path::PathBuf;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that writes draft exports into a configured directory.
#[derive(Clone)]
pub struct FsExporter {
    export_dir: PathBuf,
}

impl FsExporter {
    /// Creates a new `FsExporter` rooted at `export_dir`.
    pub fn new(export_dir: PathBuf) -> Self {
        Self { export_dir }
    }

    /// Builds a filesystem-safe filename from the draft title and id.
    ///
    /// The id suffix keeps two drafts with the same title from clobbering
    /// each other's exports.
    fn file_name(draft: &Draft, format: ExportFormat) -> String {
        let mut stem: String = draft
            .metadata
            .title
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        if stem.is_empty() {
            stem.push_str("draft");
        }
        format!("{}_{}.{}", stem, draft.id, format.extension())
    }

    /// Renders the draft body for the requested format.
    ///
    /// Markdown keeps paragraph structure by turning `<p>` blocks into blank
    /// lines before discarding remaining markup. Plain text flattens all of
    /// it with the same tag stripper the word counter uses.
    fn render(content: &str, format: ExportFormat) -> String {
        match format {
            ExportFormat::Md => {
                let paragraphs = content
                    .replace("</p>", "\n\n")
                    .replace("<br>", "\n")
                    .replace("<br/>", "\n")
                    .replace("<br />", "\n");
                strip_tags(&paragraphs)
                    .lines()
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join("\n")
                    .trim()
                    .to_string()
            }
            ExportFormat::Txt => strip_tags(content).split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

//=========================================================================================
// `DraftExporter` Trait Implementation
//=========================================================================================

#[async_trait]
impl DraftExporter for FsExporter {
    /// Writes the draft to disk and returns the path of the exported file.
    async fn export(&self, draft: &Draft, format: ExportFormat) -> PortResult<PathBuf> {
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to create export dir: {e}")))?;

        let path = self.export_dir.join(Self::file_name(draft, format));
        let body = Self::render(&draft.content, format);

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to write export: {e}")))?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flow_core::domain::DraftMetadata;
    use uuid::Uuid;

    fn draft_with(title: &str, content: &str) -> Draft {
        let now = Utc::now();
        let mut metadata = DraftMetadata::untitled(now);
        metadata.title = title.to_string();
        Draft {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: content.to_string(),
            metadata,
        }
    }

    #[test]
    fn file_names_are_sanitized_and_unique_per_draft() {
        let draft = draft_with("My Story: Part 2!", "<p>hi</p>");
        let name = FsExporter::file_name(&draft, ExportFormat::Md);
        assert!(name.starts_with("My_Story__Part_2_"));
        assert!(name.contains(&draft.id.to_string()));
        assert!(name.ends_with(".md"));
    }

    #[test]
    fn empty_title_still_produces_a_usable_stem() {
        let draft = draft_with("", "<p>hi</p>");
        let name = FsExporter::file_name(&draft, ExportFormat::Txt);
        assert!(name.starts_with("draft_"));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn markdown_render_keeps_paragraph_breaks() {
        let rendered = FsExporter::render("<p>First one.</p><p>Second one.</p>", ExportFormat::Md);
        assert_eq!(rendered, "First one.\n\nSecond one.");
    }

    #[test]
    fn txt_render_flattens_markup_to_a_single_line() {
        let rendered = FsExporter::render(
            "<p>First <strong>bold</strong> one.</p><p>Second.</p>",
            ExportFormat::Txt,
        );
        assert_eq!(rendered, "First bold one. Second.");
    }

    #[tokio::test]
    async fn export_writes_the_file_under_the_configured_dir() {
        let dir = std::env::temp_dir().join(format!("flow-export-test-{}", Uuid::new_v4()));
        let exporter = FsExporter::new(dir.clone());
        let draft = draft_with("Night Draft", "<p>Some words.</p>");

        let path = exporter.export(&draft, ExportFormat::Md).await.unwrap();
        assert!(path.starts_with(&dir));
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(body, "Some words.");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
