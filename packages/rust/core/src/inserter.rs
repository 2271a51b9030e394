//! Replacing placeholders with generated text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument};

use draftsmith_shared::{BlockId, BlockKind, Document, DraftsmithError, Paragraph, Result};
use draftsmith_structure::{Section, SectionId};

/// One or more blank lines (whitespace allowed) between paragraphs.
static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph break regex"));

/// Inserts generated content at section placeholders.
///
/// Built from one extraction of a document; placeholders are tracked by block
/// id, so a placeholder consumed by an insertion cannot be found again.
#[derive(Debug, Clone)]
pub struct ContentInserter {
    placeholders: HashMap<SectionId, Option<BlockId>>,
}

impl ContentInserter {
    pub fn new(sections: &[Section]) -> Self {
        Self {
            placeholders: sections
                .iter()
                .map(|s| (s.id, s.placeholder_position))
                .collect(),
        }
    }

    /// Replace the section's placeholder with one paragraph per blank-line
    /// separated segment of `text`, in the placeholder's style.
    ///
    /// Returns the ids of the inserted paragraphs. Text with no non-blank
    /// segment is rejected and the placeholder kept.
    #[instrument(skip_all, fields(section_id = section_id))]
    pub fn insert(&self, doc: &mut Document, section_id: SectionId, text: &str) -> Result<Vec<BlockId>> {
        let placeholder = self
            .placeholders
            .get(&section_id)
            .copied()
            .ok_or(DraftsmithError::UnknownSection { section_id })?
            .ok_or(DraftsmithError::PlaceholderNotFound { section_id })?;

        let style = doc
            .get(placeholder)
            .and_then(|block| block.as_paragraph())
            .map(|p| p.style.clone())
            .ok_or(DraftsmithError::PlaceholderNotFound { section_id })?;

        let segments = split_paragraphs(text);
        if segments.is_empty() {
            return Err(DraftsmithError::validation(format!(
                "no content to insert for section {section_id}"
            )));
        }

        let paragraphs: Vec<BlockKind> = segments
            .into_iter()
            .map(|segment| BlockKind::Paragraph(Paragraph::new(style.clone(), segment)))
            .collect();
        let count = paragraphs.len();

        let ids = doc
            .replace(placeholder, paragraphs)
            .ok_or(DraftsmithError::PlaceholderNotFound { section_id })?;

        debug!(%placeholder, %style, "placeholder replaced");
        info!(section_id, paragraphs = count, "inserted content");
        Ok(ids)
    }
}

/// Insert content for one section of a freshly extracted document.
pub fn insert_content(
    doc: &mut Document,
    sections: &[Section],
    section_id: SectionId,
    text: &str,
) -> Result<Vec<BlockId>> {
    ContentInserter::new(sections).insert(doc, section_id, text)
}

/// Split on blank lines; trim each segment and drop empty ones.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    PARAGRAPH_BREAK_RE
        .split(&normalized)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
