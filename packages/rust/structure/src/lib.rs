//! Section structure extraction for document templates.
//!
//! Walks a document's blocks in reading order and produces an ordered forest
//! of [`Section`]s keyed by heading depth. Each section carries the text that
//! describes it and, optionally, the block holding its content placeholder.

mod context;
mod extract;

use serde::Serialize;

use draftsmith_shared::{BlockId, StructuralWarning};

pub use context::{get_section_context, previous_sections_context};
pub use extract::{SectionExtractor, extract_sections};

/// Index of a section in extraction order.
pub type SectionId = usize;

/// A document region introduced by a heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Position in extraction order; stable for one document load.
    pub id: SectionId,
    /// Heading text, trimmed. Empty for the implicit root section.
    pub heading_text: String,
    /// Heading depth: 1 is top level, 0 is the implicit root.
    pub level: u32,
    /// Non-placeholder text between the heading and the placeholder (or the
    /// next heading), one paragraph per line.
    pub description: String,
    /// The block to replace with generated content.
    pub placeholder_position: Option<BlockId>,
    /// Nearest preceding section with a smaller level.
    pub parent_id: Option<SectionId>,
    /// The heading paragraph itself; `None` for the implicit root.
    pub heading_block: Option<BlockId>,
    /// Tables inside this section's region, kept for prompt context only.
    pub tables: Vec<BlockId>,
}

impl Section {
    pub fn needs_content(&self) -> bool {
        self.placeholder_position.is_some()
    }

    pub fn is_implicit_root(&self) -> bool {
        self.heading_block.is_none()
    }
}

/// Sections plus the warnings raised while extracting them.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub sections: Vec<Section>,
    pub warnings: Vec<StructuralWarning>,
}

/// The subsequence of sections that have a placeholder.
///
/// Sections without one are static headings and are skipped silently.
pub fn get_sections_needing_content(sections: &[Section]) -> Vec<&Section> {
    let needing: Vec<&Section> = sections.iter().filter(|s| s.needs_content()).collect();
    tracing::info!(
        total = sections.len(),
        needing = needing.len(),
        "found sections needing content"
    );
    needing
}
