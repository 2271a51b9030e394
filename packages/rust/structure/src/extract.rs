//! Single-pass section extraction.
//!
//! Extraction is a fold over the block sequence. The open ancestors live in
//! an explicit stack (`open`), replaced on every heading, so a section's
//! parent is always the nearest open section with a smaller level.

use tracing::{debug, info, instrument, warn};

use draftsmith_shared::{
    Block, BlockId, BlockKind, Document, DocumentConfig, Paragraph, StructuralWarning,
};

use crate::{Extraction, Section, SectionId};

/// Level of the implicit section that owns a placeholder appearing before
/// any heading.
const ROOT_LEVEL: u32 = 0;

/// Extracts [`Section`]s from documents using one template configuration.
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    config: DocumentConfig,
}

impl SectionExtractor {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Extract all sections in document order, with structural warnings.
    #[instrument(skip_all, fields(blocks = doc.len()))]
    pub fn extract(&self, doc: &Document) -> Extraction {
        let state = doc
            .blocks()
            .iter()
            .fold(FoldState::default(), |state, block| {
                state.step(block, &self.config)
            });

        let extraction = state.finish();
        info!(
            sections = extraction.sections.len(),
            warnings = extraction.warnings.len(),
            "extracted sections"
        );
        extraction
    }
}

/// Extract sections, logging (and dropping) structural warnings.
pub fn extract_sections(doc: &Document, config: &DocumentConfig) -> Vec<Section> {
    SectionExtractor::new(config.clone()).extract(doc).sections
}

// ---------------------------------------------------------------------------
// Fold state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FoldState {
    sections: Vec<Section>,
    /// Ids of open ancestors, outermost first. The last entry is the section
    /// currently receiving blocks.
    open: Vec<SectionId>,
    /// Whether the current section's description window is closed by its
    /// placeholder.
    placeholder_seen: bool,
    /// Text and tables seen before any heading; they belong to the implicit
    /// root if one gets created.
    preamble_text: Vec<String>,
    preamble_tables: Vec<BlockId>,
    warnings: Vec<StructuralWarning>,
}

impl FoldState {
    fn step(mut self, block: &Block, config: &DocumentConfig) -> Self {
        match &block.kind {
            BlockKind::Paragraph(p) => match config.heading_level(&p.style) {
                Some(level) => self.open_section(block.id, p, level),
                None => self.body_paragraph(block.id, p, &config.placeholder_pattern),
            },
            BlockKind::Table(_) => match self.current_mut() {
                Some(section) => section.tables.push(block.id),
                None => self.preamble_tables.push(block.id),
            },
        }
        self
    }

    fn finish(self) -> Extraction {
        Extraction {
            sections: self.sections,
            warnings: self.warnings,
        }
    }

    fn current_mut(&mut self) -> Option<&mut Section> {
        let id = *self.open.last()?;
        self.sections.get_mut(id)
    }

    fn open_section(&mut self, heading_block: BlockId, heading: &Paragraph, level: u32) {
        while let Some(&top) = self.open.last() {
            if self.sections[top].level >= level {
                self.open.pop();
            } else {
                break;
            }
        }

        let id = self.sections.len();
        let section = Section {
            id,
            heading_text: heading.text.trim().to_string(),
            level,
            description: String::new(),
            placeholder_position: None,
            parent_id: self.open.last().copied(),
            heading_block: Some(heading_block),
            tables: Vec::new(),
        };
        debug!(id, level, heading = %section.heading_text, "section opened");

        self.sections.push(section);
        self.open.push(id);
        self.placeholder_seen = false;
    }

    fn body_paragraph(&mut self, block: BlockId, paragraph: &Paragraph, pattern: &str) {
        let text = paragraph.text.trim();
        if text.is_empty() {
            return;
        }

        if text == pattern {
            if self.open.is_empty() {
                self.open_implicit_root();
            }
            self.record_placeholder(block);
            return;
        }

        if self.placeholder_seen {
            return;
        }
        match self.current_mut() {
            Some(section) => append_line(&mut section.description, text),
            None => self.preamble_text.push(text.to_string()),
        }
    }

    fn open_implicit_root(&mut self) {
        let id = self.sections.len();
        debug!(id, "placeholder before any heading; opening implicit root section");
        self.sections.push(Section {
            id,
            heading_text: String::new(),
            level: ROOT_LEVEL,
            description: self.preamble_text.join("\n"),
            placeholder_position: None,
            parent_id: None,
            heading_block: None,
            tables: std::mem::take(&mut self.preamble_tables),
        });
        self.preamble_text.clear();
        self.open.push(id);
    }

    fn record_placeholder(&mut self, block: BlockId) {
        let Some(section) = self.current_mut() else {
            return;
        };

        match section.placeholder_position {
            None => {
                section.placeholder_position = Some(block);
                debug!(id = section.id, %block, "placeholder found");
                self.placeholder_seen = true;
            }
            Some(_) => {
                let warning = StructuralWarning::DuplicatePlaceholder {
                    section_id: section.id,
                    heading: section.heading_text.clone(),
                    block,
                };
                warn!(%warning, "structural warning");
                self.warnings.push(warning);
            }
        }
    }
}

fn append_line(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}
