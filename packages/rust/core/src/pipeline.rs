//! End-to-end fill pipeline: extract → generate → insert → calculate tables.
//!
//! Sections are generated one at a time, in document order. A section whose
//! generation or insertion fails keeps its placeholder and is reported as a
//! warning; the rest of the document is still filled.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use draftsmith_shared::{
    AppConfig, Document, DocumentConfig, GenerationConfig, Result, StructuralWarning, Table,
    TablesConfig,
};
use draftsmith_structure::{
    Section, SectionExtractor, SectionId, get_section_context, get_sections_needing_content,
    previous_sections_context,
};
use draftsmith_tables::{TableCalculator, TableReport};

use crate::generation::{GenerationOptions, Generator};
use crate::inserter::ContentInserter;
use crate::prompt::{PromptInput, build_refinement_prompt, build_section_prompt};

/// User input for a fill run, usually read from a notes file.
///
/// ```toml
/// document_context = "Quarterly report for the platform team"
///
/// [notes]
/// "Budget" = "Call out the hosting overrun."
///
/// [sections."Budget"]
/// tone = "formal"
/// length = "1-2 paragraphs"
/// refine = "Cut anything that reads like marketing."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionNotes {
    /// What the whole document is about.
    #[serde(default)]
    pub document_context: String,
    /// Heading text → notes for that section.
    #[serde(default)]
    pub notes: HashMap<String, String>,
    /// Heading text → per-section overrides.
    #[serde(default)]
    pub sections: HashMap<String, SectionOverrides>,
}

/// Settings one section uses instead of the `[generation]` defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SectionOverrides {
    pub tone: Option<String>,
    /// Length guideline, e.g. "1-2 paragraphs".
    pub length: Option<String>,
    /// Revision request applied to the first draft in a second call.
    pub refine: Option<String>,
}

impl SectionNotes {
    /// Notes for a heading; matched after trimming, case-insensitively.
    pub fn for_heading(&self, heading: &str) -> &str {
        lookup(&self.notes, heading).map_or("", String::as_str)
    }

    /// Overrides for a heading, matched like [`Self::for_heading`].
    pub fn overrides_for(&self, heading: &str) -> Option<&SectionOverrides> {
        lookup(&self.sections, heading)
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, heading: &str) -> Option<&'a V> {
    let heading = heading.trim();
    map.get(heading).or_else(|| {
        map.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(heading))
            .map(|(_, v)| v)
    })
}

/// Settings for [`fill_document`].
#[derive(Debug, Clone, Default)]
pub struct FillConfig {
    pub document: DocumentConfig,
    pub tables: TablesConfig,
    pub generation: GenerationConfig,
    /// Leave tables untouched.
    pub skip_tables: bool,
}

impl FillConfig {
    pub fn from_app(config: &AppConfig, skip_tables: bool) -> Self {
        Self {
            document: config.document.clone(),
            tables: config.tables.clone(),
            generation: config.generation.clone(),
            skip_tables,
        }
    }
}

/// Outcome of a fill run.
#[derive(Debug, Clone, Default)]
pub struct FillReport {
    /// Sections that had a placeholder.
    pub sections_needing_content: usize,
    /// Sections whose placeholder was replaced.
    pub filled: Vec<SectionId>,
    /// `None` when tables were skipped.
    pub tables: Option<TableReport>,
    /// Extraction, generation and table warnings, in that order.
    pub warnings: Vec<StructuralWarning>,
    pub elapsed: Duration,
}

impl FillReport {
    pub fn sections_filled(&self) -> usize {
        self.filled.len()
    }

    pub fn cells_modified(&self) -> usize {
        self.tables.as_ref().map_or(0, |t| t.cells_modified)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a section is generated.
    fn section_started(&self, heading: &str, current: usize, total: usize);
    /// Called after a section's generation, successful or not.
    fn section_finished(&self, heading: &str, ok: bool);
    /// Called when the pipeline completes.
    fn done(&self, report: &FillReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn section_started(&self, _heading: &str, _current: usize, _total: usize) {}
    fn section_finished(&self, _heading: &str, _ok: bool) {}
    fn done(&self, _report: &FillReport) {}
}

/// Fill every placeholder in `doc` with generated text, then compute tables.
///
/// 1. Extract sections
/// 2. Generate a draft per section needing content
/// 3. Insert drafts at their placeholders
/// 4. Compute labelled table cells (unless skipped)
#[instrument(skip_all, fields(blocks = doc.len()))]
pub async fn fill_document<G: Generator>(
    doc: &mut Document,
    generator: &G,
    notes: &SectionNotes,
    config: &FillConfig,
    progress: &dyn ProgressReporter,
) -> Result<FillReport> {
    let start = Instant::now();
    let mut report = FillReport::default();

    // --- Phase 1: Structure ---
    progress.phase("Reading structure");
    let extraction = SectionExtractor::new(config.document.clone()).extract(doc);
    let sections = extraction.sections;
    report.warnings.extend(extraction.warnings);

    let needing = get_sections_needing_content(&sections);
    report.sections_needing_content = needing.len();

    // --- Phase 2: Generation ---
    progress.phase("Generating sections");
    let options = GenerationOptions::from(&config.generation);
    let mut drafts: BTreeMap<SectionId, String> = BTreeMap::new();

    for (i, section) in needing.iter().enumerate() {
        progress.section_started(&section.heading_text, i + 1, needing.len());

        let overrides = notes.overrides_for(&section.heading_text);
        let section_context = get_section_context(section, &sections);
        let previous = previous_sections_context(section, &sections, config.generation.context_window);
        let input = PromptInput {
            document_context: &notes.document_context,
            section_context: &section_context,
            previous_context: &previous,
            tables: section_tables(doc, section),
            notes: notes.for_heading(&section.heading_text),
            tone: overrides.and_then(|o| o.tone.as_deref()),
            length_guideline: overrides.and_then(|o| o.length.as_deref()),
        };
        let prompt = build_section_prompt(section, &input, &config.generation);

        let refine = overrides.and_then(|o| o.refine.as_deref());
        let draft = match (generator.generate(&prompt, &options).await, refine) {
            (Ok(text), Some(request)) => {
                Ok(refine_draft(generator, section, text, request, &options).await)
            }
            (first, _) => first,
        };

        match draft {
            Ok(text) => {
                debug!(section = section.id, chars = text.len(), "draft ready");
                drafts.insert(section.id, text);
                progress.section_finished(&section.heading_text, true);
            }
            Err(e) => {
                report
                    .warnings
                    .push(not_filled(section, e.to_string()));
                progress.section_finished(&section.heading_text, false);
            }
        }
    }

    // --- Phase 3: Insertion ---
    progress.phase("Inserting content");
    let inserter = ContentInserter::new(&sections);
    for (section_id, text) in &drafts {
        match inserter.insert(doc, *section_id, text) {
            Ok(_) => report.filled.push(*section_id),
            Err(e) => {
                if let Some(section) = sections.get(*section_id) {
                    report.warnings.push(not_filled(section, e.to_string()));
                }
            }
        }
    }

    // --- Phase 4: Tables ---
    if !config.skip_tables {
        progress.phase("Calculating tables");
        let tables = TableCalculator::from_config(&config.tables)?.process_document(doc);
        report.warnings.extend(tables.warnings.iter().cloned());
        report.tables = Some(tables);
    }

    report.elapsed = start.elapsed();
    info!(
        needing = report.sections_needing_content,
        filled = report.sections_filled(),
        cells = report.cells_modified(),
        warnings = report.warnings.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "fill complete"
    );

    progress.done(&report);
    Ok(report)
}

/// Ask for a revision of `draft`; a failed revision keeps the draft.
async fn refine_draft<G: Generator>(
    generator: &G,
    section: &Section,
    draft: String,
    request: &str,
    options: &GenerationOptions,
) -> String {
    if request.trim().is_empty() {
        return draft;
    }
    let prompt = build_refinement_prompt(&section.heading_text, &draft, request.trim());
    match generator.generate(&prompt, options).await {
        Ok(revised) => {
            debug!(section = section.id, chars = revised.len(), "draft refined");
            revised
        }
        Err(e) => {
            warn!(section = section.id, error = %e, "refinement failed; keeping first draft");
            draft
        }
    }
}

fn section_tables<'a>(doc: &'a Document, section: &Section) -> Vec<&'a Table> {
    section
        .tables
        .iter()
        .filter_map(|id| doc.get(*id).and_then(|b| b.as_table()))
        .collect()
}

fn not_filled(section: &Section, reason: String) -> StructuralWarning {
    let warning = StructuralWarning::SectionNotFilled {
        section_id: section.id,
        heading: section.heading_text.clone(),
        reason,
    };
    warn!(%warning, "structural warning");
    warning
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
