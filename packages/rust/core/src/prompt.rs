//! Prompt construction for section generation.

use serde::Serialize;
use tracing::debug;

use draftsmith_shared::{GenerationConfig, Table};
use draftsmith_structure::Section;

/// A chat prompt: instructions plus the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Everything known about a section besides the section itself.
#[derive(Debug, Clone, Default)]
pub struct PromptInput<'a> {
    /// What the whole document is about, if the user said.
    pub document_context: &'a str,
    /// Outline and description, as built by `get_section_context`.
    pub section_context: &'a str,
    /// Previews of the preceding sections.
    pub previous_context: &'a str,
    /// Tables found inside the section.
    pub tables: Vec<&'a Table>,
    /// The user's notes for this section.
    pub notes: &'a str,
    /// Replaces `generation.tone` for this section.
    pub tone: Option<&'a str>,
    /// Replaces `generation.length_guideline` for this section.
    pub length_guideline: Option<&'a str>,
}

/// Build the prompt for writing one section.
pub fn build_section_prompt(
    section: &Section,
    input: &PromptInput<'_>,
    generation: &GenerationConfig,
) -> Prompt {
    let system = format!(
        "You are an expert content writer helping to create high-quality document sections.\n\
         \n\
         Your task is to generate clear, well-structured content that:\n\
         - Matches the {tone} tone requested\n\
         - Is approximately {length} in length\n\
         - Flows naturally from the provided context\n\
         - Addresses all points mentioned in the user's notes\n\
         - Avoids repetition and filler content\n\
         \n\
         Generate only the section content itself, without adding headers, titles, or meta-commentary.",
        tone = input.tone.unwrap_or(generation.tone.as_str()),
        length = input.length_guideline.unwrap_or(generation.length_guideline.as_str()),
    );

    let mut parts: Vec<String> = Vec::new();

    if !input.document_context.trim().is_empty() {
        parts.push(format!("DOCUMENT CONTEXT:\n{}\n", input.document_context.trim()));
    }

    let title = if section.heading_text.is_empty() {
        "(document introduction)"
    } else {
        section.heading_text.as_str()
    };
    parts.push(format!("SECTION TO WRITE:\nTitle: {title}\nLevel: {}\n", section.level));

    if !input.section_context.is_empty() {
        parts.push(format!("EXISTING SECTION DESCRIPTION:\n{}\n", input.section_context));
    }

    if !input.tables.is_empty() {
        let rendered: Vec<String> = input
            .tables
            .iter()
            .enumerate()
            .map(|(i, table)| format!("Table {}:\n{}", i + 1, render_table(table)))
            .collect();
        parts.push(format!("REFERENCE TABLES:\n{}\n", rendered.join("\n\n")));
    }

    if !input.previous_context.is_empty() {
        parts.push(format!("PREVIOUS SECTIONS CONTEXT:\n{}\n", input.previous_context));
    }

    let notes = input.notes.trim();
    parts.push(format!(
        "USER REQUIREMENTS AND NOTES:\n{}\n",
        if notes.is_empty() { "(none provided)" } else { notes }
    ));

    parts.push(
        "Please generate content for this section that incorporates the above requirements \
         and flows naturally with the document context. Write the content directly without \
         adding section headers or labels."
            .to_string(),
    );

    let prompt = Prompt {
        system,
        user: parts.join("\n"),
    };
    debug!(
        section = section.id,
        system_chars = prompt.system.len(),
        user_chars = prompt.user.len(),
        est_tokens = estimate_tokens(&prompt.system) + estimate_tokens(&prompt.user),
        "built section prompt"
    );
    prompt
}

/// Build a prompt asking for a revision of already generated content.
pub fn build_refinement_prompt(section_title: &str, original: &str, notes: &str) -> Prompt {
    Prompt {
        system: "You are an expert editor helping to refine and improve document content.\n\
                 \n\
                 Revise the provided content based on the feedback while keeping its \
                 structure where appropriate and addressing every requirement.\n\
                 \n\
                 Provide only the revised content without meta-commentary."
            .to_string(),
        user: format!(
            "SECTION: {section_title}\n\n\
             ORIGINAL CONTENT:\n{original}\n\n\
             REFINEMENT REQUIREMENTS:\n{notes}\n\n\
             Please revise the content based on these requirements."
        ),
    }
}

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Pipe-separated rows, one per line.
fn render_table(table: &Table) -> String {
    table
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.trim()).collect::<Vec<_>>().join(" | "))
        .collect::<Vec<_>>()
        .join("\n")
}
