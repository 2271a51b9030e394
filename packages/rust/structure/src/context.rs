//! Per-section context strings used when building generation prompts.

use crate::Section;

/// Maximum characters of a neighbouring section's description to preview.
const PREVIEW_CHARS: usize = 200;

/// Ancestor headings (root first) followed by the section's own description.
///
/// ```text
/// Outline: Project plan > Delivery > Milestones
/// Description:
/// List the milestones with dates.
/// ```
pub fn get_section_context(section: &Section, sections: &[Section]) -> String {
    let mut path: Vec<&str> = ancestors(section, sections)
        .map(|s| s.heading_text.as_str())
        .collect();
    path.reverse();
    path.push(section.heading_text.as_str());
    path.retain(|h| !h.is_empty());

    let mut context = String::new();
    if !path.is_empty() {
        context.push_str("Outline: ");
        context.push_str(&path.join(" > "));
    }
    if !section.description.is_empty() {
        if !context.is_empty() {
            context.push('\n');
        }
        context.push_str("Description:\n");
        context.push_str(&section.description);
    }

    tracing::debug!(
        id = section.id,
        chars = context.len(),
        "built section context"
    );
    context
}

/// Short previews of up to `window` sections preceding `section`.
pub fn previous_sections_context(section: &Section, sections: &[Section], window: usize) -> String {
    let start = section.id.saturating_sub(window);
    let end = section.id.min(sections.len());

    sections[start.min(end)..end]
        .iter()
        .map(|prev| {
            let preview: String = prev.description.chars().take(PREVIEW_CHARS).collect();
            format!("Previous section '{}': {preview}...", prev.heading_text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Walk `parent_id` links from the section's parent up to its root.
fn ancestors<'a>(section: &Section, sections: &'a [Section]) -> impl Iterator<Item = &'a Section> {
    std::iter::successors(
        section.parent_id.and_then(|id| sections.get(id)),
        move |s| s.parent_id.and_then(|id| sections.get(id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract_sections;
    use draftsmith_shared::{
        BlockKind, DEFAULT_PLACEHOLDER, Document, DocumentConfig, Paragraph,
    };

    fn sections() -> Vec<Section> {
        let doc = Document::from_kinds([
            BlockKind::Paragraph(Paragraph::new("Heading 1", "Project plan")),
            BlockKind::Paragraph(Paragraph::body("Overall plan for the migration.")),
            BlockKind::Paragraph(Paragraph::new("Heading 2", "Delivery")),
            BlockKind::Paragraph(Paragraph::new("Heading 3", "Milestones")),
            BlockKind::Paragraph(Paragraph::body("List the milestones with dates.")),
            BlockKind::Paragraph(Paragraph::body(DEFAULT_PLACEHOLDER)),
            BlockKind::Paragraph(Paragraph::new("Heading 1", "Risks")),
        ]);
        extract_sections(&doc, &DocumentConfig::default())
    }

    #[test]
    fn context_lists_ancestors_then_description() {
        let sections = sections();
        let context = get_section_context(&sections[2], &sections);
        assert_eq!(
            context,
            "Outline: Project plan > Delivery > Milestones\n\
             Description:\nList the milestones with dates."
        );
    }

    #[test]
    fn context_without_description_is_outline_only() {
        let sections = sections();
        let context = get_section_context(&sections[3], &sections);
        assert_eq!(context, "Outline: Risks");
    }

    #[test]
    fn previous_context_respects_window() {
        let sections = sections();
        let previous = previous_sections_context(&sections[2], &sections, 1);
        assert_eq!(previous, "Previous section 'Delivery': ...");

        let previous = previous_sections_context(&sections[2], &sections, 5);
        assert!(previous.starts_with("Previous section 'Project plan': Overall plan"));
        assert_eq!(previous.lines().count(), 2);

        assert!(previous_sections_context(&sections[0], &sections, 2).is_empty());
    }
}
