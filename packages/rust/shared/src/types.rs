//! Core document model for Draftsmith.
//!
//! A [`Document`] is a flat, ordered sequence of typed blocks (paragraphs and
//! tables). Every block carries a [`BlockId`] that stays valid while other
//! blocks are inserted or replaced, which is what lets a section keep pointing
//! at its placeholder after earlier sections have been filled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paragraph style given to paragraphs created without an explicit style.
pub const DEFAULT_BODY_STYLE: &str = "Normal";

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Stable identifier of a block within one loaded document.
///
/// Ids are assigned on load and never reused; they are not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// A styled paragraph of plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Paragraph style name (e.g. `Heading 1`, `Normal`).
    #[serde(default = "default_style")]
    pub style: String,
    /// Paragraph text.
    #[serde(default)]
    pub text: String,
}

fn default_style() -> String {
    DEFAULT_BODY_STYLE.into()
}

impl Paragraph {
    pub fn new(style: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            style: style.into(),
            text: text.into(),
        }
    }

    /// A paragraph in the default body style.
    pub fn body(text: impl Into<String>) -> Self {
        Self::new(DEFAULT_BODY_STYLE, text)
    }
}

/// A table as a grid of cell strings, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a table from string slices; handy in tests and fixtures.
    pub fn from_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether every row has the same number of cells.
    pub fn is_rectangular(&self) -> bool {
        let width = self.column_count();
        self.rows.iter().all(|row| row.len() == width)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Overwrite a cell. Returns `false` if the coordinate is outside the grid.
    pub fn set_cell(&mut self, row: usize, col: usize, text: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = text.into();
                true
            }
            None => false,
        }
    }
}

/// The payload of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph(Paragraph),
    Table(Table),
}

/// A block together with its stable id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
}

impl Block {
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match &self.kind {
            BlockKind::Paragraph(p) => Some(p),
            BlockKind::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match &self.kind {
            BlockKind::Table(t) => Some(t),
            BlockKind::Paragraph(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Descriptive properties carried alongside the blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Stamped on every save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// On-disk shape of a document: blocks without ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    metadata: DocumentMetadata,
    blocks: Vec<BlockKind>,
}

/// An in-memory document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentFile", into = "DocumentFile")]
pub struct Document {
    pub metadata: DocumentMetadata,
    blocks: Vec<Block>,
    next_id: u64,
}

impl From<DocumentFile> for Document {
    fn from(file: DocumentFile) -> Self {
        let mut doc = Document::from_kinds(file.blocks);
        doc.metadata = file.metadata;
        doc
    }
}

impl From<Document> for DocumentFile {
    fn from(doc: Document) -> Self {
        Self {
            metadata: doc.metadata,
            blocks: doc.blocks.into_iter().map(|b| b.kind).collect(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::from_kinds(Vec::new())
    }
}

impl Document {
    /// Build a document, assigning sequential ids in reading order.
    pub fn from_kinds(kinds: impl IntoIterator<Item = BlockKind>) -> Self {
        let mut doc = Self {
            metadata: DocumentMetadata::default(),
            blocks: Vec::new(),
            next_id: 0,
        };
        for kind in kinds {
            doc.push(kind);
        }
        doc
    }

    /// Append a block and return its id.
    pub fn push(&mut self, kind: BlockKind) -> BlockId {
        let id = self.allocate_id();
        self.blocks.push(Block { id, kind });
        id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Current index of a block in reading order.
    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Replace one block with a run of new blocks, in place.
    ///
    /// Returns the ids of the new blocks, or `None` if `id` is not present.
    pub fn replace(&mut self, id: BlockId, kinds: Vec<BlockKind>) -> Option<Vec<BlockId>> {
        let index = self.position(id)?;
        let new_blocks: Vec<Block> = kinds
            .into_iter()
            .map(|kind| Block {
                id: self.allocate_id(),
                kind,
            })
            .collect();
        let ids = new_blocks.iter().map(|b| b.id).collect();
        self.blocks.splice(index..=index, new_blocks);
        Some(ids)
    }

    /// Tables in reading order.
    pub fn tables(&self) -> impl Iterator<Item = (BlockId, &Table)> {
        self.blocks.iter().filter_map(|b| match &b.kind {
            BlockKind::Table(t) => Some((b.id, t)),
            BlockKind::Paragraph(_) => None,
        })
    }

    /// Mutable access to tables in reading order.
    pub fn tables_mut(&mut self) -> impl Iterator<Item = (BlockId, &mut Table)> {
        self.blocks.iter_mut().filter_map(|b| match &mut b.kind {
            BlockKind::Table(t) => Some((b.id, t)),
            BlockKind::Paragraph(_) => None,
        })
    }

    /// Summary counts and properties.
    pub fn info(&self) -> DocumentInfo {
        let mut info = DocumentInfo {
            title: self.metadata.title.clone(),
            author: self.metadata.author.clone(),
            ..Default::default()
        };
        for block in &self.blocks {
            match &block.kind {
                BlockKind::Paragraph(p) => {
                    info.paragraph_count += 1;
                    info.word_count += p.text.split_whitespace().count();
                }
                BlockKind::Table(_) => info.table_count += 1,
            }
        }
        info
    }

    fn allocate_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// General information about a loaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub paragraph_count: usize,
    pub table_count: usize,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::from_kinds([
            BlockKind::Paragraph(Paragraph::new("Heading 1", "Intro")),
            BlockKind::Paragraph(Paragraph::body("{{SECTION_CONTENT}}")),
            BlockKind::Table(Table::from_rows([["a", "1"], ["Total", ""]])),
        ])
    }

    #[test]
    fn ids_are_sequential_on_load() {
        let doc = sample();
        let ids: Vec<u64> = doc.blocks().iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn replace_keeps_other_ids_and_allocates_fresh_ones() {
        let mut doc = sample();
        let new_ids = doc
            .replace(
                BlockId(1),
                vec![
                    BlockKind::Paragraph(Paragraph::body("one")),
                    BlockKind::Paragraph(Paragraph::body("two")),
                ],
            )
            .expect("block exists");

        assert_eq!(new_ids, vec![BlockId(3), BlockId(4)]);
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.position(BlockId(2)), Some(3));
        assert!(doc.get(BlockId(1)).is_none());
        assert!(doc.replace(BlockId(1), vec![]).is_none());
    }

    #[test]
    fn json_shape_has_no_ids() {
        let doc = sample();
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["blocks"][0]["type"], "paragraph");
        assert_eq!(json["blocks"][0]["style"], "Heading 1");
        assert_eq!(json["blocks"][2]["type"], "table");
        assert!(json["blocks"][0].get("id").is_none());
    }

    #[test]
    fn parses_document_json() {
        let json = r#"{
            "metadata": { "title": "Quarterly report" },
            "blocks": [
                { "type": "paragraph", "style": "Heading 1", "text": "Summary" },
                { "type": "paragraph", "text": "Body text here" },
                { "type": "table", "rows": [["Q1", "$10"], ["Total", ""]] }
            ]
        }"#;
        let doc: Document = serde_json::from_str(json).expect("parse");
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.blocks()[1].as_paragraph().unwrap().style, DEFAULT_BODY_STYLE);

        let info = doc.info();
        assert_eq!(info.paragraph_count, 2);
        assert_eq!(info.table_count, 1);
        assert_eq!(info.word_count, 4);
        assert_eq!(info.title.as_deref(), Some("Quarterly report"));
    }

    #[test]
    fn table_cell_access() {
        let mut table = Table::from_rows([vec!["a", "b"], vec!["c"]]);
        assert_eq!(table.column_count(), 2);
        assert!(!table.is_rectangular());
        assert_eq!(table.cell(1, 0), Some("c"));
        assert!(table.set_cell(0, 1, "x"));
        assert!(!table.set_cell(1, 1, "y"));
        assert_eq!(table.cell(0, 1), Some("x"));
    }
}
