//! Error and warning types for Draftsmith.
//!
//! Library crates use [`DraftsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! [`StructuralWarning`] is the non-fatal half of the taxonomy: it is logged
//! and collected into reports, never returned as an `Err`.

use std::path::PathBuf;

use crate::types::BlockId;

/// Top-level error type for all Draftsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DraftsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input could not be read as a document tree at all.
    #[error("unparseable document: {message}")]
    UnparseableDocument { message: String },

    /// The section's placeholder is gone: it was already consumed by an
    /// earlier insertion, or the section reference is stale.
    #[error("placeholder not found for section {section_id}")]
    PlaceholderNotFound { section_id: usize },

    /// The section id does not refer to any extracted section.
    #[error("unknown section id {section_id}")]
    UnknownSection { section_id: usize },

    /// Text generation failed (transport, API, or response parsing).
    #[error("generation error: {0}")]
    Generation(String),

    /// Data validation error (empty content, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DraftsmithError>;

impl DraftsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an unparseable-document error from any displayable message.
    pub fn unparseable(msg: impl Into<String>) -> Self {
        Self::UnparseableDocument {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A recoverable problem found in the document's structure.
///
/// Processing continues past every warning; callers get them back as a list
/// alongside whatever succeeded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralWarning {
    /// A section contains more than one placeholder; the first one wins.
    #[error("section {section_id} ({heading:?}) has a second placeholder at block {block}; ignored")]
    DuplicatePlaceholder {
        section_id: usize,
        heading: String,
        block: BlockId,
    },

    /// A table could not be processed at all.
    #[error("table {table} skipped: {reason}")]
    MalformedTable { table: usize, reason: String },

    /// A sum or difference found nothing numeric to work with.
    #[error("table {table}: no numeric operands for cell ({row}, {col}); left unchanged")]
    NoNumericOperands { table: usize, row: usize, col: usize },

    /// Generation for a section failed; its placeholder was left in place.
    #[error("section {section_id} ({heading:?}) not filled: {reason}")]
    SectionNotFilled {
        section_id: usize,
        heading: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DraftsmithError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DraftsmithError::PlaceholderNotFound { section_id: 4 };
        assert_eq!(err.to_string(), "placeholder not found for section 4");
    }

    #[test]
    fn warning_display_names_the_table() {
        let warning = StructuralWarning::MalformedTable {
            table: 2,
            reason: "no operand axis".into(),
        };
        assert_eq!(warning.to_string(), "table 2 skipped: no operand axis");
    }
}
