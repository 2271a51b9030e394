//! Shared types, error model, and configuration for Draftsmith.
//!
//! This crate is the foundation depended on by all other Draftsmith crates.
//! It provides:
//! - [`DraftsmithError`] and [`StructuralWarning`] — the error/warning taxonomy
//! - The document model ([`Document`], [`Block`], [`Paragraph`], [`Table`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_PLACEHOLDER, DocumentConfig, GenerationConfig, LlmConfig, LlmProvider, MAX_RETRIES,
    TablesConfig, config_dir, config_file_path, init_config, init_config_at, load_config,
    load_config_from, resolve_api_key, validate_config,
};
pub use error::{DraftsmithError, Result, StructuralWarning};
pub use types::{
    Block, BlockId, BlockKind, DEFAULT_BODY_STYLE, Document, DocumentInfo, DocumentMetadata,
    Paragraph, Table,
};
