//! Document filling workflows for Draftsmith.
//!
//! This crate ties together structure extraction, text generation, content
//! insertion, and table calculation into the end-to-end `fill_document`
//! pipeline, plus loading and atomically saving documents.

pub mod generation;
pub mod inserter;
pub mod pipeline;
pub mod prompt;
pub mod store;

pub use generation::{GenerationOptions, Generator, HttpGenerator};
pub use inserter::{ContentInserter, insert_content, split_paragraphs};
pub use pipeline::{
    FillConfig, FillReport, ProgressReporter, SectionNotes, SectionOverrides, SilentProgress,
    fill_document,
};
pub use prompt::{Prompt, PromptInput, build_refinement_prompt, build_section_prompt, estimate_tokens};
pub use store::{load_document, output_path_for, save_document};
