//! Application configuration for Draftsmith.
//!
//! User config lives at `~/.draftsmith/draftsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DraftsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "draftsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".draftsmith";

/// Placeholder token templates use unless configured otherwise.
pub const DEFAULT_PLACEHOLDER: &str = "{{SECTION_CONTENT}}";

// ---------------------------------------------------------------------------
// Config structs (matching draftsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Template structure settings.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Table calculation settings.
    #[serde(default)]
    pub tables: TablesConfig,

    /// LLM endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Text generation parameters.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// `[document]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Heading styles in level order: the first entry is level 1.
    #[serde(default = "default_heading_styles")]
    pub section_heading_styles: Vec<String>,

    /// Exact paragraph text marking where content goes (case- and
    /// whitespace-sensitive).
    #[serde(default = "default_placeholder")]
    pub placeholder_pattern: String,

    /// Suffix appended to the input file stem when no output path is given.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            section_heading_styles: default_heading_styles(),
            placeholder_pattern: default_placeholder(),
            output_suffix: default_output_suffix(),
        }
    }
}

impl DocumentConfig {
    /// Level for a heading style, or `None` if the style is not a heading.
    pub fn heading_level(&self, style: &str) -> Option<u32> {
        self.section_heading_styles
            .iter()
            .position(|s| s == style)
            .map(|i| i as u32 + 1)
    }
}

fn default_heading_styles() -> Vec<String> {
    vec!["Heading 1".into(), "Heading 2".into(), "Heading 3".into()]
}
fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.into()
}
fn default_output_suffix() -> String {
    "_generated".into()
}

/// `[tables]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesConfig {
    /// Overwrite result cells that already hold a number.
    #[serde(default)]
    pub recompute: bool,

    /// Text written when an average has no numeric operands.
    #[serde(default = "default_undefined_marker")]
    pub undefined_marker: String,

    /// Extra label terms on top of the built-in vocabulary, mapped to
    /// `sum`, `difference`, or `average`.
    #[serde(default)]
    pub vocabulary: BTreeMap<String, String>,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            recompute: false,
            undefined_marker: default_undefined_marker(),
            vocabulary: BTreeMap::new(),
        }
    }
}

fn default_undefined_marker() -> String {
    "N/A".into()
}

/// Which chat API the generation client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    /// Endpoint root, e.g. `http://localhost:11434` or `https://api.openai.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per generation call before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> LlmProvider {
    LlmProvider::Ollama
}
fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1:8b".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    120
}
/// Upper bound for `llm.max_retries`.
pub const MAX_RETRIES: u32 = 10;

fn default_max_retries() -> u32 {
    3
}

/// `[generation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Tone requested in the system prompt.
    #[serde(default = "default_tone")]
    pub tone: String,

    /// Length guidance requested in the system prompt.
    #[serde(default = "default_length_guideline")]
    pub length_guideline: String,

    /// How many preceding sections to preview in each prompt.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            tone: default_tone(),
            length_guideline: default_length_guideline(),
            context_window: default_context_window(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_top_p() -> f32 {
    0.9
}
fn default_tone() -> String {
    "professional".into()
}
fn default_length_guideline() -> String {
    "2-3 paragraphs".into()
}
fn default_context_window() -> usize {
    2
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.draftsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DraftsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.draftsmith/draftsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DraftsmithError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DraftsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| DraftsmithError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DraftsmithError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| DraftsmithError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}

/// Reject configurations the extractor or client cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.document.section_heading_styles.is_empty() {
        return Err(DraftsmithError::config(
            "document.section_heading_styles must name at least one style",
        ));
    }
    if config.document.placeholder_pattern.trim().is_empty() {
        return Err(DraftsmithError::config(
            "document.placeholder_pattern must not be blank",
        ));
    }
    if config.document.placeholder_pattern.trim() != config.document.placeholder_pattern {
        return Err(DraftsmithError::config(
            "document.placeholder_pattern must not start or end with whitespace",
        ));
    }
    for (term, op) in &config.tables.vocabulary {
        if !matches!(op.as_str(), "sum" | "difference" | "average") {
            return Err(DraftsmithError::config(format!(
                "tables.vocabulary.{term}: unknown operation '{op}' \
                 (expected sum, difference, or average)"
            )));
        }
    }
    if !(1..=MAX_RETRIES).contains(&config.llm.max_retries) {
        return Err(DraftsmithError::config(format!(
            "llm.max_retries must be between 1 and {MAX_RETRIES} (got {})",
            config.llm.max_retries
        )));
    }
    url::Url::parse(&config.llm.base_url).map_err(|e| {
        DraftsmithError::config(format!("llm.base_url '{}': {e}", config.llm.base_url))
    })?;
    Ok(())
}

/// Read the API key from the env var named in the config.
///
/// Only OpenAI-compatible endpoints require one.
pub fn resolve_api_key(config: &LlmConfig) -> Result<Option<String>> {
    let var_name = &config.api_key_env;
    match (config.provider, std::env::var(var_name)) {
        (_, Ok(val)) if !val.is_empty() => Ok(Some(val)),
        (LlmProvider::Ollama, _) => Ok(None),
        (LlmProvider::OpenAi, _) => Err(DraftsmithError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("placeholder_pattern"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.document.placeholder_pattern, DEFAULT_PLACEHOLDER);
        assert_eq!(parsed.llm.provider, LlmProvider::Ollama);
        assert_eq!(parsed.generation.context_window, 2);
    }

    #[test]
    fn heading_levels_follow_list_order() {
        let config = DocumentConfig::default();
        assert_eq!(config.heading_level("Heading 1"), Some(1));
        assert_eq!(config.heading_level("Heading 3"), Some(3));
        assert_eq!(config.heading_level("Normal"), None);
        assert_eq!(config.heading_level("heading 1"), None);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[document]
placeholder_pattern = "[[WRITE HERE]]"

[tables.vocabulary]
variance = "difference"
avg = "average"

[llm]
provider = "openai"
base_url = "https://api.openai.com"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        validate_config(&config).expect("valid");
        assert_eq!(config.document.placeholder_pattern, "[[WRITE HERE]]");
        assert_eq!(config.document.section_heading_styles.len(), 3);
        assert_eq!(config.tables.vocabulary.len(), 2);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.timeout_secs, 120);
    }

    #[test]
    fn validation_rejects_bad_vocabulary() {
        let mut config = AppConfig::default();
        config
            .tables
            .vocabulary
            .insert("median".into(), "middle".into());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown operation"));
    }

    #[test]
    fn validation_rejects_padded_placeholder() {
        let mut config = AppConfig::default();
        config.document.placeholder_pattern = " {{X}} ".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validation_bounds_max_retries() {
        let mut config = AppConfig::default();
        config.llm.max_retries = 40;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("llm.max_retries"));

        config.llm.max_retries = 0;
        assert!(validate_config(&config).is_err());

        config.llm.max_retries = MAX_RETRIES;
        validate_config(&config).expect("upper bound is allowed");
    }

    #[test]
    fn api_key_required_only_for_openai() {
        let mut llm = LlmConfig {
            api_key_env: "DS_TEST_NONEXISTENT_KEY_12345".into(),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&llm).expect("ollama needs no key"), None);

        llm.provider = LlmProvider::OpenAi;
        let result = resolve_api_key(&llm);
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
