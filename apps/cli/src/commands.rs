//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use draftsmith_core::{
    FillConfig, FillReport, HttpGenerator, ProgressReporter, SectionNotes, fill_document,
    load_document, output_path_for, save_document,
};
use draftsmith_shared::{
    AppConfig, StructuralWarning, init_config, init_config_at, load_config, load_config_from,
    resolve_api_key,
};
use draftsmith_structure::{Section, SectionExtractor};
use draftsmith_tables::TableCalculator;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Draftsmith — fill document templates with generated prose.
#[derive(Parser)]
#[command(
    name = "draftsmith",
    version,
    about = "Fill document templates with generated section content and computed tables.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.draftsmith/draftsmith.toml.
    #[arg(long, global = true, env = "DRAFTSMITH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show document information and its section outline.
    Inspect {
        /// Document to read.
        doc: PathBuf,

        /// Print sections as JSON instead of an outline.
        #[arg(long)]
        json: bool,
    },

    /// Generate content for every placeholder and compute tables.
    Fill {
        /// Template document.
        doc: PathBuf,

        /// TOML file with per-section notes.
        #[arg(short, long)]
        notes: Option<PathBuf>,

        /// Output path (defaults to <stem><output_suffix>.<ext> next to the input).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Leave tables untouched.
        #[arg(long)]
        skip_tables: bool,
    },

    /// Compute labelled table cells only.
    Tables {
        /// Document to process.
        doc: PathBuf,

        /// Output path (defaults to <stem><output_suffix>.<ext> next to the input).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Overwrite result cells that already hold a number.
        #[arg(long)]
        recompute: bool,
    },

    /// Send a short prompt to the configured model to verify the connection.
    Check,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "draftsmith=info",
        1 => "draftsmith=debug",
        _ => "draftsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Inspect { doc, json } => cmd_inspect(config_path, &doc, json),
        Command::Fill {
            doc,
            notes,
            out,
            skip_tables,
        } => cmd_fill(config_path, &doc, notes.as_deref(), out.as_deref(), skip_tables).await,
        Command::Tables {
            doc,
            out,
            recompute,
        } => cmd_tables(config_path, &doc, out.as_deref(), recompute),
        Command::Check => cmd_check(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Load the config from `--config` if given, else the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Read a notes file.
///
/// ```toml
/// document_context = "What the document is about"
///
/// [notes]
/// "Heading text" = "Notes for that section"
///
/// [sections."Heading text"]
/// tone = "technical"
/// length = "1-2 paragraphs"
/// ```
fn load_notes(path: &Path) -> Result<SectionNotes> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read notes file {}", path.display()))?;
    let notes: SectionNotes = toml::from_str(&content)
        .wrap_err_with(|| format!("failed to parse notes file {}", path.display()))?;
    Ok(notes)
}

fn output_path(input: &Path, out: Option<&Path>, config: &AppConfig) -> PathBuf {
    out.map(Path::to_path_buf)
        .unwrap_or_else(|| output_path_for(input, &config.document.output_suffix))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_inspect(config_path: Option<&Path>, path: &Path, json: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    let doc = load_document(path)?;
    let extraction = SectionExtractor::new(config.document.clone()).extract(&doc);

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction.sections)?);
        return Ok(());
    }

    let info = doc.info();
    println!();
    println!("  Document:   {}", path.display());
    if let Some(title) = &info.title {
        println!("  Title:      {title}");
    }
    if let Some(author) = &info.author {
        println!("  Author:     {author}");
    }
    println!("  Paragraphs: {}", info.paragraph_count);
    println!("  Tables:     {}", info.table_count);
    println!("  Words:      {}", info.word_count);
    println!();

    let needing = extraction.sections.iter().filter(|s| s.needs_content()).count();
    println!(
        "  Sections ({} total, {needing} need content):",
        extraction.sections.len()
    );
    for section in &extraction.sections {
        println!("  {}", outline_line(section));
    }
    print_warnings(&extraction.warnings);
    println!();
    Ok(())
}

async fn cmd_fill(
    config_path: Option<&Path>,
    path: &Path,
    notes_path: Option<&Path>,
    out: Option<&Path>,
    skip_tables: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let notes = match notes_path {
        Some(p) => load_notes(p)?,
        None => SectionNotes::default(),
    };

    let api_key = resolve_api_key(&config.llm)?;
    let generator = HttpGenerator::new(&config.llm, api_key)?;
    let mut doc = load_document(path)?;

    info!(
        doc = %path.display(),
        provider = %config.llm.provider,
        model = %config.llm.model,
        "filling document"
    );

    let reporter = CliProgress::new();
    let fill_config = FillConfig::from_app(&config, skip_tables);
    let report = fill_document(&mut doc, &generator, &notes, &fill_config, &reporter).await?;

    let target = output_path(path, out, &config);
    save_document(&mut doc, &target)?;

    // Print summary
    println!();
    println!("  Document filled.");
    println!(
        "  Sections: {}/{} filled",
        report.sections_filled(),
        report.sections_needing_content
    );
    match &report.tables {
        Some(tables) => println!(
            "  Tables:   {} processed, {} cells updated",
            tables.tables_processed, tables.cells_modified
        ),
        None => println!("  Tables:   skipped"),
    }
    println!("  Output:   {}", target.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    print_warnings(&report.warnings);
    println!();

    Ok(())
}

fn cmd_tables(
    config_path: Option<&Path>,
    path: &Path,
    out: Option<&Path>,
    recompute: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut tables_config = config.tables.clone();
    tables_config.recompute |= recompute;

    let mut doc = load_document(path)?;
    let report = TableCalculator::from_config(&tables_config)?.process_document(&mut doc);

    let target = output_path(path, out, &config);
    save_document(&mut doc, &target)?;

    println!();
    println!(
        "  Tables: {} processed, {} skipped",
        report.tables_processed, report.tables_skipped
    );
    println!("  Cells:  {} updated", report.cells_modified);
    println!("  Output: {}", target.display());
    print_warnings(&report.warnings);
    println!();
    Ok(())
}

async fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let api_key = resolve_api_key(&config.llm)?;
    let generator = HttpGenerator::new(&config.llm, api_key)?;

    println!();
    println!(
        "  Checking {} ({}) at {}",
        config.llm.model,
        config.llm.provider,
        generator.endpoint()
    );
    let reply = generator
        .test_connection()
        .await
        .wrap_err("connection check failed")?;
    println!("  Connection OK. Model replied: {}", reply.trim());
    println!();
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// One outline row: indented by level, `*` marking sections to fill.
fn outline_line(section: &Section) -> String {
    let indent = "  ".repeat(section.level.saturating_sub(1) as usize);
    let marker = if section.needs_content() { '*' } else { ' ' };
    let heading = if section.is_implicit_root() {
        "(before first heading)"
    } else {
        section.heading_text.as_str()
    };
    let tables = match section.tables.len() {
        0 => String::new(),
        n => format!(" [{n} table(s)]"),
    };
    format!("{marker} {indent}{heading}{tables}")
}

fn print_warnings(warnings: &[StructuralWarning]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("  Warnings ({}):", warnings.len());
    for warning in warnings {
        println!("  - {warning}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn section_started(&self, heading: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Generating [{current}/{total}] {heading}"));
    }

    fn section_finished(&self, heading: &str, ok: bool) {
        if !ok {
            self.spinner.println(format!("  ! {heading}: generation failed"));
        }
    }

    fn done(&self, _report: &FillReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fill_flags() {
        let cli = Cli::try_parse_from([
            "draftsmith",
            "-vv",
            "fill",
            "plan.json",
            "--notes",
            "notes.toml",
            "--skip-tables",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Fill {
                doc,
                notes,
                out,
                skip_tables,
            } => {
                assert_eq!(doc, PathBuf::from("plan.json"));
                assert_eq!(notes, Some(PathBuf::from("notes.toml")));
                assert!(out.is_none());
                assert!(skip_tables);
            }
            _ => panic!("expected fill"),
        }
    }

    #[test]
    fn parses_check_with_config() {
        let cli = Cli::try_parse_from(["draftsmith", "--config", "alt.toml", "check"]).unwrap();
        assert!(matches!(cli.command, Command::Check));
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }

    #[test]
    fn outline_marks_and_indents() {
        let section = Section {
            id: 1,
            heading_text: "Milestones".into(),
            level: 2,
            description: String::new(),
            placeholder_position: Some(draftsmith_shared::BlockId(4)),
            parent_id: Some(0),
            heading_block: Some(draftsmith_shared::BlockId(3)),
            tables: Vec::new(),
        };
        assert_eq!(outline_line(&section), "*   Milestones");
    }

    #[test]
    fn default_output_uses_configured_suffix() {
        let config = AppConfig::default();
        assert_eq!(
            output_path(Path::new("docs/plan.json"), None, &config),
            PathBuf::from("docs/plan_generated.json")
        );
        assert_eq!(
            output_path(Path::new("plan.json"), Some(Path::new("out.json")), &config),
            PathBuf::from("out.json")
        );
    }
}
