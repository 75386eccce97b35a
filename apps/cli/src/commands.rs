//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use illustra_core::{EnrichRequest, Pipeline, ProgressReporter, RunOutcome};
use illustra_shared::{AppConfig, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// illustra: pick, upload and embed images for an article.
#[derive(Parser)]
#[command(
    name = "illustra",
    version,
    about = "Illustrate an article: cover image, section images and hosted inline images.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.illustra/illustra.toml.
    #[arg(long, global = true)]
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
    /// Resolve a cover, embed section images and rewrite local images.
    Enrich {
        /// Article file (.md, .markdown, .html or plain text).
        #[arg(long)]
        content_file: PathBuf,

        /// Cover image to use instead of searching for one.
        #[arg(long)]
        cover: Option<PathBuf>,

        /// Directory of pre-approved images, preferred over search.
        #[arg(long)]
        material_dir: Option<PathBuf>,

        /// Do not insert images into article sections.
        #[arg(long)]
        no_content_images: bool,

        /// Write enriched HTML here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Keep downloaded images instead of deleting them afterwards.
        #[arg(long)]
        keep_images: bool,
    },

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
///
/// Logs go to stderr so enriched HTML on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "illustra=info",
        1 => "illustra=debug",
        _ => "illustra=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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
    let config_path = cli.config;
    match cli.command {
        Command::Enrich {
            content_file,
            cover,
            material_dir,
            no_content_images,
            out,
            keep_images,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if no_content_images {
                config.defaults.content_images = false;
            }
            let request = EnrichRequest {
                content_file,
                cover,
                material_dir,
            };
            cmd_enrich(&config, &request, out.as_deref(), keep_images).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_enrich(
    config: &AppConfig,
    request: &EnrichRequest,
    out: Option<&Path>,
    keep_images: bool,
) -> Result<()> {
    let cache_dir = config
        .defaults
        .cache_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| request.base_dir().to_path_buf());

    let pipeline = Pipeline::from_config(config, &cache_dir)?;

    info!(
        content = %request.content_file.display(),
        cache = %cache_dir.display(),
        content_images = pipeline.config().content_images,
        "enriching article"
    );

    let reporter = CliProgress::new();
    let outcome = match pipeline.run(request, &reporter).await {
        Ok(outcome) => outcome,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            let kind = if e.is_fatal() { "aborted" } else { "failed" };
            return Err(eyre!("enrichment {kind}: {e}"));
        }
    };

    emit_output(&outcome, out, keep_images)?;
    print_summary(&outcome, out);
    Ok(())
}

/// Write the enriched HTML, then drop downloaded images.
///
/// Uploads have already succeeded at this point, so cleanup runs even when
/// writing the output fails.
fn emit_output(outcome: &RunOutcome, out: Option<&Path>, keep_images: bool) -> Result<()> {
    let written = match out {
        Some(path) => std::fs::write(path, &outcome.content)
            .wrap_err_with(|| format!("failed to write {}", path.display())),
        None => {
            println!("{}", outcome.content);
            Ok(())
        }
    };

    if keep_images {
        info!("keeping downloaded images");
    } else {
        let removed = outcome.cleanup();
        if removed < outcome.downloaded().count() {
            warn!(removed, "some downloaded images could not be removed");
        }
    }

    written
}

fn print_summary(outcome: &RunOutcome, out: Option<&Path>) {
    eprintln!();
    eprintln!("  Article enriched.");
    eprintln!("  Run:      {}", outcome.run_id);
    eprintln!(
        "  Cover:    {} ({}) media_id={}",
        outcome.cover.local_path.display(),
        outcome.cover.provider(),
        outcome.cover_media_id
    );
    eprintln!(
        "  Sections: {} inserted, {} skipped",
        outcome
            .section_images
            .iter()
            .filter(|a| a.hosted_url.is_some())
            .count(),
        outcome.skipped_slots.len()
    );
    eprintln!("  Inline:   {} rewritten", outcome.inline_rewritten);
    if let Some(path) = out {
        eprintln!("  Output:   {}", path.display());
    }
    eprintln!("  Time:     {:.1}s", outcome.elapsed.as_secs_f64());
    eprintln!();
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn slot_filled(&self, position: usize, provider: &str) {
        self.spinner
            .set_message(format!("Section {position}: image from {provider}"));
    }

    fn slot_skipped(&self, position: usize, reason: &str) {
        self.spinner
            .println(format!("  section {position} left without image: {reason}"));
    }

    fn done(&self, _outcome: &RunOutcome) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use illustra_shared::{ImageAsset, ImageSource, RunId};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn enrich_flags_parse() {
        let cli = Cli::parse_from([
            "illustra",
            "-v",
            "enrich",
            "--content-file",
            "post.md",
            "--material-dir",
            "pics",
            "--no-content-images",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Enrich {
                content_file,
                material_dir,
                no_content_images,
                cover,
                ..
            } => {
                assert_eq!(content_file, PathBuf::from("post.md"));
                assert_eq!(material_dir, Some(PathBuf::from("pics")));
                assert!(no_content_images);
                assert!(cover.is_none());
            }
            Command::Config { .. } => panic!("expected enrich"),
        }
    }

    fn outcome_with_download(dir: &Path) -> (RunOutcome, PathBuf) {
        let image = dir.join("pexels-city_0badf00d.jpg");
        std::fs::write(&image, [0xFF, 0xD8, 0xFF]).unwrap();
        let outcome = RunOutcome {
            run_id: RunId::new(),
            content: "<p>hello</p>".into(),
            cover: ImageAsset {
                local_path: image.clone(),
                source: ImageSource::Downloaded {
                    provider: "pexels".into(),
                },
                identity: "pexels:0badf00d".into(),
                hosted_url: None,
            },
            cover_media_id: "MEDIA_1".into(),
            section_images: Vec::new(),
            skipped_slots: Vec::new(),
            inline_rewritten: 0,
            elapsed: std::time::Duration::ZERO,
        };
        (outcome, image)
    }

    #[test]
    fn failed_output_write_still_removes_downloads() {
        let dir = std::env::temp_dir().join(format!("illustra-cli-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let (outcome, image) = outcome_with_download(&dir);

        // A directory cannot be written as a file.
        let result = emit_output(&outcome, Some(&dir), false);

        assert!(result.is_err());
        assert!(!image.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn keep_images_leaves_downloads() {
        let dir = std::env::temp_dir().join(format!("illustra-cli-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let (outcome, image) = outcome_with_download(&dir);
        let out = dir.join("out.html");

        emit_output(&outcome, Some(&out), true).unwrap();

        assert!(image.exists());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "<p>hello</p>");
        std::fs::remove_dir_all(&dir).ok();
    }
}
