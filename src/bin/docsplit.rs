//! CLI binary for docsplit.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProcessConfig`, runs the HTTP service or a one-off split, and prints
//! results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docsplit::server::{self, AppState};
use docsplit::{
    cleanup_all, inspect, process_document, ProcessConfig, ProcessOutput, ProcessProgressCallback,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while the classifier works, then a bar with
/// one log line per descriptor.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Splitting");
    }

    /// Stop the spinner so error output is not drawn over.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ProcessProgressCallback for CliProgressCallback {
    fn on_classify_start(&self, size_bytes: usize) {
        self.bar.set_prefix("Classifying");
        self.bar
            .set_message(format!("{} KiB sent to the model…", size_bytes / 1024));
    }

    fn on_classified(&self, descriptor_count: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {descriptor_count} documents"))
        ));
    }

    fn on_split_start(&self, total_pages: u32, descriptor_count: usize) {
        self.activate_bar(descriptor_count);
        self.bar
            .println(dim(&format!("  source has {total_pages} pages")));
    }

    fn on_artifact_written(&self, ordinal: usize, total: usize, filename: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            ordinal,
            total,
            filename
        ));
        self.bar.inc(1);
    }

    fn on_descriptor_rejected(&self, ordinal: usize, total: usize, reason: &str) {
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            red("✗"),
            ordinal,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_complete(&self, written: usize, rejected: usize) {
        self.bar.finish_and_clear();
        if rejected == 0 {
            eprintln!(
                "{} {} documents written",
                green("✔"),
                bold(&written.to_string())
            );
        } else {
            eprintln!(
                "{} {} documents written  ({} skipped)",
                cyan("⚠"),
                bold(&written.to_string()),
                red(&rejected.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 5000
  docsplit serve

  # Serve a built frontend as well
  docsplit serve --static-dir build

  # Split a local bundle
  docsplit split loan_package.pdf --output-dir out/

  # Machine-readable result
  docsplit split loan_package.pdf --json > result.json

  # Inspect a PDF (no API key needed)
  docsplit inspect loan_package.pdf

  # Remove every split artifact
  docsplit cleanup

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required for serve/split)
  DOCSPLIT_MODEL          Override model ID
  DOCSPLIT_OUTPUT_DIR     Directory for split documents
  PORT                    Port for `serve`
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Classify the sub-documents of a PDF bundle and split it into one PDF each.
#[derive(Parser, Debug)]
#[command(
    name = "docsplit",
    version,
    about = "Classify the sub-documents of a PDF bundle with Gemini and split them apart",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSPLIT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Classify and split a local PDF.
    Split(SplitArgs),
    /// Print page count, PDF version and size.
    Inspect {
        /// PDF file to inspect.
        input: PathBuf,
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Remove every split artifact.
    Cleanup {
        /// Directory holding split documents.
        #[arg(long, env = "DOCSPLIT_OUTPUT_DIR", default_value = "split_documents")]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "DOCSPLIT_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Built frontend to serve at `/`.
    #[arg(long, env = "DOCSPLIT_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Directory for transient uploads.
    #[arg(long, env = "DOCSPLIT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Maximum upload size in MiB.
    #[arg(long, env = "DOCSPLIT_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    #[command(flatten)]
    classifier: ClassifierArgs,
}

#[derive(Args, Debug)]
struct SplitArgs {
    /// PDF file to split.
    input: PathBuf,

    /// Output structured JSON (ProcessOutput) instead of a summary.
    #[arg(long, env = "DOCSPLIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSPLIT_NO_PROGRESS")]
    no_progress: bool,

    #[command(flatten)]
    classifier: ClassifierArgs,
}

/// Flags shared by every command that talks to the classifier.
#[derive(Args, Debug)]
struct ClassifierArgs {
    /// Gemini model ID.
    #[arg(long, env = "DOCSPLIT_MODEL", default_value = docsplit::config::DEFAULT_MODEL)]
    model: String,

    /// Gemini REST endpoint.
    #[arg(long, env = "DOCSPLIT_ENDPOINT", default_value = docsplit::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Max output tokens for the classification response.
    #[arg(long, env = "DOCSPLIT_MAX_TOKENS", default_value_t = 10_000)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0). Provider default when unset.
    #[arg(long, env = "DOCSPLIT_TEMPERATURE")]
    temperature: Option<f32>,

    /// Classification call timeout in seconds.
    #[arg(long, env = "DOCSPLIT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Retries on transient classification failures.
    #[arg(long, env = "DOCSPLIT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOCSPLIT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Directory for split documents.
    #[arg(long, env = "DOCSPLIT_OUTPUT_DIR", default_value = "split_documents")]
    output_dir: PathBuf,

    /// Write artifacts directly into the output directory instead of one
    /// subdirectory per request.
    #[arg(long, env = "DOCSPLIT_FLAT_OUTPUT")]
    flat_output: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for an interactive split.
    let bar_active = matches!(
        &cli.command,
        Command::Split(args) if !args.json && !args.no_progress
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Split(args) => run_split(args, bar_active, cli.quiet).await,
        Command::Inspect { input, json } => run_inspect(input, json).await,
        Command::Cleanup { output_dir } => {
            let config = ProcessConfig::builder()
                .output_dir(&output_dir)
                .build()
                .context("Invalid configuration")?;
            let report = cleanup_all(&config);
            if !cli.quiet {
                eprintln!(
                    "{} removed {} entries from {}{}",
                    green("✔"),
                    report.removed,
                    output_dir.display(),
                    if report.failed > 0 {
                        format!("  ({} failed)", red(&report.failed.to_string()))
                    } else {
                        String::new()
                    }
                );
            }
            Ok(())
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.classifier, None)
        .await?
        .into_builder()
        .upload_dir(&args.upload_dir)
        .max_upload_bytes(args.max_upload_mb.saturating_mul(1024 * 1024))
        .build()
        .context("Invalid configuration")?;

    let mut state = AppState::new(config).context("Failed to configure the classifier")?;
    if let Some(dir) = args.static_dir {
        state = state.with_static_dir(dir);
    }

    let addr = SocketAddr::new(args.host, args.port);
    server::serve(addr, Arc::new(state))
        .await
        .with_context(|| format!("Server on {addr} failed"))
}

async fn run_split(args: SplitArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let bar = show_progress.then(CliProgressCallback::new);
    let progress_cb = bar
        .clone()
        .map(|cb| cb as Arc<dyn ProcessProgressCallback>);
    let config = build_config(&args.classifier, progress_cb).await?;

    let result = process_document(&args.input, &config).await;
    if let Some(ref bar) = bar {
        bar.clear();
    }
    let output = result.with_context(|| format!("Failed to split {}", args.input.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !quiet {
        print_summary(&output, &config);
    }
    Ok(())
}

async fn run_inspect(input: PathBuf, json: bool) -> Result<()> {
    let meta = inspect(&input).await.context("Failed to inspect PDF")?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
    } else {
        println!("File:         {}", input.display());
        println!("Pages:        {}", meta.page_count);
        println!("PDF Version:  {}", meta.pdf_version);
        println!("Size:         {} bytes", meta.size_bytes);
    }
    Ok(())
}

fn print_summary(output: &ProcessOutput, config: &ProcessConfig) {
    let dir = match output.batch_id {
        Some(ref id) => config.output_dir.join(id),
        None => config.output_dir.clone(),
    };
    println!(
        "{}  {} pages  →  {}",
        bold(&output.filename),
        output.total_pages,
        dir.display()
    );
    println!(
        "  {:<4} {:<22} {:>9} {:>6}  {}",
        "#", "TYPE", "PAGES", "CONF", "FILE"
    );
    for (i, doc) in output.documents.iter().enumerate() {
        let d = &doc.descriptor;
        println!(
            "  {:<4} {:<22} {:>9} {:>6.2}  {}",
            i + 1,
            d.doc_type,
            format!("{}-{}", d.page_start, d.page_end),
            d.confidence,
            doc.filename
        );
    }
    for r in &output.rejected {
        println!("  {} #{} {}: {}", red("✗"), r.ordinal, r.doc_type, r.reason);
    }
    eprintln!(
        "{}",
        dim(&format!(
            "classify {}ms  ·  split {}ms  ·  total {}ms",
            output.stats.classify_duration_ms,
            output.stats.split_duration_ms,
            output.stats.total_duration_ms
        ))
    );
}

/// Map CLI args to `ProcessConfig`.
async fn build_config(
    args: &ClassifierArgs,
    progress: Option<ProgressCallback>,
) -> Result<ProcessConfig> {
    let mut builder = ProcessConfig::builder()
        .model(&args.model)
        .endpoint(&args.endpoint)
        .max_output_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout)
        .max_retries(args.max_retries)
        .output_dir(&args.output_dir)
        .isolate_batches(!args.flat_output);

    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
