//! CLI binary for carte2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, drives an `ExtractionSession`, and prints results.

use anyhow::{Context, Result};
use carte2json::{
    CardRecord, ExtractionConfig, ExtractionSession, ParsePolicy, PipelineObserver, PipelineState,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
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

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal observer: renders the pipeline's 0–100 progress value as a bar
/// and labels it with the current stage.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Préparation");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for CliObserver {
    fn on_state(&self, state: PipelineState, progress: u8) {
        let label = match state {
            PipelineState::Idle => "En attente",
            PipelineState::FileSelected => "Image chargée",
            PipelineState::Recognizing => "Reconnaissance (OCR)",
            PipelineState::Extracting => "Extraction des champs",
            PipelineState::Succeeded => "Terminé",
            PipelineState::Failed => "Échec",
        };
        self.bar.set_prefix(label);
        self.bar.set_position(u64::from(progress));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (field table on stdout)
  carte2json carte.jpg

  # Structured JSON output
  carte2json --json carte.jpg > carte.json

  # Write JSON to a file, show the OCR transcription too
  carte2json carte.png -o carte.json --show-text

  # Fail the run when the model response cannot be parsed
  carte2json --strict carte.jpg

  # Another OpenAI-compatible endpoint and model
  carte2json --base-url http://localhost:11434/v1 --model llama3 carte.jpg

ENVIRONMENT VARIABLES:
  GROQ_API_KEY           API key for the default Groq endpoint
  CARTE2JSON_MODEL       Override the completion model
  CARTE2JSON_BASE_URL    Override the completion endpoint
  CARTE2JSON_LANGUAGE    Override the Tesseract language tag

SETUP:
  1. Install Tesseract with French data:  apt install tesseract-ocr tesseract-ocr-fra
  2. Set the API key:                     export GROQ_API_KEY=gsk_...
  3. Extract:                             carte2json carte.jpg
"#;

/// Extract structured fields from a French mutuelle-card image.
#[derive(Parser, Debug)]
#[command(
    name = "carte2json",
    version,
    about = "Extract structured fields from French mutuelle-card images using OCR and LLMs",
    long_about = "Photograph or scan a carte mutuelle, transcribe it with Tesseract, and let an \
LLM map the text onto the nine-field card schema (insurer name, care network, AMC number, \
teletransmission number, …). Works with Groq by default and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the card image (PNG, JPEG, TIFF, BMP, WebP).
    input: PathBuf,

    /// Write the record as JSON to this file instead of stdout.
    #[arg(short, long, env = "CARTE2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Chat-completion model ID.
    #[arg(long, env = "CARTE2JSON_MODEL", default_value = carte2json::config::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "CARTE2JSON_BASE_URL", default_value = carte2json::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Environment variable holding the API key.
    #[arg(long, env = "CARTE2JSON_API_KEY_ENV", default_value = carte2json::config::DEFAULT_API_KEY_ENV)]
    api_key_env: String,

    /// Tesseract language tag.
    #[arg(long, env = "CARTE2JSON_LANGUAGE", default_value = carte2json::config::DEFAULT_LANGUAGE)]
    language: String,

    /// Treat an unparseable model response as a failed run.
    #[arg(long, env = "CARTE2JSON_STRICT")]
    strict: bool,

    /// Print the record as JSON on stdout.
    #[arg(long, env = "CARTE2JSON_JSON")]
    json: bool,

    /// Also print the raw OCR transcription.
    #[arg(long, env = "CARTE2JSON_SHOW_TEXT")]
    show_text: bool,

    /// OCR timeout in seconds.
    #[arg(long, env = "CARTE2JSON_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,

    /// Completion-call timeout in seconds.
    #[arg(long, env = "CARTE2JSON_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable the progress bar.
    #[arg(long, env = "CARTE2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CARTE2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "CARTE2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // ── Config ───────────────────────────────────────────────────────────
    let config = ExtractionConfig::builder()
        .model(&cli.model)
        .base_url(&cli.base_url)
        .api_key_env(&cli.api_key_env)
        .language(&cli.language)
        .parse_policy(if cli.strict {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Lenient
        })
        .ocr_timeout_secs(cli.ocr_timeout)
        .api_timeout_secs(cli.api_timeout)
        // The CLI exits right after the run; no reason to linger at 100.
        .progress_reset_ms(0)
        .build()?;

    // ── Run ──────────────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let mut session = ExtractionSession::new(config);
    if let Some(ref obs) = observer {
        let obs: Arc<dyn PipelineObserver> = obs.clone();
        session = session.with_observer(obs);
    }

    // Clear the bar before reporting any failure, selection included, so
    // the error message never prints over a still-ticking render.
    let result = match session.select_file(&cli.input).await {
        Ok(()) => session.run().await,
        Err(e) => Err(e),
    };

    if let Some(ref obs) = observer {
        obs.finish();
    }

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{} {}", red("✘"), e);
            std::process::exit(1);
        }
    };

    // ── Render ───────────────────────────────────────────────────────────
    if cli.show_text && !cli.json {
        eprintln!("{}", bold("Texte reconnu :"));
        eprintln!("{}", dim(output.recognized_text.trim()));
        eprintln!();
    }

    if cli.json {
        let payload = serde_json::to_string_pretty(&output)?;
        println!("{payload}");
    } else {
        match output.record {
            Some(ref record) => print_record_table(record),
            None => {
                let detail = output
                    .parse_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".into());
                eprintln!(
                    "{} OCR succeeded but no fields could be extracted ({detail})",
                    red("⚠")
                );
            }
        }
    }

    if let Some(ref path) = cli.output {
        let json = serde_json::to_string_pretty(&output.record)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{} Record written to {}", green("✔"), path.display());
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}",
            dim(&format!(
                "OCR {}ms · LLM {}ms · total {}ms",
                output.stats.ocr_duration_ms,
                output.stats.llm_duration_ms,
                output.stats.total_duration_ms
            ))
        );
    }

    Ok(())
}

/// Print the nine fields as an aligned table, dimming absent values.
fn print_record_table(record: &CardRecord) {
    let fields = record.fields();
    let width = fields.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);

    println!("{}", bold("Informations de la mutuelle :"));
    for (label, value) in fields {
        let pad = " ".repeat(width - label.chars().count());
        match value {
            Some(v) => println!("  {} {}{pad}  {}", green("✓"), label, v),
            None => println!("  {} {}{pad}  {}", dim("·"), dim(label), dim("—")),
        }
    }
    println!(
        "{}",
        dim(&format!("{}/9 champs extraits", record.filled_count()))
    );
}
