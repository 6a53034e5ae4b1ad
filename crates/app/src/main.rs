use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use paperbatch_core::{
    load_prompt, parse_base_url, run_batch, seconds, write_batches, write_manifest,
    write_summary_json, BatchJob, ClaudeConfig,
    ClaudeGenerator, ExistingOutput, ExtractionOptions, FileRecord, GeminiConfig, GeminiGenerator,
    GenerationSettings, GenerationStage, LopdfExtractor, PdfStage, ProgressReporter,
    ProviderDefaults, RetryPolicy, RunSummary, TextGenerator, TokioSleeper,
    CLAUDE_DEFAULTS, CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS, GEMINI_DEFAULTS,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PROMPT_PREVIEW_CHARS: usize = 100;

#[derive(Parser)]
#[command(name = "paperbatch", version, about = "Batch PDF extraction and LLM summarisation")]
struct Cli {
    /// Also write the run summary as JSON to this path.
    #[arg(long, global = true)]
    summary_json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct FolderArgs {
    /// Folder containing the input files.
    #[arg(long, env = "INPUT_FOLDER")]
    input: PathBuf,

    /// Folder receiving one output file per processed input.
    #[arg(long, env = "OUTPUT_FOLDER")]
    output: PathBuf,

    /// Leave inputs alone when their output file already exists.
    #[arg(long, default_value_t = false)]
    skip_existing: bool,
}

impl FolderArgs {
    fn job(&self, recursive: bool) -> BatchJob {
        let mut job = BatchJob::new(&self.input, &self.output);
        job.recursive = recursive;
        if self.skip_existing {
            job.existing = ExistingOutput::Skip;
        }
        job
    }
}

#[derive(Args)]
struct GenerationArgs {
    /// Text file whose contents prefix every document.
    #[arg(long, env = "PROMPT_FILE")]
    prompt_file: PathBuf,

    /// Seconds to wait after each file before the next one.
    #[arg(long, env = "DELAY_BETWEEN_CALLS")]
    delay_between_calls: Option<f64>,

    /// Seconds to wait before retrying a rate-limited or dropped request.
    #[arg(long, env = "RATE_LIMIT_RETRY_DELAY")]
    rate_limit_retry_delay: Option<f64>,

    /// Attempts per file, including the first.
    #[arg(long, env = "MAX_RETRIES", value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: Option<u32>,

    /// Override the provider base URL.
    #[arg(long)]
    api_base: Option<String>,
}

impl GenerationArgs {
    fn settings(&self, defaults: ProviderDefaults) -> anyhow::Result<GenerationSettings> {
        let prompt = load_prompt(&self.prompt_file)?;
        let delay_between_calls = seconds(
            self.delay_between_calls
                .unwrap_or(defaults.delay_between_calls_secs),
        )?;
        let retry_delay = seconds(
            self.rate_limit_retry_delay
                .unwrap_or(defaults.retry_delay_secs),
        )?;
        let attempts = self.max_retries.unwrap_or(defaults.max_attempts);

        Ok(GenerationSettings {
            prompt,
            delay_between_calls,
            retry: RetryPolicy::new(attempts, retry_delay),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Extract every PDF in a folder to a .txt file.
    Extract {
        #[command(flatten)]
        folders: FolderArgs,

        /// Include PDFs in subfolders.
        #[arg(long, default_value_t = false)]
        recursive: bool,

        /// Prefix each page with a `[Page N]` line.
        #[arg(long, default_value_t = false)]
        page_markers: bool,

        /// Keep the raw extracted text without cleanup.
        #[arg(long, default_value_t = false)]
        no_clean: bool,

        /// Write MANIFEST.md into the output folder.
        #[arg(long, default_value_t = false)]
        manifest: bool,

        /// Also concatenate extracted papers, N per file, under `batches/`.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        batch_size: Option<u32>,
    },
    /// Summarise every .txt file in a folder with Gemini.
    Gemini {
        #[command(flatten)]
        folders: FolderArgs,

        #[command(flatten)]
        generation: GenerationArgs,

        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: String,

        #[arg(long, env = "GEMINI_MODEL", default_value = GEMINI_DEFAULTS.model)]
        model: String,
    },
    /// Summarise every .txt file in a folder with Claude.
    Claude {
        #[command(flatten)]
        folders: FolderArgs,

        #[command(flatten)]
        generation: GenerationArgs,

        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: String,

        #[arg(long, env = "CLAUDE_MODEL", default_value = CLAUDE_DEFAULTS.model)]
        model: String,

        /// Response length cap in tokens.
        #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS)]
        max_output_tokens: u32,
    },
}

struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn batch_started(&self, job: &BatchJob, total: usize) {
        println!("Found {total} file(s) to process");
        println!("Output folder: {}", job.output_dir.display());
        println!("{}", "-".repeat(50));
    }

    fn file_started(&self, index: usize, total: usize, path: &Path) {
        println!("\n{}", progress_line(index, total, path));
    }

    fn input_size(&self, chars: usize) {
        println!("{}", input_size_line(chars));
    }

    fn file_finished(&self, record: &FileRecord) {
        println!("  {}", record.status);
    }
}

fn input_size_line(chars: usize) -> String {
    format!("  input size: {chars} characters")
}

fn progress_line(index: usize, total: usize, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    format!("[{index}/{total}] Processing: {name}")
}

fn prompt_preview(prompt: &str) -> String {
    let mut preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn print_header(title: &str, job: &BatchJob, model: &str, settings: &GenerationSettings) {
    let rule = "=".repeat(50);
    println!("{rule}\n{title}\n{rule}");
    println!("Input folder:   {}", job.input_dir.display());
    println!("Output folder:  {}", job.output_dir.display());
    println!("Model:          {model}");
    println!(
        "Delay:          {}s between calls, {}s before retry, {} attempt(s)",
        settings.delay_between_calls.as_secs_f64(),
        settings.retry.retry_delay.as_secs_f64(),
        settings.retry.max_attempts
    );
    println!("Prompt preview: {}", prompt_preview(&settings.prompt));
}

async fn run_generation<G: TextGenerator>(
    job: &BatchJob,
    generator: G,
    settings: GenerationSettings,
) -> anyhow::Result<RunSummary> {
    let stage = GenerationStage::new(generator, settings);
    let summary = run_batch(job, &stage, &TokioSleeper, &ConsoleReporter).await?;
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app_version = env!("CARGO_PKG_VERSION");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "paperbatch boot"
    );

    let summary = match cli.command {
        Command::Extract {
            folders,
            recursive,
            page_markers,
            no_clean,
            manifest,
            batch_size,
        } => {
            let job = folders.job(recursive);
            let options = ExtractionOptions {
                page_markers,
                clean: !no_clean,
            };
            let stage = PdfStage::new(LopdfExtractor, options);
            let summary = run_batch(&job, &stage, &TokioSleeper, &ConsoleReporter).await?;

            if let Some(size) = batch_size {
                let size = usize::try_from(size).context("batch size does not fit in memory")?;
                let paths = write_batches(&summary, &job.output_dir, size)
                    .with_context(|| format!("writing upload batches to {}", job.output_dir.display()))?;
                println!("\nCreated {} upload batch file(s)", paths.len());
                for path in &paths {
                    println!("  {}", path.display());
                }
            }

            if manifest {
                let path = write_manifest(&summary, &job.output_dir)
                    .with_context(|| format!("writing manifest to {}", job.output_dir.display()))?;
                println!("\nManifest: {}", path.display());
            }
            summary
        }
        Command::Gemini {
            folders,
            generation,
            api_key,
            model,
        } => {
            let job = folders.job(false);
            let settings = generation.settings(GEMINI_DEFAULTS)?;
            let mut config = GeminiConfig::new(api_key, model)?;
            if let Some(base) = &generation.api_base {
                config.base_url = parse_base_url(base)?;
            }
            let generator = GeminiGenerator::new(config)?;

            print_header("TXT to MD Batch Processor (Gemini)", &job, generator.model(), &settings);
            run_generation(&job, generator, settings).await?
        }
        Command::Claude {
            folders,
            generation,
            api_key,
            model,
            max_output_tokens,
        } => {
            let job = folders.job(false);
            let settings = generation.settings(CLAUDE_DEFAULTS)?;
            let mut config = ClaudeConfig::new(api_key, model)?;
            config.max_output_tokens = max_output_tokens;
            if let Some(base) = &generation.api_base {
                config.base_url = parse_base_url(base)?;
            }
            let generator = ClaudeGenerator::new(config)?;

            print_header("TXT to MD Batch Processor (Claude)", &job, generator.model(), &settings);
            println!("Max output tokens: {max_output_tokens}");
            run_generation(&job, generator, settings).await?
        }
    };

    if let Some(path) = &cli.summary_json {
        write_summary_json(&summary, path)
            .with_context(|| format!("writing summary json to {}", path.display()))?;
        info!(path = %path.display(), "summary json written");
    }

    println!("\n{summary}");
    if summary.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }

    println!("Done!");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn progress_line_shows_position_and_name() {
        assert_eq!(
            progress_line(2, 7, Path::new("/data/in/paper.txt")),
            "[2/7] Processing: paper.txt"
        );
    }

    #[test]
    fn input_size_is_reported_in_characters() {
        assert_eq!(input_size_line(1_234), "  input size: 1234 characters");
    }

    #[test]
    fn extract_accepts_batch_size_and_summary_json() {
        let cli = Cli::try_parse_from([
            "paperbatch",
            "extract",
            "--input",
            "pdfs",
            "--output",
            "out",
            "--recursive",
            "--batch-size",
            "5",
            "--summary-json",
            "out/summary.json",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.summary_json, Some(PathBuf::from("out/summary.json")));
        match cli.command {
            Command::Extract {
                batch_size,
                recursive,
                ..
            } => {
                assert_eq!(batch_size, Some(5));
                assert!(recursive);
            }
            _ => panic!("expected extract subcommand"),
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = Cli::try_parse_from([
            "paperbatch",
            "extract",
            "--input",
            "pdfs",
            "--output",
            "out",
            "--batch-size",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn long_prompts_are_previewed() {
        let prompt = "p".repeat(150);
        assert_eq!(prompt_preview(&prompt).chars().count(), 103);
        assert_eq!(prompt_preview("Summarize:"), "Summarize:");
    }

    #[test]
    fn claude_flags_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "paperbatch",
            "claude",
            "--input",
            "in",
            "--output",
            "out",
            "--prompt-file",
            "Prompt.txt",
            "--api-key",
            "test-key",
            "--max-retries",
            "4",
        ])
        .expect("arguments should parse");

        match cli.command {
            Command::Claude {
                generation,
                max_output_tokens,
                folders,
                ..
            } => {
                assert_eq!(generation.max_retries, Some(4));
                assert_eq!(max_output_tokens, CLAUDE_DEFAULT_MAX_OUTPUT_TOKENS);
                assert_eq!(folders.job(false).existing, ExistingOutput::Overwrite);
            }
            _ => panic!("expected claude subcommand"),
        }
    }

    #[test]
    fn zero_retries_are_rejected() {
        let result = Cli::try_parse_from([
            "paperbatch",
            "gemini",
            "--input",
            "in",
            "--output",
            "out",
            "--prompt-file",
            "Prompt.txt",
            "--api-key",
            "k",
            "--max-retries",
            "0",
        ]);
        assert!(result.is_err());
    }
}
