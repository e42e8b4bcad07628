//! MRI classification CLI tool
//!
//! Classifies one or more images with a shared classifier and prints one
//! result per input.

use super::config::CliConfigBuilder;
use crate::{
    error::ClassifierError,
    processor::{Analysis, ImageClassifier},
    tracing_config::{init_cli_tracing, spans},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::Instrument;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif", "gif"];

/// Brain MRI slice classification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "mri-classify")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "show_providers")]
    pub input: Vec<String>,

    /// Model file path or URL [default: public/model/brain_tumor.onnx]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Label map path or URL [default: public/model/class_map.json]
    #[arg(short, long)]
    pub labels: Option<String>,

    /// Directory or URL prefix holding brain_tumor.onnx and class_map.json
    #[arg(long, value_name = "DIR_OR_URL")]
    pub model_dir: Option<String>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:cuda, tract:cpu)
    #[arg(short, long)]
    pub execution_provider: Option<String>,

    /// Number of inference threads (0 = runtime default)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Number of images analyzed concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Result output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Text)]
    pub format: CliOutputFormat,

    /// Append one JSON line per successful prediction to this file
    #[arg(long, value_name = "PATH")]
    pub prediction_log: Option<PathBuf>,

    /// Remember the first artifact load failure instead of retrying
    #[arg(long)]
    pub sticky_load_failures: bool,

    /// Cache directory for artifacts fetched over HTTP
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging (-v: debug for this crate, -vv: trace everything)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g., "*.png")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Show a progress bar for batch inputs
    #[arg(long)]
    pub progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    /// Human-readable summary
    Text,
    /// One JSON object per line
    Json,
}

/// Where one analysis takes its bytes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    fn name(&self) -> String {
        match self {
            Self::Stdin => "-".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = uuid::Uuid::new_v4().to_string();
    let _tracing_guard =
        init_cli_tracing(cli.verbose, &session_id).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let provider =
        ExecutionProviderManager::provider_to_string(config.backend_type, config.execution_provider);
    let session_span = spans::session(
        &session_id,
        &config.model_spec.model.display_name(),
        &provider,
    );

    info!("Model: {}", config.model_spec.model.display_name());
    info!("Labels: {}", config.model_spec.labels.display_name());
    info!("Backend: {}", provider);

    let classifier = ImageClassifier::new(config).context("Failed to create classifier")?;

    let inputs = collect_inputs(&cli)?;
    if inputs.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let start_time = Instant::now();
    let (processed, failed) = process_inputs(&cli, &classifier, inputs)
        .instrument(session_span)
        .await?;
    info!(
        "Analyzed {} image(s) in {:.2}s ({} failed)",
        processed,
        start_time.elapsed().as_secs_f64(),
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, processed + failed);
    }
    Ok(())
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("Backend and Execution Provider Diagnostics");
    println!("==========================================");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nExecution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "available"
        } else {
            "not available"
        };
        println!(
            "  {:<12} {:<14} {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\nUsage Examples:");
    println!("  --execution-provider onnx:auto    # Best available ONNX Runtime provider");
    println!("  --execution-provider onnx:cuda    # NVIDIA CUDA");
    println!("  --execution-provider onnx:coreml  # Apple CoreML");
    println!("  --execution-provider onnx:cpu     # ONNX Runtime on CPU");
    println!("  --execution-provider tract        # Pure Rust Tract backend (same as tract:cpu)");
}

/// Expand files, directories and stdin into a sorted list of inputs
fn collect_inputs(cli: &Cli) -> Result<Vec<InputSource>> {
    if cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-") {
        return Ok(vec![InputSource::Stdin]);
    }

    let mut files = Vec::new();
    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_file() {
            // explicit files are analyzed whatever their extension
            files.push(path);
        } else if path.is_dir() {
            files.extend(find_image_files(&path, cli.recursive, cli.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files.into_iter().map(InputSource::File).collect())
}

/// Analyze every input, printing results in input order
async fn process_inputs(
    cli: &Cli,
    classifier: &ImageClassifier,
    inputs: Vec<InputSource>,
) -> Result<(usize, usize)> {
    let file_count = inputs.len();
    let batch_span = spans::batch_processing(file_count);

    let progress = if cli.progress && file_count > 1 {
        let pb = ProgressBar::new(file_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut results = stream::iter(inputs)
        .map(|input| {
            let classifier = classifier.clone();
            async move {
                let name = input.name();
                let outcome = analyze_input(&classifier, &input).await;
                (name, outcome)
            }
            .instrument(batch_span.clone())
        })
        .buffered(cli.jobs);

    let mut processed = 0;
    let mut failed = 0;
    let stdout = std::io::stdout();

    while let Some((name, outcome)) = results.next().await {
        let line = match &outcome {
            Ok(analysis) => {
                processed += 1;
                render_success(analysis, cli.format)?
            },
            Err(e) => {
                failed += 1;
                error!("Failed to analyze {}: {}", name, e);
                render_failure(&name, e, cli.format)?
            },
        };

        let mut out = stdout.lock();
        if let Some(pb) = &progress {
            pb.suspend(|| writeln!(out, "{}", line))?;
            pb.set_message(name);
            pb.inc(1);
        } else {
            writeln!(out, "{}", line)?;
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Done! Analyzed: {processed}, Failed: {failed}"));
    }

    Ok((processed, failed))
}

async fn analyze_input(
    classifier: &ImageClassifier,
    input: &InputSource,
) -> crate::Result<Analysis> {
    let bytes = match input {
        InputSource::Stdin => {
            let mut buffer = Vec::new();
            tokio::io::stdin().read_to_end(&mut buffer).await?;
            buffer
        },
        InputSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| ClassifierError::file_io_error("read image", path, &e))?,
    };
    classifier.analyze_detailed(&input.name(), &bytes).await
}

fn render_success(analysis: &Analysis, format: CliOutputFormat) -> Result<String> {
    let prediction = &analysis.prediction;
    match format {
        CliOutputFormat::Text => {
            let mut text = format!(
                "{}: {} ({:.1}%)\n  {}",
                analysis.source,
                prediction.label(),
                prediction.confidence() * 100.0,
                prediction.summary()
            );
            for recommendation in prediction.recommendations() {
                text.push_str("\n  - ");
                text.push_str(recommendation);
            }
            Ok(text)
        },
        CliOutputFormat::Json => Ok(serde_json::to_string(&serde_json::json!({
            "source": analysis.source,
            "prediction": prediction,
            "timings": analysis.timings,
        }))?),
    }
}

fn render_failure(name: &str, e: &ClassifierError, format: CliOutputFormat) -> Result<String> {
    match format {
        CliOutputFormat::Text => Ok(format!("{}: error: {}", name, e)),
        CliOutputFormat::Json => Ok(serde_json::to_string(&serde_json::json!({
            "source": name,
            "error": e.to_string(),
            "kind": e.kind(),
        }))?),
    }
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if is_image_file(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if is_image_file(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    Ok(files)
}

/// Check if file is an image based on extension
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}
