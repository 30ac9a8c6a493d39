//! The `roentgen analyze` command: classify radiograph files.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use roentgen_core::{checkpoint, parse_device, Config, InferenceEngine, PredictionResult};

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Radiograph image files to classify
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Confidence threshold override (defaults to the configured value)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Checkpoint path override
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Compute device override: "auto", "cpu", "cuda", or "cuda:N"
    #[arg(long)]
    pub device: Option<String>,

    /// Emit one JSON object per file instead of text
    #[arg(long)]
    pub json: bool,
}

/// Per-file JSON record.
#[derive(Serialize)]
struct FileResult<'a> {
    file: &'a Path,
    findings: &'a [roentgen_core::Finding],
}

/// Execute the analyze command.
pub fn execute(args: AnalyzeArgs, config: Config) -> anyhow::Result<()> {
    let threshold = args.threshold.unwrap_or(config.inference.threshold);
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("--threshold must be between 0.0 and 1.0, got {threshold}");
    }

    let checkpoint_path = args
        .checkpoint
        .unwrap_or_else(|| config.checkpoint_path());
    let device_str = args.device.as_deref().unwrap_or(&config.model.device);
    let device = parse_device(device_str)?;

    // Loaded once; the same classifier instance serves every file.
    let classifier = checkpoint::load(&checkpoint_path, &device)?;
    let report = classifier.binding_report();
    if !report.is_clean() {
        tracing::warn!(
            "Checkpoint bound with warnings: {} missing, {} unexpected parameters",
            report.missing.len(),
            report.unexpected.len()
        );
    }
    let engine = InferenceEngine::new(classifier, &config.inference);

    let mut failed = 0usize;
    for path in &args.files {
        match analyze_file(&engine, path, threshold) {
            Ok(result) => print_result(path, &result, args.json)?,
            Err(e) => {
                // Per-request failures don't stop the remaining files.
                failed += 1;
                tracing::error!("{}: {e:#}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", args.files.len());
    }
    Ok(())
}

fn analyze_file(
    engine: &InferenceEngine,
    path: &Path,
    threshold: f32,
) -> anyhow::Result<PredictionResult> {
    let bytes = std::fs::read(path)?;
    Ok(engine.predict_with_threshold(&bytes, threshold)?)
}

fn print_result(path: &Path, result: &PredictionResult, json: bool) -> anyhow::Result<()> {
    if json {
        let record = FileResult {
            file: path,
            findings: &result.findings,
        };
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("{}: {}", path.display(), result.summary());
    }
    Ok(())
}
