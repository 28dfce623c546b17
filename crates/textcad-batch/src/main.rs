//! CAD-THOUGHTS corpus generator
//!
//! Reads design prompts (one per line), asks DeepSeek-R1 on Together for an
//! OpenSCAD module plus its chain of thought, and writes the collected
//! records as a JSON array.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use textcad_llm::batch::read_prompts;
use textcad_llm::{BatchOptions, BatchRunner, TogetherProvider, DEEPSEEK_R1};
use tracing::info;

const KEY_ENV_VAR: &str = "TOGETHER_API_KEY";

/// Generate CAD-THOUGHTS with DeepSeek-R1
#[derive(Debug, Parser)]
#[command(name = "textcad-batch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Text file with one design prompt per line
    #[arg(long)]
    input_file: PathBuf,

    /// Where to save the JSON array of records
    #[arg(long)]
    output_file: PathBuf,

    /// JSONL file receiving every raw outcome as it completes
    #[arg(long, default_value = "cad_partial.jsonl")]
    partial_file: PathBuf,

    #[arg(long, default_value_t = 0.6)]
    temperature: f32,

    #[arg(long, default_value_t = 0.95)]
    top_p: f32,

    #[arg(long, default_value_t = 12000)]
    max_tokens: u32,

    /// Maximum in-flight requests, also the per-second ceiling
    #[arg(long, default_value_t = 3)]
    concurrency: usize,

    #[arg(long, default_value = DEEPSEEK_R1)]
    model: String,

    /// Fallback credentials file (`{"together": "..."}`)
    #[arg(long, default_value = "keys.json")]
    keys_file: PathBuf,
}

impl Args {
    fn options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }
}

/// Resolved key, or an error naming both places it was looked for
fn require_api_key(env_value: Option<String>, keys_file: &Path) -> Result<String> {
    match resolve_api_key(env_value, keys_file)? {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => anyhow::bail!(
            "missing Together API key: set {} or add \"together\" to {}",
            KEY_ENV_VAR,
            keys_file.display()
        ),
    }
}

/// Together key from the environment, else from the keys file
fn resolve_api_key(env_value: Option<String>, keys_file: &Path) -> Result<Option<String>> {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        return Ok(Some(key));
    }

    match std::fs::read_to_string(keys_file) {
        Ok(text) => {
            let keys: HashMap<String, String> = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", keys_file.display()))?;
            Ok(keys.get("together").cloned())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", keys_file.display())),
    }
}

fn progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {}", e))?
            .progress_chars("=> "),
    );
    pb.set_message("Generating CAD-THOUGHTS");
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();

    let api_key = require_api_key(std::env::var(KEY_ENV_VAR).ok(), &args.keys_file)?;

    let text = std::fs::read_to_string(&args.input_file)
        .with_context(|| format!("Failed to read {}", args.input_file.display()))?;
    let prompts = read_prompts(&text);

    let adapter = TogetherProvider::new(Some(api_key)).with_model(args.model.clone());
    let runner = BatchRunner::new(Arc::new(adapter), args.options());

    let pb = progress_bar(prompts.len())?;
    let records = runner
        .run_with_progress(prompts, &args.partial_file, |_| pb.inc(1))
        .await?;
    pb.finish_and_clear();

    let output = serde_json::to_string_pretty(&records)?;
    std::fs::write(&args.output_file, output)
        .with_context(|| format!("Failed to write {}", args.output_file.display()))?;

    let succeeded = records.iter().filter(|r| r.is_success()).count();
    info!(succeeded, total = records.len(), "Batch complete");
    println!(
        "Done! CAD-THOUGHTS saved to {} ({}/{} parsed)",
        args.output_file.display(),
        succeeded,
        records.len()
    );

    Ok(())
}
