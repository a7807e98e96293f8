use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use docgraph::{Script, Workspace};
use docgraph_history::HistoryConfig;

/// Applies an edit script to a JSON document with undo/redo support.
#[derive(Parser, Debug)]
#[command(name = "docgraph", version, about)]
struct Cli {
    /// Edit script to run.
    script: PathBuf,

    /// Document to edit. Starts from an empty object when omitted.
    #[arg(long)]
    doc: Option<PathBuf>,

    /// History configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resulting document here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => HistoryConfig::load_or_default(path),
        None => HistoryConfig::default(),
    }
    .with_env_overrides();
    tracing::debug!("History depth limit: {}", config.max_depth);

    let document = match &cli.doc {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read document: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse document: {}", path.display()))?
        }
        None => serde_json::Value::Object(Default::default()),
    };

    let text = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Failed to read script: {}", cli.script.display()))?;
    let script = Script::parse(&text)
        .with_context(|| format!("Failed to parse script: {}", cli.script.display()))?;

    let mut workspace = Workspace::from_document(document, &config)?;
    workspace.run_script(&script)?;
    tracing::info!(
        "Ran {} command(s); {} redraw(s)",
        script.len(),
        workspace.redraw_count()
    );

    let rendered = serde_json::to_string_pretty(&workspace.to_document())
        .context("Failed to serialize document")?;
    match &cli.output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
