//! pdfedit command-line host
//!
//! Applies exact text edits to a PDF file, or lists the text runs of a page
//! so edit indices can be checked against what the engine extracts.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfedit")]
#[command(version, about = "Exact in-place PDF text replacement")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a JSON list of edits and write the patched PDF
    Apply {
        /// Source PDF
        #[arg(short, long)]
        input: PathBuf,

        /// JSON array of edits
        #[arg(short, long)]
        edits: PathBuf,

        /// Where to write the patched PDF
        #[arg(short, long)]
        output: PathBuf,

        /// TOML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print a JSON report to stdout
        #[arg(long)]
        report: bool,

        /// Only accept runs at the given source index
        #[arg(long)]
        no_global_search: bool,

        /// Write rewritten streams without compression
        #[arg(long)]
        uncompressed: bool,
    },
    /// Print the text runs of one page as JSON
    Runs {
        /// Source PDF
        #[arg(short, long)]
        input: PathBuf,

        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries JSON output, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Apply {
            input,
            edits: edits_path,
            output,
            config: config_path,
            report,
            no_global_search,
            uncompressed,
        } => {
            let engine_config = config::resolve(
                config_path.as_deref(),
                config::Overrides {
                    no_global_search,
                    uncompressed,
                },
            )?;

            let pdf = fs::read(&input)
                .with_context(|| format!("Failed to read PDF: {}", input.display()))?;
            let edits_json = fs::read_to_string(&edits_path)
                .with_context(|| format!("Failed to read edits: {}", edits_path.display()))?;
            let edits = pdfedit_core::parse_edits(&edits_json)
                .with_context(|| format!("Invalid edits file: {}", edits_path.display()))?;

            tracing::info!("Applying {} edits to {}", edits.len(), input.display());
            let (patched, edit_report) =
                pdfedit_core::apply_exact_edits_with_report(&pdf, &edits, &engine_config)
                    .context("Edits were not applied")?;

            fs::write(&output, &patched)
                .with_context(|| format!("Failed to write PDF: {}", output.display()))?;
            tracing::info!("Wrote {}", output.display());

            if report {
                println!("{}", serde_json::to_string_pretty(&edit_report)?);
            }
        }
        Command::Runs { input, page } => {
            let pdf = fs::read(&input)
                .with_context(|| format!("Failed to read PDF: {}", input.display()))?;
            let runs = pdfedit_core::list_page_runs(&pdf, page)
                .with_context(|| format!("Failed to extract runs from page {}", page))?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }

    Ok(())
}
