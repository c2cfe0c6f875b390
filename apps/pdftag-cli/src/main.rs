//! pdftag binary
//!
//! Inspect and patch the structure tree of tagged PDFs.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pdftag_cli::config::{Overrides, PatchConfig};
use pdftag_cli::report::{InfoReport, PatchReport};
use pdftag_core::Document;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdftag")]
#[command(version, about = "Accessibility fixes for tagged PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the structure tree
    Show {
        input: PathBuf,

        /// Password for encrypted input
        #[arg(long)]
        password: Option<String>,
    },

    /// Page count and whether a structure tree is present
    Info {
        input: PathBuf,

        #[arg(long)]
        password: Option<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Mark artifacts, add figure bounding boxes, optionally encrypt
    Patch {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        password: Option<String>,

        /// TOML file with [patch] and [encryption] sections
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Leave untagged paths alone
        #[arg(long)]
        no_artifacts: bool,

        /// Do not add Layout bounding boxes
        #[arg(long)]
        no_bbox: bool,

        #[arg(long)]
        user_password: Option<String>,

        #[arg(long)]
        owner_password: Option<String>,

        /// Security handler revision: 4, 5 or 6
        #[arg(long, value_parser = clap::value_parser!(u8).range(4..=6))]
        revision: Option<u8>,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Show { input, password } => {
            let doc = open(&input, password.as_deref())?;
            let structure = doc
                .show_structure()
                .with_context(|| format!("Failed to read structure of {}", input.display()))?;
            print!("{}", structure);
        }
        Command::Info {
            input,
            password,
            json,
        } => {
            let doc = open(&input, password.as_deref())?;
            let report = InfoReport {
                input: input.display().to_string(),
                pages: doc.page_count(),
                tagged: doc.has_struct_tree(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} page(s), {}",
                    report.input,
                    report.pages,
                    if report.tagged { "tagged" } else { "untagged" }
                );
            }
        }
        Command::Patch {
            input,
            output,
            password,
            config,
            no_artifacts,
            no_bbox,
            user_password,
            owner_password,
            revision,
            json,
        } => {
            let config = match config {
                Some(path) => PatchConfig::from_file(path)?,
                None => PatchConfig::default(),
            };
            let config = config.with_overrides(&Overrides {
                no_artifacts,
                no_bbox,
                user_password,
                owner_password,
                revision,
            })?;

            let report = patch(&input, &output, password.as_deref(), config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
            }
        }
    }

    Ok(())
}

fn open(path: &Path, password: Option<&str>) -> anyhow::Result<Document> {
    Document::open(path, password).with_context(|| format!("Failed to open {}", path.display()))
}

fn patch(
    input: &Path,
    output: &Path,
    password: Option<&str>,
    config: PatchConfig,
) -> anyhow::Result<PatchReport> {
    let mut doc = open(input, password)?;

    let artifacts_wrapped = if config.patch.artifacts {
        Some(doc.mark_paths_as_artifacts()?)
    } else {
        None
    };
    let bboxes_inserted = if config.patch.bbox {
        Some(doc.ensure_bbox().context("Failed to add figure bounding boxes")?)
    } else {
        None
    };

    let encryption_revision = match config.encryption {
        Some(settings) => {
            let revision = settings.revision.number();
            doc.encrypt(settings)?;
            Some(revision)
        }
        None => None,
    };

    doc.write(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(output = %output.display(), "patched");

    Ok(PatchReport {
        input: input.display().to_string(),
        output: output.display().to_string(),
        pages: doc.page_count(),
        artifacts_wrapped,
        bboxes_inserted,
        encryption_revision,
    })
}
