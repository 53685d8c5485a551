//! Command-line front end for the BPMN -> DCR compiler.
//!
//! Usage: `bpmn2dcr [path/to/process.bpmn]`. With no argument, the
//! current directory is scanned for `*.bpmn` files: a single match is
//! auto-selected, multiple matches launch an interactive picker, and
//! escaping the picker is treated as a cancellation (exit 0).

use std::path::{Path, PathBuf};

use anyhow::Context;
use bpmn2dcr_core::CompileError;
use dialoguer::Select;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path = match args.get(1) {
        Some(p) => PathBuf::from(p),
        None => match pick_interactively() {
            Ok(Some(p)) => p,
            Ok(None) => {
                info!("no file selected, exiting");
                return;
            }
            Err(e) => {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        },
    };

    match run(&path) {
        Ok(out) => {
            info!(output = %out.display(), "wrote DCR graph");
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    info!(file = %path.display(), "parsing and validating BPMN process");
    let dcr = match bpmn2dcr_core::compile(&xml) {
        Ok(dcr) => dcr,
        Err(CompileError::Validation(errors)) => {
            eprintln!("BPMN validation failed:");
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {e}", i + 1);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    info!("translating to DCR XML");
    let rendered = bpmn2dcr_core::xml::dcr_xml::to_xml(&dcr)?;

    let out_path = path.with_extension("dcr.xml");
    std::fs::write(&out_path, rendered)
        .with_context(|| format!("failed to write {}", out_path.display()))?;
    Ok(out_path)
}

/// Scans the working directory for `*.bpmn` files. `Ok(None)` means the
/// user cancelled an interactive selection (not an error).
fn pick_interactively() -> anyhow::Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(".")
        .context("failed to read the current directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|ext| ext == "bpmn").unwrap_or(false))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => anyhow::bail!("no *.bpmn files found in the current directory"),
        1 => {
            let only = candidates.into_iter().next().expect("length checked above");
            info!(file = %only.display(), "auto-selected the only BPMN file found");
            Ok(Some(only))
        }
        _ => {
            let labels: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            let selection = Select::new()
                .with_prompt("Select a BPMN file to translate")
                .items(&labels)
                .default(0)
                .interact_opt()
                .context("failed to read selection")?;
            Ok(selection.map(|i| candidates[i].clone()))
        }
    }
}
