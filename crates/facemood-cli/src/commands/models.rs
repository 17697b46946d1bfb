//! Models command - manage the face detector and face mesh weights.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use clap::{Args, Subcommand};
use facemood_adapters::models::{
    ensure_models_with_progress, missing_models, model_status, models_dir, ProgressCallback,
};
use facemood_adapters::set_models_dir;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download missing models
    Fetch,
    /// Show which models are installed
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<()> {
    if let Some(dir) = args.models_dir.clone().or_else(|| config.models.dir.clone()) {
        set_models_dir(Some(dir));
    }
    match args.command {
        ModelsCommand::Fetch => fetch(),
        ModelsCommand::List => {
            list();
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", models_dir().display());
            Ok(())
        }
    }
}

fn fetch() -> Result<()> {
    let missing = missing_models();
    if missing.is_empty() {
        println!("All models already installed in {}", models_dir().display());
        return Ok(());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {msg:<10} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    // Resets the bar whenever a new model starts downloading.
    let current = Mutex::new(String::new());
    let progress_bar = bar.clone();
    let progress: ProgressCallback = Box::new(move |name, downloaded, total| {
        let mut current = current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != name {
            name.clone_into(&mut *current);
            progress_bar.reset();
            progress_bar.set_length(total.unwrap_or(0));
            progress_bar.set_message(name.to_string());
        }
        progress_bar.set_position(downloaded);
    });

    ensure_models_with_progress(Some(&progress))?;
    bar.finish_with_message(format!("Downloaded {} model(s)", missing.len()));
    Ok(())
}

fn list() {
    let status = model_status();
    println!("Models directory: {}", models_dir().display());
    println!();

    for model in &status {
        let mark = if model.installed() { "✓" } else { "✗" };
        let size = model
            .size
            .map(|bytes| format!(" ({})", HumanBytes(bytes)))
            .unwrap_or_default();
        println!(
            "  {mark} {:<10} {}{size}",
            model.info.name, model.info.filename
        );
    }

    println!();
    let installed = status.iter().filter(|m| m.installed()).count();
    println!("{installed}/{} models installed", status.len());
}
