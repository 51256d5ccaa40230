// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
mod args;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use env_logger::Env;
use std::fs::File;
use std::path::Path;

use apk_inspector::profile::{ApkProfile, Options};
use apk_inspector::report::{summarize_report, Report, Response};
use args::Args;

const EXIT_FILE_NOT_FOUND: i32 = 3;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if !args.package.is_file() {
        eprintln!("File not found.");
        eprintln!("{}", Args::command().render_usage());
        std::process::exit(EXIT_FILE_NOT_FOUND);
    }

    let mut options = Options::new();
    if let Some(dir) = &args.workspace_dir {
        options = options.workspace_dir(dir);
    }

    let profile = open_profile(&args.package, &options)?;
    let file_name = args
        .package
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let report = Report::from_profile(file_name, &profile);
    summarize_report(&report);

    if let Some(dest) = &args.report {
        write_report_to_file(Response::Success(report), dest)?;
    }
    profile
        .close()
        .with_context(|| format!("Failed to remove workspace of {}", args.package.display()))?;
    Ok(())
}

/// Open the package and decode its manifest.
///
/// # Errors
/// Returns an error if the archive cannot be extracted or the manifest is missing or malformed.
fn open_profile(path: &Path, options: &Options) -> Result<ApkProfile> {
    log::info!("Analyzing package: package={}", path.display());
    let profile = ApkProfile::open_with(path, options)
        .with_context(|| format!("Failed to analyze package: {}", path.display()))?;
    log::info!("Analysis completed: package={}", path.display());
    Ok(profile)
}

/// Write the response envelope to a file.
///
/// # Errors
/// Returns an error if the file cannot be created or the response cannot be serialized.
fn write_report_to_file(response: Response, dest: &Path) -> Result<()> {
    log::info!("Writing report to file: file={}", dest.display());
    let file = File::create(dest)
        .with_context(|| format!("Failed to create JSON output file: {}", dest.display()))?;
    serde_json::to_writer_pretty(file, &response)
        .with_context(|| format!("Failed to serialize report to JSON: {}", dest.display()))?;
    Ok(())
}
