// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apk_inspector")]
#[command(version)]
#[command(about = "Extracts permissions, flags, codes and libraries from Android packages")]
pub(crate) struct Args {
    /// Path to the APK file to analyse.
    pub package: PathBuf,

    /// Path to the file to write the analysis results in JSON format.
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[arg(
        long,
        long_help = "Directory to extract the package into.\n\
                Defaults to the directory containing the package."
    )]
    pub workspace_dir: Option<PathBuf>,
}
