// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Report struct and the response envelope returned for one analysed file.

mod console;

pub use console::summarize_report;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::profile::{ApkProfile, Options};

/// Snapshot of every field of an [`ApkProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    file_name: String,
    app_name: Option<String>,
    permissions: Vec<String>,
    // BTreeMap/BTreeSet keep the JSON output in alphabetical order.
    flags: BTreeMap<String, String>,
    secret_codes: Vec<String>,
    manifest_libraries: Vec<String>,
    package_libraries: Vec<String>,
    native_libraries: BTreeSet<String>,
    managed_runtime_libraries: BTreeSet<String>,
    dynamic_class_loading: bool,
}

impl Report {
    /// Collect every profile field.
    #[must_use]
    pub fn from_profile(file_name: impl Into<String>, profile: &ApkProfile) -> Self {
        Self {
            file_name: file_name.into(),
            app_name: profile.name().map(str::to_string),
            permissions: profile.permissions(),
            flags: profile.flags(),
            secret_codes: profile.codes(),
            manifest_libraries: profile.libraries_manifest(),
            package_libraries: profile.libraries_packages(),
            native_libraries: profile.native_libraries(),
            managed_runtime_libraries: profile.managed_runtime_libraries(),
            dynamic_class_loading: profile.uses_dynamic_class_loading(),
        }
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    #[must_use]
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    #[must_use]
    pub fn flags(&self) -> &BTreeMap<String, String> {
        &self.flags
    }

    #[must_use]
    pub fn secret_codes(&self) -> &[String] {
        &self.secret_codes
    }

    #[must_use]
    pub fn manifest_libraries(&self) -> &[String] {
        &self.manifest_libraries
    }

    #[must_use]
    pub fn package_libraries(&self) -> &[String] {
        &self.package_libraries
    }

    #[must_use]
    pub fn native_libraries(&self) -> &BTreeSet<String> {
        &self.native_libraries
    }

    #[must_use]
    pub fn managed_runtime_libraries(&self) -> &BTreeSet<String> {
        &self.managed_runtime_libraries
    }

    #[must_use]
    pub fn dynamic_class_loading(&self) -> bool {
        self.dynamic_class_loading
    }
}

/// Outcome of analysing one file: `{"success": {...}}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Success(Report),
    Error(String),
}

impl Response {
    /// Analyse a file with default options.
    #[must_use]
    pub fn analyze(path: &Path) -> Self {
        Self::analyze_with(path, &Options::default())
    }

    /// Analyse a file. Only names ending in `.apk` are accepted; any archive or manifest error
    /// becomes a single error message.
    #[must_use]
    pub fn analyze_with(path: &Path, options: &Options) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !file_name.ends_with(".apk") {
            return Self::Error("File must have the \".apk\" extension".to_string());
        }

        match ApkProfile::open_with(path, options) {
            Ok(profile) => {
                let report = Report::from_profile(file_name, &profile);
                if let Err(e) = profile.close() {
                    log::warn!(
                        "Failed to remove workspace: package={}, error={}",
                        path.display(),
                        e
                    );
                }
                Self::Success(report)
            }
            Err(e) => {
                log::debug!("Analysis failed: package={}, error={}", path.display(), e);
                Self::Error(format!(
                    "File not recognized as a package. Error: {:#}",
                    anyhow::Error::new(e)
                ))
            }
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
