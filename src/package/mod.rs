// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Manages package lifecycle including the extraction workspace. Provides API for matching
//! package files and for collecting native and managed-runtime libraries.

mod elf;
mod extractor;
mod files;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use elf::{ElfDependencies, ElfError};
pub use extractor::{PackageError, PackageResult};
use extractor::ZipExtractor;
use files::{base_name, files_matching};

/// Native shared objects at any depth.
pub const NATIVE_LIBRARY_PATTERN: &str = "**/*.so";
/// Cross-platform runtime (.NET) assemblies at any depth.
pub const MANAGED_RUNTIME_LIBRARY_PATTERN: &str = "**/*.dll";

/// An opened package, extracted into a workspace directory that lives as long as the package.
///
/// The workspace is removed when the package is dropped, on every exit path. Use
/// [`Package::close`] to observe removal errors.
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    workspace: TempDir,
}

impl Package {
    /// Open a package and extract it next to the package file.
    ///
    /// # Errors
    /// Returns an error if the file is not a ZIP container, an entry escapes the workspace or
    /// the extraction fails.
    pub fn open(path: impl Into<PathBuf>) -> PackageResult<Self> {
        Self::open_in(path, None)
    }

    /// Open a package and extract it below `workspace_dir`, or next to the package file if
    /// `None`.
    ///
    /// # Errors
    /// Returns an error if the file is not a ZIP container, an entry escapes the workspace or
    /// the extraction fails.
    pub fn open_in(path: impl Into<PathBuf>, workspace_dir: Option<&Path>) -> PackageResult<Self> {
        let path = path.into();
        log::debug!("Extracting package: package={}", path.display());

        let mut archive = ZipExtractor::open(&path)?;
        let workspace = Self::create_workspace(&path, workspace_dir)?;
        // On error `workspace` is dropped here, which removes the partial extraction.
        let written = ZipExtractor::extract(&mut archive, &path, &workspace)?;

        log::debug!(
            "Extraction completed: package={}, workspace={}, files={}",
            path.display(),
            workspace.path().display(),
            written
        );
        Ok(Self { path, workspace })
    }

    /// Get the path to the package.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the extraction workspace.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// List the workspace-relative paths of the files matching a glob pattern, sorted.
    ///
    /// `*` matches within one path component, `**/` matches any number of directories.
    ///
    /// # Errors
    /// Returns an error if the pattern is invalid or the workspace cannot be walked.
    pub fn files_matching(&self, pattern: &str) -> PackageResult<Vec<PathBuf>> {
        files_matching(self.workspace.path(), pattern)
    }

    /// Read a file of the package by its workspace-relative path.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be read.
    pub fn read(&self, relative: impl AsRef<Path>) -> PackageResult<Vec<u8>> {
        let path = self.workspace.path().join(relative.as_ref());
        fs::read(&path).map_err(|e| PackageError::ReadFailed { path, source: e })
    }

    /// Collect the dependencies, search paths and sonames declared by the package's native
    /// libraries.
    ///
    /// Libraries sharing a base name (the same library built for several ABIs) are read once,
    /// from the lexicographically smallest path. Files that cannot be read or are not ELF
    /// contribute nothing.
    #[must_use]
    pub fn native_libraries(&self) -> BTreeSet<String> {
        let mut libraries = BTreeSet::new();
        for path in self.unique_by_base_name(NATIVE_LIBRARY_PATTERN).into_values() {
            match ElfDependencies::from_path(&self.workspace.path().join(&path)) {
                Ok(elf) => libraries.extend(elf.names().map(str::to_string)),
                Err(e) => log::warn!(
                    "Skipping native library: file={}, error={}",
                    path.display(),
                    e
                ),
            }
        }
        libraries
    }

    /// Collect the base names of the package's managed runtime (.NET) assemblies.
    #[must_use]
    pub fn managed_runtime_libraries(&self) -> BTreeSet<String> {
        self.unique_by_base_name(MANAGED_RUNTIME_LIBRARY_PATTERN)
            .into_keys()
            .collect()
    }

    /// Explicitly remove the workspace to surface any error instead of hiding it in `Drop`.
    ///
    /// # Errors
    /// Returns an error if the workspace cannot be deleted.
    pub fn close(self) -> PackageResult<()> {
        log::debug!(
            "Removing workspace: workspace={}",
            self.workspace.path().display()
        );
        self.workspace
            .close()
            .map_err(|e| PackageError::TempDirFailed { source: e })
    }

    /// Map each base name to the first matching path. Matches are sorted, so the first path is
    /// the lexicographically smallest one.
    fn unique_by_base_name(&self, pattern: &str) -> BTreeMap<String, PathBuf> {
        // Matching only fails on an unreadable workspace; library scanning degrades to nothing.
        let matches = self.files_matching(pattern).unwrap_or_else(|e| {
            log::warn!("Failed to list package files: pattern={pattern}, error={e}");
            Vec::new()
        });
        let mut unique = BTreeMap::new();
        for path in matches {
            let Some(name) = base_name(&path).map(str::to_string) else {
                continue;
            };
            unique.entry(name).or_insert(path);
        }
        unique
    }

    fn create_workspace(path: &Path, workspace_dir: Option<&Path>) -> PackageResult<TempDir> {
        let parent = workspace_dir.unwrap_or_else(|| {
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
        });
        let name = path
            .file_name()
            .map_or_else(|| "package".into(), |n| n.to_string_lossy());
        // A leading dot plus a random suffix, so the workspace never equals the package itself.
        tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .tempdir_in(parent)
            .map_err(|e| PackageError::TempDirFailed { source: e })
    }
}
