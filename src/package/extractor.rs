// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Extracts APK (ZIP) archives into a scoped workspace directory.

use path_clean::PathClean;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Result type for package operations.
pub type PackageResult<T> = std::result::Result<T, PackageError>;

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("Failed to open package: {path:?}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Package is not a valid ZIP archive: {path:?}")]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("Archive entry would be written outside the workspace: {entry} (package: {path:?})")]
    PathTraversal { entry: String, path: PathBuf },
    #[error("Failed to create/delete temporary directory")]
    TempDirFailed {
        #[source]
        source: io::Error,
    },
    #[error("Failed to read archive entry #{index} (package: {path:?})")]
    ReadEntryFailed {
        index: usize,
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("Extraction failed for entry {entry} (package: {path:?})")]
    ExtractionFailed {
        entry: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to walk extracted directory: {path:?}")]
    WalkDirFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Invalid file pattern: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Failed to read file: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Represents a file extracted from the package.
pub(crate) struct ExtractedFile<'a> {
    extraction_directory: &'a Path, // The workspace root, all package paths are relative to it.
    extracted_path: &'a Path,       // The path to the file within the extraction directory.
}

impl<'a> ExtractedFile<'a> {
    pub(crate) fn new(extraction_directory: &'a Path, extracted_path: &'a Path) -> Self {
        Self {
            extraction_directory,
            extracted_path,
        }
    }

    /// Get the path of the file relative to the workspace root, i.e. the entry name inside the
    /// archive. Returns `None` for paths outside the workspace.
    pub(crate) fn package_path(&self) -> Option<&Path> {
        self.extracted_path
            .strip_prefix(self.extraction_directory)
            .ok()
    }
}

/// Opens ZIP containers and unpacks them into a workspace.
pub(crate) struct ZipExtractor;

impl ZipExtractor {
    /// Open a package as a ZIP container.
    ///
    /// Nothing is written to disk here, so a package rejected at this stage never leaves a
    /// workspace behind.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a ZIP container.
    pub(crate) fn open(package: &Path) -> PackageResult<ZipArchive<File>> {
        let file = File::open(package).map_err(|e| PackageError::OpenFailed {
            path: package.to_path_buf(),
            source: e,
        })?;
        ZipArchive::new(file).map_err(|e| PackageError::InvalidArchive {
            path: package.to_path_buf(),
            source: e,
        })
    }

    /// Extract every archive entry into `dest`.
    ///
    /// Entries whose destination would leave `dest` abort the extraction with
    /// `PackageError::PathTraversal`; the caller owns `dest` and removes it on error.
    ///
    /// # Errors
    /// Returns an error if an entry cannot be read, escapes the workspace or cannot be written.
    pub(crate) fn extract(
        archive: &mut ZipArchive<File>,
        package: &Path,
        dest: &TempDir,
    ) -> PackageResult<usize> {
        let mut written = 0;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| PackageError::ReadEntryFailed {
                    index,
                    path: package.to_path_buf(),
                    source: e,
                })?;
            let name = entry.name().to_string();
            let target = Self::destination(dest.path(), entry.enclosed_name().as_deref())
                .ok_or_else(|| PackageError::PathTraversal {
                    entry: name.clone(),
                    path: package.to_path_buf(),
                })?;

            let extraction_failed = |e: io::Error| PackageError::ExtractionFailed {
                entry: name.clone(),
                path: package.to_path_buf(),
                source: e,
            };

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(extraction_failed)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(extraction_failed)?;
            }
            let mut out = File::create(&target).map_err(extraction_failed)?;
            io::copy(&mut entry, &mut out).map_err(extraction_failed)?;
            written += 1;
        }
        Ok(written)
    }

    /// Resolve the on-disk destination of an entry.
    ///
    /// `enclosed` is the entry name as sanitized by the `zip` crate (`None` when the name is
    /// absolute or climbs out with `..`). The joined path is cleaned and checked again so that
    /// only paths strictly below `root` are accepted.
    fn destination(root: &Path, enclosed: Option<&Path>) -> Option<PathBuf> {
        let relative = enclosed?;
        let target = root.join(relative).clean();
        let extracted = ExtractedFile::new(root, &target);
        match extracted.package_path() {
            Some(inner) if !inner.as_os_str().is_empty() => Some(target),
            _ => None,
        }
    }
}
