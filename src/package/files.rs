// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Glob matching over the files of an extracted package.

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::extractor::{ExtractedFile, PackageError, PackageResult};

/// `*` never crosses a `/`, only `**` does.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Collect the regular files below `root` whose root-relative path matches `pattern`.
///
/// The returned paths are relative to `root` and sorted, which makes every consumer
/// independent of the file system's enumeration order.
///
/// # Errors
/// Returns an error if the pattern is invalid or the directory cannot be walked.
pub(crate) fn files_matching(root: &Path, pattern: &str) -> PackageResult<Vec<PathBuf>> {
    let pattern = Pattern::new(pattern).map_err(|e| PackageError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })?;

    let mut matches = Vec::new();
    for entry in WalkDir::new(root) {
        let e = entry.map_err(|e| PackageError::WalkDirFailed {
            path: root.to_path_buf(),
            source: e,
        })?;
        if !e.file_type().is_file() {
            continue;
        }
        if let Some(relative) = ExtractedFile::new(root, e.path()).package_path() {
            if pattern.matches_path_with(relative, MATCH_OPTIONS) {
                matches.push(relative.to_path_buf());
            }
        }
    }
    matches.sort();
    Ok(matches)
}

/// Base name of a path as UTF-8 text, if it has one.
pub(crate) fn base_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}
