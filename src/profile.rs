// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Derives the security-relevant profile of an APK from its manifest, its dex files and its
//! bundled libraries.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::dex::DexListing;
use crate::manifest::{Manifest, ManifestError};
use crate::package::{Package, PackageError};

/// Result type for profile operations.
pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Errors that make a package unusable for analysis.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("Could not recognize file as Android APK: {path:?}")]
    UnrecognizedPackage {
        path: PathBuf,
        /// `None` if the package has no manifest at all.
        #[source]
        source: Option<ManifestError>,
    },
}

/// Entry name of the binary manifest.
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// Flag that is always reported, `"false"` unless a `meta-data` entry sets it.
pub const METRICS_OPT_OUT: &str = "android.webkit.WebView.MetricsOptOut";

const DEX_CLASS_LOADER: &[u8] = b"dalvik/system/DexClassLoader";

/// Application attributes that describe resources rather than behavior.
const EXCLUDED_ATTRIBUTES: [&str; 4] = [
    "android:theme",
    "android:label",
    "android:icon",
    "android:name",
];

// USSD/MMI-style control codes: `*` or `#` first, only digits, `*` and `#`, at least one digit.
static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[*#][0-9*#]*[0-9][0-9*#]*$")
        .expect("code pattern is a valid regex")
});

/// Analysis options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    workspace_dir: Option<PathBuf>,
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract packages below `dir` instead of next to the package file.
    #[must_use]
    pub fn workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = Some(dir.into());
        self
    }
}

/// An analysis session for one APK.
///
/// The package is extracted and its manifest and dex files are read once, at construction.
/// Every accessor derives its result anew on each call.
#[derive(Debug)]
pub struct ApkProfile {
    package: Package,
    manifest: Manifest,
    dex: DexListing,
}

impl ApkProfile {
    /// Open an APK with default options.
    ///
    /// # Errors
    /// Returns an error if the file is not a valid archive or has no parseable manifest.
    pub fn open(path: impl Into<PathBuf>) -> ProfileResult<Self> {
        Self::open_with(path, &Options::default())
    }

    /// Open an APK.
    ///
    /// # Errors
    /// Returns an error if the file is not a valid archive or has no parseable manifest.
    pub fn open_with(path: impl Into<PathBuf>, options: &Options) -> ProfileResult<Self> {
        let package = Package::open_in(path, options.workspace_dir.as_deref())?;
        let manifest = Self::read_manifest(&package)?;
        let dex = DexListing::from_package(&package)?;
        Ok(Self {
            package,
            manifest,
            dex,
        })
    }

    fn read_manifest(package: &Package) -> ProfileResult<Manifest> {
        let unrecognized = |source| ProfileError::UnrecognizedPackage {
            path: package.path().to_path_buf(),
            source,
        };
        if !package.workspace().join(MANIFEST_ENTRY).is_file() {
            return Err(unrecognized(None));
        }
        let bytes = package.read(MANIFEST_ENTRY)?;
        Manifest::parse(&bytes).map_err(|e| unrecognized(Some(e)))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.package.path()
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The `android:name` of the `application` element.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.manifest
            .application()
            .and_then(|app| app.attribute("android:name"))
    }

    /// Names of the requested permissions, sorted. Duplicates are kept.
    #[must_use]
    pub fn permissions(&self) -> Vec<String> {
        let mut permissions: Vec<String> = self
            .manifest
            .children("uses-permission")
            .filter_map(|permission| permission.attribute("android:name"))
            .map(str::to_string)
            .collect();
        permissions.sort();
        permissions
    }

    /// Configuration flags of the `application` element with the namespace prefix removed,
    /// plus [`METRICS_OPT_OUT`].
    #[must_use]
    pub fn flags(&self) -> BTreeMap<String, String> {
        let mut flags = BTreeMap::new();
        let application = self.manifest.application();
        if let Some(app) = application {
            for (name, value) in app.attributes().iter() {
                if EXCLUDED_ATTRIBUTES
                    .iter()
                    .any(|excluded| name.matches(excluded))
                {
                    continue;
                }
                flags.insert(name.local().to_string(), value.to_string());
            }
        }

        let mut metrics_opt_out = "false";
        if let Some(meta) = application.and_then(|app| {
            app.children_named("meta-data")
                .find(|meta| meta.attribute("android:name") == Some(METRICS_OPT_OUT))
        }) {
            if let Some(value) = meta.attribute("android:value") {
                metrics_opt_out = value;
            }
        }
        flags.insert(METRICS_OPT_OUT.to_string(), metrics_opt_out.to_string());
        flags
    }

    /// Control-code-like strings from the dex string tables, in encounter order.
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        codes(&self.dex)
    }

    /// The library named by the first `uses-library` of the application, if any.
    #[must_use]
    pub fn libraries_manifest(&self) -> Vec<String> {
        self.manifest
            .application()
            .and_then(|app| app.child("uses-library"))
            .and_then(|library| library.attribute("android:name"))
            .map(str::to_string)
            .into_iter()
            .collect()
    }

    /// Package prefixes (at most three segments) of the defined classes, sorted and unique.
    #[must_use]
    pub fn libraries_packages(&self) -> Vec<String> {
        libraries_packages(&self.dex)
    }

    /// Whether any dex string mentions `dalvik/system/DexClassLoader`.
    #[must_use]
    pub fn uses_dynamic_class_loading(&self) -> bool {
        uses_dynamic_class_loading(&self.dex)
    }

    /// See [`Package::native_libraries`].
    #[must_use]
    pub fn native_libraries(&self) -> BTreeSet<String> {
        self.package.native_libraries()
    }

    /// See [`Package::managed_runtime_libraries`].
    #[must_use]
    pub fn managed_runtime_libraries(&self) -> BTreeSet<String> {
        self.package.managed_runtime_libraries()
    }

    /// Explicitly remove the extraction workspace to surface any error.
    ///
    /// # Errors
    /// Returns an error if the workspace cannot be deleted.
    pub fn close(self) -> ProfileResult<()> {
        Ok(self.package.close()?)
    }
}

fn codes(dex: &DexListing) -> Vec<String> {
    dex.strings()
        .map(String::from_utf8_lossy)
        .filter(|s| s.starts_with(['#', '*']) && CODE_PATTERN.is_match(s))
        .map(|s| s.into_owned())
        .collect()
}

fn libraries_packages(dex: &DexListing) -> Vec<String> {
    dex.classes()
        .map(|class| {
            let outer = class.split_once('$').map_or(class, |(outer, _)| outer);
            outer.split('/').take(3).collect::<Vec<_>>().join(".")
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn uses_dynamic_class_loading(dex: &DexListing) -> bool {
    dex.strings().any(|s| {
        s.windows(DEX_CLASS_LOADER.len())
            .any(|window| window == DEX_CLASS_LOADER)
    })
}
