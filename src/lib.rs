// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! A tool for extracting security-relevant metadata from Android application packages.
//!
//! This crate provides functionality to:
//! - Extract APK archives into a private workspace
//! - Decode the binary `AndroidManifest.xml` into an element tree
//! - Read dynamic-linking metadata of bundled shared objects
//! - Build an application profile and report it as a table or JSON

pub mod batch;
pub mod dex;
pub mod manifest;
pub mod package;
pub mod profile;
pub mod report;

#[cfg(test)]
mod fixtures;

pub use dex::DexListing;
pub use manifest::Manifest;
pub use package::{ElfDependencies, Package};
pub use profile::{ApkProfile, Options, ProfileError};
pub use report::{Report, Response};
