// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Reads the string table and the defined classes of the package's dex files.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::package::{Package, PackageResult};

type Result<T> = std::result::Result<T, DexError>;

const DEX_MAGIC: &[u8; 4] = b"dex\n";
const HEADER_SIZE: usize = 0x70;
const CLASS_DEF_SIZE: usize = 32;
const DEX_PATTERN: &str = "classes*.dex";

/// Errors that can occur when parsing a dex file.
///
/// None of these are fatal for a package analysis: a dex file that cannot be parsed simply
/// contributes no strings and no classes.
#[derive(Debug, Error)]
pub enum DexError {
    #[error("File is too small to be a dex file: {size} bytes")]
    FileTooSmall { size: usize },
    #[error("File is not a dex file")]
    NotDexFile,
    #[error("Unsupported dex header size: {size}")]
    InvalidHeader { size: u32 },
    #[error("{section} at offset {offset} lies outside the file")]
    OutOfBounds { section: &'static str, offset: usize },
    #[error("Invalid {section} index: {index}")]
    InvalidIndex { section: &'static str, index: u32 },
}

/// The strings and class names of one dex file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DexFile {
    strings: Vec<Vec<u8>>,
    classes: Vec<String>,
}

impl DexFile {
    /// Parse a dex file.
    ///
    /// Strings are kept as their raw MUTF-8 bytes. Class names come from the class definitions,
    /// with the `L...;` descriptor wrapping removed (`com/example/Main`).
    ///
    /// # Errors
    /// Returns an error if the header is invalid or a table lies outside the file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DEX_MAGIC.len() || &bytes[..DEX_MAGIC.len()] != DEX_MAGIC {
            return Err(DexError::NotDexFile);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(DexError::FileTooSmall { size: bytes.len() });
        }
        let header_size = word(bytes, 36, "header")?;
        if (header_size as usize) < HEADER_SIZE {
            return Err(DexError::InvalidHeader { size: header_size });
        }

        let strings = table(bytes, 56, 4, "string_ids")?
            .map(|offset| string_data(bytes, word(bytes, offset, "string_ids")? as usize))
            .collect::<Result<Vec<_>>>()?;
        let types = table(bytes, 64, 4, "type_ids")?
            .map(|offset| word(bytes, offset, "type_ids"))
            .collect::<Result<Vec<_>>>()?;

        let mut classes = Vec::new();
        for offset in table(bytes, 96, CLASS_DEF_SIZE, "class_defs")? {
            let type_index = word(bytes, offset, "class_defs")?;
            let descriptor = types
                .get(type_index as usize)
                .and_then(|&string| strings.get(string as usize))
                .ok_or(DexError::InvalidIndex {
                    section: "type_ids",
                    index: type_index,
                })?;
            classes.push(class_name(descriptor));
        }

        Ok(Self { strings, classes })
    }

    #[must_use]
    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Strings and classes of every dex file of a package, in `classes.dex`, `classes2.dex`, ...
/// order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DexListing {
    files: Vec<DexFile>,
}

impl DexListing {
    /// Read the dex files at the root of the package.
    ///
    /// Dex files that cannot be read or parsed are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if the package workspace cannot be listed.
    pub fn from_package(package: &Package) -> PackageResult<Self> {
        let mut paths = package.files_matching(DEX_PATTERN)?;
        paths.sort_by_key(|path| dex_number(path));

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match package.read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Skipping dex file: file={}, error={}", path.display(), e);
                    continue;
                }
            };
            match DexFile::parse(&bytes) {
                Ok(dex) => {
                    log::debug!(
                        "Read dex file: file={}, strings={}, classes={}",
                        path.display(),
                        dex.strings.len(),
                        dex.classes.len()
                    );
                    files.push(dex);
                }
                Err(e) => log::warn!("Skipping dex file: file={}, error={}", path.display(), e),
            }
        }
        Ok(Self { files })
    }

    #[must_use]
    pub fn from_files(files: Vec<DexFile>) -> Self {
        Self { files }
    }

    /// Raw strings of all dex files.
    pub fn strings(&self) -> impl Iterator<Item = &[u8]> {
        self.files
            .iter()
            .flat_map(|dex| dex.strings.iter().map(Vec::as_slice))
    }

    /// Defined classes of all dex files.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .flat_map(|dex| dex.classes.iter().map(String::as_str))
    }
}

/// `classes.dex` is 1, `classesN.dex` is N. Unnumbered names sort last.
fn dex_number(path: &Path) -> (u32, PathBuf) {
    let number = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("classes"))
        .and_then(|suffix| {
            if suffix.is_empty() {
                Some(1)
            } else {
                suffix.parse().ok()
            }
        })
        .unwrap_or(u32::MAX);
    (number, path.to_path_buf())
}

fn word(bytes: &[u8], offset: usize, section: &'static str) -> Result<u32> {
    bytes
        .get(offset..offset.saturating_add(4))
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DexError::OutOfBounds { section, offset })
}

/// Offsets of the entries of a header-described table (`size` then `offset` at `field`).
fn table(
    bytes: &[u8],
    field: usize,
    entry_size: usize,
    section: &'static str,
) -> Result<impl Iterator<Item = usize>> {
    let count = word(bytes, field, section)? as usize;
    let start = word(bytes, field + 4, section)? as usize;
    let end = count
        .checked_mul(entry_size)
        .and_then(|len| start.checked_add(len))
        .filter(|&end| count == 0 || end <= bytes.len())
        .ok_or(DexError::OutOfBounds {
            section,
            offset: start,
        })?;
    Ok((start..end).step_by(entry_size))
}

/// A `string_data_item`: ULEB128 UTF-16 length, then MUTF-8 bytes up to a NUL.
fn string_data(bytes: &[u8], offset: usize) -> Result<Vec<u8>> {
    let out_of_bounds = || DexError::OutOfBounds {
        section: "string_data",
        offset,
    };
    let data = bytes.get(offset..).ok_or_else(out_of_bounds)?;
    // The length prefix is at most five bytes, each but the last with the high bit set.
    let prefix = data
        .iter()
        .take(5)
        .position(|b| b & 0x80 == 0)
        .ok_or_else(out_of_bounds)?
        + 1;
    let text = &data[prefix..];
    let end = text
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(out_of_bounds)?;
    Ok(text[..end].to_vec())
}

fn class_name(descriptor: &[u8]) -> String {
    let name = descriptor
        .strip_prefix(b"L")
        .and_then(|inner| inner.strip_suffix(b";"))
        .unwrap_or(descriptor);
    String::from_utf8_lossy(name).into_owned()
}
