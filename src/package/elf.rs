// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Parses ELF shared objects to extract their dynamic-linking metadata: `DT_NEEDED`,
//! `DT_RPATH`, `DT_RUNPATH` and `DT_SONAME` entries. Uses the `goblin` crate for the ELF
//! container.

use goblin::container::Ctx;
use goblin::elf::dynamic::{Dyn, DT_NEEDED, DT_NULL, DT_RPATH, DT_RUNPATH, DT_SONAME};
use goblin::elf::section_header::{SectionHeader, SHT_DYNAMIC};
use goblin::elf::Elf as GoblinElf;
use goblin::strtab::Strtab;
use scroll::ctx::SizeWith;
use scroll::Pread;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

type Result<T> = std::result::Result<T, ElfError>;

// ELF magic bytes: 0x7f followed by ASCII "ELF" (e_ident[EI_MAG0..EI_MAG3]).
const ELF_MAGIC: [u8; 4] = [0x7f, 0x45, 0x4c, 0x46];
// Size of the smallest (32-bit) ELF header.
const MIN_ELF_SIZE: usize = 52;

/// Errors that can occur when parsing ELF files.
///
/// None of these are fatal for a package analysis: a library that cannot be parsed simply
/// contributes no dependencies.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("File is too small to be an ELF file: {size} bytes")]
    FileTooSmall { size: usize },
    #[error("File is not an ELF file")]
    NotElfFile,
    #[error("Failed to read file: {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse ELF file")]
    ParseFailed {
        #[source]
        source: goblin::error::Error,
    },
}

impl From<goblin::error::Error> for ElfError {
    fn from(source: goblin::error::Error) -> Self {
        Self::ParseFailed { source }
    }
}

/// Dynamic-linking metadata of one ELF file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ElfDependencies {
    needed: Vec<String>,
    rpath: Vec<String>,
    runpath: Vec<String>,
    soname: Vec<String>,
}

impl ElfDependencies {
    /// Parse an ELF file from a path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a parseable ELF file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| ElfError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse the dynamic-linking metadata from the raw bytes of an ELF file.
    ///
    /// Every `SHT_DYNAMIC` section is processed. Files without section headers fall back to the
    /// dynamic table found through the program headers.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a parseable ELF container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ELF_MAGIC.len() || bytes[..ELF_MAGIC.len()] != ELF_MAGIC {
            return Err(ElfError::NotElfFile);
        }
        if bytes.len() < MIN_ELF_SIZE {
            return Err(ElfError::FileTooSmall { size: bytes.len() });
        }

        // Validates class and data encoding.
        let header = GoblinElf::parse_header(bytes)?;
        let ctx = Ctx::new(header.container()?, header.endianness()?);
        let section_headers = SectionHeader::parse(
            bytes,
            header.e_shoff as usize,
            header.e_shnum as usize,
            ctx,
        )?;

        let mut dependencies = Self::default();
        let mut found_dynamic = false;
        for section in section_headers.iter().filter(|s| s.sh_type == SHT_DYNAMIC) {
            found_dynamic = true;
            let Some(strtab) = section_headers
                .get(section.sh_link as usize)
                .and_then(|link| Self::string_table(bytes, link))
            else {
                log::debug!(
                    "Dynamic section without usable string table: link={}",
                    section.sh_link
                );
                continue;
            };
            let Some(entries) = Self::section_data(bytes, section) else {
                log::debug!(
                    "Dynamic section out of bounds: offset={}, size={}",
                    section.sh_offset,
                    section.sh_size
                );
                continue;
            };
            for entry in dynamic_entries(entries, ctx) {
                if entry.d_tag == DT_NULL {
                    break;
                }
                dependencies.record(entry.d_tag, entry.d_val, &strtab);
            }
        }

        if !found_dynamic && header.e_phnum > 0 {
            dependencies.extend_from_program_headers(bytes)?;
        }

        Ok(dependencies)
    }

    /// Get the list of dynamic dependencies (`DT_NEEDED` entries).
    #[must_use]
    pub fn needed(&self) -> &[String] {
        &self.needed
    }

    /// Get the RPATH entries from the ELF file.
    #[must_use]
    pub fn rpath(&self) -> &[String] {
        &self.rpath
    }

    /// Get the RUNPATH entries from the ELF file.
    #[must_use]
    pub fn runpath(&self) -> &[String] {
        &self.runpath
    }

    /// Get the declared module name (`DT_SONAME`), at most one entry for well-formed files.
    #[must_use]
    pub fn soname(&self) -> &[String] {
        &self.soname
    }

    /// Iterate over all four sequences.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.needed
            .iter()
            .chain(&self.rpath)
            .chain(&self.runpath)
            .chain(&self.soname)
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names().next().is_none()
    }

    fn record(&mut self, tag: u64, value: u64, strtab: &Strtab<'_>) {
        let target = match tag {
            DT_NEEDED => &mut self.needed,
            DT_RPATH => &mut self.rpath,
            DT_RUNPATH => &mut self.runpath,
            DT_SONAME => &mut self.soname,
            _ => return,
        };
        if let Some(name) = usize::try_from(value)
            .ok()
            .and_then(|offset| strtab.get_at(offset))
        {
            target.push(name.to_string());
        }
    }

    /// Stripped shared objects carry no section headers; read the dynamic table through the
    /// `PT_DYNAMIC` program header instead.
    fn extend_from_program_headers(&mut self, bytes: &[u8]) -> Result<()> {
        let elf = GoblinElf::parse(bytes)?;
        if let Some(dynamic) = &elf.dynamic {
            for dyn_entry in &dynamic.dyns {
                self.record(dyn_entry.d_tag, dyn_entry.d_val, &elf.dynstrtab);
            }
        }
        Ok(())
    }

    fn section_data<'a>(bytes: &'a [u8], section: &SectionHeader) -> Option<&'a [u8]> {
        let start = usize::try_from(section.sh_offset).ok()?;
        let size = usize::try_from(section.sh_size).ok()?;
        bytes.get(start..start.checked_add(size)?)
    }

    fn string_table<'a>(bytes: &'a [u8], section: &SectionHeader) -> Option<Strtab<'a>> {
        let offset = usize::try_from(section.sh_offset).ok()?;
        let size = usize::try_from(section.sh_size).ok()?;
        Strtab::parse(bytes, offset, size, 0x0).ok()
    }
}

/// Decode the entries of a dynamic table with the file's word size and byte order. A trailing
/// partial entry is ignored.
fn dynamic_entries(data: &[u8], ctx: Ctx) -> impl Iterator<Item = Dyn> + '_ {
    data.chunks_exact(Dyn::size_with(&ctx))
        .map_while(move |entry| entry.pread_with::<Dyn>(0, ctx).ok())
}
