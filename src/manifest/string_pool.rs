// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! The string pool chunk shared by every node of a binary XML document.

use super::chunk::{u16_at, u32_at, u8_at, ChunkHeader, NO_ENTRY};
use super::{ManifestError, ManifestResult};

const UTF8_FLAG: u32 = 0x0000_0100;
// type, headerSize, size, stringCount, styleCount, flags, stringsStart, stylesStart
const POOL_HEADER_SIZE: u16 = 28;

/// Decoded strings of a pool, addressed by index.
///
/// Strings are decoded lossily: invalid UTF-8 or unpaired surrogates become U+FFFD.
#[derive(Debug, Default, Clone)]
pub(super) struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    pub(super) fn parse(data: &[u8], chunk: &ChunkHeader) -> ManifestResult<Self> {
        if chunk.header_size < POOL_HEADER_SIZE {
            return Err(ManifestError::InvalidChunkSize {
                offset: chunk.start,
                header_size: chunk.header_size,
                size: chunk.size,
            });
        }
        let bytes = chunk.bytes(data);
        let count = u32_at(bytes, 8)? as usize;
        let flags = u32_at(bytes, 16)?;
        let strings_start = u32_at(bytes, 20)? as usize;
        let utf8 = flags & UTF8_FLAG != 0;

        let mut strings = Vec::with_capacity(count.min(bytes.len() / 4));
        for index in 0..count {
            let entry = usize::from(chunk.header_size) + 4 * index;
            let offset = u32_at(bytes, entry).map_err(|_| ManifestError::Truncated {
                offset: chunk.start + entry,
            })? as usize;
            let position = strings_start.saturating_add(offset);
            let text = if utf8 {
                Self::utf8_string(bytes, position)
            } else {
                Self::utf16_string(bytes, position)
            }
            .ok_or(ManifestError::StringOutOfBounds {
                index: index as u32,
                offset: chunk.start.saturating_add(position),
            })?;
            strings.push(text);
        }
        Ok(Self { strings })
    }

    /// Resolve a mandatory string reference.
    pub(super) fn get(&self, index: u32) -> ManifestResult<&str> {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .ok_or(ManifestError::InvalidStringIndex {
                index,
                count: self.strings.len(),
            })
    }

    /// Resolve an optional string reference; `NO_ENTRY` yields `None`.
    pub(super) fn lookup(&self, index: u32) -> ManifestResult<Option<&str>> {
        if index == NO_ENTRY {
            return Ok(None);
        }
        self.get(index).map(Some)
    }

    /// UTF-8 entry: character count and byte count (one or two bytes each), then the bytes.
    fn utf8_string(bytes: &[u8], position: usize) -> Option<String> {
        let (_, skip) = Self::utf8_length(bytes, position)?;
        let (length, skip2) = Self::utf8_length(bytes, position + skip)?;
        let start = position + skip + skip2;
        let raw = bytes.get(start..start.checked_add(length)?)?;
        Some(String::from_utf8_lossy(raw).into_owned())
    }

    /// UTF-16 entry: unit count (one or two units), then the code units.
    fn utf16_string(bytes: &[u8], position: usize) -> Option<String> {
        let first = u16_at(bytes, position).ok()?;
        let (length, start) = if first & 0x8000 == 0 {
            (usize::from(first), position + 2)
        } else {
            let second = u16_at(bytes, position + 2).ok()?;
            (
                (usize::from(first & 0x7FFF) << 16) | usize::from(second),
                position + 4,
            )
        };
        let raw = bytes.get(start..start.checked_add(length.checked_mul(2)?)?)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }

    fn utf8_length(bytes: &[u8], position: usize) -> Option<(usize, usize)> {
        let first = u8_at(bytes, position).ok()?;
        if first & 0x80 == 0 {
            Some((usize::from(first), 1))
        } else {
            let second = u8_at(bytes, position + 1).ok()?;
            Some(((usize::from(first & 0x7F) << 8) | usize::from(second), 2))
        }
    }
}
