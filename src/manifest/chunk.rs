// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Chunk headers and bounds-checked little-endian reads.

use super::{ManifestError, ManifestResult};

pub(super) const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub(super) const RES_XML_TYPE: u16 = 0x0003;
pub(super) const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub(super) const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub(super) const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub(super) const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub(super) const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub(super) const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

/// Index value meaning "no string".
pub(super) const NO_ENTRY: u32 = 0xFFFF_FFFF;

const CHUNK_HEADER_SIZE: usize = 8;

/// The common header of every chunk: type, header size and total size.
#[derive(Debug, Clone, Copy)]
pub(super) struct ChunkHeader {
    pub(super) chunk_type: u16,
    pub(super) header_size: u16,
    pub(super) size: u32,
    pub(super) start: usize,
}

impl ChunkHeader {
    /// Read the header at `start` and check that the chunk fits before `limit`.
    pub(super) fn read(data: &[u8], start: usize, limit: usize) -> ManifestResult<Self> {
        if start + CHUNK_HEADER_SIZE > limit {
            return Err(ManifestError::Truncated { offset: start });
        }
        let header = Self {
            chunk_type: u16_at(data, start)?,
            header_size: u16_at(data, start + 2)?,
            size: u32_at(data, start + 4)?,
            start,
        };
        if usize::from(header.header_size) < CHUNK_HEADER_SIZE
            || header.size < u32::from(header.header_size)
        {
            return Err(ManifestError::InvalidChunkSize {
                offset: start,
                header_size: header.header_size,
                size: header.size,
            });
        }
        if header.end() > limit {
            return Err(ManifestError::ChunkOutOfBounds {
                offset: start,
                end: header.end(),
                limit,
            });
        }
        Ok(header)
    }

    pub(super) fn end(&self) -> usize {
        self.start.saturating_add(self.size as usize)
    }

    /// First byte after the header.
    pub(super) fn body(&self) -> usize {
        self.start + usize::from(self.header_size)
    }

    /// Bytes of the whole chunk, header included.
    pub(super) fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end()]
    }
}

pub(super) fn u8_at(data: &[u8], offset: usize) -> ManifestResult<u8> {
    data.get(offset)
        .copied()
        .ok_or(ManifestError::Truncated { offset })
}

pub(super) fn u16_at(data: &[u8], offset: usize) -> ManifestResult<u16> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or(ManifestError::Truncated { offset })?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(super) fn u32_at(data: &[u8], offset: usize) -> ManifestResult<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(ManifestError::Truncated { offset })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
