// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Decodes the binary XML encoding of `AndroidManifest.xml` into an order-preserving element
//! tree.
//!
//! The document is a `RES_XML_TYPE` chunk holding a string pool, an optional resource map and
//! a flat sequence of namespace, element and CDATA node chunks. Nesting is rebuilt from the
//! start/end element pairs.

mod chunk;
mod element;
mod string_pool;
mod value;

use chunk::{
    u16_at, u32_at, u8_at, ChunkHeader, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE,
    RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE,
    RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE,
};
use string_pool::StringPool;
use thiserror::Error;
use value::TypedValue;

pub use element::{AttributeName, Attributes, Element};

/// Result type for manifest parsing.
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Structural problems in a binary XML document.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Not a binary XML document: chunk type 0x{chunk_type:04x}")]
    NotBinaryXml { chunk_type: u16 },
    #[error("Unexpected end of data at offset {offset}")]
    Truncated { offset: usize },
    #[error("Invalid chunk size at offset {offset}: header {header_size}, chunk {size}")]
    InvalidChunkSize {
        offset: usize,
        header_size: u16,
        size: u32,
    },
    #[error("Chunk at offset {offset} ends at {end}, past its parent end {limit}")]
    ChunkOutOfBounds {
        offset: usize,
        end: usize,
        limit: usize,
    },
    #[error("String #{index} at offset {offset} lies outside the string pool")]
    StringOutOfBounds { index: u32, offset: usize },
    #[error("String index {index} out of range (pool has {count} strings)")]
    InvalidStringIndex { index: u32, count: usize },
    #[error("Invalid attribute size {size} at offset {offset}")]
    InvalidAttributeSize { offset: usize, size: u16 },
    #[error("End of element </{tag}> without matching start")]
    UnbalancedEndElement { tag: String },
    #[error("Document has no root element")]
    MissingRoot,
}

const ANDROID_NAMESPACE: &str = "http://schemas.android.com/apk/res/android";
const ANDROID_PREFIX: &str = "android";

// ns, name, rawValue, then Res_value: size(u16), res0(u8), dataType(u8), data(u32).
const MIN_ATTRIBUTE_SIZE: u16 = 20;

/// Framework attribute names by resource id, for attributes whose pool name was stripped.
const FRAMEWORK_ATTRIBUTES: &[(u32, &str)] = &[
    (0x0101_0000, "theme"),
    (0x0101_0001, "label"),
    (0x0101_0002, "icon"),
    (0x0101_0003, "name"),
    (0x0101_000f, "debuggable"),
    (0x0101_0024, "value"),
    (0x0101_020c, "minSdkVersion"),
    (0x0101_021b, "versionCode"),
    (0x0101_021c, "versionName"),
    (0x0101_0270, "targetSdkVersion"),
    (0x0101_0280, "allowBackup"),
    (0x0101_035a, "largeHeap"),
    (0x0101_03af, "supportsRtl"),
    (0x0101_04ec, "usesCleartextTraffic"),
];

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    root: Element,
}

impl Manifest {
    /// Parse a binary XML document.
    ///
    /// Bytes after the document chunk are ignored, unknown chunk types are skipped by their
    /// declared size.
    ///
    /// # Errors
    /// Returns an error if a chunk is truncated or inconsistent, a string reference is out of
    /// range, elements are unbalanced or the document has no root element.
    pub fn parse(data: &[u8]) -> ManifestResult<Self> {
        // Text XML and other formats are rejected by type before their size fields are trusted.
        let chunk_type = u16_at(data, 0)?;
        if chunk_type != RES_XML_TYPE {
            return Err(ManifestError::NotBinaryXml { chunk_type });
        }
        let document = ChunkHeader::read(data, 0, data.len())?;

        let mut parser = Parser::default();
        let mut offset = document.body();
        while offset < document.end() {
            let chunk = ChunkHeader::read(data, offset, document.end())?;
            parser.chunk(data, &chunk)?;
            offset = chunk.end();
        }
        let root = parser.finish()?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// First-level elements with the given tag, in document order.
    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.root.children_named(tag)
    }

    /// First first-level element with the given tag.
    #[must_use]
    pub fn first(&self, tag: &str) -> Option<&Element> {
        self.root.child(tag)
    }

    /// The `application` element, if declared.
    #[must_use]
    pub fn application(&self) -> Option<&Element> {
        self.first("application")
    }
}

/// Namespace declaration in scope.
#[derive(Debug)]
struct Namespace {
    prefix: Option<String>,
    uri: String,
}

/// Incremental tree builder fed one chunk at a time.
#[derive(Debug, Default)]
struct Parser {
    pool: StringPool,
    resource_ids: Vec<u32>,
    namespaces: Vec<Namespace>,
    open: Vec<Element>,
    root: Option<Element>,
}

impl Parser {
    fn chunk(&mut self, data: &[u8], chunk: &ChunkHeader) -> ManifestResult<()> {
        match chunk.chunk_type {
            RES_STRING_POOL_TYPE => self.pool = StringPool::parse(data, chunk)?,
            RES_XML_RESOURCE_MAP_TYPE => {
                self.resource_ids = (chunk.body()..chunk.end().saturating_sub(3))
                    .step_by(4)
                    .map(|offset| u32_at(data, offset))
                    .collect::<ManifestResult<_>>()?;
            }
            RES_XML_START_NAMESPACE_TYPE => {
                let prefix = u32_at(data, chunk.body())?;
                let uri = u32_at(data, chunk.body() + 4)?;
                self.namespaces.push(Namespace {
                    prefix: self.pool.lookup(prefix)?.map(str::to_string),
                    uri: self.pool.lookup(uri)?.unwrap_or_default().to_string(),
                });
            }
            RES_XML_END_NAMESPACE_TYPE => {
                self.namespaces.pop();
            }
            RES_XML_START_ELEMENT_TYPE => {
                let element = self.start_element(data, chunk)?;
                self.open.push(element);
            }
            RES_XML_END_ELEMENT_TYPE => self.end_element(data, chunk)?,
            RES_XML_CDATA_TYPE => {
                let text = u32_at(data, chunk.body())?;
                if let (Some(text), Some(current)) = (self.pool.lookup(text)?, self.open.last_mut())
                {
                    current.push_text(text);
                }
            }
            other => log::debug!(
                "Skipping unknown chunk: type=0x{:04x}, offset={}, size={}",
                other,
                chunk.start,
                chunk.size
            ),
        }
        Ok(())
    }

    fn start_element(&self, data: &[u8], chunk: &ChunkHeader) -> ManifestResult<Element> {
        let body = chunk.body();
        let tag = self.pool.get(u32_at(data, body + 4)?)?;
        let attribute_start = usize::from(u16_at(data, body + 8)?);
        let attribute_size = u16_at(data, body + 10)?;
        let attribute_count = usize::from(u16_at(data, body + 12)?);
        if attribute_size < MIN_ATTRIBUTE_SIZE {
            return Err(ManifestError::InvalidAttributeSize {
                offset: chunk.start,
                size: attribute_size,
            });
        }

        let mut attributes = Attributes::default();
        for index in 0..attribute_count {
            let offset = body + attribute_start + index * usize::from(attribute_size);
            if offset + usize::from(MIN_ATTRIBUTE_SIZE) > chunk.end() {
                return Err(ManifestError::Truncated { offset });
            }
            let namespace = self.pool.lookup(u32_at(data, offset)?)?;
            let name_index = u32_at(data, offset + 4)?;
            let raw = self.pool.lookup(u32_at(data, offset + 8)?)?;
            let value = TypedValue {
                data_type: u8_at(data, offset + 15)?,
                data: u32_at(data, offset + 16)?,
            };
            let name = AttributeName::new(
                namespace.and_then(|uri| self.prefix_of(uri)),
                self.attribute_name(name_index)?,
            );
            attributes.push(name, value.render(raw, &self.pool)?);
        }
        Ok(Element::new(tag, attributes))
    }

    fn end_element(&mut self, data: &[u8], chunk: &ChunkHeader) -> ManifestResult<()> {
        let Some(element) = self.open.pop() else {
            let tag = self.pool.get(u32_at(data, chunk.body() + 4)?)?;
            return Err(ManifestError::UnbalancedEndElement {
                tag: tag.to_string(),
            });
        };
        self.close(element);
        Ok(())
    }

    fn close(&mut self, element: Element) {
        match self.open.last_mut() {
            Some(parent) => parent.push_child(element),
            None if self.root.is_none() => self.root = Some(element),
            None => log::debug!(
                "Ignoring additional top-level element: tag={}",
                element.tag()
            ),
        }
    }

    /// Elements left open at the end of the document are closed implicitly.
    fn finish(mut self) -> ManifestResult<Element> {
        while let Some(element) = self.open.pop() {
            log::debug!("Closing unterminated element: tag={}", element.tag());
            self.close(element);
        }
        self.root.ok_or(ManifestError::MissingRoot)
    }

    /// The framework namespace always renders as `android`, whatever the document declared.
    fn prefix_of(&self, uri: &str) -> Option<&str> {
        if uri == ANDROID_NAMESPACE {
            return Some(ANDROID_PREFIX);
        }
        self.namespaces
            .iter()
            .rev()
            .find(|ns| ns.uri == uri)
            .and_then(|ns| ns.prefix.as_deref())
    }

    /// Pool name of an attribute, recovered from the resource map when it was stripped.
    fn attribute_name(&self, index: u32) -> ManifestResult<String> {
        let name = self.pool.get(index)?;
        if !name.is_empty() {
            return Ok(name.to_string());
        }
        let Some(id) = self.resource_ids.get(index as usize) else {
            return Ok(String::new());
        };
        Ok(FRAMEWORK_ATTRIBUTES
            .iter()
            .find(|(known, _)| known == id)
            .map_or_else(|| format!("0x{id:08x}"), |(_, name)| (*name).to_string()))
    }
}
