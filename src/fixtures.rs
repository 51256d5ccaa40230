// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! In-memory builders for the binary formats found in an APK, used by the unit tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub(crate) const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

const NO_ENTRY: u32 = 0xFFFF_FFFF;

/// Typed attribute value as stored in a binary XML attribute.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Value<'a> {
    Str(&'a str),
    Bool(bool),
    Int(i32),
    Typed(u8, u32),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Attr<'a> {
    namespace: Option<&'a str>,
    name: &'a str,
    value: Value<'a>,
}

impl<'a> Attr<'a> {
    pub(crate) fn with_namespace(namespace: &'a str, name: &'a str, value: Value<'a>) -> Self {
        Self {
            namespace: Some(namespace),
            name,
            value,
        }
    }
}

/// Attribute in the Android framework namespace.
pub(crate) fn android<'a>(name: &'a str, value: Value<'a>) -> Attr<'a> {
    Attr {
        namespace: Some(ANDROID_NS),
        name,
        value,
    }
}

/// Attribute without namespace.
pub(crate) fn plain<'a>(name: &'a str, value: Value<'a>) -> Attr<'a> {
    Attr {
        namespace: None,
        name,
        value,
    }
}

/// Builds a binary XML document: string pool, optional resource map, then node chunks.
#[derive(Debug, Default)]
pub(crate) struct AxmlBuilder {
    strings: Vec<String>,
    resource_ids: Vec<u32>,
    nodes: Vec<u8>,
    utf8: bool,
}

impl AxmlBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Encode the string pool as UTF-8 instead of UTF-16.
    pub(crate) fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    /// Put `(name, id)` pairs at the front of the pool and record their ids in the resource map.
    pub(crate) fn resource_names(mut self, names: &[(&str, u32)]) -> Self {
        for (name, id) in names {
            self.strings.push((*name).to_string());
            self.resource_ids.push(*id);
        }
        self
    }

    pub(crate) fn android_namespace(self) -> Self {
        self.start_namespace("android", ANDROID_NS)
    }

    pub(crate) fn start_namespace(mut self, prefix: &str, uri: &str) -> Self {
        let (prefix, uri) = (self.string(prefix), self.string(uri));
        self.node(0x0100, &[prefix, uri]);
        self
    }

    pub(crate) fn end_namespace(mut self, prefix: &str, uri: &str) -> Self {
        let (prefix, uri) = (self.string(prefix), self.string(uri));
        self.node(0x0101, &[prefix, uri]);
        self
    }

    pub(crate) fn start(mut self, tag: &str, attributes: &[Attr<'_>]) -> Self {
        let name = self.string(tag);
        let mut body = Vec::new();
        put_u32(&mut body, NO_ENTRY);
        put_u32(&mut body, name);
        put_u16(&mut body, 20); // attributeStart
        put_u16(&mut body, 20); // attributeSize
        put_u16(&mut body, attributes.len() as u16);
        put_u16(&mut body, 0);
        put_u16(&mut body, 0);
        put_u16(&mut body, 0);
        for attr in attributes {
            let namespace = attr.namespace.map_or(NO_ENTRY, |ns| self.string(ns));
            let name = self.string(attr.name);
            let (raw, data_type, data) = match attr.value {
                Value::Str(s) => {
                    let index = self.string(s);
                    (index, 0x03, index)
                }
                Value::Bool(b) => (NO_ENTRY, 0x12, if b { 0xFFFF_FFFF } else { 0 }),
                Value::Int(i) => (NO_ENTRY, 0x10, i as u32),
                Value::Typed(t, d) => (NO_ENTRY, t, d),
            };
            put_u32(&mut body, namespace);
            put_u32(&mut body, name);
            put_u32(&mut body, raw);
            put_u16(&mut body, 8);
            body.push(0);
            body.push(data_type);
            put_u32(&mut body, data);
        }
        self.node_raw(0x0102, &body);
        self
    }

    pub(crate) fn end(mut self, tag: &str) -> Self {
        let name = self.string(tag);
        self.node(0x0103, &[NO_ENTRY, name]);
        self
    }

    /// Shorthand for an element without children.
    pub(crate) fn leaf(self, tag: &str, attributes: &[Attr<'_>]) -> Self {
        self.start(tag, attributes).end(tag)
    }

    pub(crate) fn cdata(mut self, text: &str) -> Self {
        let index = self.string(text);
        let mut body = Vec::new();
        put_u32(&mut body, index);
        put_u16(&mut body, 8);
        body.push(0);
        body.push(0x03);
        put_u32(&mut body, index);
        self.node_raw(0x0104, &body);
        self
    }

    /// Append an arbitrary chunk between the nodes.
    pub(crate) fn raw_chunk(mut self, chunk_type: u16, payload: &[u8]) -> Self {
        put_u16(&mut self.nodes, chunk_type);
        put_u16(&mut self.nodes, 8);
        put_u32(&mut self.nodes, 8 + payload.len() as u32);
        self.nodes.extend_from_slice(payload);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut body = self.string_pool();
        if !self.resource_ids.is_empty() {
            put_u16(&mut body, 0x0180);
            put_u16(&mut body, 8);
            put_u32(&mut body, 8 + 4 * self.resource_ids.len() as u32);
            for id in &self.resource_ids {
                put_u32(&mut body, *id);
            }
        }
        body.extend_from_slice(&self.nodes);

        let mut out = Vec::new();
        put_u16(&mut out, 0x0003);
        put_u16(&mut out, 8);
        put_u32(&mut out, 8 + body.len() as u32);
        out.extend_from_slice(&body);
        out
    }

    fn string(&mut self, s: &str) -> u32 {
        if let Some(index) = self.strings.iter().position(|known| known == s) {
            return index as u32;
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as u32
    }

    fn node(&mut self, chunk_type: u16, fields: &[u32]) {
        let mut body = Vec::new();
        for field in fields {
            put_u32(&mut body, *field);
        }
        self.node_raw(chunk_type, &body);
    }

    fn node_raw(&mut self, chunk_type: u16, body: &[u8]) {
        put_u16(&mut self.nodes, chunk_type);
        put_u16(&mut self.nodes, 16);
        put_u32(&mut self.nodes, 16 + body.len() as u32);
        put_u32(&mut self.nodes, 1); // lineNumber
        put_u32(&mut self.nodes, NO_ENTRY); // comment
        self.nodes.extend_from_slice(body);
    }

    fn string_pool(&self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        for s in &self.strings {
            offsets.push(data.len() as u32);
            if self.utf8 {
                data.push(s.chars().count() as u8);
                data.push(s.len() as u8);
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            } else {
                let units: Vec<u16> = s.encode_utf16().collect();
                put_u16(&mut data, units.len() as u16);
                for unit in units {
                    put_u16(&mut data, unit);
                }
                put_u16(&mut data, 0);
            }
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let header_size = 28u32;
        let strings_start = header_size + 4 * offsets.len() as u32;
        let mut chunk = Vec::new();
        put_u16(&mut chunk, 0x0001);
        put_u16(&mut chunk, header_size as u16);
        put_u32(&mut chunk, strings_start + data.len() as u32);
        put_u32(&mut chunk, offsets.len() as u32);
        put_u32(&mut chunk, 0); // styleCount
        put_u32(&mut chunk, if self.utf8 { 0x100 } else { 0 });
        put_u32(&mut chunk, strings_start);
        put_u32(&mut chunk, 0); // stylesStart
        for offset in offsets {
            put_u32(&mut chunk, offset);
        }
        chunk.extend_from_slice(&data);
        chunk
    }
}

/// Build a dex file whose string table holds `strings` followed by one descriptor per class,
/// with one class definition per entry of `classes` (slash-separated names).
pub(crate) fn build_dex(strings: &[&[u8]], classes: &[&str]) -> Vec<u8> {
    let descriptors: Vec<Vec<u8>> = classes
        .iter()
        .map(|class| format!("L{class};").into_bytes())
        .collect();
    let all: Vec<&[u8]> = strings
        .iter()
        .copied()
        .chain(descriptors.iter().map(Vec::as_slice))
        .collect();

    let string_ids_off = 0x70;
    let type_ids_off = string_ids_off + 4 * all.len();
    let class_defs_off = type_ids_off + 4 * classes.len();
    let data_off = class_defs_off + 32 * classes.len();

    let mut out = vec![0u8; data_off];
    let mut data = Vec::new();
    for (i, s) in all.iter().enumerate() {
        let offset = (data_off + data.len()) as u32;
        out[string_ids_off + 4 * i..][..4].copy_from_slice(&offset.to_le_bytes());
        put_uleb128(&mut data, s.len() as u32);
        data.extend_from_slice(s);
        data.push(0);
    }
    for i in 0..classes.len() {
        let descriptor = (strings.len() + i) as u32;
        out[type_ids_off + 4 * i..][..4].copy_from_slice(&descriptor.to_le_bytes());
        let class_def = class_defs_off + 32 * i;
        out[class_def..][..4].copy_from_slice(&(i as u32).to_le_bytes());
        out[class_def + 8..][..4].copy_from_slice(&NO_ENTRY.to_le_bytes()); // superclass_idx
    }
    out.extend_from_slice(&data);

    let file_size = out.len() as u32;
    out[..8].copy_from_slice(b"dex\n035\0");
    let mut field = |offset: usize, value: u32| {
        out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    };
    field(32, file_size);
    field(36, 0x70);
    field(40, 0x1234_5678);
    field(56, all.len() as u32);
    field(60, string_ids_off as u32);
    field(64, classes.len() as u32);
    field(68, type_ids_off as u32);
    field(96, classes.len() as u32);
    field(100, class_defs_off as u32);
    out
}

/// Word size and byte order of a generated ELF file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElfClass {
    pub(crate) is_64: bool,
    pub(crate) big_endian: bool,
}

impl ElfClass {
    pub(crate) const LE64: Self = Self {
        is_64: true,
        big_endian: false,
    };
    pub(crate) const LE32: Self = Self {
        is_64: false,
        big_endian: false,
    };
    pub(crate) const BE32: Self = Self {
        is_64: false,
        big_endian: true,
    };
}

/// Build a little-endian ELF64 shared object, see [`build_elf`].
pub(crate) fn build_elf64(strings: &[&str], dynamics: &[Vec<(u64, &str)>]) -> Vec<u8> {
    build_elf(ElfClass::LE64, strings, dynamics)
}

/// Build a shared object with a `.dynstr` and one `.dynamic` section per entry list.
///
/// Entry values name a string of `strings`. Every table also gets `DT_STRTAB`, `DT_STRSZ` and
/// `DT_NULL`. When there is at least one table, a `PT_LOAD` segment maps the whole file at
/// address 0 and a `PT_DYNAMIC` segment points at the first table.
pub(crate) fn build_elf(
    class: ElfClass,
    strings: &[&str],
    dynamics: &[Vec<(u64, &str)>],
) -> Vec<u8> {
    const PT_LOAD: u32 = 1;
    const PT_DYNAMIC: u32 = 2;
    const SHT_STRTAB: u32 = 3;
    const SHT_DYNAMIC: u32 = 6;
    const DT_STRTAB: u64 = 5;
    const DT_STRSZ: u64 = 10;

    let (ehsize, phentsize, shentsize) = if class.is_64 {
        (64, 56, 64)
    } else {
        (52, 32, 40)
    };
    let word = if class.is_64 { 8 } else { 4 };

    let mut dynstr = vec![0u8];
    let mut offsets = Vec::new();
    for s in strings {
        offsets.push((*s, dynstr.len() as u64));
        dynstr.extend_from_slice(s.as_bytes());
        dynstr.push(0);
    }
    let offset_of = |name: &str| {
        offsets
            .iter()
            .find(|(s, _)| *s == name)
            .map_or(0, |(_, o)| *o)
    };

    let phnum: usize = if dynamics.is_empty() { 0 } else { 2 };
    let dynstr_offset = ehsize + phnum * phentsize;
    let tables: Vec<Vec<(u64, u64)>> = dynamics
        .iter()
        .map(|entries| {
            entries
                .iter()
                .map(|(tag, value)| (*tag, offset_of(value)))
                .chain([
                    (DT_STRTAB, dynstr_offset as u64),
                    (DT_STRSZ, dynstr.len() as u64),
                    (0, 0),
                ])
                .collect()
        })
        .collect();

    let mut cursor = (dynstr_offset + dynstr.len()).next_multiple_of(8);
    let mut placed = Vec::new();
    for table in &tables {
        let size = table.len() * 2 * word;
        placed.push((cursor, size));
        cursor += size;
    }
    let shoff = cursor;
    let shnum = 2 + tables.len();
    let total = shoff + shnum * shentsize;

    let mut w = ElfWriter {
        out: Vec::with_capacity(total),
        class,
    };
    w.out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    w.out.push(if class.is_64 { 2 } else { 1 }); // EI_CLASS
    w.out.push(if class.big_endian { 2 } else { 1 }); // EI_DATA
    w.out.push(1); // EI_VERSION
    w.out.resize(16, 0);
    w.u16(3); // ET_DYN
    w.u16(match (class.is_64, class.big_endian) {
        (true, _) => 0xb7, // EM_AARCH64
        (false, false) => 0x28, // EM_ARM
        (false, true) => 0x08, // EM_MIPS
    });
    w.u32(1);
    w.word(0); // e_entry
    w.word(if phnum > 0 { ehsize as u64 } else { 0 });
    w.word(shoff as u64);
    w.u32(0); // e_flags
    w.u16(ehsize as u16);
    w.u16(phentsize as u16);
    w.u16(phnum as u16);
    w.u16(shentsize as u16);
    w.u16(shnum as u16);
    w.u16(0); // e_shstrndx

    if let Some(&(start, size)) = placed.first() {
        w.program_header(PT_LOAD, 0, total, 5);
        w.program_header(PT_DYNAMIC, start, size, 6);
    }
    w.out.extend_from_slice(&dynstr);
    w.out.resize(placed.first().map_or(shoff, |&(start, _)| start), 0);
    for table in &tables {
        for &(tag, value) in table {
            w.word(tag);
            w.word(value);
        }
    }

    w.section_header(0, 0, 0, 0);
    w.section_header(SHT_STRTAB, dynstr_offset, dynstr.len(), 0);
    for &(start, size) in &placed {
        w.section_header(SHT_DYNAMIC, start, size, 1);
    }
    w.out
}

/// Zero `e_shoff` and `e_shnum`, as in a stripped object without a section header table.
pub(crate) fn strip_section_headers(elf: &mut [u8]) {
    let (shoff, shnum) = if elf[4] == 2 {
        (40..48, 60..62)
    } else {
        (32..36, 48..50)
    };
    elf[shoff].fill(0);
    elf[shnum].fill(0);
}

struct ElfWriter {
    out: Vec<u8>,
    class: ElfClass,
}

impl ElfWriter {
    fn u16(&mut self, value: u16) {
        let bytes = if self.class.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.out.extend_from_slice(&bytes);
    }

    fn u32(&mut self, value: u32) {
        let bytes = if self.class.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.out.extend_from_slice(&bytes);
    }

    /// Address-sized field: 8 bytes for ELF64, 4 for ELF32.
    fn word(&mut self, value: u64) {
        if self.class.is_64 {
            let bytes = if self.class.big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            self.out.extend_from_slice(&bytes);
        } else {
            self.u32(value as u32);
        }
    }

    /// Segment mapped at the address equal to its file offset.
    fn program_header(&mut self, kind: u32, offset: usize, size: usize, flags: u32) {
        let (offset, size) = (offset as u64, size as u64);
        self.u32(kind);
        if self.class.is_64 {
            self.u32(flags);
        }
        self.word(offset);
        self.word(offset); // p_vaddr
        self.word(offset); // p_paddr
        self.word(size); // p_filesz
        self.word(size); // p_memsz
        if !self.class.is_64 {
            self.u32(flags);
        }
        self.word(8); // p_align
    }

    fn section_header(&mut self, kind: u32, offset: usize, size: usize, link: u32) {
        let entsize = if kind == 6 {
            if self.class.is_64 {
                16
            } else {
                8
            }
        } else {
            0
        };
        self.u32(0); // sh_name
        self.u32(kind);
        self.word(0); // sh_flags
        self.word(0); // sh_addr
        self.word(offset as u64);
        self.word(size as u64);
        self.u32(link);
        self.u32(0); // sh_info
        self.word(8); // sh_addralign
        self.word(entsize);
    }
}

/// Write a ZIP container with stored entries.
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}
