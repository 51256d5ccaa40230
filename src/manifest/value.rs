// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Typed attribute values (`Res_value`) and their textual rendering.

use super::string_pool::StringPool;
use super::ManifestResult;

const TYPE_NULL: u8 = 0x00;
const TYPE_REFERENCE: u8 = 0x01;
const TYPE_ATTRIBUTE: u8 = 0x02;
const TYPE_STRING: u8 = 0x03;
const TYPE_FLOAT: u8 = 0x04;
const TYPE_DIMENSION: u8 = 0x05;
const TYPE_FRACTION: u8 = 0x06;
const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;
const TYPE_INT_BOOLEAN: u8 = 0x12;
const TYPE_FIRST_COLOR_INT: u8 = 0x1c;
const TYPE_LAST_COLOR_INT: u8 = 0x1f;

const COMPLEX_UNIT_MASK: u32 = 0x0f;
const RADIX_MULTS: [f64; 4] = [
    1.0 / 256.0,
    1.0 / 32_768.0,
    1.0 / 8_388_608.0,
    1.0 / 2_147_483_648.0,
];
const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

// Package id of the Android framework resources.
const FRAMEWORK_PACKAGE: u32 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TypedValue {
    pub(super) data_type: u8,
    pub(super) data: u32,
}

impl TypedValue {
    /// Render the value as text. `raw` is the attribute's raw string, if it has one.
    pub(super) fn render(self, raw: Option<&str>, pool: &StringPool) -> ManifestResult<String> {
        let data = self.data;
        let text = match self.data_type {
            TYPE_STRING => match raw {
                Some(s) => s.to_string(),
                None => pool.get(data)?.to_string(),
            },
            TYPE_NULL => raw.unwrap_or_default().to_string(),
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE => Self::reference('@', data),
            TYPE_ATTRIBUTE | TYPE_DYNAMIC_ATTRIBUTE => Self::reference('?', data),
            TYPE_FLOAT => f32::from_bits(data).to_string(),
            TYPE_DIMENSION => Self::complex(data, 1.0, &DIMENSION_UNITS),
            TYPE_FRACTION => Self::complex(data, 100.0, &FRACTION_UNITS),
            TYPE_INT_DEC => (data as i32).to_string(),
            TYPE_INT_HEX => format!("0x{data:08X}"),
            TYPE_INT_BOOLEAN => (data != 0).to_string(),
            TYPE_FIRST_COLOR_INT..=TYPE_LAST_COLOR_INT => format!("#{data:08X}"),
            other => match raw {
                Some(s) => s.to_string(),
                None => format!("<0x{data:X}, type 0x{other:02X}>"),
            },
        };
        Ok(text)
    }

    fn reference(sigil: char, id: u32) -> String {
        let package = if id >> 24 == FRAMEWORK_PACKAGE {
            "android:"
        } else {
            ""
        };
        format!("{sigil}{package}{id:08X}")
    }

    /// Complex values keep a signed 24-bit mantissa in the upper bits, a radix selector in bits
    /// 4-5 and the unit in bits 0-3.
    fn complex(data: u32, scale: f64, units: &[&str]) -> String {
        let mantissa = f64::from((data & 0xFFFF_FF00) as i32);
        let value = mantissa * RADIX_MULTS[((data >> 4) & 0x3) as usize] * scale;
        let unit = units
            .get((data & COMPLEX_UNIT_MASK) as usize)
            .copied()
            .unwrap_or_default();
        format!("{value:.6}{unit}")
    }
}
