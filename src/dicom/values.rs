//! Tag table construction and typed value access.
//!
//! The tag table is built once per decode call from a single walk over the
//! data set. Text VRs are stored as trimmed strings and binary numeric VRs as
//! `f64` lists; bulk binary values (OB/OW/UN) are not copied. The pixel data
//! element is recorded by position only.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::ParseError;
use crate::io::ByteOrder;

use super::parser::{DataSetWalker, ElementHeader, TransferSyntax};
use super::tags::{Tag, Vr};

/// Sentinel returned for absent tags.
pub const UNKNOWN: &str = "Unknown";

// =============================================================================
// TagValue
// =============================================================================

/// Decoded value of one element.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// Character string, padding removed
    Text(String),

    /// Binary numeric values (US, SS, UL, SL, FL, FD)
    Numbers(Vec<f64>),
}

impl TagValue {
    /// Decode value bytes according to their VR.
    ///
    /// Returns `None` for VRs that are not stored in the table.
    pub fn decode(vr: Vr, bytes: &[u8], order: ByteOrder) -> Option<Self> {
        if vr.is_text() {
            let text = String::from_utf8_lossy(bytes);
            return Some(TagValue::Text(
                text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string(),
            ));
        }

        let numbers: Vec<f64> = match vr {
            Vr::US => bytes.chunks_exact(2).map(|b| order.read_u16(b) as f64).collect(),
            Vr::SS => bytes.chunks_exact(2).map(|b| order.read_i16(b) as f64).collect(),
            Vr::UL => bytes.chunks_exact(4).map(|b| order.read_u32(b) as f64).collect(),
            Vr::SL => bytes.chunks_exact(4).map(|b| order.read_i32(b) as f64).collect(),
            Vr::FL => bytes.chunks_exact(4).map(|b| order.read_f32(b) as f64).collect(),
            Vr::FD => bytes.chunks_exact(8).map(|b| order.read_f64(b)).collect(),
            _ => return None,
        };
        Some(TagValue::Numbers(numbers))
    }

    /// All numeric values, parsing backslash-separated text (DS/IS) if needed.
    pub fn numbers(&self) -> Vec<f64> {
        match self {
            TagValue::Numbers(values) => values.clone(),
            TagValue::Text(text) => text
                .split('\\')
                .filter_map(|part| part.trim().parse::<f64>().ok())
                .collect(),
        }
    }

    /// First numeric value.
    pub fn first_number(&self) -> Option<f64> {
        match self {
            TagValue::Numbers(values) => values.first().copied(),
            TagValue::Text(text) => text
                .split('\\')
                .next()
                .and_then(|part| part.trim().parse::<f64>().ok()),
        }
    }

    /// Human-readable form used in metadata text.
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            TagValue::Text(text) => Cow::Borrowed(text.as_str()),
            TagValue::Numbers(values) => Cow::Owned(
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\\"),
            ),
        }
    }
}

// =============================================================================
// PixelDataLocation
// =============================================================================

/// Position of the pixel data element inside the original buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDataLocation {
    /// Offset of the first sample byte
    pub value_offset: usize,

    /// Declared length; `None` for encapsulated (undefined-length) data
    pub declared_length: Option<u32>,

    /// Bytes actually present from `value_offset` to the end of the element
    pub available: usize,
}

impl PixelDataLocation {
    fn from_header(header: &ElementHeader, bytes: &[u8]) -> Self {
        Self {
            value_offset: header.value_offset,
            declared_length: header.length,
            available: header.value(bytes).len(),
        }
    }
}

// =============================================================================
// TagTable
// =============================================================================

/// Read-only mapping from tag to decoded value, plus the pixel data position.
#[derive(Debug, Clone)]
pub struct TagTable {
    values: HashMap<Tag, TagValue>,
    transfer_syntax: TransferSyntax,
    pixel_data: Option<PixelDataLocation>,
}

impl TagTable {
    /// Parse a Part-10 stream into a tag table without touching pixel samples.
    ///
    /// # Errors
    /// Any structural [`ParseError`]. Absent tags are not errors.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut walker = DataSetWalker::new(bytes)?;
        let transfer_syntax = walker.transfer_syntax().clone();
        let body_order = transfer_syntax.byte_order();
        let body_offset = walker.meta().body_offset;

        let mut values = HashMap::new();
        let mut pixel_data = None;

        for header in walker.by_ref() {
            let header = header?;

            if header.tag == Tag::PIXEL_DATA {
                pixel_data = Some(PixelDataLocation::from_header(&header, bytes));
                continue;
            }
            if header.tag.is_delimiter() || header.is_undefined_length() {
                continue;
            }

            let order = if header.header_offset < body_offset {
                ByteOrder::LittleEndian
            } else {
                body_order
            };
            if let Some(value) = TagValue::decode(header.vr, header.value(bytes), order) {
                values.insert(header.tag, value);
            }
        }

        Ok(Self {
            values,
            transfer_syntax,
            pixel_data,
        })
    }

    /// Build a table from keyword/value pairs (e.g. an external decoder's
    /// metadata object). Unknown keywords are ignored.
    pub fn from_keywords<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        let values = pairs
            .into_iter()
            .filter_map(|(keyword, value)| {
                keyword_tag(keyword).map(|tag| (tag, TagValue::Text(value.trim().to_string())))
            })
            .collect();

        Self {
            values,
            transfer_syntax: TransferSyntax::ImplicitVrLittleEndian,
            pixel_data: None,
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        self.values.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.values.contains_key(&tag)
    }

    /// Display text for a tag, or `"Unknown"` when absent or empty.
    pub fn text(&self, tag: Tag) -> Cow<'_, str> {
        match self.values.get(&tag) {
            Some(value) => {
                let shown = value.display();
                if shown.is_empty() {
                    Cow::Borrowed(UNKNOWN)
                } else {
                    shown
                }
            }
            None => Cow::Borrowed(UNKNOWN),
        }
    }

    /// String value, if the tag is present as text.
    pub fn string(&self, tag: Tag) -> Option<&str> {
        match self.values.get(&tag) {
            Some(TagValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// First value as `f64` (binary numeric or DS/IS text).
    pub fn f64(&self, tag: Tag) -> Option<f64> {
        self.values.get(&tag).and_then(TagValue::first_number)
    }

    /// All values as `f64`.
    pub fn f64_values(&self, tag: Tag) -> Vec<f64> {
        self.values
            .get(&tag)
            .map(TagValue::numbers)
            .unwrap_or_default()
    }

    /// First value as a non-negative integer.
    pub fn u32(&self, tag: Tag) -> Option<u32> {
        self.f64(tag)
            .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32)
    }

    pub fn u16(&self, tag: Tag) -> Option<u16> {
        self.u32(tag).and_then(|v| u16::try_from(v).ok())
    }

    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.transfer_syntax
    }

    pub fn pixel_data(&self) -> Option<&PixelDataLocation> {
        self.pixel_data.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &TagValue)> {
        self.values.iter()
    }
}

/// Map a DICOM keyword to its tag, for the attributes this crate reports.
pub fn keyword_tag(keyword: &str) -> Option<Tag> {
    let tag = match keyword {
        "Modality" => Tag::MODALITY,
        "BodyPartExamined" => Tag::BODY_PART_EXAMINED,
        "PatientAge" => Tag::PATIENT_AGE,
        "PatientSex" => Tag::PATIENT_SEX,
        "StudyDescription" => Tag::STUDY_DESCRIPTION,
        "SeriesDescription" => Tag::SERIES_DESCRIPTION,
        "Manufacturer" => Tag::MANUFACTURER,
        "Rows" => Tag::ROWS,
        "Columns" => Tag::COLUMNS,
        "NumberOfFrames" => Tag::NUMBER_OF_FRAMES,
        "PhotometricInterpretation" => Tag::PHOTOMETRIC_INTERPRETATION,
        "BitsAllocated" => Tag::BITS_ALLOCATED,
        _ => return None,
    };
    Some(tag)
}

// =============================================================================
// Tests
// =============================================================================
