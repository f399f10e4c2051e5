//! Human-readable metadata for downstream prompts.
//!
//! The text block is deliberately limited to non-identifying attributes, so
//! it is safe to forward whether or not anonymization was requested.

use std::fmt::Write;

use serde::Serialize;

use super::tags::Tag;
use super::values::TagTable;

/// Attributes rendered into the prompt text block, in order.
const PROMPT_FIELDS: &[(&str, Tag)] = &[
    ("Modality", Tag::MODALITY),
    ("Body Part", Tag::BODY_PART_EXAMINED),
    ("Patient Age", Tag::PATIENT_AGE),
    ("Patient Sex", Tag::PATIENT_SEX),
    ("Study Description", Tag::STUDY_DESCRIPTION),
    ("Series Description", Tag::SERIES_DESCRIPTION),
    ("Manufacturer", Tag::MANUFACTURER),
];

/// Render the short `Label: value` lines included in AI prompts.
///
/// Absent attributes render as `Unknown`.
pub fn metadata_text(table: &TagTable) -> String {
    let mut text = String::new();
    for (label, tag) in PROMPT_FIELDS {
        let _ = writeln!(text, "{}: {}", label, table.text(*tag));
    }
    text
}

/// Structured summary returned alongside the text block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DicomSummary {
    pub modality: Option<String>,
    pub body_part: Option<String>,
    pub patient_age: Option<String>,
    pub patient_sex: Option<String>,
    pub study_description: Option<String>,
    pub series_description: Option<String>,
    pub manufacturer: Option<String>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub number_of_frames: u32,
    pub bits_allocated: Option<u16>,
    pub photometric_interpretation: Option<String>,
    pub transfer_syntax: String,
}

impl DicomSummary {
    pub fn from_table(table: &TagTable) -> Self {
        let text = |tag: Tag| {
            table
                .string(tag)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            modality: text(Tag::MODALITY),
            body_part: text(Tag::BODY_PART_EXAMINED),
            patient_age: text(Tag::PATIENT_AGE),
            patient_sex: text(Tag::PATIENT_SEX),
            study_description: text(Tag::STUDY_DESCRIPTION),
            series_description: text(Tag::SERIES_DESCRIPTION),
            manufacturer: text(Tag::MANUFACTURER),
            rows: table.u32(Tag::ROWS),
            columns: table.u32(Tag::COLUMNS),
            number_of_frames: table.u32(Tag::NUMBER_OF_FRAMES).unwrap_or(1).max(1),
            bits_allocated: table.u16(Tag::BITS_ALLOCATED),
            photometric_interpretation: text(Tag::PHOTOMETRIC_INTERPRETATION),
            transfer_syntax: table.transfer_syntax().uid().to_string(),
        }
    }
}
