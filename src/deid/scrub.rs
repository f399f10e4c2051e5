//! In-place scrub of identifying header values.
//!
//! A first structural pass records where each identifying element's value
//! lives; a second pass overwrites those bytes. Lengths never change, so the
//! buffer can be parsed afterwards exactly as before and every offset found
//! by the first pass stays valid. Sequence contents are not scrubbed.

use crate::dicom::{DataSetWalker, Tag, Vr};
use crate::error::ParseError;

/// Replacement for person names.
pub const NAME_REPLACEMENT: &[u8] = b"ANONYMIZED";

/// Replacement for full-length dates.
pub const DATE_REPLACEMENT: &[u8] = b"19010101";

/// Elements blanked by [`scrub_tags`].
pub const SCRUBBED_TAGS: &[Tag] = &[
    Tag::PATIENT_NAME,
    Tag::PATIENT_ID,
    Tag::PATIENT_BIRTH_DATE,
    Tag::OTHER_PATIENT_IDS,
    Tag::OTHER_PATIENT_NAMES,
    Tag::PATIENT_ADDRESS,
    Tag::PATIENT_TELEPHONE_NUMBERS,
    Tag::INSTITUTION_NAME,
    Tag::INSTITUTION_ADDRESS,
    Tag::REFERRING_PHYSICIAN_NAME,
    Tag::PERFORMING_PHYSICIAN_NAME,
    Tag::OPERATORS_NAME,
    Tag::ACCESSION_NUMBER,
    Tag::STUDY_DATE,
    Tag::SERIES_DATE,
    Tag::ACQUISITION_DATE,
    Tag::CONTENT_DATE,
];

/// Tags that were overwritten, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrubReport {
    pub scrubbed: Vec<Tag>,
}

impl ScrubReport {
    pub fn len(&self) -> usize {
        self.scrubbed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrubbed.is_empty()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.scrubbed.contains(&tag)
    }
}

/// A value region found by the structural pass.
struct Region {
    tag: Tag,
    vr: Vr,
    start: usize,
    len: usize,
}

/// Blank identifying header values in place.
///
/// # Errors
/// Structural [`ParseError`]s from the first pass. The buffer is untouched if
/// the first pass fails.
pub fn scrub_tags(bytes: &mut [u8]) -> Result<ScrubReport, ParseError> {
    let regions = {
        let mut regions = Vec::new();
        for header in DataSetWalker::new(bytes)? {
            let header = header?;
            if !SCRUBBED_TAGS.contains(&header.tag) {
                continue;
            }
            let Some(length) = header.length else {
                continue;
            };
            regions.push(Region {
                tag: header.tag,
                vr: header.vr,
                start: header.value_offset,
                len: length as usize,
            });
        }
        regions
    };

    let mut report = ScrubReport::default();
    for region in regions {
        if region.len == 0 {
            continue;
        }
        let value = &mut bytes[region.start..region.start + region.len];
        overwrite(value, region.vr);
        report.scrubbed.push(region.tag);
    }

    Ok(report)
}

/// Replace a value, keeping its length.
fn overwrite(value: &mut [u8], vr: Vr) {
    match vr {
        Vr::PN => {
            value.fill(b' ');
            let n = NAME_REPLACEMENT.len().min(value.len());
            value[..n].copy_from_slice(&NAME_REPLACEMENT[..n]);
        }
        Vr::DA if value.len() == DATE_REPLACEMENT.len() => {
            value.copy_from_slice(DATE_REPLACEMENT);
        }
        _ => value.fill(b' '),
    }
}
