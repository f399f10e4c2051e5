//! DICOM tag and value representation definitions.
//!
//! This module defines the vocabulary for walking a data set:
//! - Tags (group, element) for the attributes this crate reads or scrubs
//! - Value representations (VR), which determine header layout and decoding
//!
//! Only the attributes needed for rendering, prompt metadata and
//! de-identification are named. Everything else is walked over and kept in
//! the tag table by number only.

use std::fmt;

// =============================================================================
// Tag
// =============================================================================

/// A DICOM attribute tag, `(group,element)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub group: u16,
    pub element: u16,
}

impl Tag {
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }

    // -------------------------------------------------------------------------
    // File Meta Information
    // -------------------------------------------------------------------------
    pub const TRANSFER_SYNTAX_UID: Tag = Tag::new(0x0002, 0x0010);

    // -------------------------------------------------------------------------
    // Study / Series / Equipment
    // -------------------------------------------------------------------------
    pub const SOP_CLASS_UID: Tag = Tag::new(0x0008, 0x0016);
    pub const STUDY_DATE: Tag = Tag::new(0x0008, 0x0020);
    pub const SERIES_DATE: Tag = Tag::new(0x0008, 0x0021);
    pub const ACQUISITION_DATE: Tag = Tag::new(0x0008, 0x0022);
    pub const CONTENT_DATE: Tag = Tag::new(0x0008, 0x0023);
    pub const ACCESSION_NUMBER: Tag = Tag::new(0x0008, 0x0050);
    pub const MODALITY: Tag = Tag::new(0x0008, 0x0060);
    pub const MANUFACTURER: Tag = Tag::new(0x0008, 0x0070);
    pub const INSTITUTION_NAME: Tag = Tag::new(0x0008, 0x0080);
    pub const INSTITUTION_ADDRESS: Tag = Tag::new(0x0008, 0x0081);
    pub const REFERRING_PHYSICIAN_NAME: Tag = Tag::new(0x0008, 0x0090);
    pub const STUDY_DESCRIPTION: Tag = Tag::new(0x0008, 0x1030);
    pub const SERIES_DESCRIPTION: Tag = Tag::new(0x0008, 0x103E);
    pub const PERFORMING_PHYSICIAN_NAME: Tag = Tag::new(0x0008, 0x1050);
    pub const OPERATORS_NAME: Tag = Tag::new(0x0008, 0x1070);

    // -------------------------------------------------------------------------
    // Patient
    // -------------------------------------------------------------------------
    pub const PATIENT_NAME: Tag = Tag::new(0x0010, 0x0010);
    pub const PATIENT_ID: Tag = Tag::new(0x0010, 0x0020);
    pub const PATIENT_BIRTH_DATE: Tag = Tag::new(0x0010, 0x0030);
    pub const PATIENT_SEX: Tag = Tag::new(0x0010, 0x0040);
    pub const OTHER_PATIENT_IDS: Tag = Tag::new(0x0010, 0x1000);
    pub const OTHER_PATIENT_NAMES: Tag = Tag::new(0x0010, 0x1001);
    pub const PATIENT_AGE: Tag = Tag::new(0x0010, 0x1010);
    pub const PATIENT_ADDRESS: Tag = Tag::new(0x0010, 0x1040);
    pub const PATIENT_TELEPHONE_NUMBERS: Tag = Tag::new(0x0010, 0x2154);

    // -------------------------------------------------------------------------
    // Acquisition
    // -------------------------------------------------------------------------
    pub const BODY_PART_EXAMINED: Tag = Tag::new(0x0018, 0x0015);

    // -------------------------------------------------------------------------
    // Image Pixel Module
    // -------------------------------------------------------------------------
    pub const SAMPLES_PER_PIXEL: Tag = Tag::new(0x0028, 0x0002);
    pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag::new(0x0028, 0x0004);
    pub const PLANAR_CONFIGURATION: Tag = Tag::new(0x0028, 0x0006);
    pub const NUMBER_OF_FRAMES: Tag = Tag::new(0x0028, 0x0008);
    pub const ROWS: Tag = Tag::new(0x0028, 0x0010);
    pub const COLUMNS: Tag = Tag::new(0x0028, 0x0011);
    pub const BITS_ALLOCATED: Tag = Tag::new(0x0028, 0x0100);
    pub const BITS_STORED: Tag = Tag::new(0x0028, 0x0101);
    pub const PIXEL_REPRESENTATION: Tag = Tag::new(0x0028, 0x0103);
    pub const WINDOW_CENTER: Tag = Tag::new(0x0028, 0x1050);
    pub const WINDOW_WIDTH: Tag = Tag::new(0x0028, 0x1051);
    pub const RESCALE_INTERCEPT: Tag = Tag::new(0x0028, 0x1052);
    pub const RESCALE_SLOPE: Tag = Tag::new(0x0028, 0x1053);

    pub const PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0010);

    // -------------------------------------------------------------------------
    // Item delimiters (group FFFE, no VR in any transfer syntax)
    // -------------------------------------------------------------------------
    pub const ITEM: Tag = Tag::new(0xFFFE, 0xE000);
    pub const ITEM_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE00D);
    pub const SEQUENCE_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE0DD);

    /// Whether this is one of the FFFE item/delimiter tags.
    #[inline]
    pub const fn is_delimiter(&self) -> bool {
        self.group == 0xFFFE
    }

    /// Whether this tag belongs to the file meta group.
    #[inline]
    pub const fn is_meta(&self) -> bool {
        self.group == 0x0002
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

// =============================================================================
// Value Representation
// =============================================================================

/// Value representation of an element.
///
/// Determines both the explicit-VR header layout (2- or 4-byte length) and
/// how the value bytes are decoded into the tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vr {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FD,
    FL,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
}

impl Vr {
    /// Parse the two ASCII characters of an explicit VR.
    ///
    /// Returns `None` for unknown codes.
    pub fn from_bytes(code: [u8; 2]) -> Option<Self> {
        let vr = match &code {
            b"AE" => Vr::AE,
            b"AS" => Vr::AS,
            b"AT" => Vr::AT,
            b"CS" => Vr::CS,
            b"DA" => Vr::DA,
            b"DS" => Vr::DS,
            b"DT" => Vr::DT,
            b"FD" => Vr::FD,
            b"FL" => Vr::FL,
            b"IS" => Vr::IS,
            b"LO" => Vr::LO,
            b"LT" => Vr::LT,
            b"OB" => Vr::OB,
            b"OD" => Vr::OD,
            b"OF" => Vr::OF,
            b"OL" => Vr::OL,
            b"OW" => Vr::OW,
            b"PN" => Vr::PN,
            b"SH" => Vr::SH,
            b"SL" => Vr::SL,
            b"SQ" => Vr::SQ,
            b"SS" => Vr::SS,
            b"ST" => Vr::ST,
            b"TM" => Vr::TM,
            b"UC" => Vr::UC,
            b"UI" => Vr::UI,
            b"UL" => Vr::UL,
            b"UN" => Vr::UN,
            b"UR" => Vr::UR,
            b"US" => Vr::US,
            b"UT" => Vr::UT,
            _ => return None,
        };
        Some(vr)
    }

    /// Whether the explicit-VR header uses 2 reserved bytes and a 4-byte length.
    #[inline]
    pub const fn has_long_length(self) -> bool {
        matches!(
            self,
            Vr::OB | Vr::OD | Vr::OF | Vr::OL | Vr::OW | Vr::SQ | Vr::UC | Vr::UN | Vr::UR | Vr::UT
        )
    }

    /// Whether values of this VR are character strings.
    #[inline]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Vr::AE
                | Vr::AS
                | Vr::CS
                | Vr::DA
                | Vr::DS
                | Vr::DT
                | Vr::IS
                | Vr::LO
                | Vr::LT
                | Vr::PN
                | Vr::SH
                | Vr::ST
                | Vr::TM
                | Vr::UC
                | Vr::UI
                | Vr::UR
                | Vr::UT
        )
    }
}

/// VR lookup for Implicit VR Little Endian data sets.
///
/// Implicit VR streams carry no VR in the element header, so the decoder needs
/// a dictionary. Only the attributes this crate decodes are listed; unknown
/// tags come back as `UN` and are kept out of the tag table.
pub fn implicit_vr(tag: Tag) -> Vr {
    if tag.element == 0x0000 {
        // Group length
        return Vr::UL;
    }

    match tag {
        Tag::TRANSFER_SYNTAX_UID | Tag::SOP_CLASS_UID => Vr::UI,
        Tag::STUDY_DATE
        | Tag::SERIES_DATE
        | Tag::ACQUISITION_DATE
        | Tag::CONTENT_DATE
        | Tag::PATIENT_BIRTH_DATE => Vr::DA,
        Tag::ACCESSION_NUMBER => Vr::SH,
        Tag::MODALITY
        | Tag::PATIENT_SEX
        | Tag::BODY_PART_EXAMINED
        | Tag::PHOTOMETRIC_INTERPRETATION => Vr::CS,
        Tag::MANUFACTURER
        | Tag::INSTITUTION_NAME
        | Tag::STUDY_DESCRIPTION
        | Tag::SERIES_DESCRIPTION
        | Tag::PATIENT_ID
        | Tag::OTHER_PATIENT_IDS => Vr::LO,
        Tag::INSTITUTION_ADDRESS | Tag::PATIENT_ADDRESS => Vr::ST,
        Tag::REFERRING_PHYSICIAN_NAME
        | Tag::PERFORMING_PHYSICIAN_NAME
        | Tag::OPERATORS_NAME
        | Tag::PATIENT_NAME
        | Tag::OTHER_PATIENT_NAMES => Vr::PN,
        Tag::PATIENT_AGE => Vr::AS,
        Tag::PATIENT_TELEPHONE_NUMBERS => Vr::SH,
        Tag::SAMPLES_PER_PIXEL
        | Tag::PLANAR_CONFIGURATION
        | Tag::ROWS
        | Tag::COLUMNS
        | Tag::BITS_ALLOCATED
        | Tag::BITS_STORED
        | Tag::PIXEL_REPRESENTATION => Vr::US,
        Tag::NUMBER_OF_FRAMES => Vr::IS,
        Tag::WINDOW_CENTER | Tag::WINDOW_WIDTH | Tag::RESCALE_INTERCEPT | Tag::RESCALE_SLOPE => {
            Vr::DS
        }
        Tag::PIXEL_DATA => Vr::OW,
        _ => Vr::UN,
    }
}
