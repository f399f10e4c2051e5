//! DICOM Part-10 framing and data set walking.
//!
//! # Part-10 File Structure
//!
//! ```text
//! Bytes 0-127:   Preamble (ignored, usually zero)
//! Bytes 128-131: "DICM" magic
//! Bytes 132-...: File meta group (0002,xxxx), always Explicit VR Little Endian
//! ...            Data set, encoded per Transfer Syntax UID (0002,0010)
//! ```
//!
//! # Element Headers
//!
//! ```text
//! Implicit VR:           tag(4) length(4)
//! Explicit VR (short):   tag(4) VR(2) length(2)
//! Explicit VR (long):    tag(4) VR(2) reserved(2) length(4)     OB OW SQ UN UT ...
//! Item / delimiters:     tag(4) length(4)                        group FFFE
//! ```
//!
//! The walker never copies values. It yields [`ElementHeader`]s carrying byte
//! offsets into the original buffer, which is what both the tag table and the
//! in-place tag scrub need.

use crate::error::ParseError;
use crate::io::ByteOrder;

use super::tags::{implicit_vr, Tag, Vr};

// =============================================================================
// Constants
// =============================================================================

/// Size of the Part-10 preamble in bytes
pub const PREAMBLE_SIZE: usize = 128;

/// Magic bytes following the preamble
pub const DICM_MAGIC: &[u8; 4] = b"DICM";

/// Length value marking an undefined-length element or item
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Nesting limit for undefined-length sequences
const MAX_SEQUENCE_DEPTH: usize = 32;

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

// =============================================================================
// TransferSyntax
// =============================================================================

/// Encoding of the data set body.
///
/// Everything that is not one of the three native syntaxes is assumed to be
/// Explicit VR Little Endian with encapsulated (compressed) pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    Encapsulated(String),
}

impl TransferSyntax {
    /// Classify a Transfer Syntax UID.
    pub fn from_uid(uid: &str) -> Self {
        match uid.trim_end_matches(['\0', ' ']) {
            IMPLICIT_VR_LITTLE_ENDIAN => TransferSyntax::ImplicitVrLittleEndian,
            EXPLICIT_VR_LITTLE_ENDIAN => TransferSyntax::ExplicitVrLittleEndian,
            EXPLICIT_VR_BIG_ENDIAN => TransferSyntax::ExplicitVrBigEndian,
            other => TransferSyntax::Encapsulated(other.to_string()),
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            TransferSyntax::ImplicitVrLittleEndian => IMPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrLittleEndian => EXPLICIT_VR_LITTLE_ENDIAN,
            TransferSyntax::ExplicitVrBigEndian => EXPLICIT_VR_BIG_ENDIAN,
            TransferSyntax::Encapsulated(uid) => uid,
        }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        match self {
            TransferSyntax::ExplicitVrBigEndian => ByteOrder::BigEndian,
            _ => ByteOrder::LittleEndian,
        }
    }

    #[inline]
    pub fn is_explicit_vr(&self) -> bool {
        !matches!(self, TransferSyntax::ImplicitVrLittleEndian)
    }

    /// Whether pixel data is compressed and beyond the native decoder.
    #[inline]
    pub fn is_encapsulated(&self) -> bool {
        matches!(self, TransferSyntax::Encapsulated(_))
    }

    fn encoding(&self) -> Encoding {
        Encoding {
            explicit_vr: self.is_explicit_vr(),
            order: self.byte_order(),
        }
    }
}

/// Header layout used while reading one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Encoding {
    explicit_vr: bool,
    order: ByteOrder,
}

impl Encoding {
    const META: Encoding = Encoding {
        explicit_vr: true,
        order: ByteOrder::LittleEndian,
    };
}

// =============================================================================
// FileMeta
// =============================================================================

/// Result of the first structural pass over a Part-10 stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Offset of the first element (the start of the meta group)
    pub data_offset: usize,

    /// Offset of the first element after the meta group
    pub body_offset: usize,

    /// Encoding of the body
    pub transfer_syntax: TransferSyntax,
}

impl FileMeta {
    /// Locate the meta group and read the transfer syntax.
    ///
    /// Accepts a standard 128-byte preamble + `DICM`, a bare `DICM` marker
    /// with the preamble stripped, or a stream that starts directly with a
    /// group 0002 element. A missing Transfer Syntax UID defaults to Implicit
    /// VR Little Endian.
    ///
    /// # Errors
    /// - `MissingMagic` if neither framing is present
    /// - `Truncated` / `ValueOutOfBounds` if the meta group is cut short
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let data_offset = if has_preamble(bytes) {
            PREAMBLE_SIZE + DICM_MAGIC.len()
        } else if bytes.starts_with(DICM_MAGIC) {
            DICM_MAGIC.len()
        } else if bytes.len() >= 8 && ByteOrder::LittleEndian.read_u16(bytes) == 0x0002 {
            0
        } else {
            return Err(ParseError::MissingMagic);
        };

        let mut pos = data_offset;
        let mut transfer_syntax = None;

        while pos + 2 <= bytes.len() && ByteOrder::LittleEndian.read_u16(&bytes[pos..]) == 0x0002 {
            let header = read_element(bytes, pos, Encoding::META, 0)?;
            if header.tag == Tag::TRANSFER_SYNTAX_UID {
                let uid = String::from_utf8_lossy(header.value(bytes));
                transfer_syntax = Some(TransferSyntax::from_uid(&uid));
            }
            pos = header.end;
        }

        Ok(FileMeta {
            data_offset,
            body_offset: pos,
            transfer_syntax: transfer_syntax.unwrap_or(TransferSyntax::ImplicitVrLittleEndian),
        })
    }
}

/// Whether the bytes carry a Part-10 preamble followed by `DICM`.
pub fn has_preamble(bytes: &[u8]) -> bool {
    bytes.len() >= PREAMBLE_SIZE + DICM_MAGIC.len()
        && &bytes[PREAMBLE_SIZE..PREAMBLE_SIZE + DICM_MAGIC.len()] == DICM_MAGIC
}

// =============================================================================
// ElementHeader
// =============================================================================

/// Location and shape of one top-level data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub tag: Tag,

    /// VR from the header (explicit) or the dictionary (implicit)
    pub vr: Vr,

    /// Declared value length; `None` for undefined length
    pub length: Option<u32>,

    /// Offset of the first header byte
    pub header_offset: usize,

    /// Offset of the first value byte
    pub value_offset: usize,

    /// Offset just past this element (after any delimitation item)
    pub end: usize,
}

impl ElementHeader {
    /// Value bytes, clipped to what the buffer actually holds.
    ///
    /// Only pixel data may be clipped; every other element is bounds-checked
    /// when the header is read.
    pub fn value<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        let stop = match self.length {
            Some(len) => (self.value_offset + len as usize).min(bytes.len()),
            None => self.end.min(bytes.len()),
        };
        &bytes[self.value_offset..stop]
    }

    #[inline]
    pub fn is_undefined_length(&self) -> bool {
        self.length.is_none()
    }
}

// =============================================================================
// DataSetWalker
// =============================================================================

/// Iterator over the top-level elements of a Part-10 stream.
///
/// Meta group elements are decoded as Explicit VR Little Endian, body
/// elements per the transfer syntax. Sequence contents are skipped. The
/// walker stops after the first error.
pub struct DataSetWalker<'a> {
    bytes: &'a [u8],
    meta: FileMeta,
    pos: usize,
    done: bool,
}

impl<'a> DataSetWalker<'a> {
    /// Parse the file meta group and position the walker on the first element.
    pub fn new(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let meta = FileMeta::parse(bytes)?;
        Ok(Self::with_meta(bytes, meta))
    }

    pub fn with_meta(bytes: &'a [u8], meta: FileMeta) -> Self {
        let pos = meta.data_offset;
        Self {
            bytes,
            meta,
            pos,
            done: false,
        }
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn transfer_syntax(&self) -> &TransferSyntax {
        &self.meta.transfer_syntax
    }
}

impl Iterator for DataSetWalker<'_> {
    type Item = Result<ElementHeader, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.bytes.len() {
            return None;
        }

        let encoding = if self.pos < self.meta.body_offset {
            Encoding::META
        } else {
            self.meta.transfer_syntax.encoding()
        };

        match read_element(self.bytes, self.pos, encoding, 0) {
            Ok(header) => {
                self.pos = header.end;
                Some(Ok(header))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// Element Reading
// =============================================================================

fn ensure(bytes: &[u8], offset: usize, needed: usize) -> Result<(), ParseError> {
    let available = bytes.len().saturating_sub(offset);
    if available < needed {
        return Err(ParseError::Truncated {
            offset,
            needed,
            available,
        });
    }
    Ok(())
}

/// Read one element header at `pos` and compute where it ends.
fn read_element(
    bytes: &[u8],
    pos: usize,
    encoding: Encoding,
    depth: usize,
) -> Result<ElementHeader, ParseError> {
    ensure(bytes, pos, 8)?;

    let order = encoding.order;
    let tag = Tag::new(order.read_u16(&bytes[pos..]), order.read_u16(&bytes[pos + 2..]));

    // Items and delimiters never carry a VR
    if tag.is_delimiter() {
        let raw_len = order.read_u32(&bytes[pos + 4..]);
        let len = if raw_len == UNDEFINED_LENGTH { 0 } else { raw_len };
        let value_offset = pos + 8;
        return bounded(bytes, tag, Vr::UN, pos, value_offset, len);
    }

    let (vr, raw_len, value_offset) = if encoding.explicit_vr {
        let vr = Vr::from_bytes([bytes[pos + 4], bytes[pos + 5]])
            .ok_or(ParseError::InvalidVr { tag, offset: pos })?;
        if vr.has_long_length() {
            ensure(bytes, pos, 12)?;
            (vr, order.read_u32(&bytes[pos + 8..]), pos + 12)
        } else {
            (vr, order.read_u16(&bytes[pos + 6..]) as u32, pos + 8)
        }
    } else {
        (implicit_vr(tag), order.read_u32(&bytes[pos + 4..]), pos + 8)
    };

    if raw_len == UNDEFINED_LENGTH {
        let end = if tag == Tag::PIXEL_DATA && depth == 0 {
            // Encapsulated fragments; tolerate a missing delimiter at the tail
            skip_sequence(bytes, value_offset, encoding, tag, depth).unwrap_or(bytes.len())
        } else {
            skip_sequence(bytes, value_offset, encoding, tag, depth)?
        };
        return Ok(ElementHeader {
            tag,
            vr,
            length: None,
            header_offset: pos,
            value_offset,
            end,
        });
    }

    if tag == Tag::PIXEL_DATA && depth == 0 {
        // Truncated pixel data is the extractor's call, not a parse failure
        let end = (value_offset + raw_len as usize).min(bytes.len());
        return Ok(ElementHeader {
            tag,
            vr,
            length: Some(raw_len),
            header_offset: pos,
            value_offset,
            end,
        });
    }

    bounded(bytes, tag, vr, pos, value_offset, raw_len)
}

fn bounded(
    bytes: &[u8],
    tag: Tag,
    vr: Vr,
    header_offset: usize,
    value_offset: usize,
    len: u32,
) -> Result<ElementHeader, ParseError> {
    let length = len as usize;
    let available = bytes.len().saturating_sub(value_offset);
    if length > available {
        return Err(ParseError::ValueOutOfBounds {
            tag,
            offset: value_offset,
            length,
            available,
        });
    }
    Ok(ElementHeader {
        tag,
        vr,
        length: Some(len),
        header_offset,
        value_offset,
        end: value_offset + length,
    })
}

/// Skip the items of an undefined-length sequence.
///
/// Returns the offset just past the Sequence Delimitation Item.
fn skip_sequence(
    bytes: &[u8],
    mut pos: usize,
    encoding: Encoding,
    sequence: Tag,
    depth: usize,
) -> Result<usize, ParseError> {
    if depth >= MAX_SEQUENCE_DEPTH {
        return Err(ParseError::UnterminatedSequence { tag: sequence });
    }

    let unterminated = || ParseError::UnterminatedSequence { tag: sequence };
    let order = encoding.order;

    loop {
        if bytes.len().saturating_sub(pos) < 8 {
            return Err(unterminated());
        }
        let tag = Tag::new(order.read_u16(&bytes[pos..]), order.read_u16(&bytes[pos + 2..]));
        let len = order.read_u32(&bytes[pos + 4..]);

        match tag {
            Tag::SEQUENCE_DELIMITATION => return Ok(pos + 8),
            Tag::ITEM if len == UNDEFINED_LENGTH => {
                pos = skip_item(bytes, pos + 8, encoding, sequence, depth + 1)?;
            }
            Tag::ITEM => {
                let next = pos + 8 + len as usize;
                if next > bytes.len() {
                    return Err(unterminated());
                }
                pos = next;
            }
            _ => return Err(unterminated()),
        }
    }
}

/// Skip the elements of an undefined-length item.
///
/// Returns the offset just past the Item Delimitation Item.
fn skip_item(
    bytes: &[u8],
    mut pos: usize,
    encoding: Encoding,
    sequence: Tag,
    depth: usize,
) -> Result<usize, ParseError> {
    let order = encoding.order;

    loop {
        if bytes.len().saturating_sub(pos) < 8 {
            return Err(ParseError::UnterminatedSequence { tag: sequence });
        }
        let tag = Tag::new(order.read_u16(&bytes[pos..]), order.read_u16(&bytes[pos + 2..]));
        if tag == Tag::ITEM_DELIMITATION {
            return Ok(pos + 8);
        }
        let header = read_element(bytes, pos, encoding, depth)?;
        pos = header.end;
    }
}

// =============================================================================
// Tests
// =============================================================================
