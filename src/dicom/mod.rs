//! DICOM Part-10 reading.
//!
//! This module walks a DICOM byte stream into a tag table without touching
//! pixel samples. It is used both by the decoder and to produce the metadata
//! text that accompanies rendered images.
//!
//! # Key Concepts
//!
//! - **Transfer syntax**: the meta group (always Explicit VR Little Endian)
//!   declares how the rest of the data set is encoded. Implicit VR LE,
//!   Explicit VR LE and Explicit VR BE are read natively; anything else is
//!   treated as encapsulated pixel data.
//!
//! - **Offsets, not copies**: the walker yields element headers with byte
//!   offsets. The tag scrub rewrites values in place at those offsets, and the
//!   pixel extractor builds its typed view at the pixel data offset.
//!
//! - **Unknown sentinel**: absent tags read as `"Unknown"`. Only structural
//!   corruption fails a parse.

pub mod detect;
pub mod metadata;
mod parser;
mod tags;
mod values;

pub use detect::{classify, is_dicom_bytes, InputKind, DICOM_MIME_TYPE};
pub use metadata::{metadata_text, DicomSummary};
pub use parser::{
    has_preamble, DataSetWalker, ElementHeader, FileMeta, TransferSyntax, DICM_MAGIC,
    EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN,
    PREAMBLE_SIZE, UNDEFINED_LENGTH,
};
pub use tags::{implicit_vr, Tag, Vr};
pub use values::{keyword_tag, PixelDataLocation, TagTable, TagValue, UNKNOWN};
