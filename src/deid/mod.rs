//! De-identification.
//!
//! Two independent redaction points: [`scrub_tags`] blanks identifying header
//! values in the raw buffer before parsing, and [`AnonymizationZones`] blacks
//! out edge bands of every rendered frame as the last pixel operation.

mod scrub;
mod zones;

pub use scrub::{scrub_tags, ScrubReport, DATE_REPLACEMENT, NAME_REPLACEMENT, SCRUBBED_TAGS};
pub use zones::AnonymizationZones;
