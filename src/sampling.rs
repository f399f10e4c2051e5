//! Bounded stride sampling over frames and folder series.
//!
//! Rendering cost grows with the number of frames, so multi-frame objects and
//! folders are reduced to at most `max_frames` evenly spread indices. The
//! selection always starts at index 0, is strictly increasing, and depends only
//! on its inputs.

use std::cmp::Ordering;

use bytes::Bytes;

use crate::dicom::{classify, InputKind};

/// Default cap on rendered frames per object or series.
pub const DEFAULT_MAX_FRAMES: usize = 12;

// =============================================================================
// Frame selection
// =============================================================================

/// Ordered, strictly increasing indices into a frame or file axis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameSelection {
    indices: Vec<usize>,
}

impl FrameSelection {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn into_indices(self) -> Vec<usize> {
        self.indices
    }
}

/// Select `min(total, max_frames)` evenly strided indices from `0..total`.
///
/// With `step = total / max_frames`, index `i` maps to `floor(i * step)`,
/// computed in integers. `max_frames` is clamped to at least 1.
pub fn select_frames(total: usize, max_frames: usize) -> FrameSelection {
    let max_frames = max_frames.max(1);
    if total <= max_frames {
        return FrameSelection {
            indices: (0..total).collect(),
        };
    }

    let indices = (0..max_frames).map(|i| i * total / max_frames).collect();
    FrameSelection { indices }
}

// =============================================================================
// Series selection
// =============================================================================

/// One file from an uploaded folder.
#[derive(Debug, Clone)]
pub struct SeriesEntry {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl SeriesEntry {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            data: data.into(),
        }
    }

    pub fn kind(&self) -> InputKind {
        classify(&self.name, self.mime_type.as_deref(), &self.data)
    }
}

/// Files chosen from a folder, as indices into the original entry list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesSelection {
    /// Sampled DICOM files, in natural name order
    Dicom { indices: Vec<usize> },

    /// No DICOM present; every image/video entry, in natural name order
    Generic { indices: Vec<usize> },
}

impl SeriesSelection {
    pub fn indices(&self) -> &[usize] {
        match self {
            SeriesSelection::Dicom { indices } | SeriesSelection::Generic { indices } => indices,
        }
    }

    pub fn is_dicom(&self) -> bool {
        matches!(self, SeriesSelection::Dicom { .. })
    }
}

/// Pick which files of a folder to render.
///
/// Non-DICOM files are ignored. If no DICOM remains, the selection degrades
/// to the image/video files for the generic media path.
pub fn select_series(entries: &[SeriesEntry], max_frames: usize) -> SeriesSelection {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| natural_cmp(&entries[a].name, &entries[b].name).then(a.cmp(&b)));

    let kinds: Vec<InputKind> = entries.iter().map(SeriesEntry::kind).collect();

    let dicom: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| kinds[i] == InputKind::Dicom)
        .collect();

    if dicom.is_empty() {
        let indices = order
            .into_iter()
            .filter(|&i| kinds[i].is_generic_media())
            .collect();
        return SeriesSelection::Generic { indices };
    }

    let indices = select_frames(dicom.len(), max_frames)
        .iter()
        .map(|i| dicom[i])
        .collect();
    SeriesSelection::Dicom { indices }
}

// =============================================================================
// Natural ordering
// =============================================================================

/// Compare names so embedded numbers order numerically (`IM2` < `IM10`).
///
/// Letters compare case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ordering = compare_digit_runs(&ln, &rn);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
