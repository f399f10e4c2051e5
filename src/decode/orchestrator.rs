//! Decode orchestration.
//!
//! `DicomDecoder` is the main entry point. It runs the tiers of
//! [`Tier::CHAIN`] in order:
//!
//! ```text
//!  bytes ──► scrub (anonymize only) ──► TagTable::parse
//!                                            │
//!   ┌────────────────────────────────────────┘
//!   ▼
//!  Native ──fallthrough──► External ──fallthrough──► Passthrough
//!    │                       │                          │
//!    ▼                       ▼                          ▼
//!  Success                 Success                   Degraded
//! ```
//!
//! Errors inside a tier never reach the caller; they become fallthrough
//! reasons. The caller sees `Degraded` or `Failure` instead.

use bytes::Bytes;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::deid::{scrub_tags, AnonymizationZones};
use crate::dicom::{TagTable, DICOM_MIME_TYPE};
use crate::error::{ConfigError, DecodeError, ParseError, PixelError, RenderError, SubprocessError};
use crate::pixel::{extract, is_valid_quality, to_grayscale, FrameEncoder, OutputFormat};
use crate::sampling::{select_frames, select_series, SeriesEntry, SeriesSelection, DEFAULT_MAX_FRAMES};

use super::external::{AbortSignal, ExternalDecoder, ScratchFiles};
use super::result::{DecodeResult, DecodeSource, RenderedFrame};
use super::strategy::{FallthroughLog, Tier, TierOutcome};

// =============================================================================
// Settings and requests
// =============================================================================

/// Decoder configuration shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderSettings {
    /// Cap on rendered frames per object or series
    pub max_frames: usize,

    pub output_format: OutputFormat,

    pub zones: AnonymizationZones,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            output_format: OutputFormat::default(),
            zones: AnonymizationZones::default(),
        }
    }
}

impl DecoderSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames == 0 {
            return Err(ConfigError::InvalidMaxFrames);
        }
        if let OutputFormat::Jpeg { quality } = self.output_format {
            if !is_valid_quality(quality) {
                return Err(ConfigError::InvalidQuality(quality));
            }
        }
        Ok(())
    }
}

/// One object to decode.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub bytes: Bytes,
    pub anonymize: bool,
    pub abort: Option<AbortSignal>,

    /// Overrides `DecoderSettings::max_frames` for this object
    pub max_frames: Option<usize>,
}

impl DecodeRequest {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            anonymize: false,
            abort: None,
            max_frames: None,
        }
    }

    pub fn with_anonymize(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Render at most `max_frames` frames of this object. Zero is treated as one.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames.max(1));
        self
    }

    fn is_aborted(&self) -> bool {
        self.abort.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}

/// Outcome of decoding a folder.
#[derive(Debug, Clone)]
pub enum SeriesOutcome {
    /// Results for the sampled DICOM files, parallel to `selected`
    Dicom {
        selected: Vec<usize>,
        results: Vec<DecodeResult>,
    },

    /// No DICOM; these entries go to the generic media path
    Generic { selected: Vec<usize> },
}

impl SeriesOutcome {
    pub fn selected(&self) -> &[usize] {
        match self {
            SeriesOutcome::Dicom { selected, .. } | SeriesOutcome::Generic { selected } => selected,
        }
    }
}

/// Input after scrubbing and the structural parse.
struct Prepared {
    bytes: Bytes,
    table: Result<TagTable, ParseError>,
    anonymize: bool,

    /// Identifying tags are known to be blank (or anonymization is off)
    scrubbed: bool,

    abort: Option<AbortSignal>,
    max_frames: usize,
}

// =============================================================================
// DicomDecoder
// =============================================================================

/// Runs the native → external → passthrough chain.
///
/// Stateless across requests apart from the external decoder's one-time
/// initialization, so a single instance can be shared behind an `Arc`.
pub struct DicomDecoder<E> {
    settings: DecoderSettings,
    encoder: FrameEncoder,
    external: E,
}

impl<E: ExternalDecoder> DicomDecoder<E> {
    /// # Errors
    /// Invalid settings (`ConfigError`).
    pub fn new(settings: DecoderSettings, external: E) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            encoder: FrameEncoder::new(settings.output_format),
            settings,
            external,
        })
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    pub fn external(&self) -> &E {
        &self.external
    }

    /// Decode one object. Never fails; problems surface as `Degraded` or
    /// `Failure`.
    pub async fn decode(&self, request: DecodeRequest) -> DecodeResult {
        if request.bytes.is_empty() {
            return DecodeResult::failure("empty input");
        }
        if request.is_aborted() {
            return DecodeResult::failure("aborted by caller");
        }

        let prepared = self.prepare(request);
        let mut log = FallthroughLog::default();

        for tier in Tier::CHAIN {
            debug!(tier = %tier, "Attempting decode tier");

            let outcome = match tier {
                Tier::Native => self.native(&prepared),
                Tier::External => self.external_tier(&prepared).await,
                Tier::Passthrough => self.passthrough(&prepared, &log),
            };

            match outcome {
                TierOutcome::Done(result) => {
                    info!(
                        tier = %tier,
                        status = result.status(),
                        frames = result.frames().len(),
                        "Decode finished"
                    );
                    return result;
                }
                TierOutcome::Fallthrough(reason) => {
                    warn!(tier = %tier, reason = %reason, "Decode tier fell through");
                    log.push(tier, reason);
                }
            }
        }

        DecodeResult::failure(log.summary())
    }

    /// Decode the sampled DICOM files of a folder, one at a time.
    ///
    /// The cap applies to the file axis only; each selected file contributes
    /// its first frame.
    pub async fn decode_series(&self, entries: &[SeriesEntry], anonymize: bool) -> SeriesOutcome {
        match select_series(entries, self.settings.max_frames) {
            SeriesSelection::Generic { indices } => {
                debug!(files = entries.len(), "Series holds no DICOM");
                SeriesOutcome::Generic { selected: indices }
            }
            SeriesSelection::Dicom { indices } => {
                debug!(
                    files = entries.len(),
                    selected = indices.len(),
                    "Decoding series"
                );
                let mut results = Vec::with_capacity(indices.len());
                for &index in &indices {
                    let request = DecodeRequest::new(entries[index].data.clone())
                        .with_anonymize(anonymize)
                        .with_max_frames(1);
                    results.push(self.decode(request).await);
                }
                SeriesOutcome::Dicom {
                    selected: indices,
                    results,
                }
            }
        }
    }

    /// Decode two independent series concurrently.
    pub async fn decode_pair(
        &self,
        first: &[SeriesEntry],
        second: &[SeriesEntry],
        anonymize: bool,
    ) -> (SeriesOutcome, SeriesOutcome) {
        tokio::join!(
            self.decode_series(first, anonymize),
            self.decode_series(second, anonymize)
        )
    }

    // -------------------------------------------------------------------------
    // Preparation
    // -------------------------------------------------------------------------

    fn prepare(&self, request: DecodeRequest) -> Prepared {
        let DecodeRequest {
            bytes,
            anonymize,
            abort,
            max_frames,
        } = request;

        let (bytes, scrubbed) = if anonymize {
            let mut buffer = bytes.to_vec();
            match scrub_tags(&mut buffer) {
                Ok(report) => {
                    debug!(scrubbed = report.len(), "Scrubbed identifying tags");
                    (Bytes::from(buffer), true)
                }
                Err(e) => {
                    warn!(error = %e, "Tag scrub failed; input left unscrubbed");
                    (bytes, false)
                }
            }
        } else {
            (bytes, true)
        };

        let table = TagTable::parse(&bytes);
        if let Err(e) = &table {
            debug!(error = %e, "Tag parse failed");
        }

        Prepared {
            bytes,
            table,
            anonymize,
            scrubbed,
            abort,
            max_frames: max_frames.unwrap_or(self.settings.max_frames),
        }
    }

    // -------------------------------------------------------------------------
    // Tiers
    // -------------------------------------------------------------------------

    fn native(&self, prepared: &Prepared) -> TierOutcome {
        let table = match &prepared.table {
            Ok(table) => table,
            Err(e) => return TierOutcome::Fallthrough(e.to_string()),
        };

        match self.render_native(table, prepared) {
            Ok(frames) => TierOutcome::Done(DecodeResult::Success {
                frames,
                metadata: table.clone(),
                source: DecodeSource::Native,
            }),
            Err(e) => TierOutcome::Fallthrough(e.to_string()),
        }
    }

    fn render_native(
        &self,
        table: &TagTable,
        prepared: &Prepared,
    ) -> Result<Vec<RenderedFrame>, DecodeError> {
        let (descriptor, samples) = extract(table, &prepared.bytes)?;
        let selection = select_frames(descriptor.frame_count as usize, prepared.max_frames);

        let mut frames = Vec::with_capacity(selection.len());
        for index in selection.iter() {
            let frame = samples
                .frame(&descriptor, index as u32)
                .ok_or(PixelError::BufferTooShort {
                    required: (index + 1)
                        * descriptor.samples_per_frame()
                        * descriptor.bytes_per_sample(),
                    available: samples.len() * descriptor.bytes_per_sample(),
                })?;

            let canvas = to_grayscale(&descriptor, &frame).to_rgb_image();
            frames.push(self.finish_frame(canvas, index, prepared.anonymize)?);
        }

        Ok(frames)
    }

    async fn external_tier(&self, prepared: &Prepared) -> TierOutcome {
        match self.run_external(prepared).await {
            Ok(result) => TierOutcome::Done(result),
            Err(DecodeError::Subprocess(SubprocessError::Aborted)) => {
                TierOutcome::Done(DecodeResult::failure("aborted by caller"))
            }
            Err(e) => TierOutcome::Fallthrough(e.to_string()),
        }
    }

    async fn run_external(&self, prepared: &Prepared) -> Result<DecodeResult, DecodeError> {
        let scratch = ScratchFiles::create().map_err(SubprocessError::from)?;
        let result = self.invoke_external(&scratch, prepared).await;
        scratch.close();
        result
    }

    async fn invoke_external(
        &self,
        scratch: &ScratchFiles,
        prepared: &Prepared,
    ) -> Result<DecodeResult, DecodeError> {
        scratch
            .write_input(&prepared.bytes)
            .await
            .map_err(SubprocessError::from)?;

        let output = self
            .external
            .invoke(
                scratch.input_path(),
                scratch.output_path(),
                prepared.abort.clone(),
            )
            .await?;
        if !output.success {
            return Err(SubprocessError::ReportedFailure.into());
        }

        let image = match output.image_bytes()? {
            Some(image) => image,
            None => scratch.read_output().await.map_err(SubprocessError::from)?,
        };
        let canvas = self.encoder.decode(&image)?;
        let frame = self.finish_frame(canvas, 0, prepared.anonymize)?;

        let metadata = match &prepared.table {
            Ok(table) => table.clone(),
            Err(_) => output.metadata_table(),
        };

        Ok(DecodeResult::Success {
            frames: vec![frame],
            metadata,
            source: DecodeSource::External,
        })
    }

    fn passthrough(&self, prepared: &Prepared, log: &FallthroughLog) -> TierOutcome {
        if prepared.anonymize && !prepared.scrubbed {
            return TierOutcome::Done(DecodeResult::failure(format!(
                "{}; identifying tags could not be scrubbed, raw bytes withheld",
                log.summary()
            )));
        }

        TierOutcome::Done(DecodeResult::Degraded {
            reason: log.summary(),
            bytes: prepared.bytes.clone(),
            mime_type: DICOM_MIME_TYPE,
            metadata: prepared.table.as_ref().ok().cloned(),
        })
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Mask (when anonymizing) and encode. Masking is always the last pixel
    /// operation.
    fn finish_frame(
        &self,
        mut canvas: RgbImage,
        frame_index: usize,
        anonymize: bool,
    ) -> Result<RenderedFrame, RenderError> {
        if anonymize {
            self.settings.zones.apply(&mut canvas);
        }

        let (width, height) = canvas.dimensions();
        let data = self.encoder.encode(&canvas)?;
        Ok(RenderedFrame {
            width,
            height,
            data,
            mime_type: self.settings.output_format.mime_type(),
            frame_index,
        })
    }
}
