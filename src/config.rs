//! Configuration management for the DICOM renderer.
//!
//! Command-line arguments are parsed with clap; every server option can also
//! be set through an environment variable with the `DICOM_` prefix.
//!
//! # Subcommands
//!
//! - `serve` - run the HTTP server
//! - `decode <path>` - decode a file or a folder and print the JSON result
//! - `check` - verify the external decoder is usable
//!
//! # Environment Variables
//!
//! - `DICOM_HOST` - Server bind address (default: 0.0.0.0)
//! - `DICOM_PORT` - Server port (default: 3000)
//! - `DICOM_INTERPRETER` - Interpreter for the external decoder (default: python3)
//! - `DICOM_DECODER_SCRIPT` - External decoder script (optional)
//! - `DICOM_MAX_FRAMES` - Frames rendered per object or series (default: 12)
//! - `DICOM_OUTPUT_FORMAT` - `png` or `jpeg` (default: png)
//! - `DICOM_JPEG_QUALITY` - JPEG quality (default: 85)
//! - `DICOM_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::decode::{DecoderSettings, ProcessDecoder};
use crate::deid::AnonymizationZones;
use crate::pixel::{is_valid_quality, OutputFormat, DEFAULT_JPEG_QUALITY};
use crate::sampling::DEFAULT_MAX_FRAMES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default interpreter for the external decoder.
pub const DEFAULT_INTERPRETER: &str = "python3";

// =============================================================================
// CLI Arguments
// =============================================================================

/// DICOM renderer - windowed, de-identified previews of DICOM images.
#[derive(Parser, Debug, Clone)]
#[command(name = "dicom-render")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Decode a file or folder and print the JSON result.
    Decode(DecodeConfig),

    /// Check that the external decoder can run.
    Check(CheckConfig),
}

/// Output encoding selectable on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    #[default]
    Png,
    Jpeg,
}

// =============================================================================
// Shared decoder options
// =============================================================================

/// Options shared by every command that decodes.
#[derive(Args, Debug, Clone)]
pub struct DecoderArgs {
    /// Interpreter used to run the external decoder script.
    #[arg(long, default_value = DEFAULT_INTERPRETER, env = "DICOM_INTERPRETER")]
    pub interpreter: String,

    /// External decoder script. Without it the external tier is skipped.
    #[arg(long, env = "DICOM_DECODER_SCRIPT")]
    pub script: Option<PathBuf>,

    /// Maximum frames rendered per multi-frame object or folder.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAMES, env = "DICOM_MAX_FRAMES")]
    pub max_frames: usize,

    /// Output image format.
    #[arg(long, value_enum, default_value_t = FormatArg::Png, env = "DICOM_OUTPUT_FORMAT")]
    pub format: FormatArg,

    /// JPEG quality (1-100), used when the format is jpeg.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "DICOM_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl DecoderArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_frames == 0 {
            return Err("max_frames must be greater than 0".to_string());
        }
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        if let Some(script) = &self.script {
            if !script.is_file() {
                return Err(format!(
                    "Decoder script not found: {}",
                    script.display()
                ));
            }
        }
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.format {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::jpeg(self.jpeg_quality),
        }
    }

    pub fn settings(&self) -> DecoderSettings {
        DecoderSettings {
            max_frames: self.max_frames,
            output_format: self.output_format(),
            zones: AnonymizationZones::default(),
        }
    }

    pub fn process_decoder(&self) -> ProcessDecoder {
        ProcessDecoder::new(self.interpreter.clone(), self.script.clone())
    }
}

// =============================================================================
// Serve
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "DICOM_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "DICOM_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub decoder: DecoderArgs,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "DICOM_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        self.decoder.validate()
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Decode
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct DecodeConfig {
    /// DICOM file, or a folder decoded as a series.
    pub path: PathBuf,

    /// Scrub identifying tags and mask burned-in text.
    #[arg(long, default_value_t = false)]
    pub anonymize: bool,

    /// Also write rendered frames to this directory.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    #[command(flatten)]
    pub decoder: DecoderArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl DecodeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Input not found: {}", self.path.display()));
        }
        if let Some(dir) = &self.out_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!("Output path is not a directory: {}", dir.display()));
            }
        }
        self.decoder.validate()
    }
}

// =============================================================================
// Check
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Interpreter used to run the external decoder script.
    #[arg(long, default_value = DEFAULT_INTERPRETER, env = "DICOM_INTERPRETER")]
    pub interpreter: String,

    /// External decoder script.
    #[arg(long, env = "DICOM_DECODER_SCRIPT")]
    pub script: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
