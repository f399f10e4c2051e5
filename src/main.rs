//! DICOM Render - windowed, de-identified previews of DICOM images.
//!
//! This binary starts the HTTP server, decodes files from the command line,
//! or checks the external decoder.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dicom_render::{
    config::{CheckConfig, Cli, Command, DecodeConfig, ServeConfig},
    decode::{DecodeRequest, DecodeResult, DicomDecoder, ProcessDecoder, SeriesOutcome},
    sampling::SeriesEntry,
    server::{create_router, RouterConfig, SeriesResponse},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Decode(config) => run_decode(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("DICOM Render v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Max frames: {}", config.decoder.max_frames);
    info!("  Output: {}", config.decoder.output_format().mime_type());
    match &config.decoder.script {
        Some(script) => info!(
            "  External decoder: {} {}",
            config.decoder.interpreter,
            script.display()
        ),
        None => {
            warn!("  External decoder: DISABLED - compressed objects will be passed through");
            warn!("        Enable with --script=<decoder script>");
        }
    }

    let decoder = match DicomDecoder::new(
        config.decoder.settings(),
        config.decoder.process_decoder(),
    ) {
        Ok(decoder) => decoder,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = decoder.external().ensure_initialized().await {
        warn!("  External decoder unavailable: {}", e);
    }

    let router = create_router(decoder, build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl --data-binary @scan.dcm 'http://{}/decode?anonymize=true'",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "dicom_render=debug,tower_http=debug"
    } else {
        "dicom_render=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new();

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Decode Command
// =============================================================================

async fn run_decode(config: DecodeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let decoder = match DicomDecoder::new(
        config.decoder.settings(),
        config.decoder.process_decoder(),
    ) {
        Ok(decoder) => decoder,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (json, results) = if config.path.is_dir() {
        let entries = match read_series(&config.path).await {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let outcome = decoder.decode_series(&entries, config.anonymize).await;
        let results = match &outcome {
            SeriesOutcome::Dicom { selected, results } => selected
                .iter()
                .map(|&index| file_stem(Path::new(&entries[index].name)))
                .zip(results.iter().cloned())
                .collect(),
            SeriesOutcome::Generic { .. } => Vec::new(),
        };
        (
            serde_json::to_string_pretty(&SeriesResponse::from_outcome(outcome)),
            results,
        )
    } else {
        let bytes = match tokio::fs::read(&config.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error: failed to read {}: {}", config.path.display(), e);
                return ExitCode::FAILURE;
            }
        };

        let request = DecodeRequest::new(bytes).with_anonymize(config.anonymize);
        let result = decoder.decode(request).await;
        let json = serde_json::to_string_pretty(&result.to_output());
        (json, vec![(file_stem(&config.path), result)])
    };

    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if let Some(ref out_dir) = config.out_dir {
        let extension = decoder.settings().output_format.extension();
        if let Err(e) = write_frames(out_dir, extension, &results).await {
            eprintln!("Error: failed to write frames: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let all_failed = results
        .iter()
        .all(|(_, result)| matches!(result, DecodeResult::Failure { .. }));
    if !results.is_empty() && all_failed {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Read every regular file of a folder, in directory order.
async fn read_series(dir: &Path) -> std::io::Result<Vec<SeriesEntry>> {
    let mut entries = Vec::new();
    let mut listing = tokio::fs::read_dir(dir).await?;

    while let Some(item) = listing.next_entry().await? {
        if !item.file_type().await?.is_file() {
            continue;
        }
        let name = item.file_name().to_string_lossy().into_owned();
        let data = tokio::fs::read(item.path()).await?;
        debug!(file = %name, bytes = data.len(), "Read series file");
        entries.push(SeriesEntry::new(name, None, data));
    }

    Ok(entries)
}

/// Write each rendered frame as `<stem>-<frame>.<ext>`.
async fn write_frames(
    out_dir: &Path,
    extension: &str,
    results: &[(String, DecodeResult)],
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(out_dir).await?;

    for (stem, result) in results {
        for frame in result.frames() {
            let path = out_dir.join(format!("{}-{}.{}", stem, frame.frame_index, extension));
            tokio::fs::write(&path, &frame.data).await?;
            info!(path = %path.display(), "Wrote frame");
        }
    }

    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string())
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("DICOM Render Configuration Check");
    println!("═════════════════════════════════");
    println!();
    println!("✓ Interpreter: {}", config.interpreter);

    let Some(script) = config.script.clone() else {
        println!("✗ Script: not configured");
        println!();
        println!("Without a decoder script, compressed objects are passed through");
        println!("undecoded. Set --script or DICOM_DECODER_SCRIPT.");
        return ExitCode::FAILURE;
    };

    if !script.is_file() {
        println!("✗ Script: {} not found", script.display());
        return ExitCode::FAILURE;
    }
    println!("✓ Script: {}", script.display());
    println!();

    print!("Probing interpreter... ");
    let decoder = ProcessDecoder::new(config.interpreter.clone(), Some(script));
    match decoder.ensure_initialized().await {
        Ok(_) => println!("✓ success"),
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - '{}' is installed and on PATH", config.interpreter);
            println!("  - The decoder script's dependencies are installed");
            return ExitCode::FAILURE;
        }
    }

    println!();
    println!("═════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
