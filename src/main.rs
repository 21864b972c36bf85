use anyhow::Result;
use clap::Parser;
use posecam::sim::{SimCameraSource, SimMediaBackend, SimShareTarget, SimStage};
use posecam::{
    Collaborators, Environment, ExportOutcome, PosecamApp, PosecamConfig, ShutdownReason,
    StaticDecorations,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";

#[derive(Parser, Debug)]
#[command(name = "posecam")]
#[command(about = "Photo booth capture core with animated pose overlays")]
#[command(version)]
#[command(long_about = "Runs a posecam capture session headless against simulated camera, \
media and display collaborators: asset detection and preloading, the pose countdown, \
freeze-frame compositing and export of the finished photo.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "posecam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build and initialize but don't start
    #[arg(long, help = "Perform dry run - detect assets and initialize components but don't start them")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Write logs to a file in addition to stderr")]
    log_file: Option<String>,

    /// Number of photos to take
    #[arg(short = 'n', long, default_value_t = 1, help = "Number of captures to run")]
    captures: u32,

    /// Flip the camera between captures
    #[arg(long, help = "Switch between front and back camera before each capture after the first")]
    flip: bool,

    /// Share instead of download
    #[arg(long, help = "Export through the share target instead of downloading")]
    share: bool,

    /// User agent used for format detection
    #[arg(long, value_name = "UA", help = "User-agent string used to pick the overlay video format")]
    user_agent: Option<String>,

    /// Seed for pose selection
    #[arg(long, help = "Seed pose selection for reproducible sessions")]
    seed: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting Posecam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match PosecamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if args.seed.is_some() {
        config.system.rng_seed = args.seed;
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let user_agent = args.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let collaborators = Collaborators {
        environment: Environment::new(
            user_agent,
            Arc::new(posecam::detector::StaticCodecProbe::permissive()),
        ),
        camera_source: Arc::new(SimCameraSource::new()),
        media_backend: Arc::new(SimMediaBackend::new()),
        stage: Arc::new(SimStage::new()),
        decorations: Arc::new(StaticDecorations::load(&config.assets)),
        share_target: Some(Arc::new(SimShareTarget::new(true))),
    };

    let mut app = PosecamApp::new(config, collaborators).map_err(|e| {
        error!("Failed to create app: {}", e);
        e
    })?;
    info!(
        "Detected {:?} platform, using {} overlays (alpha: {})",
        app.profile().platform_family,
        app.profile().format,
        app.profile().supports_alpha
    );

    if args.dry_run {
        app.initialize().await?;
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    app.start().await.map_err(|e| {
        error!("Failed to start session: {}", e);
        e
    })?;
    let status = app.status();
    info!(
        "Session ready: {} camera (live: {}), {} poses loaded",
        status.facing, status.camera_live, status.loaded_poses
    );

    for index in 0..args.captures {
        if args.flip && index > 0 {
            match app.flip_camera().await {
                Ok(stream) => info!("Camera flipped to {}", stream.facing()),
                Err(e) => warn!("Camera flip failed: {}", e),
            }
        }

        let result = match app.capture().await {
            Ok(Some(result)) => result,
            Ok(None) => {
                warn!("Capture {} skipped, another capture is running", index + 1);
                continue;
            }
            Err(e) => {
                error!("Capture {} failed: {}", index + 1, e);
                continue;
            }
        };

        let exported = if args.share {
            app.share().await
        } else {
            app.download().await.map(ExportOutcome::Downloaded)
        };
        match exported {
            Ok(ExportOutcome::Downloaded(path)) => println!(
                "✓ Capture {} ({}x{}, pose {}) saved to {}",
                result.capture_count,
                result.image.width,
                result.image.height,
                result.pose_id.as_deref().unwrap_or("none"),
                path.display()
            ),
            Ok(ExportOutcome::Shared) => {
                println!("✓ Capture {} shared", result.capture_count)
            }
            Err(e) => error!("Export failed: {}", e),
        }

        app.retake();
    }

    let status = app.status();
    println!(
        "✓ Session finished: {} captures, {} poses loaded",
        status.capture_count, status.loaded_poses
    );

    app.request_shutdown(ShutdownReason::UserRequest).await;
    let exit_code = app.run().await.map_err(|e| {
        error!("Session error during shutdown: {}", e);
        e
    })?;

    info!("Posecam exited with code: {}", exit_code);
    // exit skips destructors; flush the file writer first
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("posecam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(log_file) => {
            let path = Path::new(log_file);
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", log_file))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Posecam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&PosecamConfig::default())?);
    Ok(())
}
