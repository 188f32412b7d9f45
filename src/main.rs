use anyhow::{Context, Result};
use camsession::hardware::{FixedDisplay, SimulatedCameraProvider, SurfaceHandle};
use camsession::keyboard_input::KeyboardInputHandler;
use camsession::orientation::Rotation;
use camsession::session::{DeviceProxy, SessionManager, SurfaceCallback};
use camsession::storage::{DirectoryStorage, GeoLocation, SpaceStatus};
use camsession::CamsessionConfig;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const PREVIEW_SURFACE: SurfaceHandle = SurfaceHandle(1);
const RESULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "camsession")]
#[command(about = "Serialized camera session controller driving a simulated camera")]
#[command(version)]
#[command(long_about = "Opens a simulated camera through the single-worker session queue, \
configures its preview for a portrait surface, and captures pictures into the media \
directory and its JSON index. Run with --interactive to drive it from the keyboard.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camsession.toml", help = "Path to TOML configuration file")]
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

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print the effective configuration and exit
    #[arg(long, help = "Print the effective configuration in TOML format and exit")]
    print_config: bool,

    /// Camera to open instead of the configured default
    #[arg(long, value_name = "ID")]
    camera: Option<i32>,

    /// Number of pictures the scripted run takes
    #[arg(long, default_value_t = 3)]
    captures: u32,

    /// Drive the session from the keyboard instead of the script
    #[arg(short, long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args)?;

    info!("Starting camsession v{}", env!("CARGO_PKG_VERSION"));

    let config = CamsessionConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
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
    config.validate().context("Invalid configuration")?;

    let provider = SimulatedCameraProvider::from_config(&config.simulator);
    let storage = Arc::new(DirectoryStorage::open(&config.storage)?);
    match storage.available_space() {
        SpaceStatus::Available(bytes) => {
            info!("{} MiB free in {}", bytes / (1024 * 1024), storage.root().display())
        }
        SpaceStatus::UnknownSize => warn!("Free space in {} is unknown", storage.root().display()),
        SpaceStatus::Unavailable => {
            anyhow::bail!("Media directory {} is not writable", storage.root().display())
        }
    }

    let camera_count = config.simulator.camera_count;
    let camera_id = args.camera.unwrap_or(config.camera.default_id);
    let manager = SessionManager::new(Arc::new(provider), storage.clone(), config.camera.clone())?;
    let display = Arc::new(FixedDisplay::new(Rotation::Rotate0, true));
    let proxy = manager.device(display);

    proxy.surface_created(PREVIEW_SURFACE);
    proxy.start_preview_with(PREVIEW_SURFACE, camera_id);
    proxy.surface_changed(PREVIEW_SURFACE, 0, 1080, 1920);

    if !wait_until_open(&proxy, Duration::from_secs(5)).await {
        error!("Camera {} did not open", camera_id);
    } else if args.interactive {
        run_interactive(&proxy, camera_id, camera_count).await?;
    } else {
        run_script(&proxy, args.captures).await;
    }

    proxy.surface_destroyed(PREVIEW_SURFACE);

    let stats = tokio::task::spawn_blocking(move || {
        let mut manager = manager;
        manager.shutdown();
        manager.stats()
    })
    .await?;

    info!(
        "Session finished: {} commands ({} failed), {} pictures, {} duplicate captures rejected",
        stats.commands_processed,
        stats.commands_failed,
        stats.pictures_persisted,
        stats.duplicate_captures_rejected
    );
    info!("{} pictures indexed in {}", storage.records().len(), storage.root().display());

    Ok(())
}

async fn wait_until_open(proxy: &DeviceProxy, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while !proxy.is_open() {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

async fn run_script(proxy: &DeviceProxy, captures: u32) {
    if let Some(focus) = proxy.auto_focus() {
        match tokio::time::timeout(RESULT_TIMEOUT, focus).await {
            Ok(Ok(success)) => info!("Auto focus {}", if success { "locked" } else { "failed" }),
            _ => warn!("No auto focus result"),
        }
    }

    for index in 0..captures {
        // alternate tagged and untagged captures
        let receiver = if index % 2 == 1 {
            let location = GeoLocation {
                latitude: 48.8584,
                longitude: 2.2945,
            };
            let (tx, rx) = tokio::sync::oneshot::channel();
            proxy
                .take_picture_at(location, move |result| {
                    let _ = tx.send(result);
                })
                .then_some(rx)
        } else {
            proxy.capture()
        };

        let Some(receiver) = receiver else {
            warn!("Capture {} was not queued", index + 1);
            continue;
        };

        tokio::select! {
            result = tokio::time::timeout(RESULT_TIMEOUT, receiver) => match result {
                Ok(Ok(Ok(picture))) => info!(
                    "Capture {}: {} ({}, {} bytes, rotated {})",
                    index + 1,
                    picture.path.display(),
                    picture.size,
                    picture.size_bytes,
                    picture.orientation
                ),
                Ok(Ok(Err(e))) => error!("Capture {} failed: {}", index + 1, e),
                _ => error!("Capture {} produced no result", index + 1),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping script");
                return;
            }
        }
    }
}

async fn run_interactive(proxy: &DeviceProxy, camera_id: i32, camera_count: usize) -> Result<()> {
    let shutdown = CancellationToken::new();
    let keyboard = KeyboardInputHandler::new(
        proxy.clone(),
        PREVIEW_SURFACE,
        camera_id,
        camera_count,
        shutdown.clone(),
    );
    keyboard.start().await?;

    tokio::select! {
        _ = shutdown.cancelled() => info!("Quit requested from keyboard"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    keyboard.stop().await?;
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
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
        .unwrap_or_else(|_| EnvFilter::new(format!("camsession={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_names(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_names(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_names(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "camsession.log"));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer)
                .boxed();
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
