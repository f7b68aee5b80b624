use anyhow::{bail, Context};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sysinfo::System;

use arena_hud::notify::{Level, Notifier};
use arena_hud::{
    AppResult, Config, DetectionContext, DetectionOrchestrator, Feed, FrameSource, ScreenCapture,
    StateBus, Stats, StillFrame, TemplateLibrary,
};

const LOG_TARGET_STARTUP: &str = "arena_hud::startup";

/// Queue size of the statistics worker.
const STATS_QUEUE: usize = 4096;

const USAGE: &str = "Usage: arena-hud [--config PATH] [--replay IMAGE]

Commands while running:
  p  pause / resume
  s  status
  h  match history
  e  recent events
  q  quit";

/// Initialize tracing with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/ArenaHud/logs/
/// - Windows: %APPDATA%/ArenaHud/logs/
/// - Linux: ~/.config/ArenaHud/logs/
///
/// Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = dirs::config_dir()
        .map(|dir| dir.join("ArenaHud").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "arena-hud.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Arena HUD v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Monitors: {} detected",
        ScreenCapture::monitor_count()
    );
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    replay: Option<PathBuf>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config = Some(iter.next().context("--config needs a path")?.into());
            }
            "--replay" => {
                args.replay = Some(iter.next().context("--replay needs an image")?.into());
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {}\n\n{}", other, USAGE),
        }
    }
    Ok(args)
}

/// Prints notifications and keeps them in a feed.
struct Console {
    feed: Feed,
}

impl Notifier for Console {
    fn notify(&self, level: Level, message: String) {
        match level {
            Level::Status => println!("{}", message),
            Level::Warn | Level::Error => eprintln!("{}", message),
        }
        self.feed.notify(level, message);
    }
}

fn main() -> AppResult<()> {
    initialize_tracing();
    log_runtime_environment();

    let args = parse_args()?;

    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let templates = TemplateLibrary::load(config.template_dir.clone()).with_context(|| {
        format!("Failed to load templates from {}", config.template_dir.display())
    })?;
    if templates.is_empty() {
        tracing::warn!("No templates found in {}", config.template_dir.display());
    }

    let frames: Arc<dyn FrameSource> = match &args.replay {
        Some(path) => Arc::new(
            StillFrame::open(path)
                .with_context(|| format!("Failed to open replay image {}", path.display()))?,
        ),
        None => Arc::new(
            ScreenCapture::new(config.monitor_index).context(
                "Failed to initialize screen capture (macOS needs the Screen Recording permission)",
            )?,
        ),
    };
    tracing::info!("Capturing from {}", frames.name());

    let stats = Stats::spawn(config.stats, STATS_QUEUE).context("Failed to start statistics")?;
    let bus = StateBus::new();
    let (updates, _) = bus.subscribe();
    thread::Builder::new()
        .name("state-updates".to_string())
        .spawn(move || {
            for update in updates.iter() {
                tracing::debug!(target: "arena_hud::state", "{}: {:?}", update.label(), update);
            }
        })
        .context("Failed to start state update listener")?;

    let ctx = Arc::new(DetectionContext::new(
        config,
        Arc::new(templates),
        frames,
        Arc::new(Console {
            feed: Feed::default(),
        }),
        stats.recorder(),
        bus,
    ));
    let orchestrator = DetectionOrchestrator::new(Arc::clone(&ctx));
    orchestrator.start().context("Failed to start detection")?;
    println!("{}", USAGE.lines().skip(2).collect::<Vec<_>>().join("\n"));

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        match line.trim() {
            "p" => match orchestrator.toggle_pause() {
                Ok(true) => println!("Paused"),
                Ok(false) => println!("Resumed"),
                Err(e) => eprintln!("{}", e),
            },
            "s" => println!("{}", orchestrator.status()),
            "h" => {
                for row in ctx.history.dump() {
                    println!("{}", row);
                }
            }
            "e" => {
                for row in ctx.log.recent(Duration::from_secs(300)) {
                    println!("{}", row);
                }
            }
            "q" => break,
            "" => {}
            other => eprintln!("Unknown command: {}", other),
        }
    }

    orchestrator.stop().context("Failed to stop detection")?;
    if stats.is_enabled() {
        stats.log_report();
    }
    for row in ctx.history.dump() {
        println!("{}", row);
    }
    tracing::info!("Arena HUD exiting");
    Ok(())
}
