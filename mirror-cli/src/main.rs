//! Mirroring client entry point.
//!
//! ```text
//! mirror-cli                      Mirror the only attached device
//! mirror-cli --serial <serial>    Mirror a specific device
//! mirror-cli --list-devices       Print attached devices and exit
//! mirror-cli --config <path>      Use custom config TOML
//! mirror-cli --gen-config         Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_core::remote::parse_device_list;
use mirror_core::{
    AdbExecutor, DefaultCodecFactory, DeviceInfo, EVENT_CHANNEL_CAPACITY, MirrorEvent,
    RemoteExecutor, SessionOrchestrator, TcpDialer,
};

use mirror_cli::config::MirrorConfig;
use mirror_cli::devices::select_device;
use mirror_cli::input::{Command, Console};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "mirror-cli", about = "Headless Android device mirroring client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "mirror-cli.toml")]
    config: PathBuf,

    /// Device serial (as printed by --list-devices).
    #[arg(short, long)]
    serial: Option<String>,

    /// Server artifact to push (overrides the default file name).
    #[arg(long)]
    server_file: Option<PathBuf>,

    /// Print attached devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&MirrorConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = MirrorConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("mirror-cli v{}", env!("CARGO_PKG_VERSION"));

    let executor = Arc::new(AdbExecutor::new(config.adb.path.clone(), config.adb_timeout()));

    // ── 1. Pick the device ──────────────────────────────────────

    let devices = list_devices(executor.as_ref()).await?;
    if cli.list_devices {
        for device in &devices {
            println!("{}\t{}", device.serial, device.status);
        }
        return Ok(());
    }
    let serial = select_device(&devices, cli.serial.as_deref())?.serial.clone();
    info!(%serial, "mirroring device");

    // ── 2. Start the session ────────────────────────────────────

    let session = config.session_config(&serial, cli.server_file.as_deref());
    let (event_tx, mut events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = SessionOrchestrator::new(
        session,
        executor,
        Arc::new(TcpDialer::default()),
        Arc::new(DefaultCodecFactory),
    )
    .start(event_tx);
    let mut states = handle.subscribe();

    // ── 3. Event loop ───────────────────────────────────────────

    let mut console = Console::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut closing = false;

    let mut fps_tick = tokio::time::interval(Duration::from_secs(1));
    let mut window_start = Instant::now();
    let mut window_frames = 0u32;
    let mut last_size = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(MirrorEvent::DeviceIdentified(name)) => info!(device = %name, "device identified"),
                Some(MirrorEvent::FrameDecoded(frame)) => {
                    window_frames += 1;
                    if last_size != Some((frame.width, frame.height)) {
                        info!(width = frame.width, height = frame.height, "frame size");
                        last_size = Some((frame.width, frame.height));
                        console.set_frame_size(frame.width, frame.height);
                    }
                }
                None => break,
            },
            _ = fps_tick.tick() => {
                if window_frames > 0 {
                    let fps = f64::from(window_frames) / window_start.elapsed().as_secs_f64();
                    info!("{fps:.1} fps");
                }
                window_frames = 0;
                window_start = Instant::now();
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console.handle(&line) {
                    Ok(Command::Send(msgs)) => {
                        let total = msgs.len();
                        let sent = handle.control().send_all(msgs);
                        if sent < total {
                            warn!("{} of {total} control messages not sent", total - sent);
                        }
                    }
                    Ok(Command::Quit) => {
                        closing = true;
                        handle.close();
                    }
                    Err(e) => warn!("{e}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin error: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c, if !closing => {
                info!("interrupted");
                closing = true;
                handle.close();
            }
            changed = states.changed() => {
                if changed.is_err() || states.borrow_and_update().is_terminal() {
                    break;
                }
            }
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    handle.close();
    match handle.join().await {
        Ok(report) => {
            info!(
                attempts = report.video_attempts,
                control = report.control_connected,
                "session closed"
            );
            if let Some(stats) = report.stats {
                info!(
                    packets = stats.packets,
                    frames = stats.frames,
                    decode_errors = stats.decode_errors,
                    dropped = stats.dropped_frames,
                    "decode totals"
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("session failed: {e}");
            Err(e.into())
        }
    }
}

async fn list_devices(executor: &dyn RemoteExecutor) -> Result<Vec<DeviceInfo>, Box<dyn std::error::Error>> {
    let out = executor.run("", &["devices".to_owned()]).await?;
    if !out.success() {
        return Err(format!("adb devices failed: {}", out.output.trim()).into());
    }
    Ok(parse_device_list(&out.output))
}
