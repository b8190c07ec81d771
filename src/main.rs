use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

// Module declarations
mod config;
mod debounce;
mod docker;
mod error;
mod logging;
mod matcher;
mod restart;
mod truenas;
mod watcher;

// Import our modules
use config::Config;
use debounce::DebounceGate;
use docker::DockerService;
use restart::handle_printer_event;
use truenas::TrueNasService;
use watcher::{DmesgFollower, ShutdownFlag};

/// USB printer watcher - kernel-log-driven print spooler recovery.
///
/// This application follows the kernel log (`dmesg --follow --human`) and
/// watches for USB printer attach events. The p910nd print spooler loses its
/// device handle when the printer power-cycles, so on every accepted event
/// the watcher restarts the spooler: first as a TrueNAS SCALE app via the
/// middleware API, then as a plain Docker container if the API path is
/// unavailable or fails.
///
/// # Features
///
/// * Real-time kernel log monitoring via a dmesg subprocess
/// * Token-based USB printer attach detection
/// * Cooldown gate so one attach burst causes one restart
/// * Two-tier restart: TrueNAS SCALE API with docker CLI fallback
/// * Container name resolution with exact-match precedence
/// * Logging to stdout, optionally to a file and to syslog
/// * Clean shutdown on SIGINT and SIGTERM
///
/// # Environment Variables
///
/// All optional (with defaults):
/// * `BASE_URL` - TrueNAS API base URL (default: unset, disables the API tier)
/// * `API_KEY` - TrueNAS API key (default: unset, disables the API tier)
/// * `APP_NAME` - TrueNAS app to restart (default: "p910nd")
/// * `DOCKER_CONTAINER` - Container name pattern for the fallback (default: "p910nd")
/// * `USB_EVENT_MATCH_ANY_OF` - Comma-separated match tokens
///   (default: "usblp,USB Bidirectional printer")
/// * `SSL_VERIFY` - Verify the TrueNAS TLS certificate (default: "false")
/// * `COOLDOWN_SECONDS` - Seconds between accepted events (default: "10")
/// * `LOG_LEVEL` - Log verbosity (default: "info")
/// * `LOG_TO_FILE` - Also log to a file (default: "false")
/// * `LOG_FILE_PATH` - Log file path (default: "/var/log/usb-printer-watcher.log")
/// * `LOG_TO_SYSLOG` - Also log to syslog (default: "false")
/// * `SYSLOG_ADDRESS` - Unix socket path or "host:port" (default: "/dev/log")
///
/// # Usage
///
/// ```bash
/// export BASE_URL="https://truenas.local"
/// export API_KEY="1-abcdef..."
/// export APP_NAME="p910nd"
/// export DOCKER_CONTAINER="p910nd"
/// ./usb-printer-watcher
/// ```
fn main() -> Result<()> {
    // Load configuration from environment variables
    let config = Config::load().expect(
        "Failed to load configuration. Please check the watcher environment variables.",
    );

    // Initialize the stdout/file/syslog sinks before anything logs
    logging::init(&config)?;

    info!("USB printer watcher starting...");
    if config.base_url.is_empty() || config.api_key.is_empty() {
        info!("TrueNAS API not configured; restarts will use the Docker fallback only.");
    } else {
        info!("Using TrueNAS API at: {}", config.base_url);
    }
    info!(
        "Restart targets: app '{}', container pattern '{}'",
        config.app_name, config.docker_container
    );
    if config.match_tokens.is_empty() {
        warn!("The USB event token list is empty; no kernel log line will ever match.");
    }

    // Initialize services
    let truenas = TrueNasService::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.ssl_verify,
    )?;
    let docker = DockerService::new();
    let mut gate = DebounceGate::new(config.cooldown_seconds);

    // Stop cleanly on SIGINT/SIGTERM: the handler nudges the dmesg subprocess
    // so the blocking read loop ends
    let shutdown = Arc::new(ShutdownFlag::new());
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            info!("Shutdown signal received, stopping the watcher...");
            shutdown.request_stop();
        })?;
    }

    let follower = DmesgFollower::new();
    follower.run(&config.match_tokens, &mut gate, &shutdown, || {
        handle_printer_event(
            &truenas,
            &docker,
            &config.app_name,
            &config.docker_container,
        );
    })?;

    if shutdown.is_stopped() {
        info!("USB printer watcher stopped.");
    } else {
        warn!("The dmesg stream ended unexpectedly, exiting.");
    }

    Ok(())
}
