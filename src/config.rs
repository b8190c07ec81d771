use std::path::PathBuf;

use log::LevelFilter;

use crate::error::ConfigError;
use crate::matcher;

/// Configuration for the USB printer watcher loaded from environment variables.
///
/// This struct defines all the configurable parameters for the watcher,
/// including the TrueNAS API endpoint, restart targets, event matching and
/// logging sinks. All values are loaded from environment variables to support
/// containerized deployments, and every variable has a default so the watcher
/// starts with an empty environment (in that case only the Docker fallback is
/// used for restarts).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the TrueNAS SCALE API (e.g. "https://truenas.local").
    ///
    /// Trailing slashes are stripped. When empty, the TrueNAS tier of the
    /// restart procedure is disabled and only the Docker fallback runs.
    /// Environment variable: `BASE_URL`
    pub base_url: String,

    /// TrueNAS API key used as a bearer token.
    ///
    /// When empty, the TrueNAS tier of the restart procedure is disabled.
    /// Environment variable: `API_KEY`
    pub api_key: String,

    /// Name of the TrueNAS app (chart release) hosting the print spooler.
    ///
    /// Set to an empty string to skip the TrueNAS tier even when the API is
    /// configured.
    /// Environment variable: `APP_NAME` (default: "p910nd")
    pub app_name: String,

    /// Name pattern of the Docker container hosting the print spooler.
    ///
    /// An exact container name wins; otherwise a unique substring match is
    /// accepted.
    /// Environment variable: `DOCKER_CONTAINER` (default: "p910nd")
    pub docker_container: String,

    /// Tokens that identify a USB printer attach event in the kernel log.
    ///
    /// A log line matches when it contains any token as a case-sensitive
    /// substring. Parsed from a comma-separated list.
    /// Environment variable: `USB_EVENT_MATCH_ANY_OF`
    /// (default: "usblp,USB Bidirectional printer")
    pub match_tokens: Vec<String>,

    /// Whether to verify the TrueNAS TLS certificate.
    ///
    /// TrueNAS boxes commonly serve self-signed certificates, hence the
    /// default of "false".
    /// Environment variable: `SSL_VERIFY` (default: "false")
    pub ssl_verify: bool,

    /// Cooldown window between accepted printer events, in seconds.
    ///
    /// Matches arriving within the window are ignored so one attach burst
    /// causes one restart. Fractional values are allowed.
    /// Environment variable: `COOLDOWN_SECONDS` (default: "10")
    pub cooldown_seconds: f64,

    /// Log verbosity: one of "off", "error", "warn", "info", "debug", "trace".
    /// Environment variable: `LOG_LEVEL` (default: "info")
    pub log_level: LevelFilter,

    /// Whether to append log lines to a file in addition to stdout.
    /// Environment variable: `LOG_TO_FILE` (default: "false")
    pub log_to_file: bool,

    /// Path of the log file used when file logging is enabled.
    ///
    /// Missing parent directories are created on startup.
    /// Environment variable: `LOG_FILE_PATH`
    /// (default: "/var/log/usb-printer-watcher.log")
    pub log_file_path: PathBuf,

    /// Whether to forward log lines to syslog in addition to stdout.
    /// Environment variable: `LOG_TO_SYSLOG` (default: "false")
    pub log_to_syslog: bool,

    /// Syslog destination used when syslog logging is enabled.
    ///
    /// A value starting with '/' is treated as a unix socket path, anything
    /// else as a "host:port" UDP address.
    /// Environment variable: `SYSLOG_ADDRESS` (default: "/dev/log")
    pub syslog_address: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set environment variable cannot be parsed:
    /// - `SSL_VERIFY`, `LOG_TO_FILE`, `LOG_TO_SYSLOG`: must be "true" or
    ///   "false" (any casing)
    /// - `COOLDOWN_SECONDS`: must be a finite, non-negative number
    /// - `LOG_LEVEL`: must be a level name known to the `log` crate
    ///
    /// # Examples
    ///
    /// ```rust
    /// use usb_printer_watcher::config::Config;
    ///
    /// let config = Config::load().expect("Failed to load configuration");
    /// assert!(!config.docker_container.is_empty());
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        let base_url = std::env::var("BASE_URL")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("API_KEY").unwrap_or_default();

        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "p910nd".to_string());

        let docker_container =
            std::env::var("DOCKER_CONTAINER").unwrap_or_else(|_| "p910nd".to_string());

        let match_tokens = matcher::parse_match_tokens(
            &std::env::var("USB_EVENT_MATCH_ANY_OF")
                .unwrap_or_else(|_| constants::DEFAULT_MATCH_TOKENS.to_string()),
        );

        let ssl_verify = parse_bool(
            "SSL_VERIFY",
            &std::env::var("SSL_VERIFY").unwrap_or_else(|_| "false".to_string()),
        )?;

        let cooldown_raw = std::env::var("COOLDOWN_SECONDS").unwrap_or_else(|_| "10".to_string());
        let cooldown_seconds =
            cooldown_raw
                .trim()
                .parse::<f64>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "COOLDOWN_SECONDS".to_string(),
                    value: cooldown_raw.clone(),
                    reason: e.to_string(),
                })?;
        if !cooldown_seconds.is_finite() || cooldown_seconds < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "COOLDOWN_SECONDS".to_string(),
                value: cooldown_raw,
                reason: "must be a finite, non-negative number".to_string(),
            });
        }

        let log_level_raw = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_level =
            log_level_raw
                .trim()
                .parse::<LevelFilter>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "LOG_LEVEL".to_string(),
                    value: log_level_raw.clone(),
                    reason: e.to_string(),
                })?;

        let log_to_file = parse_bool(
            "LOG_TO_FILE",
            &std::env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string()),
        )?;

        let log_file_path = PathBuf::from(
            std::env::var("LOG_FILE_PATH")
                .unwrap_or_else(|_| "/var/log/usb-printer-watcher.log".to_string()),
        );

        let log_to_syslog = parse_bool(
            "LOG_TO_SYSLOG",
            &std::env::var("LOG_TO_SYSLOG").unwrap_or_else(|_| "false".to_string()),
        )?;

        let syslog_address =
            std::env::var("SYSLOG_ADDRESS").unwrap_or_else(|_| "/dev/log".to_string());

        Ok(Config {
            base_url,
            api_key,
            app_name,
            docker_container,
            match_tokens,
            ssl_verify,
            cooldown_seconds,
            log_level,
            log_to_file,
            log_file_path,
            log_to_syslog,
            syslog_address,
        })
    }
}

/// Parse a boolean environment variable, accepting "true" and "false" in any
/// casing.
fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    raw.trim()
        .to_lowercase()
        .parse::<bool>()
        .map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "must be 'true' or 'false'".to_string(),
        })
}

/// Application constants used throughout the system.
pub mod constants {
    /// Command used to follow the kernel ring buffer.
    pub const DMESG_PROGRAM: &str = "dmesg";

    /// Arguments for the kernel log follower: stream new messages and keep
    /// the human-readable format the match tokens are written against.
    pub const DMESG_ARGS: [&str; 2] = ["--follow", "--human"];

    /// Default token list for USB printer attach detection.
    pub const DEFAULT_MATCH_TOKENS: &str = "usblp,USB Bidirectional printer";

    /// Timeout for the TrueNAS app list request in seconds.
    pub const EXISTS_TIMEOUT_SECONDS: u64 = 10;

    /// Timeout for the TrueNAS app restart request in seconds.
    pub const RESTART_TIMEOUT_SECONDS: u64 = 30;

    /// How long to wait for the log subprocess to exit after a termination
    /// request before killing it, in seconds.
    pub const CHILD_GRACE_SECONDS: u64 = 5;

    /// Process name reported to syslog.
    pub const SYSLOG_PROCESS_NAME: &str = "usb-printer-watcher";
}
