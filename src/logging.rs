use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use log::{Log, Metadata, Record, warn};
use syslog::{BasicLogger, Facility, Formatter3164};

use crate::config::{Config, constants};

/// Initialize the process-wide logger from the configuration.
///
/// Log lines always go to stdout. A file sink and a syslog sink are added
/// when enabled in the configuration. A syslog connection failure does not
/// abort startup; it is reported as a warning through the sinks that did
/// come up.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or if a logger has
/// already been installed for this process.
pub fn init(config: &Config) -> Result<()> {
    let mut sinks: Vec<Box<dyn Log>> = Vec::new();

    let console = env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(config.log_level)
        .build();
    sinks.push(Box::new(console));

    if config.log_to_file {
        sinks.push(Box::new(FileSink::open(&config.log_file_path)?));
    }

    let mut syslog_failure = None;
    if config.log_to_syslog {
        match syslog_sink(&config.syslog_address) {
            Ok(sink) => sinks.push(sink),
            Err(e) => syslog_failure = Some(e),
        }
    }

    log::set_boxed_logger(Box::new(MultiLog { sinks }))?;
    log::set_max_level(config.log_level);

    if let Some(e) = syslog_failure {
        warn!(
            "Could not connect to syslog at '{}': {}",
            config.syslog_address, e
        );
    }

    Ok(())
}

/// Build a syslog sink for either a unix socket path or a "host:port" UDP
/// address.
fn syslog_sink(address: &str) -> Result<Box<dyn Log>> {
    let formatter = Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: constants::SYSLOG_PROCESS_NAME.to_string(),
        pid: std::process::id(),
    };

    let logger = if address.starts_with('/') {
        syslog::unix_custom(formatter, address)
    } else {
        syslog::udp(formatter, "0.0.0.0:0", address)
    }
    .map_err(|e| anyhow::anyhow!("syslog connection failed: {}", e))?;

    Ok(Box::new(BasicLogger::new(logger)))
}

/// Fan-out logger that forwards every record to each configured sink.
struct MultiLog {
    sinks: Vec<Box<dyn Log>>,
}

impl Log for MultiLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.sinks.iter().any(|sink| sink.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        for sink in &self.sinks {
            sink.log(record);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

/// Plain-text sink that appends timestamped log lines to a file.
struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory '{}'", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file '{}'", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Log for FileSink {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{} [{}] {}", timestamp, record.level(), record.args());
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}
