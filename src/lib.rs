//! USB printer watcher - kernel-log-driven print spooler recovery.
//!
//! This library provides components for following the kernel log in real
//! time, detecting USB printer attach events and restarting the print
//! spooler, preferring the TrueNAS SCALE API and falling back to the docker
//! CLI.
//!
//! # Core Components
//!
//! * [`config`] - Configuration loaded from environment variables
//! * [`matcher`] - Kernel log line classification
//! * [`debounce`] - Cooldown gate that collapses event bursts
//! * [`watcher`] - `dmesg --follow` subprocess and read loop
//! * [`truenas`] - TrueNAS SCALE API client
//! * [`docker`] - docker CLI wrapper with container name resolution
//! * [`restart`] - Two-tier restart procedure
//! * [`logging`] - stdout, file and syslog log sinks
//! * [`error`] - Configuration error types
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use usb_printer_watcher::{
//!     Config, DebounceGate, DmesgFollower, DockerService, ShutdownFlag, TrueNasService,
//!     handle_printer_event,
//! };
//!
//! let config = Config::load().expect("Failed to load configuration");
//! let truenas =
//!     TrueNasService::new(config.base_url.clone(), config.api_key.clone(), config.ssl_verify)
//!         .expect("Failed to build the TrueNAS client");
//! let docker = DockerService::new();
//! let mut gate = DebounceGate::new(config.cooldown_seconds);
//! let shutdown = Arc::new(ShutdownFlag::new());
//!
//! DmesgFollower::new()
//!     .run(&config.match_tokens, &mut gate, &shutdown, || {
//!         handle_printer_event(&truenas, &docker, &config.app_name, &config.docker_container);
//!     })
//!     .expect("dmesg follower failed");
//! ```

pub mod config;
pub mod matcher;
pub mod debounce;
pub mod watcher;
pub mod truenas;
pub mod docker;
pub mod restart;
pub mod logging;
pub mod error;

// Re-export commonly used types for convenience
pub use config::Config;
pub use debounce::DebounceGate;
pub use docker::{DockerService, NameResolution};
pub use error::ConfigError;
pub use restart::{AppPlatform, ContainerRuntime, handle_printer_event};
pub use truenas::TrueNasService;
pub use watcher::{DmesgFollower, ShutdownFlag};
