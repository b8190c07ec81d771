#![allow(dead_code)]
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::restart::ContainerRuntime;

/// Outcome of resolving a container name pattern against the running
/// container list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameResolution {
    /// Exactly one container matched.
    Resolved(String),

    /// No container name contains the pattern.
    NotFound,

    /// Several container names contain the pattern; the restart is refused
    /// rather than picking one arbitrarily.
    Ambiguous(Vec<String>),
}

/// Resolve a container name pattern against a list of container names.
///
/// An exact name match always wins, even when the pattern is also a
/// substring of other names. Otherwise the pattern must be a substring of
/// exactly one name.
pub fn resolve_name(pattern: &str, names: &[String]) -> NameResolution {
    if names.iter().any(|name| name == pattern) {
        return NameResolution::Resolved(pattern.to_string());
    }

    let mut matches: Vec<String> = names
        .iter()
        .filter(|name| name.contains(pattern))
        .cloned()
        .collect();

    match matches.len() {
        1 => NameResolution::Resolved(matches.remove(0)),
        0 => NameResolution::NotFound,
        _ => NameResolution::Ambiguous(matches),
    }
}

/// Docker CLI wrapper that restarts containers by name pattern.
///
/// Container names come from `docker ps`; resolution accepts an exact match
/// or a unique substring match. Zero or several candidates leave nothing to
/// restart.
pub struct DockerService {
    program: String,
}

impl DockerService {
    /// Create a service that shells out to `docker` from the PATH.
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Create a service that shells out to a specific docker binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the docker binary is present and answers `--version`.
    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn running_container_names(&self) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .args(["ps", "--format", "{{.Names}}"])
            .output()
            .with_context(|| format!("failed to run '{} ps'", self.program))?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "'{} ps' failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Resolve the container to restart from the running container list.
    ///
    /// Resolution failures are logged here with the candidate list so the
    /// operator can narrow down the `DOCKER_CONTAINER` pattern.
    pub fn resolve_container(&self, pattern: &str) -> NameResolution {
        let names = match self.running_container_names() {
            Ok(names) => names,
            Err(e) => {
                error!("Could not list running Docker containers: {}", e);
                return NameResolution::NotFound;
            }
        };

        if names.is_empty() {
            error!("No running Docker containers found.");
            return NameResolution::NotFound;
        }

        let resolution = resolve_name(pattern, &names);
        match &resolution {
            NameResolution::Resolved(name) if name == pattern => {
                info!("Found an exact Docker container name match: '{}'.", name);
            }
            NameResolution::Resolved(name) => {
                info!(
                    "Matched Docker container '{}' for pattern '{}'.",
                    name, pattern
                );
            }
            NameResolution::NotFound => {
                error!(
                    "No Docker container name contains '{}'. Running containers: {:?}",
                    pattern, names
                );
            }
            NameResolution::Ambiguous(candidates) => {
                error!(
                    "Ambiguous container pattern '{}', candidates: {:?}. Use a more specific DOCKER_CONTAINER value.",
                    pattern, candidates
                );
            }
        }

        resolution
    }

    fn run_restart(&self, name: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["restart", name])
            .output()
            .with_context(|| format!("failed to run '{} restart {}'", self.program, name))?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "'{} restart {}' failed: {}",
                self.program,
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ContainerRuntime for DockerService {
    /// Restart the container matching the pattern.
    ///
    /// Resolution failures and CLI failures are logged and reported as
    /// `false` so the caller can account for a failed remediation.
    fn restart_container(&self, pattern: &str) -> bool {
        if !self.is_available() {
            warn!(
                "The '{}' command is not available, skipping the container restart.",
                self.program
            );
            return false;
        }

        let name = match self.resolve_container(pattern) {
            NameResolution::Resolved(name) => name,
            NameResolution::NotFound | NameResolution::Ambiguous(_) => return false,
        };

        info!("Restarting Docker container '{}'...", name);
        match self.run_restart(&name) {
            Ok(stdout) => {
                info!("Docker container '{}' restarted.", name);
                if !stdout.is_empty() {
                    debug!("{}", stdout);
                }
                true
            }
            Err(e) => {
                error!("Failed to restart Docker container '{}': {}", name, e);
                false
            }
        }
    }
}
