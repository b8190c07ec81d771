use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use serde_json::json;

use crate::config::constants;
use crate::restart::AppPlatform;

/// TrueNAS SCALE API client for querying and restarting chart release apps.
///
/// The service is inert while the base URL or API key is missing: every
/// operation then reports failure without any network traffic, which sends
/// the restart procedure straight to the Docker fallback.
pub struct TrueNasService {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl TrueNasService {
    /// Create a new TrueNasService.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the TrueNAS API without a trailing slash
    ///   (e.g. "https://truenas.local"); empty when unconfigured
    /// * `api_key` - TrueNAS API key used as a bearer token; empty when
    ///   unconfigured
    /// * `ssl_verify` - Whether to verify the TLS certificate; TrueNAS boxes
    ///   commonly serve self-signed certificates
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: String, api_key: String, ssl_verify: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }

    /// Fetch the names of all chart release apps known to TrueNAS.
    fn fetch_app_names(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/v2.0/chart/release", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(constants::EXISTS_TIMEOUT_SECONDS))
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to list TrueNAS apps: HTTP {}",
                response.status()
            ));
        }

        let releases: Vec<serde_json::Value> = response.json()?;
        Ok(releases
            .iter()
            .filter_map(|release| release.get("name").and_then(|name| name.as_str()))
            .map(ToOwned::to_owned)
            .collect())
    }

    fn request_restart(&self, app_name: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v2.0/chart/release/restart", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(constants::RESTART_TIMEOUT_SECONDS))
            .json(&json!({ "release_name": app_name }))
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to restart TrueNAS app: HTTP {}",
                response.status()
            ));
        }

        Ok(())
    }
}

impl AppPlatform for TrueNasService {
    /// Check whether the app is present in the TrueNAS chart release list.
    ///
    /// Any API failure is treated as "not found" so the restart procedure
    /// can move on to the Docker fallback.
    fn app_exists(&self, app_name: &str) -> bool {
        if !self.is_configured() {
            return false;
        }

        match self.fetch_app_names() {
            Ok(names) => {
                let exists = names.iter().any(|name| name == app_name);
                debug!("TrueNAS app '{}' exists: {}", app_name, exists);
                exists
            }
            Err(e) => {
                warn!("Could not fetch the app list from TrueNAS: {}", e);
                false
            }
        }
    }

    fn restart_app(&self, app_name: &str) -> bool {
        if !self.is_configured() {
            return false;
        }

        match self.request_restart(app_name) {
            Ok(()) => {
                info!("Restarted the TrueNAS app '{}' via the API.", app_name);
                true
            }
            Err(e) => {
                error!(
                    "Failed to restart the app '{}' via the TrueNAS API: {}",
                    app_name, e
                );
                false
            }
        }
    }
}
