use log::{error, info};

/// Platform app manager that can restart a named app. Implemented by the
/// TrueNAS SCALE API client in production.
pub trait AppPlatform {
    /// Whether an app with this exact name is known to the platform.
    fn app_exists(&self, app_name: &str) -> bool;

    /// Restart the named app. Returns `true` on confirmed success.
    fn restart_app(&self, app_name: &str) -> bool;
}

/// Container runtime that can restart a container chosen by name pattern.
/// Implemented by the docker CLI wrapper in production.
pub trait ContainerRuntime {
    /// Restart the container whose name matches the pattern. Returns `true`
    /// on confirmed success.
    fn restart_container(&self, pattern: &str) -> bool;
}

/// Run the print spooler restart procedure for one accepted printer event.
///
/// The platform API is the preferred path: when an app name is configured
/// and the platform reports it, a platform restart is attempted first. On
/// any failure along that path the Docker fallback runs instead. Returns
/// `true` when either tier confirms the restart.
pub fn handle_printer_event(
    platform: &dyn AppPlatform,
    runtime: &dyn ContainerRuntime,
    app_name: &str,
    container_pattern: &str,
) -> bool {
    info!("USB printer event detected, starting the print spooler restart procedure.");

    if !app_name.is_empty()
        && platform.app_exists(app_name)
        && platform.restart_app(app_name)
    {
        return true;
    }

    if runtime.restart_container(container_pattern) {
        return true;
    }

    error!(
        "Could not restart the print spooler, neither via the TrueNAS API nor as a Docker container."
    );
    false
}
