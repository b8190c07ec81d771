use std::time::{Duration, Instant};

/// Cooldown gate that collapses a burst of matching log lines into a single
/// remediation trigger.
///
/// A single USB attach typically produces several kernel messages that all
/// match the printer tokens. The gate accepts the first match and rejects
/// every later one until strictly more than the cooldown has elapsed since
/// the last accepted match.
#[derive(Debug)]
pub struct DebounceGate {
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl DebounceGate {
    /// Create a gate with the given cooldown window.
    ///
    /// # Arguments
    ///
    /// * `cooldown_seconds` - Cooldown window in seconds. Must be finite and
    ///   non-negative; [`Config::load`] validates this before construction.
    ///
    /// [`Config::load`]: crate::config::Config::load
    pub fn new(cooldown_seconds: f64) -> Self {
        Self {
            cooldown: Duration::from_secs_f64(cooldown_seconds),
            last_trigger: None,
        }
    }

    /// Whether a match observed at `now` should trigger remediation.
    ///
    /// The first match always triggers. A later match triggers only when the
    /// elapsed time since the last accepted match exceeds the cooldown; a
    /// match landing exactly on the boundary is still suppressed.
    pub fn should_trigger(&self, now: Instant) -> bool {
        match self.last_trigger {
            None => true,
            Some(last) => now.duration_since(last) > self.cooldown,
        }
    }

    /// Record an accepted match at `now`.
    ///
    /// The watcher records before starting remediation, so time spent on a
    /// slow restart counts against the next cooldown window.
    pub fn record_trigger(&mut self, now: Instant) {
        self.last_trigger = Some(now);
    }
}
