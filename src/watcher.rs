#![allow(dead_code)]
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{error, info, warn};

use crate::config::constants;
use crate::debounce::DebounceGate;
use crate::matcher;

/// Cooperative shutdown handle shared between the follower loop and the
/// process signal handler.
pub struct ShutdownFlag {
    stop: AtomicBool,
    child_pid: AtomicU32,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            child_pid: AtomicU32::new(0),
        }
    }

    /// Ask the follower loop to stop.
    ///
    /// The log subprocess is sent a termination signal so the blocking read
    /// in the follower unblocks on end of stream.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let pid = self.child_pid.load(Ordering::SeqCst);
        if pid != 0 {
            let _ = Command::new("kill")
                .arg(pid.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_child(&self, pid: u32) {
        self.child_pid.store(pid, Ordering::SeqCst);
    }

    fn clear_child(&self) {
        self.child_pid.store(0, Ordering::SeqCst);
    }
}

/// Follows the kernel log and fires a callback for each accepted USB printer
/// event.
///
/// The follower spawns `dmesg --follow --human`, reads its stdout line by
/// line and classifies each line against the match tokens. Matches are run
/// through the cooldown gate so one attach burst triggers the callback once.
pub struct DmesgFollower {
    program: String,
    args: Vec<String>,
}

impl DmesgFollower {
    /// Create a follower for the system `dmesg` command.
    pub fn new() -> Self {
        Self {
            program: constants::DMESG_PROGRAM.to_string(),
            args: constants::DMESG_ARGS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Create a follower for an arbitrary line-producing command.
    pub fn with_command(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// Follow the log stream until it ends or a stop is requested.
    ///
    /// Each line is trimmed and classified; blank lines are skipped. For a
    /// matching line the gate decides whether the event is accepted, and an
    /// accepted event is recorded on the gate before `on_event` runs. The
    /// subprocess is terminated and reaped before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the log command cannot be spawned. A stream that
    /// ends or turns unreadable is not an error; the follower cleans up and
    /// returns so the caller decides what a silent log stream means.
    pub fn run<F>(
        &self,
        tokens: &[String],
        gate: &mut DebounceGate,
        shutdown: &ShutdownFlag,
        mut on_event: F,
    ) -> Result<()>
    where
        F: FnMut(),
    {
        info!(
            "Starting '{} {}'. USB printer match tokens: {:?}",
            self.program,
            self.args.join(" "),
            tokens
        );

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(
                    "Failed to start '{}': {}. Is util-linux installed and the kernel log readable?",
                    self.program, e
                );
                return Err(anyhow::anyhow!("failed to start '{}': {}", self.program, e));
            }
        };

        shutdown.set_child(child.id());

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                shutdown.clear_child();
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("no stdout handle for the '{}' subprocess", self.program);
            }
        };

        let reader = BufReader::new(stdout);
        for line in reader.lines() {
            if shutdown.is_stopped() {
                break;
            }

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Error reading the '{}' stream: {}", self.program, e);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if matcher::line_matches(trimmed, tokens) {
                let now = Instant::now();
                if gate.should_trigger(now) {
                    info!("Printer event detected in line: {}", trimmed);
                    gate.record_trigger(now);
                    on_event();
                } else {
                    info!("Additional match within the cooldown window, skipping.");
                }
            }
        }

        shutdown.clear_child();
        terminate_child(&mut child);
        Ok(())
    }
}

/// Ask the log subprocess to exit, wait out a grace period, then kill it.
fn terminate_child(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!("Could not poll the log subprocess: {}", e);
            return;
        }
    }

    let _ = Command::new("kill")
        .arg(child.id().to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    let deadline = Instant::now() + Duration::from_secs(constants::CHILD_GRACE_SECONDS);
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                warn!("Could not poll the log subprocess: {}", e);
                break;
            }
        }
    }

    warn!("The log subprocess ignored the termination request, killing it.");
    if let Err(e) = child.kill() {
        warn!("Could not kill the log subprocess: {}", e);
    }
    let _ = child.wait();
}
