use std::cell::Cell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use usb_printer_watcher::config::constants;
use usb_printer_watcher::debounce::DebounceGate;
use usb_printer_watcher::docker::{DockerService, NameResolution, resolve_name};
use usb_printer_watcher::matcher::{line_matches, parse_match_tokens};
use usb_printer_watcher::restart::{AppPlatform, ContainerRuntime, handle_printer_event};
use usb_printer_watcher::truenas::TrueNasService;
use usb_printer_watcher::watcher::{DmesgFollower, ShutdownFlag};

#[test]
fn test_match_token_parsing() {
    let tokens = parse_match_tokens(" usblp , ,USB Bidirectional printer ,,");
    assert_eq!(
        tokens,
        vec!["usblp".to_string(), "USB Bidirectional printer".to_string()]
    );

    assert!(parse_match_tokens("").is_empty());
    assert!(parse_match_tokens(" , ,, ").is_empty());
}

#[test]
fn test_line_matching_is_case_sensitive() {
    let tokens = parse_match_tokens(constants::DEFAULT_MATCH_TOKENS);

    // A realistic usblp bind line matches on both default tokens
    let attach = "usblp 1-1.4:1.0: usblp0: USB Bidirectional printer dev 5 \
                  if 0 alt 0 proto 2 vid 0x04E8 pid 0x3321";
    assert!(line_matches(attach, &tokens));

    // Unrelated kernel chatter does not match
    assert!(!line_matches(
        "usb 1-1.4: new high-speed USB device number 11 using xhci_hcd",
        &tokens
    ));

    // Matching is case-sensitive
    assert!(!line_matches("USBLP0: printer ready", &tokens));
    assert!(!line_matches("usb bidirectional printer attached", &tokens));
}

#[test]
fn test_empty_token_set_never_matches() {
    assert!(!line_matches("usblp0: USB Bidirectional printer", &[]));
}

#[test]
fn test_debounce_boundary_is_strict() {
    let mut gate = DebounceGate::new(10.0);
    let t0 = Instant::now();

    // The first match always triggers
    assert!(gate.should_trigger(t0));
    gate.record_trigger(t0);

    // Inside the window and exactly on the boundary: suppressed
    assert!(!gate.should_trigger(t0 + Duration::from_secs(5)));
    assert!(!gate.should_trigger(t0 + Duration::from_secs(10)));

    // Strictly past the boundary: accepted
    assert!(gate.should_trigger(t0 + Duration::from_secs(10) + Duration::from_millis(1)));
}

#[test]
fn test_debounce_zero_cooldown() {
    let mut gate = DebounceGate::new(0.0);
    let t0 = Instant::now();

    gate.record_trigger(t0);
    // Zero elapsed is not strictly greater than a zero cooldown
    assert!(!gate.should_trigger(t0));
    assert!(gate.should_trigger(t0 + Duration::from_millis(1)));
}

#[test]
fn test_resolve_name_exact_match_wins() {
    let names = vec!["p910nd".to_string(), "p910nd-backup".to_string()];
    assert_eq!(
        resolve_name("p910nd", &names),
        NameResolution::Resolved("p910nd".to_string())
    );
}

#[test]
fn test_resolve_name_unique_substring() {
    let names = vec!["ix-p910nd-abc123".to_string(), "nginx".to_string()];
    assert_eq!(
        resolve_name("p910nd", &names),
        NameResolution::Resolved("ix-p910nd-abc123".to_string())
    );
}

#[test]
fn test_resolve_name_ambiguous() {
    let names = vec!["ix-p910nd-a".to_string(), "ix-p910nd-b".to_string()];
    assert_eq!(
        resolve_name("p910nd", &names),
        NameResolution::Ambiguous(names.clone())
    );
}

#[test]
fn test_resolve_name_not_found() {
    let names = vec!["nginx".to_string(), "postgres".to_string()];
    assert_eq!(resolve_name("p910nd", &names), NameResolution::NotFound);
}

#[test]
fn test_restart_prefers_truenas_api() {
    let platform = StubPlatform::new(true, true);
    let runtime = StubRuntime::new(true);

    assert!(handle_printer_event(&platform, &runtime, "p910nd", "p910nd"));
    assert_eq!(platform.restart_calls.get(), 1);
    assert_eq!(runtime.restart_calls.get(), 0);
}

#[test]
fn test_restart_falls_back_when_api_restart_fails() {
    let platform = StubPlatform::new(true, false);
    let runtime = StubRuntime::new(true);

    assert!(handle_printer_event(&platform, &runtime, "p910nd", "p910nd"));
    assert_eq!(platform.restart_calls.get(), 1);
    assert_eq!(runtime.restart_calls.get(), 1);
}

#[test]
fn test_restart_skips_api_when_app_name_empty() {
    let platform = StubPlatform::new(true, true);
    let runtime = StubRuntime::new(true);

    assert!(handle_printer_event(&platform, &runtime, "", "p910nd"));
    assert_eq!(platform.exists_calls.get(), 0);
    assert_eq!(platform.restart_calls.get(), 0);
    assert_eq!(runtime.restart_calls.get(), 1);
}

#[test]
fn test_restart_skips_api_when_app_missing() {
    let platform = StubPlatform::new(false, true);
    let runtime = StubRuntime::new(true);

    assert!(handle_printer_event(&platform, &runtime, "p910nd", "p910nd"));
    assert_eq!(platform.exists_calls.get(), 1);
    assert_eq!(platform.restart_calls.get(), 0);
    assert_eq!(runtime.restart_calls.get(), 1);
}

#[test]
fn test_restart_reports_total_failure() {
    let platform = StubPlatform::new(false, false);
    let runtime = StubRuntime::new(false);

    assert!(!handle_printer_event(&platform, &runtime, "p910nd", "p910nd"));
    assert_eq!(runtime.restart_calls.get(), 1);
}

#[test]
fn test_docker_restart_with_exact_name() {
    let dir = TempDir::new().expect("tempdir");
    // The stub only accepts a restart of the exact name, so a substring
    // candidate being picked over the exact match would fail the test
    let program = write_stub_docker(
        &dir,
        r#"case "$1" in
--version) echo 'Docker version 24.0.7'; exit 0 ;;
ps) printf 'p910nd\np910nd-old\n'; exit 0 ;;
restart) [ "$2" = "p910nd" ] || exit 1; exit 0 ;;
esac
exit 1"#,
    );

    let docker = DockerService::with_program(program);
    assert!(docker.restart_container("p910nd"));
}

#[test]
fn test_docker_restart_with_unique_substring() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_stub_docker(
        &dir,
        r#"case "$1" in
--version) exit 0 ;;
ps) printf 'ix-p910nd-abc123\nnginx\n'; exit 0 ;;
restart) [ "$2" = "ix-p910nd-abc123" ] || exit 1; echo "$2"; exit 0 ;;
esac
exit 1"#,
    );

    let docker = DockerService::with_program(program);
    assert!(docker.restart_container("p910nd"));
}

#[test]
fn test_docker_refuses_ambiguous_pattern() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_stub_docker(
        &dir,
        r#"case "$1" in
--version) exit 0 ;;
ps) printf 'ix-p910nd-a\nix-p910nd-b\n'; exit 0 ;;
esac
exit 1"#,
    );

    let docker = DockerService::with_program(program);
    match docker.resolve_container("p910nd") {
        NameResolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
        other => panic!("expected an ambiguous resolution, got {:?}", other),
    }
    assert!(!docker.restart_container("p910nd"));
}

#[test]
fn test_docker_no_matching_container() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_stub_docker(
        &dir,
        r#"case "$1" in
--version) exit 0 ;;
ps) printf 'nginx\n'; exit 0 ;;
esac
exit 1"#,
    );

    let docker = DockerService::with_program(program);
    assert_eq!(
        docker.resolve_container("p910nd"),
        NameResolution::NotFound
    );
    assert!(!docker.restart_container("p910nd"));
}

#[test]
fn test_docker_binary_unavailable() {
    let docker = DockerService::with_program("/nonexistent/docker-stub-for-tests");
    assert!(!docker.restart_container("p910nd"));
}

#[test]
fn test_truenas_unconfigured_service_is_inert() {
    // No base URL and no API key: both operations fail without any traffic
    let truenas =
        TrueNasService::new(String::new(), String::new(), false).expect("client build failed");
    assert!(!truenas.app_exists("p910nd"));
    assert!(!truenas.restart_app("p910nd"));
}

#[test]
fn test_truenas_unreachable_api() {
    // Nothing listens here, so both operations report failure instead of
    // panicking or hanging
    let truenas = TrueNasService::new(
        "http://127.0.0.1:59123".to_string(),
        "test-key".to_string(),
        true,
    )
    .expect("client build failed");
    assert!(!truenas.app_exists("p910nd"));
    assert!(!truenas.restart_app("p910nd"));
}

#[test]
fn test_follower_collapses_event_burst() {
    let tokens = parse_match_tokens(constants::DEFAULT_MATCH_TOKENS);
    let mut gate = DebounceGate::new(60.0);
    let shutdown = ShutdownFlag::new();
    let count = Cell::new(0u32);

    let follower = DmesgFollower::with_command(
        "sh",
        &[
            "-c",
            r#"echo 'usb 1-1: usblp0: USB Bidirectional printer dev 5'
echo 'usb 1-1: new high-speed USB device number 11 using xhci_hcd'
echo 'usblp 1-1:1.0: usblp0: USB Bidirectional printer dev 5'"#,
        ],
    );

    follower
        .run(&tokens, &mut gate, &shutdown, || {
            count.set(count.get() + 1)
        })
        .expect("follower run failed");

    assert_eq!(count.get(), 1);
}

#[test]
fn test_follower_triggers_again_after_cooldown() {
    let tokens = parse_match_tokens("usblp");
    let mut gate = DebounceGate::new(0.05);
    let shutdown = ShutdownFlag::new();
    let count = Cell::new(0u32);

    let follower = DmesgFollower::with_command(
        "sh",
        &[
            "-c",
            "echo 'usblp0: printer attached'; sleep 0.5; echo 'usblp0: printer attached'",
        ],
    );

    follower
        .run(&tokens, &mut gate, &shutdown, || {
            count.set(count.get() + 1)
        })
        .expect("follower run failed");

    assert_eq!(count.get(), 2);
}

#[test]
fn test_follower_skips_blank_lines_and_trims() {
    let tokens = parse_match_tokens(constants::DEFAULT_MATCH_TOKENS);
    let mut gate = DebounceGate::new(60.0);
    let shutdown = ShutdownFlag::new();
    let count = Cell::new(0u32);

    let follower = DmesgFollower::with_command(
        "sh",
        &[
            "-c",
            r#"printf '   \n\n  usblp 1-1:1.0: usblp0: USB Bidirectional printer dev 3  \n'"#,
        ],
    );

    follower
        .run(&tokens, &mut gate, &shutdown, || {
            count.set(count.get() + 1)
        })
        .expect("follower run failed");

    assert_eq!(count.get(), 1);
}

#[test]
fn test_follower_missing_command_is_an_error() {
    let tokens = parse_match_tokens("usblp");
    let mut gate = DebounceGate::new(10.0);
    let shutdown = ShutdownFlag::new();

    let follower = DmesgFollower::with_command("/nonexistent/dmesg-stub-for-tests", &[]);
    let result = follower.run(&tokens, &mut gate, &shutdown, || {});
    assert!(result.is_err());
}

#[test]
fn test_follower_stops_on_shutdown_request() {
    let tokens = parse_match_tokens("nothing-ever-matches-this");
    let mut gate = DebounceGate::new(10.0);
    let shutdown = Arc::new(ShutdownFlag::new());

    let stopper = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            shutdown.request_stop();
        })
    };

    // An endless stream: only the stop request can end the run
    let follower =
        DmesgFollower::with_command("sh", &["-c", "while true; do echo tick; sleep 0.1; done"]);
    follower
        .run(&tokens, &mut gate, &shutdown, || {})
        .expect("follower run failed");

    stopper.join().expect("stopper thread panicked");
    assert!(shutdown.is_stopped());
}

/// Write an executable stub docker script into the temp dir and return its
/// path.
fn write_stub_docker(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("docker");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write stub docker");

    let mut perms = fs::metadata(&path).expect("stat stub docker").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod stub docker");

    path.to_string_lossy().into_owned()
}

/// Counting stub for the TrueNAS tier of the restart procedure.
struct StubPlatform {
    exists: bool,
    restart_ok: bool,
    exists_calls: Cell<u32>,
    restart_calls: Cell<u32>,
}

impl StubPlatform {
    fn new(exists: bool, restart_ok: bool) -> Self {
        Self {
            exists,
            restart_ok,
            exists_calls: Cell::new(0),
            restart_calls: Cell::new(0),
        }
    }
}

impl AppPlatform for StubPlatform {
    fn app_exists(&self, _app_name: &str) -> bool {
        self.exists_calls.set(self.exists_calls.get() + 1);
        self.exists
    }

    fn restart_app(&self, _app_name: &str) -> bool {
        self.restart_calls.set(self.restart_calls.get() + 1);
        self.restart_ok
    }
}

/// Counting stub for the Docker tier of the restart procedure.
struct StubRuntime {
    restart_ok: bool,
    restart_calls: Cell<u32>,
}

impl StubRuntime {
    fn new(restart_ok: bool) -> Self {
        Self {
            restart_ok,
            restart_calls: Cell::new(0),
        }
    }
}

impl ContainerRuntime for StubRuntime {
    fn restart_container(&self, _pattern: &str) -> bool {
        self.restart_calls.set(self.restart_calls.get() + 1);
        self.restart_ok
    }
}
