//! Supervision scenarios against real processes.

#![cfg(unix)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use warden_output::{ExitEvent, LineBuffer, OutputSinks, StreamType};
use warden_spec::{ProcessSpec, StopBehavior, SupervisionOptions};
use warden_supervisor::{ProcessHandle, ProcessState, RestartDecision, Supervisor};

const SETTLE: Duration = Duration::from_secs(15);

fn sh(script: &str, options: SupervisionOptions) -> ProcessSpec {
    ProcessSpec::new(format!("/bin/sh -c '{}'", script), options).unwrap()
}

async fn terminal(handle: &ProcessHandle) {
    tokio::time::timeout(SETTLE, handle.wait_terminal())
        .await
        .expect("process did not reach terminal state");
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(SETTLE, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn last_reason(handle: &ProcessHandle) -> Option<String> {
    handle.history().last().and_then(|t| t.reason.clone())
}

#[tokio::test]
async fn clean_exit_is_not_restarted() {
    let handle = ProcessHandle::new(sh(
        "exit 0",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            acceptable_exit_codes: vec![0],
            max_retries: 3,
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(handle.retry_count(), 1);
    assert_eq!(handle.generation(), 1);
    assert_eq!(handle.exit_code(), 0);
    assert_eq!(last_reason(&handle), Some(RestartDecision::CleanExit.to_string()));
}

#[tokio::test]
async fn failing_process_is_restarted_until_budget_is_spent() {
    let events: Arc<Mutex<Vec<ExitEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);

    let handle = ProcessHandle::new(sh(
        "exit 1",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            acceptable_exit_codes: vec![0],
            max_retries: 2,
            sinks: OutputSinks::new().on_exit(move |event| sink_events.lock().push(event.clone())),
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(handle.state(), ProcessState::Terminal);
    assert_eq!(handle.generation(), 3);
    assert_eq!(handle.retry_count(), 3);
    assert_eq!(handle.exit_code(), 1);
    assert_eq!(
        last_reason(&handle),
        Some(RestartDecision::RetriesExhausted.to_string())
    );

    let events = events.lock();
    let seen: Vec<(u64, u32, i32)> = events
        .iter()
        .map(|e| (e.generation, e.retry_count, e.exit_code))
        .collect();
    assert_eq!(seen, vec![(1, 1, 1), (2, 2, 1), (3, 3, 1)]);
}

#[tokio::test]
async fn auto_restart_disabled_goes_terminal() {
    let handle = ProcessHandle::new(sh(
        "exit 1",
        SupervisionOptions {
            auto_start: true,
            auto_restart: false,
            max_retries: 10,
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(handle.generation(), 1);
    assert_eq!(handle.retry_count(), 1);
    assert_eq!(handle.exit_code(), 1);
}

#[tokio::test]
async fn acceptable_exit_code_suppresses_restart() {
    let handle = ProcessHandle::new(sh(
        "exit 3",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            acceptable_exit_codes: vec![0, 3],
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(handle.generation(), 1);
    assert_eq!(handle.exit_code(), 3);
}

#[tokio::test]
async fn kill_twice_on_terminal_handle_is_ok() {
    let handle = ProcessHandle::new(sh(
        "exit 5",
        SupervisionOptions {
            auto_start: true,
            ..Default::default()
        },
    ))
    .unwrap();
    terminal(&handle).await;

    handle.kill().unwrap();
    handle.kill().unwrap();
    handle.stop().unwrap();
    assert_eq!(handle.exit_code(), 5);
    assert_eq!(handle.state(), ProcessState::Terminal);
}

#[tokio::test]
async fn environment_overrides_reach_the_child() {
    let output = LineBuffer::new(16);
    let mut environment = BTreeMap::new();
    environment.insert("PATH".to_string(), "/custom".to_string());
    environment.insert("WARDEN_TEST_VALUE".to_string(), "a b=c".to_string());

    let handle = ProcessHandle::new(sh(
        r#"echo "$PATH"; echo "$WARDEN_TEST_VALUE""#,
        SupervisionOptions {
            auto_start: true,
            environment,
            sinks: OutputSinks::new().on_stdout(output.callback()),
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(output.texts(StreamType::Stdout), vec!["/custom", "a b=c"]);
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker"), b"x").unwrap();

    let handle = ProcessHandle::new(sh(
        "test -f marker",
        SupervisionOptions {
            auto_start: true,
            working_directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(handle.exit_code(), 0);
}

#[tokio::test]
async fn stop_suppresses_restart_by_default() {
    let handle = ProcessHandle::new(sh(
        "exec sleep 30",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            max_retries: 5,
            ..Default::default()
        },
    ))
    .unwrap();
    assert_eq!(handle.state(), ProcessState::Running);

    handle.stop().unwrap();
    terminal(&handle).await;
    assert_eq!(handle.generation(), 1);
    assert_eq!(handle.retry_count(), 1);
    assert_eq!(handle.exit_code(), 128 + 15);
    assert_eq!(
        last_reason(&handle),
        Some(RestartDecision::StopRequested.to_string())
    );
}

#[tokio::test]
async fn stop_under_exit_policy_restarts() {
    let handle = ProcessHandle::new(sh(
        "exec sleep 30",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            max_retries: 5,
            stop_behavior: StopBehavior::ExitPolicy,
            ..Default::default()
        },
    ))
    .unwrap();

    handle.stop().unwrap();
    wait_until(|| handle.generation() == 2 && handle.state() == ProcessState::Running).await;
    assert_eq!(handle.retry_count(), 1);

    handle.close();
    handle.kill().unwrap();
    terminal(&handle).await;
    assert_eq!(handle.generation(), 2);
}

#[tokio::test]
async fn custom_sink_sees_blank_lines() {
    let output = LineBuffer::new(16);
    let handle = ProcessHandle::new(sh(
        r#"printf "a\n\n  \nb\n"; printf "err\n" >&2"#,
        SupervisionOptions {
            auto_start: true,
            sinks: OutputSinks::new()
                .on_stdout(output.callback())
                .on_stderr(output.callback()),
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    assert_eq!(output.texts(StreamType::Stdout), vec!["a", "", "  ", "b"]);
    assert_eq!(output.texts(StreamType::Stderr), vec!["err"]);
    assert!(output.lines().iter().all(|l| l.generation == 1));
}

#[tokio::test]
async fn output_of_each_generation_stays_separate() {
    let output = LineBuffer::new(64);
    let handle = ProcessHandle::new(sh(
        "echo start; echo end; exit 1",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            max_retries: 2,
            sinks: OutputSinks::new().on_stdout(output.callback()),
            ..Default::default()
        },
    ))
    .unwrap();

    terminal(&handle).await;
    let lines: Vec<(u64, String)> = output
        .lines()
        .into_iter()
        .map(|l| (l.generation, l.line))
        .collect();
    let expected: Vec<(u64, String)> = (1..=3)
        .flat_map(|g| [(g, "start".to_string()), (g, "end".to_string())])
        .collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn launch_failure_leaves_handle_idle() {
    let handle = ProcessHandle::new(
        ProcessSpec::new("/definitely/not/here --flag", SupervisionOptions::default()).unwrap(),
    )
    .unwrap();

    let err = handle.start().unwrap_err();
    assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    assert_eq!(handle.state(), ProcessState::Idle);
    assert_eq!(handle.generation(), 0);
    assert_eq!(handle.retry_count(), 0);
}

#[tokio::test]
async fn auto_start_failure_is_returned_from_new() {
    let spec = ProcessSpec::new(
        "/definitely/not/here",
        SupervisionOptions {
            auto_start: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(ProcessHandle::new(spec).is_err());
}

#[tokio::test]
async fn dropped_handle_is_not_relaunched() {
    let generations = Arc::new(Mutex::new(Vec::new()));
    let sink_generations = Arc::clone(&generations);

    let handle = ProcessHandle::new(sh(
        "sleep 0.2; exit 1",
        SupervisionOptions {
            auto_start: true,
            auto_restart: true,
            max_retries: 5,
            sinks: OutputSinks::new()
                .on_exit(move |event| sink_generations.lock().push(event.generation)),
            ..Default::default()
        },
    ))
    .unwrap();
    drop(handle);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(*generations.lock(), vec![1]);
}

#[tokio::test]
async fn shutdown_all_kills_stubborn_processes() {
    let supervisor = Supervisor::new();
    supervisor
        .create(sh(
            "exec sleep 30",
            SupervisionOptions {
                name: Some("polite".to_string()),
                auto_start: true,
                auto_restart: true,
                ..Default::default()
            },
        ))
        .unwrap();
    supervisor
        .create(sh(
            r#"trap "" TERM; while true; do sleep 1; done"#,
            SupervisionOptions {
                name: Some("stubborn".to_string()),
                auto_start: true,
                auto_restart: true,
                stop_behavior: StopBehavior::ExitPolicy,
                ..Default::default()
            },
        ))
        .unwrap();

    // Give the stubborn shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let killed = supervisor.shutdown_all(Duration::from_millis(500)).await;
    assert_eq!(killed, 1);

    for handle in supervisor.list() {
        terminal(&handle).await;
        assert_eq!(handle.generation(), 1);
    }
    assert_eq!(supervisor.get("stubborn").unwrap().exit_code(), 128 + 9);
}
