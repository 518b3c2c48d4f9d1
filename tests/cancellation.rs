// tests/cancellation.rs

#![cfg(unix)]

use std::time::{Duration, Instant};

use dicy::rule::RuleCatalog;
use dicy::types::{Action, Command, Phase};
use dicy_test_utils::{Project, ProjectBuilder, TestStep, init_tracing, with_timeout};

/// Pid recorded by the running command in `name`, once it is complete.
fn recorded_pid(project: &Project, name: &str) -> Option<i32> {
    project.read(name).trim().parse().ok()
}

/// Whether `pid` names a live process. Zombies count as gone.
fn is_alive(pid: i32) -> bool {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        let state = stat.rsplit(')').next().unwrap_or_default().trim_start();
        return !state.starts_with('Z');
    }
    // SAFETY: signal 0 performs the existence check only.
    unsafe { libc::kill(pid, 0) == 0 }
}

async fn wait_until_gone(pid: i32) -> bool {
    for _ in 0..100 {
        if !is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn kill_terminates_the_running_command_and_fails_the_build() {
    init_tracing();
    let project = ProjectBuilder::new().build();
    let sleeper = TestStep::new("Sleeper", Command::Build, Phase::Execute).command(&[
        "sh",
        "-c",
        "sleep 30 & echo $! > child.pid; echo $$ > shell.pid; wait",
    ]);
    let runs = sleeper.runs();
    let catalog = RuleCatalog::new().with(sleeper).unwrap();
    let mut dicy = project
        .builder()
        .catalog(catalog)
        .build()
        .unwrap();
    let kill = dicy.kill_switch();

    let started = Instant::now();
    let (result, ()) = with_timeout(async {
        tokio::join!(dicy.run(&["build"]), async {
            while !kill.is_running() || recorded_pid(&project, "shell.pid").is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            kill.kill("test cancellation").await;
        })
    })
    .await;

    assert!(!result.unwrap(), "a cancelled build reports failure");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(!kill.is_running());

    let shell = recorded_pid(&project, "shell.pid").expect("shell pid recorded");
    let child = recorded_pid(&project, "child.pid").expect("child pid recorded");
    assert!(wait_until_gone(shell).await, "command process {shell} still running");
    assert!(wait_until_gone(child).await, "background child {child} still running");

    let sleeper = dicy
        .state()
        .rules()
        .find(|r| r.type_name == "Sleeper")
        .expect("rule survives cancellation");
    assert!(sleeper.has_action(Action::Run), "interrupted action stays pending");
    assert!(!sleeper.is_failed());
}

#[tokio::test]
async fn kill_without_a_build_returns_immediately() {
    init_tracing();
    let project = ProjectBuilder::new().build();
    let dicy = project.builder().catalog(RuleCatalog::new()).build().unwrap();
    with_timeout(dicy.kill_switch().kill("nothing to stop")).await;
    assert!(!dicy.kill_switch().is_running());
}

#[tokio::test]
async fn second_concurrent_build_is_refused() {
    init_tracing();
    let project = ProjectBuilder::new().build();
    let dicy = project.builder().catalog(RuleCatalog::new()).build().unwrap();
    let kill = dicy.kill_switch();

    let guard = kill.begin().unwrap();
    assert!(matches!(kill.begin(), Err(dicy::errors::DicyError::BuildInProgress)));
    drop(guard);
    assert!(kill.begin().is_ok());
}
