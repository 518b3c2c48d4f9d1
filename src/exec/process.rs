// src/exec/process.rs

//! Run one external command to completion or cancellation.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::KillToken;
use crate::exec::command::{CommandLine, CommandSpec, ExecError, ProcessOutput};
use crate::exec::registry::{ProcessRegistry, Registration, terminate_group};

/// Spawn `spec` under `root`, wait for it, and collect the requested
/// streams.
///
/// If the kill token fires first, the child's process group is sent
/// `SIGTERM`, the child is killed and [`ExecError::Cancelled`] is returned.
pub async fn run_command(
    spec: &CommandSpec,
    root: &Path,
    env: &[(String, String)],
    registry: &ProcessRegistry,
    token: &KillToken,
) -> Result<ProcessOutput, ExecError> {
    let program = spec.program().to_string();

    let mut cmd = match &spec.command {
        CommandLine::Argv(args) => {
            let mut c = Command::new(args.first().map(String::as_str).unwrap_or_default());
            c.args(args.iter().skip(1));
            c
        }
        CommandLine::Shell(line) if cfg!(windows) => {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(line);
            c
        }
        CommandLine::Shell(line) => {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            c
        }
    };

    cmd.current_dir(root.join(&spec.cwd))
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    info!(command = %spec, cwd = %spec.cwd, "starting process");

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;
    let pid = child.id();
    let _registration = Registration::new(registry, pid);

    let stdout = child
        .stdout
        .take()
        .map(|s| collect_lines(s, program.clone(), "stdout", spec.capture_stdout));
    let stderr = child
        .stderr
        .take()
        .map(|s| collect_lines(s, program.clone(), "stderr", spec.capture_stderr));

    tokio::select! {
        status = child.wait() => {
            let stdout = join_output(stdout).await;
            let stderr = join_output(stderr).await;
            let status = match status {
                Ok(status) => status,
                Err(source) => return Err(ExecError::Spawn { program, source }),
            };

            debug!(program = %program, code = ?status.code(), "process exited");
            if status.success() {
                Ok(ProcessOutput { stdout, stderr })
            } else {
                Err(ExecError::Failed {
                    program,
                    code: status.code(),
                    signal: exit_signal(&status),
                    stdout,
                    stderr,
                })
            }
        }

        reason = token.cancelled() => {
            info!(program = %program, "cancellation requested; terminating process");
            if let Some(pid) = pid {
                terminate_group(pid);
            }
            if let Err(e) = child.kill().await {
                warn!(program = %program, error = %e, "failed to kill child process");
            }
            Err(ExecError::Cancelled { program, reason })
        }
    }
}

fn collect_lines<R>(stream: R, program: String, name: &'static str, keep: bool) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut text = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if keep {
                text.push_str(&line);
                text.push('\n');
            } else {
                debug!(program = %program, "{name}: {line}");
            }
        }
        text
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(h) => h.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
