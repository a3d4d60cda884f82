// src/exec/task_runner.rs

//! Shell-command task body.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::parse_duration;
use crate::exec::TaskBody;
use crate::trigger::BoxFuture;
use crate::types::{Event, Value};

/// Runs `sh -c <cmd>` (or `cmd /C` on Windows) once per event.
///
/// The process sees `CADENCE_TASK`, `CADENCE_EVENT_SEQ` and `CADENCE_EVENT`
/// (the event value rendered as text) in its environment. Its result is
/// derived from stdout with [`value_from_stdout`]; a non-zero exit status is
/// a failure.
///
/// If the future is dropped (scheduler shutdown) the child is killed.
#[derive(Debug, Clone)]
pub struct ShellBody {
    cmd: String,
}

impl ShellBody {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl TaskBody for ShellBody {
    fn run<'a>(&'a self, task: &'a str, event: Event) -> BoxFuture<'a, Result<Value>> {
        Box::pin(run_command(task, &self.cmd, event))
    }
}

async fn run_command(task: &str, cmd_line: &str, event: Event) -> Result<Value> {
    info!(task = %task, seq = event.seq, cmd = %cmd_line, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.env("CADENCE_TASK", task)
        .env("CADENCE_EVENT_SEQ", event.seq.to_string())
        .env("CADENCE_EVENT", event.value.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let task_name = task.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %task_name, "stderr: {}", line);
            }
        });
    }

    let mut output = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("reading stdout of task '{task}'"))?
        {
            debug!(task = %task, "stdout: {}", line);
            output.push(line);
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{task}'"))?;
    let code = status.code().unwrap_or(-1);

    info!(
        task = %task,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if !status.success() {
        bail!("task '{task}' exited with status {code}");
    }

    Ok(value_from_stdout(&output))
}

/// Derive a task result from captured stdout lines.
///
/// - A last non-empty line that parses as a duration (`"250ms"`, `"3s"`)
///   becomes `Value::Duration`, which lets a command steer a recurrent
///   trigger.
/// - Any other output becomes `Value::Text` of the trimmed output.
/// - No output becomes `Value::Unit`.
pub fn value_from_stdout(lines: &[String]) -> Value {
    let Some(last) = lines.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()) else {
        return Value::Unit;
    };

    if let Ok(duration) = parse_duration(last) {
        return Value::Duration(duration);
    }

    Value::Text(lines.join("\n").trim().to_string())
}
