// Helper functions for running the external toolkit executable

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::ConvertError;

/// A fully described external process run
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Piped to standard input when present
    pub stdin: Option<Vec<u8>>,
    /// Variables removed from the child environment
    pub env_remove: Vec<&'static str>,
    pub timeout: Option<Duration>,
}

impl ProcessInvocation {
    pub fn new(program: impl AsRef<OsStr>, args: Vec<OsString>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args,
            stdin: None,
            env_remove: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_stdin(mut self, input: Option<Vec<u8>>) -> Self {
        self.stdin = input;
        self
    }

    pub fn with_env_removed(mut self, var: &'static str) -> Self {
        self.env_remove.push(var);
        self
    }

    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run a process to completion, capturing stdout and stderr in memory.
///
/// The exit status is not inspected here.
pub async fn run_output_with_timeout(invocation: ProcessInvocation) -> Result<Output, ConvertError> {
    let program = invocation.program_name();

    let mut command = TokioCommand::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in &invocation.env_remove {
        command.env_remove(var);
    }

    let mut child = command.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConvertError::ToolNotFound(program.clone()),
        _ => ConvertError::Io(e),
    })?;

    let stdin_task = match (child.stdin.take(), invocation.stdin) {
        (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
            // A tool that exits without draining stdin closes the pipe early;
            // its exit status and stderr tell the real story.
            match pipe.write_all(&input).await {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        })),
        _ => None,
    };

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ConvertError::Io(std::io::Error::other("failed to capture stdout")))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ConvertError::Io(std::io::Error::other("failed to capture stderr")))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match invocation.timeout {
        Some(limit) => match timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                if let Some(task) = stdin_task {
                    task.abort();
                }
                return Err(ConvertError::Timeout {
                    program,
                    seconds: limit.as_secs(),
                });
            }
        },
        None => child.wait().await?,
    };

    if let Some(task) = stdin_task {
        task.await.map_err(join_error)??;
    }
    let stdout = stdout_task.await.map_err(join_error)??;
    let stderr = stderr_task.await.map_err(join_error)??;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn join_error(e: tokio::task::JoinError) -> ConvertError {
    ConvertError::Io(std::io::Error::other(format!("pipe task failed: {}", e)))
}
