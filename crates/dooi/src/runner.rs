//! Subprocess seam used by catalog listing, fetching, and dependency installs.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;

use crate::error::{DooiError, ErrorCode, Result};

/// Exit code reported when the program itself could not be spawned.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Shell, libuv and `npx` wordings for a program that does not exist.
const MISSING_PROGRAM_MARKERS: &[&str] = &[
    "command not found",
    "ENOENT",
    "No such file or directory",
    "could not determine executable to run",
];

/// A single program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// `program arg1 arg2 ...`, for logs and error details.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a finished process. A non-zero `exit_code` is not an error here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The program itself could not be started: the spawn failed, or a shell or `npx` wrapper
    /// reported one of `programs` as missing. Errors the program prints are not matched.
    pub fn is_not_found(&self, programs: &[&str]) -> bool {
        if self.exit_code == EXIT_COMMAND_NOT_FOUND {
            return true;
        }
        let names_program = programs
            .iter()
            .any(|program| !program.is_empty() && self.stderr.contains(program));
        names_program && MISSING_PROGRAM_MARKERS.iter().any(|m| self.stderr.contains(m))
    }
}

/// Runs external programs. Fails only for timeouts and unexpected I/O errors.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        tracing::debug!(
            command = %invocation.command_line(),
            cwd = %invocation.cwd.display(),
            "spawning"
        );

        let output = match tokio::time::timeout(invocation.timeout, cmd.output()).await {
            Err(_) => {
                tracing::warn!(
                    command = %invocation.command_line(),
                    timeout_ms = invocation.timeout.as_millis() as u64,
                    "command timed out"
                );
                return Err(DooiError::with_message(
                    ErrorCode::OperationTimeout,
                    format!(
                        "Command timed out after {}ms: {}",
                        invocation.timeout.as_millis(),
                        invocation.command_line()
                    ),
                )
                .detail("command", invocation.command_line())
                .detail("timeoutMs", invocation.timeout.as_millis() as u64));
            }
            Ok(Err(err)) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: format!("{}: command not found", invocation.program),
                    exit_code: EXIT_COMMAND_NOT_FOUND,
                });
            }
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok(output)) => output,
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        tracing::debug!(
            command = %invocation.command_line(),
            exit_code = result.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }
}

type Responder = Box<dyn Fn(&Invocation) -> Result<CommandOutput> + Send + Sync>;

/// In-process runner that answers from registered responders and records every invocation.
///
/// A responder answers any invocation whose arguments contain its key (`get`, `list`,
/// `install`, ...). Unmatched invocations take the next queued output, then a successful empty
/// output.
#[derive(Default)]
pub struct ScriptedRunner {
    responders: Vec<(String, Responder)>,
    queued: Mutex<VecDeque<CommandOutput>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers invocations whose arguments contain `subcommand`.
    pub fn on<F>(mut self, subcommand: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        self.responders.push((subcommand.into(), Box::new(responder)));
        self
    }

    pub fn push(&self, output: CommandOutput) {
        self.queued.lock().push_back(output);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().push(invocation.clone());

        let responder = self
            .responders
            .iter()
            .find(|(subcommand, _)| invocation.args.iter().any(|arg| arg == subcommand));
        if let Some((_, responder)) = responder {
            return responder(invocation);
        }

        Ok(self.queued.lock().pop_front().unwrap_or_default())
    }
}
