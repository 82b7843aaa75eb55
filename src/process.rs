//! External process helpers.
//!
//! [`Cmd`] runs a single host tool and captures its output. [`Pipeline`]
//! chains several tools stdin-to-stdout, the way a shell `a | b | c` would,
//! without going through a shell. Both take an optional working directory
//! that applies to the spawned processes only; the current directory of this
//! process is never changed.

use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Check whether a command can be found on `PATH`.
pub fn exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for a single external command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            dir: None,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Run the command with `dir` as its working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Message used as the error context when the command fails.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Human-readable rendering of the command line, for logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }

    fn failure_message(&self, detail: &str) -> String {
        match &self.error_msg {
            Some(msg) => format!("{}: {}", msg, detail),
            None => detail.to_string(),
        }
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn run(&self) -> Result<CommandResult> {
        debug!(command = %self.display(), "running");
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| self.failure_message(&format!("spawning `{}`", self.display())))?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            bail!(self.failure_message(&format!(
                "`{}` exited with {}: {}",
                self.display(),
                result.status,
                result.stderr.trim()
            )));
        }
        Ok(result)
    }
}

/// A chain of commands connected stdout-to-stdin.
///
/// Every stage is checked: the pipeline fails if any process exits
/// non-zero, not only the last one.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<Cmd>,
    dir: Option<PathBuf>,
    stdin_file: Option<PathBuf>,
    stdout_file: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, cmd: Cmd) -> Self {
        self.stages.push(cmd);
        self
    }

    /// Working directory applied to every stage that does not set its own.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Feed the first stage from a file.
    pub fn stdin_file(mut self, path: &Path) -> Self {
        self.stdin_file = Some(path.to_path_buf());
        self
    }

    /// Write the last stage's stdout into a file (created or truncated).
    pub fn stdout_file(mut self, path: &Path) -> Self {
        self.stdout_file = Some(path.to_path_buf());
        self
    }

    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn display(&self) -> String {
        let mut rendered = self
            .stages
            .iter()
            .map(Cmd::display)
            .collect::<Vec<_>>()
            .join(" | ");
        if let Some(stdin) = &self.stdin_file {
            rendered = format!("{} < {}", rendered, stdin.display());
        }
        if let Some(stdout) = &self.stdout_file {
            rendered = format!("{} > {}", rendered, stdout.display());
        }
        rendered
    }

    fn failure_message(&self, detail: &str) -> String {
        match &self.error_msg {
            Some(msg) => format!("{}: {}", msg, detail),
            None => detail.to_string(),
        }
    }

    pub fn run(&self) -> Result<()> {
        if self.stages.is_empty() {
            bail!(self.failure_message("empty command pipeline"));
        }
        debug!(pipeline = %self.display(), "running");

        let mut stdin = match &self.stdin_file {
            Some(path) => Stdio::from(File::open(path).with_context(|| {
                self.failure_message(&format!("opening '{}'", path.display()))
            })?),
            None => Stdio::null(),
        };

        // Opened before anything is spawned so a bad output path runs nothing.
        let mut stdout_file = match &self.stdout_file {
            Some(path) => Some(File::create(path).with_context(|| {
                self.failure_message(&format!("creating '{}'", path.display()))
            })?),
            None => None,
        };

        let mut children: Vec<(String, Child, JoinHandle<String>)> = Vec::new();
        let last = self.stages.len() - 1;

        for (index, stage) in self.stages.iter().enumerate() {
            let mut command = stage.command();
            if stage.dir.is_none() {
                if let Some(dir) = &self.dir {
                    command.current_dir(dir);
                }
            }

            let stdout = if index == last {
                match stdout_file.take() {
                    Some(file) => Stdio::from(file),
                    None => Stdio::null(),
                }
            } else {
                Stdio::piped()
            };

            let spawned = command
                .stdin(stdin)
                .stdout(stdout)
                .stderr(Stdio::piped())
                .spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(err) => {
                    reap(children);
                    return Err(err).with_context(|| {
                        self.failure_message(&format!("spawning `{}`", stage.display()))
                    });
                }
            };

            stdin = match child.stdout.take() {
                Some(out) => Stdio::from(out),
                None => Stdio::null(),
            };
            let stderr_reader = drain_stderr(&mut child);
            children.push((stage.display(), child, stderr_reader));
        }

        let mut failures = Vec::new();
        let mut wait_error = None;
        for (display, mut child, stderr_reader) in children {
            let waited = child.wait();
            if waited.is_err() {
                let _ = child.kill();
            }
            let stderr = stderr_reader.join().unwrap_or_default();
            match waited {
                Ok(status) if !status.success() => {
                    failures.push(format!("`{}` exited with {}: {}", display, status, stderr.trim()));
                }
                Ok(_) => {}
                Err(err) => {
                    wait_error.get_or_insert((display, err));
                }
            }
        }

        // Every child has been waited on or killed by now.
        if let Some((display, err)) = wait_error {
            return Err(err)
                .with_context(|| self.failure_message(&format!("waiting for `{}`", display)));
        }
        if !failures.is_empty() {
            bail!(self.failure_message(&failures.join("; ")));
        }
        Ok(())
    }
}

fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf);
        }
        buf
    })
}

fn reap(children: Vec<(String, Child, JoinHandle<String>)>) {
    for (_, mut child, reader) in children {
        let _ = child.kill();
        let _ = child.wait();
        let _ = reader.join();
    }
}
