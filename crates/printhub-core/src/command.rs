// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subprocess runner for the system utilities printhub delegates to
// (CUPS, SANE, ImageMagick, Ghostscript, poppler, systemd).
//
// Programs are always spawned with an argument vector, never through a
// shell, so user-controlled values (file names, device names) cannot inject
// commands.  An allowlist policy bounds which programs may run at all.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::{PrinthubError, Result};

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub program: String,
    pub args: Vec<String>,
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr, the way a shell user would see them.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Set of program names the runner is allowed to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
}

impl CommandPolicy {
    /// The utilities the server needs in production.
    pub fn system_default() -> Self {
        Self::allow([
            "lp",
            "lpstat",
            "scanimage",
            "convert",
            "gs",
            "pdftoppm",
            "systemctl",
            "sudo",
        ])
    }

    pub fn allow<I, S>(programs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: programs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, program: &str) -> bool {
        self.allowed.contains(program)
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self::system_default()
    }
}

/// Spawns allowlisted programs with a timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    policy: CommandPolicy,
    timeout: Duration,
    sudo: bool,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            policy: CommandPolicy::system_default(),
            timeout,
            sudo: false,
        }
    }

    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prefix [`privileged_output`](Self::privileged_output) calls with `sudo -n`.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Same runner with a different timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a program and capture its output whatever the exit status.
    #[instrument(skip(self, args), fields(argc = args.len()))]
    pub async fn output(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.check_policy(program)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, ?args, "spawning command");
        let output = self.wait(program, cmd).await?;

        let captured = CommandOutput {
            program: program.to_string(),
            args: args.to_vec(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, status = ?captured.status, "command finished");
        Ok(captured)
    }

    /// Run a program and fail unless it exits successfully.
    pub async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = self.output(program, args).await?;
        if !output.success() {
            warn!(program, status = ?output.status, stderr = %output.stderr.trim(), "command failed");
            return Err(PrinthubError::CommandFailed {
                program: program.to_string(),
                status: output.status.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Run a program with its stdout redirected into `dest`.
    ///
    /// Returns the number of bytes written.  The file is left in place on
    /// failure so the caller decides whether to keep partial output.
    #[instrument(skip(self, args, dest), fields(dest = %dest.display()))]
    pub async fn run_to_file(&self, program: &str, args: &[String], dest: &Path) -> Result<u64> {
        self.check_policy(program)?;

        let file = tokio::fs::File::create(dest).await?.into_std().await;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(file)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, ?args, "spawning command with stdout redirect");
        let output = self.wait(program, cmd).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(program, status = ?output.status.code(), stderr = %stderr, "command failed");
            return Err(PrinthubError::CommandFailed {
                program: program.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        let written = tokio::fs::metadata(dest).await?.len();
        debug!(program, bytes = written, "command output captured to file");
        Ok(written)
    }

    /// Like [`output`](Self::output), escalated through `sudo -n` when the
    /// runner is configured for it.
    pub async fn privileged_output(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        if !self.sudo {
            return self.output(program, args).await;
        }
        self.check_policy(program)?;
        let mut sudo_args = Vec::with_capacity(args.len() + 2);
        sudo_args.push("-n".to_string());
        sudo_args.push(program.to_string());
        sudo_args.extend_from_slice(args);
        self.output("sudo", &sudo_args).await
    }

    /// Privileged variant of [`run`](Self::run).
    pub async fn privileged_run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = self.privileged_output(program, args).await?;
        if !output.success() {
            return Err(PrinthubError::CommandFailed {
                program: program.to_string(),
                status: output.status.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    fn check_policy(&self, program: &str) -> Result<()> {
        if self.policy.allows(program) {
            Ok(())
        } else {
            warn!(program, "command rejected by policy");
            Err(PrinthubError::CommandDenied(program.to_string()))
        }
    }

    async fn wait(&self, program: &str, mut cmd: Command) -> Result<std::process::Output> {
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(PrinthubError::Command {
                program: program.to_string(),
                detail: e.to_string(),
            }),
            Err(_) => {
                warn!(program, secs = self.timeout.as_secs(), "command timed out");
                Err(PrinthubError::CommandTimeout {
                    program: program.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Convenience for building argument vectors from string literals.
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
