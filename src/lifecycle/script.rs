//! Startup script supervision.
//!
//! # Responsibilities
//! - Run the configured command once through the platform shell
//! - Share the terminal (stdout/stderr are inherited)
//! - Report the script's exit code through the exit channel
//!
//! # Design Decisions
//! - The script's lifetime bounds the server's: when it ends, the process ends
//! - A script that cannot be spawned is a startup error
//! - Termination by signal reports exit code 1

use std::io;

use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::ScriptConfig;
use crate::lifecycle::shutdown::{ExitHandle, ExitReason};

#[cfg(windows)]
const DEFAULT_SHELL: &str = "powershell.exe";
#[cfg(not(windows))]
const DEFAULT_SHELL: &str = "bash";

/// Runs the startup command and reports when it ends.
#[derive(Debug, Clone)]
pub struct ScriptSupervisor {
    command: String,
    shell: String,
}

impl ScriptSupervisor {
    pub fn new(config: &ScriptConfig) -> Self {
        Self {
            command: config.command.clone(),
            shell: config
                .shell
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
        }
    }

    fn shell_command(&self) -> Command {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(shell_flag(&self.shell)).arg(&self.command);
        cmd
    }

    /// Spawn the script. The returned task reports `ExitReason::ScriptExited`
    /// once the script terminates.
    pub fn spawn(&self, exits: ExitHandle) -> io::Result<JoinHandle<()>> {
        let mut child = self.shell_command().spawn()?;
        tracing::info!(shell = %self.shell, pid = ?child.id(), "Startup script running");

        Ok(tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!("Command exited successfully");
                    0
                }
                Ok(status) => {
                    tracing::warn!(status = %status, "Command exited with error");
                    status.code().unwrap_or(1)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to wait for command");
                    1
                }
            };
            exits.exit(ExitReason::ScriptExited(code));
        }))
    }
}

fn shell_flag(shell: &str) -> &'static str {
    let lower = shell.to_ascii_lowercase();
    if lower.contains("powershell") || lower.contains("pwsh") {
        "-Command"
    } else if lower.ends_with("cmd") || lower.ends_with("cmd.exe") {
        "/C"
    } else {
        "-c"
    }
}
