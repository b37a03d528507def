/*!
 * Privileged Shell
 * Runs radio commands as root, directly or through non-interactive sudo
 */

use std::process::{Command, Stdio};

use nix::unistd::geteuid;

use super::{ShellExecutor, SystemError};

pub struct PrivilegedShell {
    use_sudo: bool,
}

impl PrivilegedShell {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn is_root() -> bool {
        geteuid().is_root()
    }

    fn sudo_available() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn command_for(&self, command: &str) -> Command {
        let mut cmd = if Self::is_root() {
            Command::new("sh")
        } else {
            let mut sudo = Command::new("sudo");
            sudo.args(["-n", "sh"]);
            sudo
        };
        cmd.arg("-c").arg(command);
        cmd
    }

    pub fn run(&self, command: &str) -> Result<(), SystemError> {
        let output = self.command_for(command).stdin(Stdio::null()).output()?;

        if !output.status.success() {
            return Err(SystemError::CommandFailed {
                command: command.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

impl ShellExecutor for PrivilegedShell {
    fn has_access(&self) -> bool {
        Self::is_root() || (self.use_sudo && Self::sudo_available())
    }

    fn execute(&self, command: &str) {
        match self.run(command) {
            Ok(()) => tracing::debug!("Executed shell command: {}", command),
            Err(e) => tracing::warn!("Shell command failed: {}", e),
        }
    }
}
