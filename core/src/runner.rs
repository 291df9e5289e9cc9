use std::path::Path;
use std::time::Duration;

use crate::EngineError;

/// Bound for queries and one-shot mutations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound for format and clean batches, which can run for minutes on slow
/// media.
pub const FORMAT_TIMEOUT: Duration = Duration::from_secs(300);

/// A fully specified external command: program, arguments and deadline.
/// Every command carries a timeout; nothing runs unbounded.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// PowerShell one-liner under the default timeout.
    pub fn powershell(command: &str) -> Self {
        Self::new(
            "powershell.exe",
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                command.to_string(),
            ],
        )
    }

    /// diskpart batch run from a script file.
    pub fn diskpart(script_path: &Path) -> Self {
        Self::new(
            "diskpart",
            vec!["/s".to_string(), script_path.display().to_string()],
        )
    }

    /// Single-line rendering used for logging and by the mock runner.
    pub fn rendered(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// Both streams joined; diskpart reports most errors on stdout.
    pub fn combined(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Single choke point for every OS interaction. The engine talks to
/// PowerShell and diskpart exclusively through this trait, so tests can
/// script the full command stream without launching a process.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powershell_spec_carries_noprofile() {
        let spec = CommandSpec::powershell("Get-Disk | ConvertTo-Json");
        assert_eq!(spec.program, "powershell.exe");
        assert_eq!(spec.args[0], "-NoProfile");
        assert_eq!(spec.args[1], "-Command");
        assert_eq!(spec.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn diskpart_spec_points_at_script() {
        let spec = CommandSpec::diskpart(Path::new("C:\\Temp\\s.txt")).with_timeout(FORMAT_TIMEOUT);
        assert_eq!(spec.program, "diskpart");
        assert_eq!(spec.args[0], "/s");
        assert!(spec.args[1].ends_with("s.txt"));
        assert_eq!(spec.timeout, FORMAT_TIMEOUT);
    }

    #[test]
    fn combined_output_skips_empty_stderr() {
        let output = CommandOutput {
            stdout: "done".to_string(),
            stderr: String::new(),
            success: true,
        };
        assert_eq!(output.combined(), "done");
    }
}
