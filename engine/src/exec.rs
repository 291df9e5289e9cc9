use std::process::Stdio;

use async_trait::async_trait;
use diskforge_core::{CommandOutput, CommandRunner, CommandSpec, EngineError, MAX_LABEL_LEN};
use tokio::process::Command;

/// Process-backed runner: the only place a child process is spawned.
/// Output is captured in full; each command's timeout is enforced here,
/// and an expired child is killed rather than left running.
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, EngineError> {
        log::debug!("running: {}", spec.rendered());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let child = cmd.spawn().map_err(|e| {
            EngineError::Command(format!("failed to start {}: {}", spec.program, e))
        })?;

        // kill_on_drop reaps the child when the timeout drops this future
        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                EngineError::Command(format!("{} did not complete: {}", spec.program, e))
            })?,
            Err(_) => {
                log::warn!(
                    "{} exceeded its {}s timeout, killing",
                    spec.program,
                    spec.timeout.as_secs()
                );
                return Err(EngineError::Timeout(format!(
                    "{} exceeded {}s",
                    spec.program,
                    spec.timeout.as_secs()
                )));
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

/// Escape a value for a single-quoted PowerShell string.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Filesystem tokens are spliced into both PowerShell and diskpart lines,
/// so only plain alphanumerics are allowed through.
pub fn validate_fs_token(filesystem: &str) -> Result<(), EngineError> {
    if filesystem.is_empty() || !filesystem.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::InvalidInput(format!(
            "invalid filesystem name: {:?}",
            filesystem
        )));
    }
    Ok(())
}

/// Reduce a label to characters that cannot break out of a quoted
/// diskpart argument, uppercased and capped at the FAT limit.
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .take(MAX_LABEL_LEN)
        .collect::<String>()
        .trim()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_doubles_single_quotes() {
        assert_eq!(ps_quote("E:"), "'E:'");
        assert_eq!(ps_quote("it's"), "'it''s'");
    }

    #[test]
    fn filesystem_tokens_must_be_alphanumeric() {
        assert!(validate_fs_token("FAT32").is_ok());
        assert!(validate_fs_token("exFAT").is_ok());
        assert!(validate_fs_token("NTFS").is_ok());
        assert!(validate_fs_token("").is_err());
        assert!(validate_fs_token("fs; clean").is_err());
        assert!(validate_fs_token("fat 32").is_err());
    }

    #[test]
    fn labels_are_stripped_capped_and_uppercased() {
        assert_eq!(sanitize_label("my usb"), "MY USB");
        assert_eq!(sanitize_label("data\"quote"), "DATAQUOTE");
        assert_eq!(sanitize_label("a-very-long-label-name"), "A-VERY-LONG");
        assert_eq!(sanitize_label(""), "");
    }
}
