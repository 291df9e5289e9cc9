use std::fmt;
use std::sync::Arc;

use diskforge_core::{
    CommandOutput, CommandRunner, EngineError, FormatRequest, OpReport, FORMAT_TIMEOUT,
};

use crate::discovery::Discovery;
use crate::exec;
use crate::guard::SafetyGuard;
use crate::locks::{LockKey, OpLocks};
use crate::script::{self, DiskpartScript};

/// diskpart reports format results in prose, not exit codes. A transcript
/// containing none of these phrases is a failure even on a zero exit.
const SUCCESS_PHRASES: [&str; 3] = ["successfully", "percent complete", "complete"];

/// One step of the fallback chain, in the order the chain tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatStrategy {
    /// Wipe and re-partition the disk named in the request.
    RebuildByNumber,
    /// In-place format of the mounted volume through `select volume`.
    VolumeByLetter,
    /// Wipe and re-partition the disk the letter resolved to. Reaches
    /// media whose volume has gone RAW and no longer answers by letter.
    RebuildResolved,
}

impl fmt::Display for FormatStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatStrategy::RebuildByNumber => write!(f, "disk rebuild"),
            FormatStrategy::VolumeByLetter => write!(f, "volume format"),
            FormatStrategy::RebuildResolved => write!(f, "resolved-disk rebuild"),
        }
    }
}

/// Drives a format request through the strategy chain until one attempt
/// succeeds. A request naming a disk number goes straight to the rebuild;
/// a letter-only request tries the in-place volume format first, then
/// falls back to rebuilding whichever disk the letter resolves to.
pub struct FormatOrchestrator {
    runner: Arc<dyn CommandRunner>,
    guard: Arc<SafetyGuard>,
    locks: Arc<OpLocks>,
    discovery: Discovery,
}

impl FormatOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        guard: Arc<SafetyGuard>,
        locks: Arc<OpLocks>,
        discovery: Discovery,
    ) -> Self {
        Self {
            runner,
            guard,
            locks,
            discovery,
        }
    }

    pub async fn format(&self, request: &FormatRequest) -> Result<OpReport, EngineError> {
        request.validate()?;
        exec::validate_fs_token(&request.filesystem)?;
        let label = exec::sanitize_label(&request.label);

        if let Some(letter) = request.letter {
            self.guard.ensure_mutable(&letter.with_colon())?;
        }

        // Pin the disk identity before anything destructive runs: the
        // guard sweep and the lock key both want the whole disk whenever
        // it can be named.
        let resolved = match request.disk_number {
            Some(number) => Some(number),
            None => match request.letter {
                Some(letter) => self.discovery.resolve_disk_number(letter).await,
                None => None,
            },
        };

        let key = match (resolved, request.letter) {
            (Some(disk_number), _) => LockKey::Disk(disk_number),
            (None, Some(letter)) => LockKey::Letter(letter),
            // validate() already rejected the targetless request
            (None, None) => {
                return Err(EngineError::InvalidInput(
                    "format request names neither a drive letter nor a disk number".to_string(),
                ))
            }
        };

        let plan: &[FormatStrategy] = if request.disk_number.is_some() {
            &[FormatStrategy::RebuildByNumber]
        } else {
            &[
                FormatStrategy::VolumeByLetter,
                FormatStrategy::RebuildResolved,
            ]
        };

        let _lock = self.locks.acquire(key).await;

        // Sweep under the lock: no other operation can remount letters
        // on the target disk between the check and the first strategy.
        if let Some(disk_number) = resolved {
            let letters = self.discovery.disk_letters(disk_number).await;
            self.guard.ensure_letters_mutable(&letters)?;
        }

        let mut failures = Vec::new();
        for strategy in plan {
            match self.attempt(*strategy, request, &label, resolved).await {
                Ok(report) => {
                    log::info!("{} succeeded for {}", strategy, key);
                    return Ok(report);
                }
                Err(reason) => {
                    log::warn!("{} failed for {}: {}", strategy, key, reason);
                    failures.push(format!("{}: {}", strategy, reason));
                }
            }
        }

        Err(EngineError::FormatExhausted(format!(
            "every strategy failed for {}; the media may be in RAW state or write-protected ({})",
            key,
            failures.join("; ")
        )))
    }

    async fn attempt(
        &self,
        strategy: FormatStrategy,
        request: &FormatRequest,
        label: &str,
        resolved: Option<u32>,
    ) -> Result<OpReport, String> {
        match strategy {
            FormatStrategy::RebuildByNumber => {
                let disk_number = match request.disk_number {
                    Some(number) => number,
                    None => return Err("request carries no disk number".to_string()),
                };
                self.rebuild(disk_number, request, label).await
            }
            FormatStrategy::VolumeByLetter => {
                let letter = match request.letter {
                    Some(letter) => letter,
                    None => return Err("request carries no drive letter".to_string()),
                };
                let batch = DiskpartScript::new(
                    "format",
                    &letter.as_char().to_string(),
                    script::volume_format_script(letter, &request.filesystem, label, request.quick),
                );
                let output = batch
                    .run(self.runner.as_ref(), FORMAT_TIMEOUT)
                    .await
                    .map_err(|e| e.to_string())?;
                classify(&output)?;
                Ok(OpReport::ok(format!(
                    "Volume {} formatted as {}",
                    letter, request.filesystem
                )))
            }
            FormatStrategy::RebuildResolved => {
                let disk_number = match resolved {
                    Some(number) => number,
                    None => return Err("no disk number resolved for the letter".to_string()),
                };
                self.rebuild(disk_number, request, label).await
            }
        }
    }

    async fn rebuild(
        &self,
        disk_number: u32,
        request: &FormatRequest,
        label: &str,
    ) -> Result<OpReport, String> {
        let batch = DiskpartScript::new(
            "rebuild",
            &disk_number.to_string(),
            script::rebuild_script(
                disk_number,
                &request.filesystem,
                label,
                request.quick,
                request.letter,
            ),
        );
        let output = batch
            .run(self.runner.as_ref(), FORMAT_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;
        classify(&output)?;
        Ok(OpReport::ok(format!(
            "Disk {} formatted as {}",
            disk_number, request.filesystem
        )))
    }
}

/// Conservative transcript check: only output carrying a known success
/// phrase passes, everything else is reported as a failure reason.
fn classify(output: &CommandOutput) -> Result<(), String> {
    let transcript = output.combined();
    if !output.success {
        return Err(script::transcript_tail(&transcript));
    }
    let lower = transcript.to_lowercase();
    if SUCCESS_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        Ok(())
    } else {
        Err(format!(
            "no success marker in output: {}",
            script::transcript_tail(&transcript)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
        }
    }

    #[test]
    fn every_success_phrase_is_recognized() {
        assert!(classify(&ok("DiskPart successfully formatted the volume.")).is_ok());
        assert!(classify(&ok("  100 percent complete  ")).is_ok());
        assert!(classify(&ok("Format complete.")).is_ok());
    }

    #[test]
    fn phrase_match_ignores_case() {
        assert!(classify(&ok("DiskPart SUCCESSFULLY formatted the volume.")).is_ok());
        assert!(classify(&ok("100 PERCENT COMPLETE")).is_ok());
    }

    #[test]
    fn unrecognized_output_fails_even_on_success_exit() {
        let result = classify(&ok("Virtual Disk Service error: the volume is not online."));
        assert!(result.is_err());
        let reason = result.unwrap_err();
        assert!(reason.contains("no success marker"));
        assert!(reason.contains("not online"));
    }

    #[test]
    fn empty_output_is_a_failure() {
        assert!(classify(&ok("")).is_err());
    }

    #[test]
    fn failed_exit_fails_regardless_of_phrases() {
        let output = CommandOutput {
            stdout: "DiskPart successfully formatted the volume.".to_string(),
            stderr: "access denied".to_string(),
            success: false,
        };
        let reason = classify(&output).unwrap_err();
        assert!(reason.contains("access denied"));
    }

    #[test]
    fn failure_reason_keeps_the_transcript_tail() {
        let output = CommandOutput {
            stdout: "Microsoft DiskPart version 10.0\n\nVolume 3 is the selected volume.\nVirtual Disk Service error:\nThe operation is not supported.".to_string(),
            stderr: String::new(),
            success: false,
        };
        let reason = classify(&output).unwrap_err();
        assert!(reason.contains("not supported"));
        assert!(!reason.contains("version 10.0"));
    }
}
