use std::sync::Arc;

use diskforge_core::{
    gb_to_bytes, CommandRunner, CommandSpec, DriveLetter, EngineError, OpReport, FORMAT_TIMEOUT,
};

use crate::discovery::Discovery;
use crate::exec;
use crate::guard::SafetyGuard;
use crate::locks::{LockKey, OpLocks};
use crate::parse::{self, AccessPathsRecord};

/// Drive-letter and partition management for one attached disk.
pub struct PartitionManager {
    runner: Arc<dyn CommandRunner>,
    guard: Arc<SafetyGuard>,
    locks: Arc<OpLocks>,
    discovery: Discovery,
}

impl PartitionManager {
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

    /// Assign a letter to a partition. A protected letter is refused
    /// before anything reaches the shell.
    ///
    /// The availability check is query-then-act: the platform offers no
    /// atomic reservation, so a letter can still be taken between the
    /// check and the assignment. The per-disk lock serializes competing
    /// assignments from this process, which is the realistic collision
    /// source.
    pub async fn assign_letter(
        &self,
        disk_number: u32,
        partition_number: u32,
        letter: DriveLetter,
    ) -> Result<OpReport, EngineError> {
        self.guard.ensure_mutable(&letter.with_colon())?;

        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        if self.letter_occupied(letter).await {
            return Err(EngineError::LetterInUse(letter.with_colon()));
        }

        let command = format!(
            "Add-PartitionAccessPath -DiskNumber {} -PartitionNumber {} -AccessPath {}",
            disk_number,
            partition_number,
            exec::ps_quote(&letter.with_colon())
        );
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::LetterAssignment(format!(
                "could not assign {} to disk {} partition {}: {}",
                letter,
                disk_number,
                partition_number,
                output.stderr.trim()
            )));
        }

        log::info!(
            "assigned {} to disk {} partition {}",
            letter,
            disk_number,
            partition_number
        );
        Ok(OpReport::ok(format!("Drive letter {} assigned", letter)))
    }

    /// Remove a partition's drive letter. A partition that has no letter
    /// is a no-op success, not an error; a partition mounted at a
    /// protected letter is refused.
    pub async fn remove_letter(
        &self,
        disk_number: u32,
        partition_number: u32,
    ) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let paths = self.access_paths(disk_number, partition_number).await?;
        let letter_path = match paths.iter().find(|p| looks_like_letter_path(p)) {
            Some(path) => path.clone(),
            None => {
                return Ok(OpReport::ok("No drive letter to remove"));
            }
        };
        self.guard.ensure_mutable(letter_path.trim_end_matches('\\'))?;

        let command = format!(
            "Remove-PartitionAccessPath -DiskNumber {} -PartitionNumber {} -AccessPath {}",
            disk_number,
            partition_number,
            exec::ps_quote(&letter_path)
        );
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not remove letter from disk {} partition {}: {}",
                disk_number,
                partition_number,
                output.stderr.trim()
            )));
        }

        Ok(OpReport::ok("Drive letter removed"))
    }

    /// Create a partition of `size_gb` and format it in one pipeline.
    pub async fn create_partition(
        &self,
        disk_number: u32,
        size_gb: f64,
        filesystem: &str,
        label: &str,
    ) -> Result<OpReport, EngineError> {
        exec::validate_fs_token(filesystem)?;
        if !size_gb.is_finite() || size_gb <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "partition size must be positive, got {}",
                size_gb
            )));
        }
        let label = exec::sanitize_label(label);
        let size_bytes = gb_to_bytes(size_gb);

        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let command = format!(
            "New-Partition -DiskNumber {} -Size {} -AssignDriveLetter | Format-Volume -FileSystem {} -NewFileSystemLabel {} -Confirm:$false",
            disk_number,
            size_bytes,
            filesystem,
            exec::ps_quote(&label)
        );
        let spec = CommandSpec::powershell(&command).with_timeout(FORMAT_TIMEOUT);
        let output = self.runner.run(&spec).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not create partition on disk {}: {}",
                disk_number,
                output.stderr.trim()
            )));
        }

        log::info!(
            "created {:.2} GB {} partition on disk {}",
            size_gb,
            filesystem,
            disk_number
        );
        Ok(OpReport::ok("Partition created"))
    }

    /// Delete a partition. Every letter the disk hosts is checked against
    /// the guard under the disk lock, so a disk carrying the protected
    /// volume cannot lose partitions through this path.
    pub async fn delete_partition(
        &self,
        disk_number: u32,
        partition_number: u32,
    ) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let letters = self.discovery.disk_letters(disk_number).await;
        self.guard.ensure_letters_mutable(&letters)?;

        let command = format!(
            "Remove-Partition -DiskNumber {} -PartitionNumber {} -Confirm:$false",
            disk_number, partition_number
        );
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not delete partition {} on disk {}: {}",
                partition_number,
                disk_number,
                output.stderr.trim()
            )));
        }

        Ok(OpReport::ok("Partition deleted"))
    }

    /// Letters currently free for assignment: the usable space minus
    /// mounted drives and protected volumes, computed here rather than
    /// in the shell. A failed query degrades to the fixed conservative
    /// fallback list.
    pub async fn available_letters(&self) -> Vec<DriveLetter> {
        let command = "(Get-PSDrive -PSProvider FileSystem).Name | ConvertTo-Json";
        let output = match self.runner.run(&CommandSpec::powershell(command)).await {
            Ok(output) if output.success => output,
            Ok(output) => {
                log::warn!(
                    "drive letter query failed, using fallback: {}",
                    output.stderr.trim()
                );
                return DriveLetter::fallback_letters();
            }
            Err(e) => {
                log::warn!("drive letter query failed, using fallback: {}", e);
                return DriveLetter::fallback_letters();
            }
        };

        let names: Vec<String> = match parse::parse_records(&output.stdout) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("drive letter list unreadable, using fallback: {}", e);
                return DriveLetter::fallback_letters();
            }
        };

        let used: Vec<DriveLetter> = names
            .iter()
            .filter_map(|name| DriveLetter::parse(name).ok())
            .collect();
        free_letters(&used, &self.guard)
    }

    async fn letter_occupied(&self, letter: DriveLetter) -> bool {
        let command = format!(
            "Get-Volume -DriveLetter {} -ErrorAction SilentlyContinue",
            letter.as_char()
        );
        match self.runner.run(&CommandSpec::powershell(&command)).await {
            Ok(output) => output.success && !output.stdout.trim().is_empty(),
            // a failed check means the letter is probably free; the
            // assignment itself will say otherwise
            Err(_) => false,
        }
    }

    async fn access_paths(
        &self,
        disk_number: u32,
        partition_number: u32,
    ) -> Result<Vec<String>, EngineError> {
        let command = format!(
            "Get-Partition -DiskNumber {} -PartitionNumber {} | Select-Object AccessPaths | ConvertTo-Json",
            disk_number, partition_number
        );
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not read access paths of disk {} partition {}: {}",
                disk_number,
                partition_number,
                output.stderr.trim()
            )));
        }
        let records: Vec<AccessPathsRecord> = parse::parse_records(&output.stdout)?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|r| r.access_paths)
            .unwrap_or_default())
    }
}

/// Access paths mix drive letters ("E:\") with volume GUID paths; only
/// the letter form is a removable mount point here.
fn looks_like_letter_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes.get(2).map_or(true, |b| *b == b'\\')
}

fn free_letters(used: &[DriveLetter], guard: &SafetyGuard) -> Vec<DriveLetter> {
    DriveLetter::usable_space()
        .filter(|letter| !used.contains(letter))
        .filter(|letter| !guard.is_protected(&letter.with_colon()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_paths_are_recognized() {
        assert!(looks_like_letter_path("E:\\"));
        assert!(looks_like_letter_path("E:"));
        assert!(!looks_like_letter_path("\\\\?\\Volume{3b2f}\\"));
        assert!(!looks_like_letter_path(""));
        assert!(!looks_like_letter_path("EF"));
    }

    #[test]
    fn free_letters_excludes_used_and_protected() {
        let guard = SafetyGuard::default();
        let used = vec![
            DriveLetter::parse("D").unwrap(),
            DriveLetter::parse("E").unwrap(),
        ];
        let free = free_letters(&used, &guard);

        assert!(!free.iter().any(|l| l.as_char() == 'C'));
        assert!(!free.iter().any(|l| l.as_char() == 'D'));
        assert!(!free.iter().any(|l| l.as_char() == 'E'));
        assert!(free.iter().any(|l| l.as_char() == 'F'));
        assert!(free.iter().any(|l| l.as_char() == 'Z'));
        // 24 usable minus C, D and E
        assert_eq!(free.len(), 21);
    }

    #[test]
    fn nothing_used_still_hides_protected() {
        let free = free_letters(&[], &SafetyGuard::default());
        assert_eq!(free.len(), 23);
        assert_eq!(free[0].as_char(), 'D');
    }
}
