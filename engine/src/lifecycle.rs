use std::sync::Arc;

use diskforge_core::{
    CommandRunner, CommandSpec, EngineError, OpReport, PartitionStyle, FORMAT_TIMEOUT,
};

use crate::discovery::Discovery;
use crate::exec;
use crate::guard::SafetyGuard;
use crate::locks::{LockKey, OpLocks};
use crate::script::{self, DiskpartScript};

/// Whole-disk state transitions: online/read-write toggles,
/// initialization, the destructive clean, and the PowerShell rebuild
/// recovery path.
pub struct Lifecycle {
    runner: Arc<dyn CommandRunner>,
    guard: Arc<SafetyGuard>,
    locks: Arc<OpLocks>,
    discovery: Discovery,
}

impl Lifecycle {
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

    /// Bring a disk online. Idempotent: an online disk stays online.
    pub async fn set_online(&self, disk_number: u32) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let command = format!("Set-Disk -Number {} -IsOffline $false", disk_number);
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not bring disk {} online: {}",
                disk_number,
                output.stderr.trim()
            )));
        }
        Ok(OpReport::ok("Disk is now online"))
    }

    /// Clear a disk's read-only flag. Idempotent.
    pub async fn set_read_write(&self, disk_number: u32) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let command = format!("Set-Disk -Number {} -IsReadOnly $false", disk_number);
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not clear read-only on disk {}: {}",
                disk_number,
                output.stderr.trim()
            )));
        }
        Ok(OpReport::ok("Disk is now read-write"))
    }

    /// Give a RAW disk a partition table. Already-initialized disks are
    /// a no-op thanks to SilentlyContinue.
    pub async fn initialize(
        &self,
        disk_number: u32,
        style: PartitionStyle,
    ) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;
        self.initialize_unlocked(disk_number, style).await
    }

    /// Wipe a disk's partition table. The guard sweep over the disk's
    /// hosted letters runs under the disk lock, so the letter set cannot
    /// change between the check and the wipe.
    pub async fn clean(&self, disk_number: u32) -> Result<OpReport, EngineError> {
        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let letters = self.discovery.disk_letters(disk_number).await;
        self.guard.ensure_letters_mutable(&letters)?;

        self.clean_unlocked(disk_number).await
    }

    /// Recovery path for disks diskpart cannot format: clean, lay down
    /// an MBR table, then create and format one maximum-size partition
    /// entirely through PowerShell.
    pub async fn rebuild(
        &self,
        disk_number: u32,
        filesystem: &str,
        label: &str,
    ) -> Result<OpReport, EngineError> {
        exec::validate_fs_token(filesystem)?;
        let label = exec::sanitize_label(label);

        let _lock = self.locks.acquire(LockKey::Disk(disk_number)).await;

        let letters = self.discovery.disk_letters(disk_number).await;
        self.guard.ensure_letters_mutable(&letters)?;

        self.clean_unlocked(disk_number).await?;
        self.initialize_unlocked(disk_number, PartitionStyle::Mbr)
            .await?;

        let command = format!(
            "New-Partition -DiskNumber {} -UseMaximumSize -AssignDriveLetter | Format-Volume -FileSystem {} -NewFileSystemLabel {} -Confirm:$false",
            disk_number,
            filesystem,
            exec::ps_quote(&label)
        );
        let spec = CommandSpec::powershell(&command).with_timeout(FORMAT_TIMEOUT);
        let output = self.runner.run(&spec).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not rebuild disk {}: {}",
                disk_number,
                output.stderr.trim()
            )));
        }

        log::info!("rebuilt disk {} as {}", disk_number, filesystem);
        Ok(OpReport::ok(format!(
            "Disk {} rebuilt as {}",
            disk_number, filesystem
        )))
    }

    async fn initialize_unlocked(
        &self,
        disk_number: u32,
        style: PartitionStyle,
    ) -> Result<OpReport, EngineError> {
        let style_arg = style.as_os_arg().ok_or_else(|| {
            EngineError::InvalidInput(format!("cannot initialize a disk as {:?}", style))
        })?;

        let command = format!(
            "Initialize-Disk -Number {} -PartitionStyle {} -ErrorAction SilentlyContinue",
            disk_number, style_arg
        );
        let output = self.runner.run(&CommandSpec::powershell(&command)).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "could not initialize disk {}: {}",
                disk_number,
                output.stderr.trim()
            )));
        }
        Ok(OpReport::ok(format!("Disk initialized as {}", style_arg)))
    }

    async fn clean_unlocked(&self, disk_number: u32) -> Result<OpReport, EngineError> {
        let batch = DiskpartScript::new(
            "clean",
            &disk_number.to_string(),
            script::clean_script(disk_number),
        );
        let output = batch.run(self.runner.as_ref(), FORMAT_TIMEOUT).await?;
        if !output.success {
            return Err(EngineError::Command(format!(
                "diskpart clean of disk {} failed: {}",
                disk_number,
                script::transcript_tail(&output.combined())
            )));
        }

        log::info!("cleaned disk {}", disk_number);
        Ok(OpReport::ok("Disk cleaned"))
    }
}
