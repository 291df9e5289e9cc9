use std::sync::Arc;

use diskforge_core::{
    bytes_to_gb, CommandRunner, CommandSpec, Device, DriveLetter, DriveType, EngineError,
    LogicalDrive, Partition, PartitionStyle, PhysicalDisk, VolumeInfo,
};
use futures::future;

use crate::guard::SafetyGuard;
use crate::parse::{
    self, DiskNumberRecord, DiskRecord, LogicalDiskRecord, PartitionRecord,
};

/// Field list shared by every Get-Disk projection.
const DISK_FIELDS: &str =
    "Number, FriendlyName, Size, PartitionStyle, OperationalStatus, HealthStatus, BusType, IsOffline, IsReadOnly";

/// Field list for Win32_LogicalDisk projections.
const LOGICAL_FIELDS: &str = "DeviceID, VolumeName, Size, FreeSpace, FileSystem, DriveType";

/// Read side of the engine: every listing is a fresh snapshot, nothing
/// is cached, and enumeration failures degrade to empty results instead
/// of erroring so one unreadable disk cannot hide the rest.
#[derive(Clone)]
pub struct Discovery {
    runner: Arc<dyn CommandRunner>,
    guard: Arc<SafetyGuard>,
}

impl Discovery {
    pub fn new(runner: Arc<dyn CommandRunner>, guard: Arc<SafetyGuard>) -> Self {
        Self { runner, guard }
    }

    /// Removable physical disks with their partition tables joined in.
    /// Partition queries for the surviving disks run concurrently; the
    /// result order follows the disk query.
    pub async fn list_physical_disks(&self) -> Vec<PhysicalDisk> {
        let records = match self.query_disks().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("disk enumeration failed: {}", e);
                return vec![];
            }
        };

        let removable: Vec<DiskRecord> = records.into_iter().filter(removable_bus).collect();

        let partition_queries = removable.iter().map(|disk| self.partitions(disk.number));
        let partition_sets = future::join_all(partition_queries).await;

        removable
            .into_iter()
            .zip(partition_sets)
            .map(|(record, partitions)| build_disk(record, partitions))
            .collect()
    }

    /// All devices an operator can act on. Physical disks are preferred;
    /// when none are visible the mounted removable volumes are offered as
    /// a degraded logical view.
    pub async fn list_devices(&self) -> Vec<Device> {
        let physical = self.list_physical_disks().await;
        if !physical.is_empty() {
            return physical.into_iter().map(Device::Physical).collect();
        }

        log::info!("no removable physical disks visible, listing logical drives");
        self.list_logical_drives()
            .await
            .into_iter()
            .map(Device::Logical)
            .collect()
    }

    /// Mounted removable volumes (DriveType 2).
    pub async fn list_logical_drives(&self) -> Vec<LogicalDrive> {
        let command = format!(
            "Get-WmiObject -Class Win32_LogicalDisk | Where-Object {{ $_.DriveType -eq 2 }} | Select-Object {} | ConvertTo-Json",
            LOGICAL_FIELDS
        );
        let records: Vec<LogicalDiskRecord> = match self.query(&command, "Win32_LogicalDisk").await
        {
            Ok(records) => records,
            Err(e) => {
                log::warn!("logical drive enumeration failed: {}", e);
                return vec![];
            }
        };

        records.into_iter().filter_map(build_logical).collect()
    }

    /// Partitions of one disk; failures absorb to empty so a degraded
    /// disk still shows up in listings.
    pub async fn partitions(&self, disk_number: u32) -> Vec<Partition> {
        let command = format!(
            "Get-Partition -DiskNumber {} -ErrorAction SilentlyContinue | Select-Object PartitionNumber, DriveLetter, Size, Type, IsActive | ConvertTo-Json",
            disk_number
        );
        let records: Vec<PartitionRecord> = match self.query(&command, "Get-Partition").await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("partition query for disk {} failed: {}", disk_number, e);
                return vec![];
            }
        };

        records.into_iter().map(partition_from).collect()
    }

    /// Letters currently hosted by a disk, for guard sweeps and lock
    /// decisions on disk-addressed destructive paths.
    pub async fn disk_letters(&self, disk_number: u32) -> Vec<DriveLetter> {
        self.partitions(disk_number)
            .await
            .iter()
            .filter_map(|p| p.letter)
            .collect()
    }

    /// One physical disk in detail, including offline/read-only flags.
    /// Absent or unreadable disks are None.
    pub async fn disk_detail(&self, disk_number: u32) -> Option<PhysicalDisk> {
        let command = format!(
            "Get-Disk -Number {} | Select-Object {} | ConvertTo-Json",
            disk_number, DISK_FIELDS
        );
        let records: Vec<DiskRecord> = match self.query(&command, "Get-Disk").await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("detail query for disk {} failed: {}", disk_number, e);
                return None;
            }
        };

        let record = records.into_iter().next()?;
        let partitions = self.partitions(record.number).await;
        Some(build_disk(record, partitions))
    }

    /// One mounted volume in detail: the logical-disk record joined with
    /// a best-effort disk-number resolution. The sources can disagree;
    /// a missing disk number is not an error.
    pub async fn volume_info(&self, letter: DriveLetter) -> Option<VolumeInfo> {
        let command = format!(
            "Get-WmiObject -Class Win32_LogicalDisk | Where-Object {{ $_.DeviceID -eq '{}' }} | Select-Object {} | ConvertTo-Json",
            letter.with_colon(),
            LOGICAL_FIELDS
        );
        let records: Vec<LogicalDiskRecord> = match self.query(&command, "Win32_LogicalDisk").await
        {
            Ok(records) => records,
            Err(e) => {
                log::warn!("volume query for {} failed: {}", letter, e);
                return None;
            }
        };
        let record = records.into_iter().next()?;

        let disk_number = self.resolve_disk_number(letter).await;

        let size_bytes = record.size.unwrap_or(0);
        let free_bytes = record.free_space.unwrap_or(0);
        let used_bytes = size_bytes.saturating_sub(free_bytes);
        let drive_type = DriveType::from_code(record.drive_type.unwrap_or(0));

        Some(VolumeInfo {
            letter,
            label: record
                .volume_name
                .unwrap_or_else(|| "Removable Disk".to_string()),
            filesystem: record.file_system.unwrap_or_else(|| "Unknown".to_string()),
            size_bytes,
            size_gb: bytes_to_gb(size_bytes),
            free_bytes,
            free_gb: bytes_to_gb(free_bytes),
            used_bytes,
            used_gb: bytes_to_gb(used_bytes),
            drive_type,
            is_removable: drive_type == DriveType::Removable,
            disk_number,
            is_protected: self.guard.is_protected(&letter.with_colon()),
        })
    }

    /// Disk number behind a mounted letter, when the OS can tell.
    pub async fn resolve_disk_number(&self, letter: DriveLetter) -> Option<u32> {
        let command = format!(
            "Get-Partition -DriveLetter {} -ErrorAction SilentlyContinue | Select-Object DiskNumber | ConvertTo-Json",
            letter.as_char()
        );
        match self.query::<DiskNumberRecord>(&command, "Get-Partition").await {
            Ok(records) => records.into_iter().next().map(|r| r.disk_number),
            Err(e) => {
                log::debug!("could not resolve {} to a disk number: {}", letter, e);
                None
            }
        }
    }

    async fn query_disks(&self) -> Result<Vec<DiskRecord>, EngineError> {
        // broad filter keeps just-attached sticks that are still offline
        let command = format!(
            "Get-Disk | Where-Object {{ $_.BusType -eq 'USB' -or $_.IsOffline -eq $false }} | Select-Object {} | ConvertTo-Json",
            DISK_FIELDS
        );
        self.query(&command, "Get-Disk").await
    }

    async fn query<T: serde::de::DeserializeOwned>(
        &self,
        command: &str,
        what: &str,
    ) -> Result<Vec<T>, EngineError> {
        let output = self.runner.run(&CommandSpec::powershell(command)).await?;
        if !output.success {
            return Err(EngineError::Enumeration(format!(
                "{} failed: {}",
                what,
                output.stderr.trim()
            )));
        }
        parse::parse_records(&output.stdout)
    }
}

/// Removable means attached over USB, SD or MMC.
fn removable_bus(record: &DiskRecord) -> bool {
    match record.bus_type.as_deref() {
        Some(bus) => matches!(bus.to_uppercase().as_str(), "USB" | "SD" | "MMC"),
        None => false,
    }
}

fn build_disk(record: DiskRecord, partitions: Vec<Partition>) -> PhysicalDisk {
    let style = PartitionStyle::from_os(record.partition_style.as_deref());
    let size_bytes = record.size.unwrap_or(0);
    let primary_letter = partitions.iter().find_map(|p| p.letter);

    PhysicalDisk {
        number: record.number,
        friendly_name: record
            .friendly_name
            .unwrap_or_else(|| "USB Disk".to_string()),
        size_bytes,
        size_gb: bytes_to_gb(size_bytes),
        style,
        status: record
            .operational_status
            .unwrap_or_else(|| "Unknown".to_string()),
        health: record
            .health_status
            .unwrap_or_else(|| "Unknown".to_string()),
        bus_type: record.bus_type,
        is_offline: record.is_offline,
        is_read_only: record.is_read_only,
        partitions,
        primary_letter,
    }
}

fn partition_from(record: PartitionRecord) -> Partition {
    let size_bytes = record.size.unwrap_or(0);
    Partition {
        number: record.partition_number,
        letter: letter_from_os(record.drive_letter.as_deref()),
        size_bytes,
        size_gb: bytes_to_gb(size_bytes),
        kind: record
            .partition_type
            .unwrap_or_else(|| "Basic".to_string()),
        is_active: record.is_active,
    }
}

fn build_logical(record: LogicalDiskRecord) -> Option<LogicalDrive> {
    let letter = match DriveLetter::parse(&record.device_id) {
        Ok(letter) => letter,
        Err(_) => {
            log::warn!("skipping logical disk with odd id {:?}", record.device_id);
            return None;
        }
    };
    let size_bytes = record.size.unwrap_or(0);
    let free_bytes = record.free_space.unwrap_or(0);

    Some(LogicalDrive {
        letter,
        label: record
            .volume_name
            .unwrap_or_else(|| "Removable Disk".to_string()),
        filesystem: record.file_system.unwrap_or_else(|| "Unknown".to_string()),
        size_bytes,
        size_gb: bytes_to_gb(size_bytes),
        free_bytes,
        free_gb: bytes_to_gb(free_bytes),
        is_removable: record.drive_type == Some(2),
    })
}

/// Letters arrive as "E", null, a "-" placeholder or a NUL character
/// depending on the PowerShell version; only a real letter survives.
fn letter_from_os(raw: Option<&str>) -> Option<DriveLetter> {
    raw.and_then(|s| DriveLetter::parse(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_record() -> DiskRecord {
        DiskRecord {
            number: 1,
            friendly_name: Some("SanDisk Ultra".to_string()),
            size: Some(15_931_539_456),
            partition_style: Some("MBR".to_string()),
            operational_status: Some("Online".to_string()),
            health_status: Some("Healthy".to_string()),
            bus_type: Some("USB".to_string()),
            is_offline: false,
            is_read_only: false,
        }
    }

    #[test]
    fn usb_sd_and_mmc_are_removable() {
        let mut record = usb_record();
        assert!(removable_bus(&record));
        record.bus_type = Some("sd".to_string());
        assert!(removable_bus(&record));
        record.bus_type = Some("MMC".to_string());
        assert!(removable_bus(&record));
        record.bus_type = Some("NVMe".to_string());
        assert!(!removable_bus(&record));
        record.bus_type = None;
        assert!(!removable_bus(&record));
    }

    #[test]
    fn os_letter_placeholders_become_none() {
        assert!(letter_from_os(None).is_none());
        assert!(letter_from_os(Some("-")).is_none());
        assert!(letter_from_os(Some("\u{0}")).is_none());
        assert!(letter_from_os(Some("")).is_none());
        assert_eq!(
            letter_from_os(Some("e")).map(|l| l.as_char()),
            Some('E')
        );
    }

    #[test]
    fn missing_disk_fields_fall_back() {
        let record = DiskRecord {
            number: 2,
            friendly_name: None,
            size: None,
            partition_style: None,
            operational_status: None,
            health_status: None,
            bus_type: Some("USB".to_string()),
            is_offline: false,
            is_read_only: false,
        };
        let disk = build_disk(record, vec![]);
        assert_eq!(disk.friendly_name, "USB Disk");
        assert_eq!(disk.size_bytes, 0);
        assert_eq!(disk.size_gb, 0.0);
        assert_eq!(disk.style, PartitionStyle::Raw);
        assert_eq!(disk.status, "Unknown");
        assert!(disk.primary_letter.is_none());
    }

    #[test]
    fn primary_letter_is_first_lettered_partition() {
        let partitions = vec![
            Partition {
                number: 1,
                letter: None,
                size_bytes: 0,
                size_gb: 0.0,
                kind: "Reserved".to_string(),
                is_active: false,
            },
            Partition {
                number: 2,
                letter: DriveLetter::parse("F").ok(),
                size_bytes: 0,
                size_gb: 0.0,
                kind: "Basic".to_string(),
                is_active: true,
            },
            Partition {
                number: 3,
                letter: DriveLetter::parse("G").ok(),
                size_bytes: 0,
                size_gb: 0.0,
                kind: "Basic".to_string(),
                is_active: false,
            },
        ];
        let disk = build_disk(usb_record(), partitions);
        assert_eq!(disk.primary_letter.map(|l| l.as_char()), Some('F'));
    }
}
