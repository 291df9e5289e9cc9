use diskforge_core::EngineError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Normalize ConvertTo-Json output. PowerShell collapses a one-element
/// pipeline to a bare object and an empty pipeline to no output at all;
/// all three shapes land in the same Vec. Malformed text is a parse
/// error, never a silent empty result.
pub fn parse_records<T: DeserializeOwned>(json_str: &str) -> Result<Vec<T>, EngineError> {
    let trimmed = json_str.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }
    if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .map_err(|e| EngineError::Parse(format!("bad record array: {}", e)))
    } else {
        let record: T = serde_json::from_str(trimmed)
            .map_err(|e| EngineError::Parse(format!("bad record: {}", e)))?;
        Ok(vec![record])
    }
}

/// Get-Disk projection. Numeric fields can be null for media-less card
/// reader slots, and the offline/read-only flags only appear in queries
/// that project them.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskRecord {
    #[serde(rename = "Number")]
    pub number: u32,
    #[serde(rename = "FriendlyName")]
    pub friendly_name: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<u64>,
    #[serde(rename = "PartitionStyle")]
    pub partition_style: Option<String>,
    #[serde(rename = "OperationalStatus")]
    pub operational_status: Option<String>,
    #[serde(rename = "HealthStatus")]
    pub health_status: Option<String>,
    #[serde(rename = "BusType")]
    pub bus_type: Option<String>,
    #[serde(rename = "IsOffline", default)]
    pub is_offline: bool,
    #[serde(rename = "IsReadOnly", default)]
    pub is_read_only: bool,
}

/// Get-Partition projection. A letterless partition reports its letter
/// as null on PowerShell 7 and as a NUL character on 5.1.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionRecord {
    #[serde(rename = "PartitionNumber")]
    pub partition_number: u32,
    #[serde(rename = "DriveLetter")]
    pub drive_letter: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<u64>,
    #[serde(rename = "Type")]
    pub partition_type: Option<String>,
    #[serde(rename = "IsActive", default)]
    pub is_active: bool,
}

/// Win32_LogicalDisk projection.
#[derive(Debug, Clone, Deserialize)]
pub struct LogicalDiskRecord {
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "VolumeName")]
    pub volume_name: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<u64>,
    #[serde(rename = "FreeSpace")]
    pub free_space: Option<u64>,
    #[serde(rename = "FileSystem")]
    pub file_system: Option<String>,
    #[serde(rename = "DriveType")]
    pub drive_type: Option<u32>,
}

/// Letter-to-disk resolution record.
#[derive(Debug, Clone, Deserialize)]
pub struct DiskNumberRecord {
    #[serde(rename = "DiskNumber")]
    pub disk_number: u32,
}

/// Access paths of one partition.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessPathsRecord {
    #[serde(rename = "AccessPaths")]
    pub access_paths: Option<Vec<String>>,
}
