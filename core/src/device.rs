use serde::{Deserialize, Serialize};

use crate::letter::DriveLetter;

/// One removable physical disk as reported by the OS, rebuilt on every
/// enumeration. Byte sizes are authoritative; the GB figures are derived
/// for display and never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalDisk {
    pub number: u32,
    pub friendly_name: String,
    pub size_bytes: u64,
    pub size_gb: f64,
    pub style: PartitionStyle,
    pub status: String,
    pub health: String,
    pub bus_type: Option<String>,
    pub is_offline: bool,
    pub is_read_only: bool,
    pub partitions: Vec<Partition>,
    /// First partition letter, when any partition carries one.
    pub primary_letter: Option<DriveLetter>,
}

impl PhysicalDisk {
    pub fn has_letter(&self) -> bool {
        self.primary_letter.is_some()
    }

    /// Every letter currently hosted by this disk.
    pub fn letters(&self) -> Vec<DriveLetter> {
        self.partitions.iter().filter_map(|p| p.letter).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub number: u32,
    pub letter: Option<DriveLetter>,
    pub size_bytes: u64,
    pub size_gb: f64,
    pub kind: String,
    pub is_active: bool,
}

/// Mounted-volume view used when no physical disk is enumerable, e.g.
/// in restricted sessions where Get-Disk returns nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalDrive {
    pub letter: DriveLetter,
    pub label: String,
    pub filesystem: String,
    pub size_bytes: u64,
    pub size_gb: f64,
    pub free_bytes: u64,
    pub free_gb: f64,
    pub is_removable: bool,
}

/// Element type of device listings: physical disks preferred, logical
/// drives as the degraded fallback projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Device {
    Physical(PhysicalDisk),
    Logical(LogicalDrive),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionStyle {
    Mbr,
    Gpt,
    Raw,
    Unknown,
}

impl PartitionStyle {
    /// Style string as Get-Disk reports it; absent means RAW.
    pub fn from_os(style: Option<&str>) -> Self {
        match style.map(|s| s.to_uppercase()) {
            Some(s) if s == "MBR" => PartitionStyle::Mbr,
            Some(s) if s == "GPT" => PartitionStyle::Gpt,
            Some(s) if s == "RAW" => PartitionStyle::Raw,
            None => PartitionStyle::Raw,
            _ => PartitionStyle::Unknown,
        }
    }

    /// Argument form for Initialize-Disk. Only MBR and GPT are real
    /// initialization targets.
    pub fn as_os_arg(&self) -> Option<&'static str> {
        match self {
            PartitionStyle::Mbr => Some("MBR"),
            PartitionStyle::Gpt => Some("GPT"),
            _ => None,
        }
    }
}

/// Win32_LogicalDisk DriveType codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveType {
    Unknown,
    NoRootDirectory,
    Removable,
    Local,
    Network,
    CdRom,
    RamDisk,
}

impl DriveType {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DriveType::NoRootDirectory,
            2 => DriveType::Removable,
            3 => DriveType::Local,
            4 => DriveType::Network,
            5 => DriveType::CdRom,
            6 => DriveType::RamDisk,
            _ => DriveType::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DriveType::Unknown => "Unknown",
            DriveType::NoRootDirectory => "No Root Directory",
            DriveType::Removable => "Removable Disk",
            DriveType::Local => "Local Disk",
            DriveType::Network => "Network Drive",
            DriveType::CdRom => "CD-ROM",
            DriveType::RamDisk => "RAM Disk",
        }
    }
}

/// Detail view of one mounted volume, joined from the logical-disk query
/// and a best-effort partition lookup. The two sources can disagree, so
/// the disk number is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub letter: DriveLetter,
    pub label: String,
    pub filesystem: String,
    pub size_bytes: u64,
    pub size_gb: f64,
    pub free_bytes: u64,
    pub free_gb: f64,
    pub used_bytes: u64,
    pub used_gb: f64,
    pub drive_type: DriveType,
    pub is_removable: bool,
    pub disk_number: Option<u32>,
    pub is_protected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_type_codes_map_like_wmi() {
        assert_eq!(DriveType::from_code(2), DriveType::Removable);
        assert_eq!(DriveType::from_code(5), DriveType::CdRom);
        assert_eq!(DriveType::from_code(0), DriveType::Unknown);
        assert_eq!(DriveType::from_code(99), DriveType::Unknown);
        assert_eq!(DriveType::Removable.description(), "Removable Disk");
        assert_eq!(DriveType::NoRootDirectory.description(), "No Root Directory");
    }

    #[test]
    fn partition_style_parses_os_strings() {
        assert_eq!(PartitionStyle::from_os(Some("MBR")), PartitionStyle::Mbr);
        assert_eq!(PartitionStyle::from_os(Some("gpt")), PartitionStyle::Gpt);
        assert_eq!(PartitionStyle::from_os(Some("RAW")), PartitionStyle::Raw);
        assert_eq!(PartitionStyle::from_os(None), PartitionStyle::Raw);
        assert_eq!(
            PartitionStyle::from_os(Some("Dynamic")),
            PartitionStyle::Unknown
        );
    }

    #[test]
    fn initialize_arg_only_for_real_styles() {
        assert_eq!(PartitionStyle::Mbr.as_os_arg(), Some("MBR"));
        assert_eq!(PartitionStyle::Gpt.as_os_arg(), Some("GPT"));
        assert_eq!(PartitionStyle::Raw.as_os_arg(), None);
    }

    #[test]
    fn disk_letters_come_from_partitions() {
        let disk = PhysicalDisk {
            number: 1,
            friendly_name: "Test USB".to_string(),
            size_bytes: 0,
            size_gb: 0.0,
            style: PartitionStyle::Mbr,
            status: "Online".to_string(),
            health: "Healthy".to_string(),
            bus_type: Some("USB".to_string()),
            is_offline: false,
            is_read_only: false,
            partitions: vec![
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
                    letter: DriveLetter::parse("E").ok(),
                    size_bytes: 0,
                    size_gb: 0.0,
                    kind: "Basic".to_string(),
                    is_active: true,
                },
            ],
            primary_letter: DriveLetter::parse("E").ok(),
        };
        assert!(disk.has_letter());
        assert_eq!(disk.letters().len(), 1);
        assert_eq!(disk.letters()[0].as_char(), 'E');
    }
}
