pub mod device;
pub mod error;
pub mod format;
pub mod letter;
pub mod runner;
pub mod test_utils;
pub mod units;

pub use device::{
    Device, DriveType, LogicalDrive, Partition, PartitionStyle, PhysicalDisk, VolumeInfo,
};
pub use error::EngineError;
pub use format::{FormatRequest, OpReport, MAX_LABEL_LEN};
pub use letter::DriveLetter;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, DEFAULT_TIMEOUT, FORMAT_TIMEOUT};
pub use units::{bytes_to_gb, gb_to_bytes};
