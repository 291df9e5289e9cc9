use serde::{Deserialize, Serialize};

use crate::letter::DriveLetter;
use crate::EngineError;

/// FAT volume labels top out at 11 characters; the same cap is applied to
/// every filesystem for a uniform request surface.
pub const MAX_LABEL_LEN: usize = 11;

/// A format request targeting a mounted letter, a physical disk number,
/// or both. When both are present the disk number wins: rebuilding by
/// number is the path that also recovers RAW media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRequest {
    pub letter: Option<DriveLetter>,
    pub disk_number: Option<u32>,
    pub filesystem: String,
    pub label: String,
    pub quick: bool,
}

impl FormatRequest {
    pub fn by_letter(letter: DriveLetter, filesystem: &str, label: &str) -> Self {
        Self {
            letter: Some(letter),
            disk_number: None,
            filesystem: filesystem.to_string(),
            label: label.to_string(),
            quick: true,
        }
    }

    pub fn by_disk(disk_number: u32, filesystem: &str, label: &str) -> Self {
        Self {
            letter: None,
            disk_number: Some(disk_number),
            filesystem: filesystem.to_string(),
            label: label.to_string(),
            quick: true,
        }
    }

    pub fn full(mut self) -> Self {
        self.quick = false;
        self
    }

    /// Structural check: a request must name at least one target.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.letter.is_none() && self.disk_number.is_none() {
            return Err(EngineError::InvalidInput(
                "format request names neither a drive letter nor a disk number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Structured result every mutating operation reports to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpReport {
    pub success: bool,
    pub message: String,
}

impl OpReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
