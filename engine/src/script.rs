use std::path::{Path, PathBuf};
use std::time::Duration;

use diskforge_core::{CommandOutput, CommandRunner, CommandSpec, DriveLetter, EngineError};

/// A diskpart batch: script text plus the unique temp file it runs from.
///
/// File names carry the operation and target so a failed run can be
/// traced from the temp directory; the uuid keeps concurrent runs from
/// clobbering each other's scripts.
#[derive(Debug)]
pub struct DiskpartScript {
    path: PathBuf,
    text: String,
}

impl DiskpartScript {
    pub fn new(operation: &str, target: &str, text: String) -> Self {
        let file = format!(
            "diskforge_{}_{}_{}.txt",
            operation,
            target,
            uuid::Uuid::new_v4()
        );
        Self {
            path: std::env::temp_dir().join(file),
            text,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the script, execute it under `timeout`, then delete it.
    /// Deletion is best-effort; a leftover script in the temp dir is
    /// harmless and useful for postmortems.
    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        timeout: Duration,
    ) -> Result<CommandOutput, EngineError> {
        std::fs::write(&self.path, &self.text)?;
        log::debug!("diskpart script at {}: {:?}", self.path.display(), self.text);

        let spec = CommandSpec::diskpart(&self.path).with_timeout(timeout);
        let result = runner.run(&spec).await;

        let _ = std::fs::remove_file(&self.path);
        result
    }
}

/// Wipe a disk's partition table.
pub fn clean_script(disk_number: u32) -> String {
    format!("select disk {}\nclean\nexit\n", disk_number)
}

/// Last non-empty lines of a transcript, enough for an error message
/// without dumping the whole diskpart banner.
pub(crate) fn transcript_tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" / ")
}

/// Wipe the disk and lay down one formatted primary partition. The
/// quick flag is honored; callers wanting the original always-quick
/// behavior pass true.
pub fn rebuild_script(
    disk_number: u32,
    filesystem: &str,
    label: &str,
    quick: bool,
    letter: Option<DriveLetter>,
) -> String {
    let assign = match letter {
        Some(letter) => format!("assign letter={}", letter.as_char()),
        None => "assign".to_string(),
    };
    let quick_flag = if quick { " quick" } else { "" };
    format!(
        "select disk {}\nclean\ncreate partition primary\n{}\nformat fs={} label=\"{}\"{}\nexit\n",
        disk_number,
        assign,
        filesystem.to_lowercase(),
        label,
        quick_flag
    )
}

/// In-place format of a mounted volume addressed by letter. `override`
/// forces dismount when the volume is in use.
pub fn volume_format_script(
    letter: DriveLetter,
    filesystem: &str,
    label: &str,
    quick: bool,
) -> String {
    let quick_flag = if quick { " quick" } else { "" };
    format!(
        "select volume {}\nformat fs={} label=\"{}\"{} override\nexit\n",
        letter.as_char(),
        filesystem.to_lowercase(),
        label,
        quick_flag
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_selects_then_cleans() {
        assert_eq!(clean_script(3), "select disk 3\nclean\nexit\n");
    }

    #[test]
    fn rebuild_orders_clean_create_assign_format() {
        let letter = DriveLetter::parse("E").ok();
        let script = rebuild_script(2, "FAT32", "SDCARD", true, letter);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "select disk 2",
                "clean",
                "create partition primary",
                "assign letter=E",
                "format fs=fat32 label=\"SDCARD\" quick",
                "exit",
            ]
        );
    }

    #[test]
    fn rebuild_without_letter_uses_bare_assign() {
        let script = rebuild_script(1, "NTFS", "DATA", false, None);
        assert!(script.contains("\nassign\n"));
        assert!(script.contains("format fs=ntfs label=\"DATA\"\n"));
        assert!(!script.contains("quick"));
    }

    #[test]
    fn volume_format_always_overrides() {
        let letter = DriveLetter::parse("F").unwrap();
        let quick = volume_format_script(letter, "exFAT", "USB", true);
        assert!(quick.starts_with("select volume F\n"));
        assert!(quick.contains("format fs=exfat label=\"USB\" quick override"));

        let full = volume_format_script(letter, "exFAT", "USB", false);
        assert!(full.contains("format fs=exfat label=\"USB\" override"));
    }

    #[test]
    fn script_paths_are_unique_per_instance() {
        let a = DiskpartScript::new("clean", "5", clean_script(5));
        let b = DiskpartScript::new("clean", "5", clean_script(5));
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("diskforge_clean_5_"));
        assert!(name.ends_with(".txt"));
    }
}
