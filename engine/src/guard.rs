use std::collections::BTreeSet;

use diskforge_core::{DriveLetter, EngineError};

/// Volumes the engine refuses to touch, consulted before any destructive
/// command is issued. Membership is by normalized letter: `"c"`, `"C"`,
/// `"c:"` and `"C:"` all name the same volume. The set is fixed at
/// construction; there is no way to mutate it afterwards.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    protected: BTreeSet<char>,
}

impl Default for SafetyGuard {
    /// Protects the system volume.
    fn default() -> Self {
        Self::new(["C"])
    }
}

impl SafetyGuard {
    pub fn new<I, S>(protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let protected = protected
            .into_iter()
            .filter_map(|entry| normalize(entry.as_ref()))
            .collect();
        Self { protected }
    }

    pub fn is_protected(&self, target: &str) -> bool {
        match normalize(target) {
            Some(letter) => self.protected.contains(&letter),
            None => false,
        }
    }

    /// Fail fast before a destructive command reaches the shell.
    pub fn ensure_mutable(&self, target: &str) -> Result<(), EngineError> {
        if self.is_protected(target) {
            return Err(EngineError::ProtectedResource(format!(
                "refusing to modify protected volume {}",
                target.trim()
            )));
        }
        Ok(())
    }

    /// Guard sweep used by disk-level destructive paths: every letter the
    /// disk currently hosts must be mutable.
    pub fn ensure_letters_mutable(&self, letters: &[DriveLetter]) -> Result<(), EngineError> {
        for letter in letters {
            self.ensure_mutable(&letter.with_colon())?;
        }
        Ok(())
    }

    pub fn protected_letters(&self) -> impl Iterator<Item = char> + '_ {
        self.protected.iter().copied()
    }
}

fn normalize(target: &str) -> Option<char> {
    let trimmed = target.trim().trim_end_matches(':');
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c.to_ascii_uppercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blocks_every_spelling_of_the_system_volume() {
        let guard = SafetyGuard::default();
        for spelling in ["C:", "C", "c:", "c", " C: "] {
            assert!(guard.is_protected(spelling), "missed {:?}", spelling);
        }
    }

    #[test]
    fn default_allows_other_letters() {
        let guard = SafetyGuard::default();
        assert!(!guard.is_protected("D:"));
        assert!(!guard.is_protected("E"));
        assert!(!guard.is_protected("z"));
    }

    #[test]
    fn garbage_targets_are_not_protected() {
        let guard = SafetyGuard::default();
        assert!(!guard.is_protected(""));
        assert!(!guard.is_protected("C:\\"));
        assert!(!guard.is_protected("CD"));
    }

    #[test]
    fn ensure_mutable_reports_protected_resource() {
        let guard = SafetyGuard::default();
        let err = guard.ensure_mutable("C:").unwrap_err();
        assert!(matches!(err, EngineError::ProtectedResource(_)));
        assert!(guard.ensure_mutable("E:").is_ok());
    }

    #[test]
    fn custom_sets_extend_protection() {
        let guard = SafetyGuard::new(["C", "d:"]);
        assert!(guard.is_protected("D"));
        assert!(guard.is_protected("c"));
        assert!(!guard.is_protected("E"));
        assert_eq!(guard.protected_letters().collect::<Vec<_>>(), vec!['C', 'D']);
    }

    #[test]
    fn letter_sweep_stops_on_first_protected() {
        let guard = SafetyGuard::default();
        let letters = vec![
            DriveLetter::parse("E").unwrap(),
            DriveLetter::parse("C").unwrap(),
        ];
        assert!(guard.ensure_letters_mutable(&letters).is_err());
        assert!(guard
            .ensure_letters_mutable(&[DriveLetter::parse("E").unwrap()])
            .is_ok());
    }
}
