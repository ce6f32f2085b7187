use crate::config::SyncSettings;
use regex::Regex;
use tracing::warn;

/// Runtime filter compiled from the include / ignore pattern lists.
///
/// Patterns apply to the bare file name only, never the full path, so the
/// same rule set gives identical answers for watch events and tree scans.
#[derive(Debug)]
pub struct SyncFilter {
    include: Vec<Regex>,
    ignore: Vec<Regex>,
}

impl SyncFilter {
    /// Compile both lists. A pattern that fails to compile is reported once
    /// here and never matches afterwards.
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            include: compile(&settings.src_files),
            ignore: compile(&settings.ignore_files),
        }
    }

    /// Ignore rules take precedence; then any include rule admits the file;
    /// anything else is excluded.
    pub fn should_sync(&self, file_name: &str) -> bool {
        if self.ignore.iter().any(|re| re.is_match(file_name)) {
            return false;
        }
        self.include.iter().any(|re| re.is_match(file_name))
    }
}

fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pat| match Regex::new(pat) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("ignoring invalid filter pattern {pat:?}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(include: &[&str], ignore: &[&str]) -> SyncSettings {
        SyncSettings {
            src_files: include.iter().map(|s| s.to_string()).collect(),
            ignore_files: ignore.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn ignore_takes_precedence() {
        let filter = SyncFilter::new(&settings(&[".*\\.txt$"], &["^\\."]));
        assert!(!filter.should_sync(".hidden.txt"));
        assert!(filter.should_sync("notes.txt"));
        assert!(!filter.should_sync("readme.md"));
    }

    #[test]
    fn empty_include_excludes_everything() {
        let filter = SyncFilter::new(&settings(&[], &[]));
        assert!(!filter.should_sync("anything.txt"));
    }

    #[test]
    fn invalid_pattern_never_matches() {
        let filter = SyncFilter::new(&settings(&["[unclosed", ".*\\.txt$"], &["(bad"]));
        assert!(filter.should_sync("ok.txt"));
        assert!(!filter.should_sync("[unclosed"));
    }
}
