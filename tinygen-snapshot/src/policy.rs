//! File eligibility for full-repository reads.

use std::collections::BTreeSet;
use std::path::Path;

use tinygen_core::config::SnapshotSettings;

/// Exact-match, case-sensitive directory exclusions and extension allowlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPolicy {
    excluded_dirs: BTreeSet<String>,
    source_extensions: BTreeSet<String>,
}

impl SnapshotPolicy {
    /// Extensions are given with their leading dot (`".rs"`).
    pub fn new<D, E>(excluded_dirs: D, source_extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            excluded_dirs: excluded_dirs.into_iter().map(Into::into).collect(),
            source_extensions: source_extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.contains(name)
    }

    /// True when the file name's last extension is on the allowlist.
    /// Dotfiles without a further extension (`.gitignore`) never match.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.source_extensions.contains(&format!(".{ext}")))
            .unwrap_or(false)
    }
}

impl From<&SnapshotSettings> for SnapshotPolicy {
    fn from(settings: &SnapshotSettings) -> Self {
        Self {
            excluded_dirs: settings.excluded_dirs.clone(),
            source_extensions: settings.source_extensions.clone(),
        }
    }
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::from(&SnapshotSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_common_dependency_dirs() {
        let policy = SnapshotPolicy::default();
        for dir in ["node_modules", "vendor", ".git", "build", "dist"] {
            assert!(policy.is_excluded_dir(dir), "{dir} should be excluded");
        }
        assert!(!policy.is_excluded_dir("src"));
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let policy = SnapshotPolicy::default();
        assert!(policy.is_source_file(Path::new("src/main.rs")));
        assert!(!policy.is_source_file(Path::new("src/MAIN.RS")));
        assert!(!policy.is_source_file(Path::new("README.md")));
        assert!(!policy.is_source_file(Path::new(".gitignore")));
        assert!(!policy.is_source_file(Path::new("Makefile")));
    }

    #[test]
    fn overrides_replace_defaults() {
        let policy = SnapshotPolicy::new(["target"], [".md"]);
        assert!(policy.is_excluded_dir("target"));
        assert!(!policy.is_excluded_dir("node_modules"));
        assert!(policy.is_source_file(Path::new("docs/guide.md")));
        assert!(!policy.is_source_file(Path::new("src/lib.rs")));
    }
}
