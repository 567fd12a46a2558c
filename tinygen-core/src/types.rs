//! Domain types shared by every tinygen crate.
//!
//! Repository-relative paths inside a [`FileSet`] are `String`s with forward
//! slashes; they are wire data (prompt headings, diff headers), not host paths.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Location of a remote repository (clone URL or local path understood by the host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference(pub String);

impl RepositoryReference {
    /// Stable local identifier: `<name>_<first 12 hex chars of sha256(reference)>`.
    ///
    /// The readable prefix comes from the last path segment with any `.git`
    /// suffix removed; the hash keeps two repositories with the same name apart.
    pub fn repo_id(&self) -> RepoId {
        let digest = hex::encode(Sha256::digest(self.0.as_bytes()));
        RepoId(format!("{}_{}", self.slug(), &digest[..12]))
    }

    fn slug(&self) -> String {
        let trimmed = self.0.trim_end_matches('/');
        let last = trimmed
            .rsplit(|c: char| c == '/' || c == ':' || c == '\\')
            .next()
            .unwrap_or_default();
        let last = last.strip_suffix(".git").unwrap_or(last);
        let slug: String = last
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        if slug.trim_matches('-').is_empty() {
            "repo".to_string()
        } else {
            slug
        }
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepositoryReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepositoryReference {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Directory-safe identifier derived from a [`RepositoryReference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId(pub String);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ledger-assigned identifier of a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for QueryId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// FileSet
// ---------------------------------------------------------------------------

/// Point-in-time mapping of repository-relative path to file text, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet(BTreeMap<String, String>);

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file. Backslashes in `path` are normalised to `/`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into().replace('\\', "/");
        self.0.insert(path, content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for (path, content) in iter {
            set.insert(path, content);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged message exchanged with the generative backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// ---------------------------------------------------------------------------
// Policy enums
// ---------------------------------------------------------------------------

/// Shape of the answer requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// The backend answers with a unified diff that is returned as-is.
    #[default]
    UnifiedDiff,
    /// The backend answers with a JSON map of path to full new content,
    /// converted locally into a unified diff.
    RewrittenFiles,
}

impl ArtifactFormat {
    /// Reply that means "keep the first answer" during the reflection pass.
    pub fn sentinel(&self) -> &'static str {
        match self {
            ArtifactFormat::UnifiedDiff => "y",
            ArtifactFormat::RewrittenFiles => "n",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::UnifiedDiff => write!(f, "unified_diff"),
            ArtifactFormat::RewrittenFiles => write!(f, "rewritten_files"),
        }
    }
}

/// How the reflection reply is compared against the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceMode {
    /// Trimmed, case-folded reply must equal the sentinel exactly.
    #[default]
    Exact,
    /// Also tolerates trailing punctuation, quoting and the long form (`yes`/`no`).
    Lenient,
}

/// Whether ledger failures abort a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedgerPolicy {
    /// Log the failure and keep generating.
    #[default]
    BestEffort,
    /// Surface the failure as the run's error.
    Required,
}

// ---------------------------------------------------------------------------
// Query record
// ---------------------------------------------------------------------------

/// Audit record of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: QueryId,
    pub repo_url: RepositoryReference,
    pub prompt: String,
    #[serde(default)]
    pub diff: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_is_stable_and_readable() {
        let reference = RepositoryReference::from("https://example.com/acme/repo.git");
        let a = reference.repo_id();
        let b = reference.repo_id();
        assert_eq!(a, b);
        assert!(a.0.starts_with("repo_"), "got {a}");
        assert_eq!(a.0.len(), "repo_".len() + 12);
    }

    #[test]
    fn repo_id_differs_for_same_name_on_different_hosts() {
        let a = RepositoryReference::from("https://github.com/a/tool.git").repo_id();
        let b = RepositoryReference::from("https://gitlab.com/b/tool.git").repo_id();
        assert_ne!(a, b);
        assert!(a.0.starts_with("tool_") && b.0.starts_with("tool_"));
    }

    #[test]
    fn repo_id_handles_scp_style_and_trailing_slash() {
        let scp = RepositoryReference::from("git@github.com:acme/widget.git").repo_id();
        assert!(scp.0.starts_with("widget_"), "got {scp}");
        let slash = RepositoryReference::from("https://example.com/acme/widget/").repo_id();
        assert!(slash.0.starts_with("widget_"), "got {slash}");
        let odd = RepositoryReference::from("///").repo_id();
        assert!(odd.0.starts_with("repo_"), "got {odd}");
    }

    #[test]
    fn file_set_normalises_separators_and_orders_by_path() {
        let set: FileSet = [("src\\b.rs", "b"), ("a.rs", "a")].into_iter().collect();
        let paths: Vec<_> = set.paths().collect();
        assert_eq!(paths, vec!["a.rs", "src/b.rs"]);
        assert_eq!(set.get("src/b.rs"), Some("b"));
    }

    #[test]
    fn role_serialises_lowercase() {
        let turn = ConversationTurn::assistant("hi");
        let yaml = serde_yaml::to_string(&turn).expect("serialize");
        assert!(yaml.contains("role: assistant"));
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn sentinel_per_format() {
        assert_eq!(ArtifactFormat::UnifiedDiff.sentinel(), "y");
        assert_eq!(ArtifactFormat::RewrittenFiles.sentinel(), "n");
    }
}
