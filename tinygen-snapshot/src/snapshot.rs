//! Snapshot acquisition and reads.
//!
//! # Layout
//!
//! ```text
//! <repos>/
//!   <repo_id>/           (working copy)
//!   <repo_id>.lock       (advisory lock file, held by a SnapshotHandle)
//!   <repo_id>.partial/   (first clone in progress; renamed into place on success)
//! ```
//!
//! A handle keeps the exclusive lock from `acquire` until it is dropped, so an
//! update issued by one caller never runs underneath another caller's read.

use std::fs::{File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use walkdir::WalkDir;

use tinygen_core::{FileSet, RepoId, RepositoryReference};

use crate::error::{acquisition_err, read_err, SnapshotError};
use crate::host::RepositoryHost;
use crate::policy::SnapshotPolicy;

/// Materialises repositories under a local root directory.
pub struct RepositorySnapshot {
    repos_dir: PathBuf,
    host: Arc<dyn RepositoryHost>,
    policy: SnapshotPolicy,
}

/// A locked, up-to-date local copy of one repository.
#[derive(Debug)]
pub struct SnapshotHandle {
    reference: RepositoryReference,
    repo_id: RepoId,
    dir: PathBuf,
    _lock: File,
}

impl SnapshotHandle {
    pub fn reference(&self) -> &RepositoryReference {
        &self.reference
    }

    pub fn repo_id(&self) -> &RepoId {
        &self.repo_id
    }

    /// Root of the local copy.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RepositorySnapshot {
    pub fn new(
        repos_dir: impl Into<PathBuf>,
        host: Arc<dyn RepositoryHost>,
        policy: SnapshotPolicy,
    ) -> Self {
        Self {
            repos_dir: repos_dir.into(),
            host,
            policy,
        }
    }

    /// `<repos>/<repo_id>/`. Pure, no I/O.
    pub fn snapshot_dir(&self, repo_id: &RepoId) -> PathBuf {
        self.repos_dir.join(&repo_id.0)
    }

    /// Ensure an up-to-date local copy of `reference` exists and lock it.
    ///
    /// Clones when no copy exists for the reference's id, pulls otherwise.
    /// Failures are returned as [`SnapshotError::Acquisition`]; nothing is retried.
    pub fn acquire(&self, reference: &RepositoryReference) -> Result<SnapshotHandle, SnapshotError> {
        let repo_id = reference.repo_id();
        std::fs::create_dir_all(&self.repos_dir).map_err(|e| {
            acquisition_err(reference, format!("cannot create {}: {e}", self.repos_dir.display()))
        })?;

        let lock = self.lock(reference, &repo_id)?;
        let dir = self.snapshot_dir(&repo_id);

        if dir.exists() {
            self.host
                .update(reference, &dir)
                .map_err(|e| acquisition_err(reference, e))?;
        } else {
            self.fetch_fresh(reference, &repo_id, &dir)?;
        }

        tracing::debug!(repo = %reference, repo_id = %repo_id, "snapshot acquired");
        Ok(SnapshotHandle {
            reference: reference.clone(),
            repo_id,
            dir,
            _lock: lock,
        })
    }

    fn lock(&self, reference: &RepositoryReference, repo_id: &RepoId) -> Result<File, SnapshotError> {
        let path = self.repos_dir.join(format!("{}.lock", repo_id.0));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| acquisition_err(reference, format!("cannot open {}: {e}", path.display())))?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| acquisition_err(reference, format!("cannot lock {}: {e}", path.display())))?;
        Ok(file)
    }

    /// Clone into `<repo_id>.partial` and rename into place only on success.
    fn fetch_fresh(
        &self,
        reference: &RepositoryReference,
        repo_id: &RepoId,
        dir: &Path,
    ) -> Result<(), SnapshotError> {
        let partial = self.repos_dir.join(format!("{}.partial", repo_id.0));
        if partial.exists() {
            std::fs::remove_dir_all(&partial).map_err(|e| {
                acquisition_err(reference, format!("cannot clear {}: {e}", partial.display()))
            })?;
        }

        if let Err(err) = self.host.fetch(reference, &partial) {
            let _ = std::fs::remove_dir_all(&partial);
            return Err(acquisition_err(reference, err));
        }

        if let Err(err) = std::fs::rename(&partial, dir) {
            let _ = std::fs::remove_dir_all(&partial);
            return Err(acquisition_err(
                reference,
                format!("cannot move snapshot into {}: {err}", dir.display()),
            ));
        }
        Ok(())
    }

    /// Read files from a locked snapshot.
    ///
    /// `None` or an empty slice reads every eligible file. Otherwise exactly the
    /// given repository-relative paths are read; if any of them is missing the
    /// whole read fails with [`SnapshotError::MissingFile`] naming it.
    pub fn read(
        &self,
        handle: &SnapshotHandle,
        paths: Option<&[String]>,
    ) -> Result<FileSet, SnapshotError> {
        let files = match paths {
            Some(paths) if !paths.is_empty() => read_selected(handle.dir(), paths)?,
            _ => read_all(handle.dir(), &self.policy)?,
        };
        tracing::debug!(repo = %handle.reference, files = files.len(), "snapshot read");
        Ok(files)
    }
}

fn read_all(root: &Path, policy: &SnapshotPolicy) -> Result<FileSet, SnapshotError> {
    let mut files = FileSet::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !policy.is_excluded_dir(&entry.file_name().to_string_lossy())
    });

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            read_err(path, source)
        })?;
        if !entry.file_type().is_file() || !policy.is_source_file(entry.path()) {
            continue;
        }
        let relative = relative_key(root, entry.path());
        let content =
            std::fs::read_to_string(entry.path()).map_err(|e| read_err(&relative, e))?;
        files.insert(relative, content);
    }
    Ok(files)
}

fn read_selected(root: &Path, paths: &[String]) -> Result<FileSet, SnapshotError> {
    let canonical_root = root.canonicalize().map_err(|e| read_err(root, e))?;
    // Resolve everything first so a missing path fails before any read.
    let mut resolved = Vec::with_capacity(paths.len());
    for requested in paths {
        let key = normalize_key(requested);
        let full = contained_path(root, &key)
            .and_then(|full| snapshot_file(&canonical_root, &full))
            .ok_or_else(|| SnapshotError::MissingFile {
                path: requested.clone(),
            })?;
        resolved.push((key, full));
    }

    let mut files = FileSet::new();
    for (key, full) in resolved {
        let content = std::fs::read_to_string(&full).map_err(|e| read_err(&key, e))?;
        files.insert(key, content);
    }
    Ok(files)
}

/// `root.join(relative)` if `relative` stays inside `root`.
fn contained_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.as_os_str().is_empty() {
        return None;
    }
    let stays_inside = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    stays_inside.then(|| root.join(relative))
}

/// The symlink-free location of `full` if it is a regular file under
/// `canonical_root`. Links pointing out of the snapshot resolve to `None`.
fn snapshot_file(canonical_root: &Path, full: &Path) -> Option<PathBuf> {
    let canonical = full.canonicalize().ok()?;
    (canonical.starts_with(canonical_root) && canonical.is_file()).then_some(canonical)
}

fn normalize_key(requested: &str) -> String {
    let forward = requested.replace('\\', "/");
    forward.strip_prefix("./").unwrap_or(&forward).to_string()
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
