//! Query ledger: the audit trail of pipeline invocations.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tinygen/
//!   queries/
//!     1.yaml        (one record per query, mode 0600)
//!     2.yaml
//! ```
//!
//! Identifiers are assigned sequentially. A new identifier is reserved with an
//! exclusive create of `<id>.yaml`, so two processes sharing a home never hand
//! out the same id. Record contents are always written to a `.tmp` sibling and
//! renamed into place.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::error::{ledger_io, LedgerError};
use crate::types::{Query, QueryId, RepositoryReference};

/// Create/update-by-id store for [`Query`] records.
pub trait QueryLedger: Send + Sync {
    /// Store a new record with no diff and return it with its assigned id.
    fn create(&self, reference: &RepositoryReference, prompt: &str) -> Result<Query, LedgerError>;

    /// Set the diff of record `id`, refresh its update timestamp and return it.
    fn attach_result(&self, id: QueryId, diff: &str) -> Result<Query, LedgerError>;

    /// Fetch record `id`.
    fn get(&self, id: QueryId) -> Result<Query, LedgerError>;
}

/// A timestamp strictly after `previous`, normally "now".
fn refreshed_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

// ---------------------------------------------------------------------------
// File-backed ledger
// ---------------------------------------------------------------------------

/// Durable ledger keeping one YAML file per query under `<home>/.tinygen/queries/`.
#[derive(Debug)]
pub struct FileLedger {
    dir: PathBuf,
    // Serialises read-modify-write cycles issued from this process.
    lock: Mutex<()>,
}

impl FileLedger {
    /// Ledger rooted at `<home>/.tinygen/queries/`. No I/O until first use.
    pub fn at(home: &Path) -> Self {
        Self {
            dir: queries_dir_at(home),
            lock: Mutex::new(()),
        }
    }

    /// `at` convenience wrapper using `dirs::home_dir()`.
    pub fn open() -> Result<Self, LedgerError> {
        let home = dirs::home_dir().ok_or(LedgerError::HomeNotFound)?;
        Ok(Self::at(&home))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>.yaml`. Pure, no I/O.
    pub fn record_path(&self, id: QueryId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id.0))
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_dir(&self) -> Result<(), LedgerError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| ledger_io(&self.dir, e))?;
            set_dir_permissions(&self.dir)?;
        }
        Ok(())
    }

    fn highest_id(&self) -> Result<u64, LedgerError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ledger_io(&self.dir, e))?;
        let highest = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".yaml")?.parse::<u64>().ok()
            })
            .max()
            .unwrap_or(0);
        Ok(highest)
    }

    /// Reserve the next free id by exclusively creating its (empty) record file.
    fn reserve_id(&self) -> Result<QueryId, LedgerError> {
        let mut candidate = self.highest_id()? + 1;
        loop {
            let path = self.record_path(QueryId(candidate));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(QueryId(candidate)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => candidate += 1,
                Err(err) => return Err(ledger_io(path, err)),
            }
        }
    }

    fn load(&self, id: QueryId) -> Result<Query, LedgerError> {
        let path = self.record_path(id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LedgerError::NotFound { id })
            }
            Err(err) => return Err(ledger_io(path, err)),
        };
        // A reserved id whose record write has not landed yet.
        if contents.trim().is_empty() {
            return Err(LedgerError::NotFound { id });
        }
        serde_yaml::from_str(&contents).map_err(|source| LedgerError::Parse { path, source })
    }

    /// Write flow: serialize → `<id>.yaml.tmp` → `chmod 0600` → `rename`.
    fn save(&self, query: &Query) -> Result<(), LedgerError> {
        let path = self.record_path(query.id);
        let tmp = path.with_file_name(format!("{}.yaml.tmp", query.id.0));
        let yaml = serde_yaml::to_string(query)?;
        std::fs::write(&tmp, yaml).map_err(|e| ledger_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(err) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(ledger_io(&path, err));
        }
        Ok(())
    }
}

impl QueryLedger for FileLedger {
    fn create(&self, reference: &RepositoryReference, prompt: &str) -> Result<Query, LedgerError> {
        let _guard = self.guard();
        self.ensure_dir()?;
        let id = self.reserve_id()?;
        let now = Utc::now();
        let query = Query {
            id,
            repo_url: reference.clone(),
            prompt: prompt.to_string(),
            diff: None,
            created_at: now,
            updated_at: now,
        };
        if let Err(err) = self.save(&query) {
            let _ = std::fs::remove_file(self.record_path(id));
            return Err(err);
        }
        tracing::debug!(query_id = %id, "query record created");
        Ok(query)
    }

    fn attach_result(&self, id: QueryId, diff: &str) -> Result<Query, LedgerError> {
        let _guard = self.guard();
        let mut query = self.load(id)?;
        query.diff = Some(diff.to_string());
        query.updated_at = refreshed_timestamp(query.created_at.max(query.updated_at));
        self.save(&query)?;
        tracing::debug!(query_id = %id, "query diff attached");
        Ok(query)
    }

    fn get(&self, id: QueryId) -> Result<Query, LedgerError> {
        self.load(id)
    }
}

/// `<home>/.tinygen/queries/`. Pure, no I/O.
pub fn queries_dir_at(home: &Path) -> PathBuf {
    home.join(".tinygen").join("queries")
}

// ---------------------------------------------------------------------------
// In-memory ledger
// ---------------------------------------------------------------------------

/// Process-local ledger; records vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<BTreeMap<QueryId, Query>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<QueryId, Query>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl QueryLedger for MemoryLedger {
    fn create(&self, reference: &RepositoryReference, prompt: &str) -> Result<Query, LedgerError> {
        let mut records = self.guard();
        let id = QueryId(records.keys().next_back().map_or(1, |last| last.0 + 1));
        let now = Utc::now();
        let query = Query {
            id,
            repo_url: reference.clone(),
            prompt: prompt.to_string(),
            diff: None,
            created_at: now,
            updated_at: now,
        };
        records.insert(id, query.clone());
        Ok(query)
    }

    fn attach_result(&self, id: QueryId, diff: &str) -> Result<Query, LedgerError> {
        let mut records = self.guard();
        let query = records.get_mut(&id).ok_or(LedgerError::NotFound { id })?;
        query.diff = Some(diff.to_string());
        query.updated_at = refreshed_timestamp(query.created_at.max(query.updated_at));
        Ok(query.clone())
    }

    fn get(&self, id: QueryId) -> Result<Query, LedgerError> {
        self.guard().get(&id).cloned().ok_or(LedgerError::NotFound { id })
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), LedgerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| ledger_io(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), LedgerError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), LedgerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| ledger_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), LedgerError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
