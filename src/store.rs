//! Token store: persisted `access_token` / `refresh_token` pair.
//!
//! DESIGN
//! ======
//! The store is the single source of truth for "am I logged in". It is a
//! plain key-value wrapper with no network access and no events; the
//! refresher and the session manager emit notifications after they mutate it.
//!
//! ERROR HANDLING
//! ==============
//! Storage failures never propagate. An unreadable or corrupt file reads as
//! an empty session and a failed write is logged, so callers always fall back
//! to "tokens absent".

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

// =============================================================================
// KEYS & SNAPSHOT
// =============================================================================

/// The two persisted credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    AccessToken,
    RefreshToken,
}

impl TokenKey {
    pub const ALL: [Self; 2] = [Self::AccessToken, Self::RefreshToken];

    /// Fixed storage name of this key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Point-in-time view of the stored tokens. Tokens are opaque strings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn get(&self, key: TokenKey) -> Option<&str> {
        let slot = match key {
            TokenKey::AccessToken => &self.access_token,
            TokenKey::RefreshToken => &self.refresh_token,
        };
        slot.as_deref().filter(|v| !v.is_empty())
    }

    fn slot_mut(&mut self, key: TokenKey) -> &mut Option<String> {
        match key {
            TokenKey::AccessToken => &mut self.access_token,
            TokenKey::RefreshToken => &mut self.refresh_token,
        }
    }

    /// `true` when neither token is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        TokenKey::ALL.iter().all(|key| self.get(*key).is_none())
    }
}

// Token values stay out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.get(TokenKey::AccessToken).map(|_| "<redacted>"))
            .field("refresh_token", &self.get(TokenKey::RefreshToken).map(|_| "<redacted>"))
            .finish()
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Key-value storage for the session tokens. Swappable for an in-memory fake.
pub trait TokenStore: Send + Sync {
    /// Current value of `key`; empty values read as absent.
    fn get(&self, key: TokenKey) -> Option<String>;

    fn set(&self, key: TokenKey, value: &str);

    fn clear(&self, keys: &[TokenKey]);

    fn snapshot(&self) -> Session {
        Session { access_token: self.get(TokenKey::AccessToken), refresh_token: self.get(TokenKey::RefreshToken) }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Used by tests and by sessions that must not persist.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: Mutex<Session>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given tokens.
    #[must_use]
    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        Self {
            session: Mutex::new(Session {
                access_token: access_token.map(str::to_owned),
                refresh_token: refresh_token.map(str::to_owned),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        lock(&self.session).get(key).map(str::to_owned)
    }

    fn set(&self, key: TokenKey, value: &str) {
        *lock(&self.session).slot_mut(key) = Some(value.to_owned());
    }

    fn clear(&self, keys: &[TokenKey]) {
        let mut session = lock(&self.session);
        for key in keys {
            *session.slot_mut(*key) = None;
        }
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON file shared by every process pointed at the same path.
///
/// Reads go to disk each time so that writes from other processes are
/// visible immediately. Each read-modify-write holds an exclusive advisory
/// lock on a sibling `.lock` file, so concurrent writers in any process are
/// serialized. The new document is written to a uniquely named temp file in
/// the same directory and renamed over the old one, so readers never observe
/// a half-written document.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileTokenStore {
    /// Open the store at `path`, creating its parent directory if needed.
    ///
    /// Existing tokens are picked up as-is; nothing is written until the
    /// first `set` or `clear`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "token store directory unavailable");
            }
        }

        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        let store = Self { path, lock_path };
        let existing = store.load();
        tracing::debug!(path = %store.path.display(), session = ?existing, "token store opened");
        store
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Session {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Session::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "token store unreadable");
                return Session::default();
            }
        };
        if raw.trim().is_empty() {
            return Session::default();
        }
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "token store corrupt; treating as empty");
            Session::default()
        })
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn persist(&self, session: &Session) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(session).map_err(std::io::Error::other)?;
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn open_lock(&self) -> Option<RwLock<File>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path);
        match file {
            Ok(file) => Some(RwLock::new(file)),
            Err(e) => {
                tracing::warn!(path = %self.lock_path.display(), error = %e, "token store lock unavailable");
                None
            }
        }
    }

    /// Read-modify-write under the cross-process lock.
    ///
    /// If the lock cannot be taken the write still happens, unserialized.
    fn update(&self, apply: impl FnOnce(&mut Session)) {
        let mut file_lock = self.open_lock();
        let _held = file_lock.as_mut().and_then(|l| {
            l.write()
                .inspect_err(|e| {
                    tracing::warn!(path = %self.lock_path.display(), error = %e, "token store lock failed");
                })
                .ok()
        });

        let mut session = self.load();
        apply(&mut session);
        if let Err(e) = self.persist(&session) {
            tracing::warn!(path = %self.path.display(), error = %e, "token store write failed");
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Option<String> {
        self.load().get(key).map(str::to_owned)
    }

    fn set(&self, key: TokenKey, value: &str) {
        self.update(|session| *session.slot_mut(key) = Some(value.to_owned()));
    }

    fn clear(&self, keys: &[TokenKey]) {
        self.update(|session| {
            for key in keys {
                *session.slot_mut(*key) = None;
            }
        });
    }

    // One read, so both tokens come from the same version of the file.
    fn snapshot(&self) -> Session {
        let session = self.load();
        Session {
            access_token: session.get(TokenKey::AccessToken).map(str::to_owned),
            refresh_token: session.get(TokenKey::RefreshToken).map(str::to_owned),
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
