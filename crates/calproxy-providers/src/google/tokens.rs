//! Credential model and persistence.
//!
//! A [`Credential`] is the single OAuth token set the proxy works with. It is
//! persisted through a [`CredentialStore`]; the default backend is a JSON file
//! written atomically with restrictive permissions.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ProviderError;

use super::oauth::RefreshedToken;

/// Seconds shaved off the provider-reported lifetime so a token is renewed
/// before Google starts rejecting it.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Upper bound on a provider-reported lifetime. Google issues one hour.
const MAX_EXPIRES_IN_SECS: i64 = 366 * 24 * 60 * 60;

/// An OAuth access/refresh token pair plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token attached to API requests.
    pub access_token: String,

    /// Token used to obtain new access tokens without user interaction.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token stops being usable. `None` means no known expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Scopes granted by the user.
    #[serde(default)]
    pub scopes: BTreeSet<String>,

    /// Token type reported by the token endpoint, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// When the access token was obtained.
    #[serde(default = "Utc::now")]
    pub last_refresh: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Converts a provider `expires_in` into a conservative absolute expiry.
///
/// Negative lifetimes expire immediately and absurd ones are capped.
fn expiry_from(expires_in_secs: i64) -> DateTime<Utc> {
    let now = Utc::now();
    let lifetime = expires_in_secs.clamp(0, MAX_EXPIRES_IN_SECS);
    let usable = if lifetime > 2 * EXPIRY_MARGIN_SECS {
        lifetime - EXPIRY_MARGIN_SECS
    } else {
        lifetime / 2
    };
    Duration::try_seconds(usable)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}

impl Credential {
    /// Creates a credential from token endpoint data.
    pub fn new<I, S>(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from),
            scopes: scopes.into_iter().map(Into::into).collect(),
            token_type: default_token_type(),
            last_refresh: Utc::now(),
        }
    }

    /// Returns true once the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// A credential is valid when it has an access token that has not expired.
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }

    /// Returns true if every required scope was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|s| self.scopes.contains(s.as_ref()))
    }

    /// Returns true if a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Builds the credential that results from a successful refresh.
    ///
    /// The refresh token is kept unless the provider rotated it, and the
    /// scope set is only replaced when the provider reports one.
    pub fn refreshed(&self, token: RefreshedToken) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: token.expires_in.map(expiry_from),
            scopes: token.scopes.unwrap_or_else(|| self.scopes.clone()),
            token_type: token.token_type.unwrap_or_else(|| self.token_type.clone()),
            last_refresh: Utc::now(),
        }
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|at| at - Utc::now())
    }
}

/// Errors raised by a credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {action} credential file {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize credential: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StoreError> for ProviderError {
    fn from(err: StoreError) -> Self {
        ProviderError::storage(err.to_string()).with_source(err)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable single-record persistence for the credential.
pub trait CredentialStore: Send + Sync {
    /// Reads the persisted credential.
    ///
    /// A missing or unparseable record is reported as `Ok(None)`; only
    /// failures to read an existing record are errors.
    fn load(&self) -> StoreResult<Option<Credential>>;

    /// Replaces the persisted credential.
    fn save(&self, credential: &Credential) -> StoreResult<()>;

    /// Removes the persisted credential.
    fn clear(&self) -> StoreResult<()>;
}

/// JSON file backed credential store.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the record location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credential".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> StoreResult<Option<Credential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no credential file");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io("read", &self.path, e)),
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                debug!(path = %self.path.display(), "loaded credential");
                Ok(Some(credential))
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unparseable credential file");
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &Credential) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory for", &self.path, e))?;
        }

        let content = serde_json::to_string_pretty(credential)?;

        // Readers only ever observe the old or the new record.
        let temp_path = self.temp_path();
        match fs::remove_file(&temp_path) {
            Ok(()) => debug!(path = %temp_path.display(), "removed stale temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io("remove stale", &temp_path, e)),
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options.open(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io("write", &temp_path, e));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::io("replace", &self.path, e));
        }

        debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "removed credential file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", &self.path, e)),
        }
    }
}

/// In-process credential store.
///
/// Nothing survives a restart. Counts loads and saves so callers can verify
/// how often the record was touched.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
            ..Self::default()
        }
    }

    /// Returns the current record without counting a load.
    pub fn snapshot(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> StoreResult<Option<Credential>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    fn save(&self, credential: &Credential) -> StoreResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.credential.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        *self.credential.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
