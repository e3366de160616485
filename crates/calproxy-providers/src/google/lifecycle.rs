//! Credential lifecycle management.
//!
//! [`CredentialManager::acquire`] is called on every proxied request. It
//! returns the stored credential when it is usable and otherwise renews it,
//! preferring a silent refresh and falling back to interactive authorization.
//!
//! The hot path takes no async lock. Renewal is serialized by one async mutex and
//! re-checks the store after acquiring it, so concurrent callers that all
//! observed an expired credential trigger a single refresh.
//!
//! An interactive flow runs while holding the renewal lock. Other callers
//! that need a renewal wait until it completes or times out.
//!
//! A renewed credential the store refused to save is kept in memory and
//! served until it expires, so a read-only store does not turn every request
//! into a renewal.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

use super::authorize::Authorizer;
use super::config::REQUIRED_SCOPES;
use super::oauth::TokenRefresher;
use super::tokens::{Credential, CredentialStore};

/// Diagnostic view of the stored credential. Carries no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub present: bool,
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
    pub scopes_ok: bool,
    pub scopes: Vec<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl CredentialStatus {
    fn absent() -> Self {
        Self {
            present: false,
            valid: false,
            expires_at: None,
            has_refresh_token: false,
            scopes_ok: false,
            scopes: Vec::new(),
            last_refresh: None,
        }
    }

    /// True when requests can be served without renewing.
    pub fn is_usable(&self) -> bool {
        self.valid && self.scopes_ok
    }
}

/// Owns the credential for the process.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    authorizer: Arc<dyn Authorizer>,
    scopes: Vec<String>,
    renewal: Mutex<()>,
    /// Last renewal the store failed to persist.
    unsaved: RwLock<Option<Credential>>,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            store,
            refresher,
            authorizer,
            scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
            renewal: Mutex::new(()),
            unsaved: RwLock::new(None),
        }
    }

    /// Overrides the required scope set.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns a usable credential, renewing it if needed.
    ///
    /// # Errors
    ///
    /// Fails with `AuthenticationFailed` when no credential could be
    /// obtained. A transient refresh failure keeps the stored refresh token
    /// and does not start an interactive flow.
    pub async fn acquire(&self) -> ProviderResult<Credential> {
        if let Some(credential) = self.load()
            && self.is_usable(&credential)
        {
            return Ok(credential);
        }

        let _guard = self.renewal.lock().await;

        let current = self.load();
        if let Some(credential) = &current
            && self.is_usable(credential)
        {
            debug!("credential renewed by a concurrent caller");
            return Ok(credential.clone());
        }

        self.renew(current).await
    }

    /// Runs a fresh interactive authorization regardless of the stored state.
    ///
    /// Unlike [`acquire`](Self::acquire), a failure to persist the result is
    /// an error here: the caller asked for a stored credential.
    pub async fn authorize_now(&self) -> ProviderResult<Credential> {
        let _guard = self.renewal.lock().await;
        let credential = self.authorize().await?;
        self.store.save(&credential)?;
        self.set_unsaved(None);
        info!("stored new credential");
        Ok(credential)
    }

    /// Describes the stored credential.
    pub fn status(&self) -> CredentialStatus {
        let Some(credential) = self.load() else {
            return CredentialStatus::absent();
        };

        CredentialStatus {
            present: true,
            valid: credential.is_valid(),
            expires_at: credential.expires_at,
            has_refresh_token: credential.can_refresh(),
            scopes_ok: credential.has_scopes(&self.scopes),
            scopes: credential.scopes.iter().cloned().collect(),
            last_refresh: Some(credential.last_refresh),
        }
    }

    /// Removes the stored credential.
    pub async fn logout(&self) -> ProviderResult<()> {
        let _guard = self.renewal.lock().await;
        self.store.clear()?;
        self.set_unsaved(None);
        info!("credential removed");
        Ok(())
    }

    fn is_usable(&self, credential: &Credential) -> bool {
        credential.is_valid() && credential.has_scopes(&self.scopes)
    }

    /// Current credential: the stored one, unless it is unusable and a
    /// newer renewal is only held in memory.
    fn load(&self) -> Option<Credential> {
        let stored = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load credential, treating it as absent");
            None
        });

        if let Some(credential) = &stored
            && self.is_usable(credential)
        {
            return stored;
        }

        let unsaved = self
            .unsaved
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        unsaved.or(stored)
    }

    fn set_unsaved(&self, credential: Option<Credential>) {
        *self.unsaved.write().unwrap_or_else(|e| e.into_inner()) = credential;
    }

    /// Renewal proper. Must be called with the renewal lock held.
    async fn renew(&self, current: Option<Credential>) -> ProviderResult<Credential> {
        if let Some(credential) = current
            && credential.has_scopes(&self.scopes)
            && let Some(refresh_token) = credential.refresh_token.as_deref().filter(|t| !t.is_empty())
        {
            debug!("access token expired, refreshing");
            match self.refresher.refresh(refresh_token).await {
                Ok(token) => {
                    let renewed = credential.refreshed(token);
                    self.persist(&renewed);
                    info!(expires_at = ?renewed.expires_at, "credential refreshed");
                    return Ok(renewed);
                }
                Err(e) if e.code() == ProviderErrorCode::AuthenticationFailed => {
                    warn!(error = %e, "refresh grant rejected, starting authorization");
                }
                Err(e) => {
                    warn!(error = %e, "credential refresh failed");
                    let mut failure = ProviderError::authentication(format!(
                        "credential refresh failed: {}",
                        e.message()
                    ))
                    .with_provider("oauth");
                    if let Some(status) = e.status() {
                        failure = failure.with_status(status);
                    }
                    return Err(failure.with_source(e));
                }
            }
        } else {
            debug!("no refreshable credential, starting authorization");
        }

        let credential = self.authorize().await?;
        self.persist(&credential);
        Ok(credential)
    }

    async fn authorize(&self) -> ProviderResult<Credential> {
        let credential = self.authorizer.authorize(&self.scopes).await.map_err(|e| {
            if e.code() == ProviderErrorCode::AuthenticationFailed {
                e
            } else {
                ProviderError::authentication(format!("authorization failed: {}", e.message()))
                    .with_source(e)
            }
        })?;

        if !credential.has_scopes(&self.scopes) {
            let missing: Vec<&str> = self
                .scopes
                .iter()
                .filter(|s| !credential.scopes.contains(s.as_str()))
                .map(String::as_str)
                .collect();
            return Err(ProviderError::authentication(format!(
                "granted scopes do not include: {}",
                missing.join(", ")
            )));
        }

        info!("obtained credential through authorization");
        Ok(credential)
    }

    /// Saves `credential`, logging instead of failing. On failure the
    /// credential is kept in memory for later calls.
    fn persist(&self, credential: &Credential) {
        match self.store.save(credential) {
            Ok(()) => self.set_unsaved(None),
            Err(e) => {
                error!(error = %e, "failed to persist credential, keeping it in memory only");
                self.set_unsaved(Some(credential.clone()));
            }
        }
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
