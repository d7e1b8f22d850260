//! Installation of the encryption layer and the readiness state it owns.

use crate::config::EncryptionConfig;
use crate::error::Error;
use crate::migration::{self, MigrationReport};
use crate::schema::SettingsTableExtension;
use crate::store::{ReadyHandler, Store};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

/// Whether the ready-time migration has completed for the current open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Readiness {
    /// Hooks may or may not be attached yet.
    #[default]
    NotReady,
    /// Hooks are attached and the settings record reflects the configuration.
    Ready,
}

impl Readiness {
    /// Returns `true` for [`Readiness::Ready`].
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Handle returned by [`install`].
///
/// Callers must not touch encrypted tables until [`Session::is_ready`] is
/// `true` (or [`Session::wait_ready`] resolves).
pub struct Session {
    shared: Arc<Shared>,
}

struct Shared {
    config: EncryptionConfig,
    readiness: watch::Sender<Readiness>,
    last_report: Mutex<Option<MigrationReport>>,
}

impl Session {
    /// Current readiness state.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        *self.shared.readiness.borrow()
    }

    /// Returns `true` once the migration of the current open has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Waits until the session becomes ready.
    ///
    /// Never resolves if the ready sequence of the current open failed.
    pub async fn wait_ready(&self) {
        let mut receiver = self.shared.readiness.subscribe();
        // The sender lives in `self.shared`, so the channel cannot close here.
        let _ = receiver.wait_for(|state| state.is_ready()).await;
    }

    /// The configuration this session was installed with.
    #[must_use]
    pub fn config(&self) -> &EncryptionConfig {
        &self.shared.config
    }

    /// Report of the most recent successful migration run.
    #[must_use]
    pub fn last_report(&self) -> Option<MigrationReport> {
        self.shared.last_report.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Installs the encryption layer on a store that has not opened yet.
///
/// Registers the settings-table schema extension, re-applies the current
/// schema version if one was already declared, and subscribes to the store's
/// ready event.
///
/// # Errors
///
/// - `Error::MissingProvider` if tables are configured without a provider
/// - `Error::StoreAlreadyOpen` if the store is past version 0 and no longer
///   accepts the schema touch-up
pub fn install(store: &dyn Store, config: EncryptionConfig) -> Result<Session, Error> {
    if config.provider().is_none() && !config.tables().is_empty() {
        return Err(Error::MissingProvider(config.tables().to_vec()));
    }

    store.extend_schema(Arc::new(SettingsTableExtension));
    if store.version() > 0 {
        store.touch_schema().map_err(|err| {
            warn!(error = %err, "schema touch-up rejected");
            Error::StoreAlreadyOpen
        })?;
    }

    let (readiness, _) = watch::channel(Readiness::NotReady);
    let shared = Arc::new(Shared { config, readiness, last_report: Mutex::new(None) });
    store.on_ready(Arc::new(ReadyStep { shared: Arc::clone(&shared) }));

    Ok(Session { shared })
}

struct ReadyStep {
    shared: Arc<Shared>,
}

#[async_trait]
impl ReadyHandler for ReadyStep {
    async fn on_ready(&self, store: &dyn Store) -> Result<(), Error> {
        self.shared.readiness.send_replace(Readiness::NotReady);

        let report = migration::run(store, &self.shared.config).await?;
        info!(tables = ?self.shared.config.tables(), "encryption layer ready");

        *self.shared.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
        self.shared.readiness.send_replace(Readiness::Ready);
        Ok(())
    }
}
