//! The ready-time migration sequence.
//!
//! Runs once per store open:
//! 1. resolve the settings table,
//! 2. read the previous settings (empty if none),
//! 3. classify every table and install hooks where the scenario requires it,
//! 4. clear the settings table and write the current configuration.
//!
//! Any failure aborts the sequence; the caller only flips readiness after
//! [`run`] returns `Ok`.

use crate::config::EncryptionConfig;
use crate::constants::SETTINGS_TABLE;
use crate::error::Error;
use crate::hooks::EncryptionHooks;
use crate::scenario::{self, Scenario};
use crate::settings::Settings;
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Settings found before this run.
    pub previous: Settings,
    /// Scenario of every declared table, in store order.
    pub scenarios: Vec<(String, Scenario)>,
}

impl MigrationReport {
    /// Scenario of `table`, if it is declared.
    #[must_use]
    pub fn scenario(&self, table: &str) -> Option<Scenario> {
        self.scenarios.iter().find(|(name, _)| name == table).map(|(_, scenario)| *scenario)
    }

    /// Tables that received hooks in this run.
    pub fn hooked_tables(&self) -> impl Iterator<Item = &str> {
        self.scenarios
            .iter()
            .filter(|(_, scenario)| scenario.requires_hooks())
            .map(|(name, _)| name.as_str())
    }
}

/// Runs the migration sequence against an opened store.
///
/// # Errors
///
/// - `Error::EncryptionTableNotFound` if the settings table is missing or the
///   store reports a not-found condition at any step
/// - `Error::MissingProvider` if a table needs hooks but no provider is set
/// - `Error::Store` for any other store failure
pub async fn run(store: &dyn Store, config: &EncryptionConfig) -> Result<MigrationReport, Error> {
    store.table(SETTINGS_TABLE).map_err(Error::from_settings_io)?;

    let previous = store
        .last(SETTINGS_TABLE)
        .await
        .map_err(Error::from_settings_io)?
        .map(|record| Settings::from_record(&record))
        .unwrap_or_default();
    debug!(tables = ?previous.tables, "previous encryption settings");

    let tables = store.tables();
    let planned = scenario::plan(&tables, config.tables(), &previous.tables);

    for (table, scenario) in &planned {
        debug!(table = table.name(), %scenario, "table classified");
        match scenario {
            Scenario::UnencryptedChange | Scenario::EncryptedNoChange => {
                let provider = config
                    .provider()
                    .ok_or_else(|| Error::MissingProvider(config.tables().to_vec()))?;
                let hooks = EncryptionHooks::new((*table).clone(), Arc::clone(provider));
                store
                    .install_hooks(table.name(), Arc::new(hooks))
                    .map_err(Error::from_settings_io)?;
                info!(table = table.name(), %scenario, "encryption hooks installed");
            }
            Scenario::EncryptedChange => {
                warn!(
                    table = table.name(),
                    "table is no longer configured for encryption; stored ciphertext is left in place"
                );
            }
            Scenario::UnencryptedNoChange | Scenario::IsSettingsTable => {}
        }
    }

    let current = Settings::new(config.tables().to_vec());
    store.clear(SETTINGS_TABLE).await.map_err(Error::from_settings_io)?;
    store.put(SETTINGS_TABLE, current.to_record()).await.map_err(Error::from_settings_io)?;

    Ok(MigrationReport {
        previous,
        scenarios: planned.iter().map(|(table, s)| (table.name().to_string(), *s)).collect(),
    })
}
