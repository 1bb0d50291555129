use std::sync::Arc;

use tracing::info;

use crate::account::{Account, AccountStore, NewAccount, Role};
use crate::clock::Clock;
use crate::config::{ConfigError, SystemConfig};
use crate::connection::ConnectionProvider;
use crate::error::StoreError;
use crate::gate::AccessGate;
use crate::repository::RepositoryError;
use crate::telemetry::{TelemetryOptions, TelemetryStore};

/// Creates the first TEACHER account when seeding is enabled and the
/// account collection is empty. Returns the account when one was created.
pub fn seed_admin_if_empty(
    accounts: &AccountStore,
    config: &SystemConfig,
) -> Result<Option<Account>, StoreError> {
    if !config.get_bool("bootstrap.seed_admin") {
        return Ok(None);
    }
    if accounts.count()? > 0 {
        return Ok(None);
    }
    let account = accounts.create_account(NewAccount {
        name: config.get_string("bootstrap.admin_name"),
        email: config.get_string("bootstrap.admin_email"),
        role: Role::Teacher,
    })?;
    info!(account_id = %account.id, email = %account.email, "seeded bootstrap account");
    Ok(Some(account))
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stores and gate sharing one database handle.
#[derive(Clone)]
pub struct WeatherBundle {
    pub accounts: AccountStore,
    pub telemetry: TelemetryStore,
    pub gate: AccessGate,
    pub seeded: Option<Account>,
}

pub fn load_from_system_config(
    config: &SystemConfig,
    clock: Arc<dyn Clock>,
) -> Result<WeatherBundle, BootstrapError> {
    let provider = ConnectionProvider::from_config(config)?;
    let database = provider.database_handle();
    let options = TelemetryOptions::from_config(config)?;

    let accounts = AccountStore::new(&database, clock.clone());
    let telemetry = TelemetryStore::new(&database, clock, options);
    let gate = AccessGate::new(
        accounts.clone(),
        &config.get_string("security.api_key_header"),
    )?;
    let seeded = seed_admin_if_empty(&accounts, config)?;
    Ok(WeatherBundle {
        accounts,
        telemetry,
        gate,
        seeded,
    })
}
