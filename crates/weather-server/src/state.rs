use std::path::Path;
use std::sync::Arc;

use tracing::info;
use weather_store::{
    default_config_template, load_from_system_config, AccessGate, AccountStore, Clock,
    SystemConfig, TelemetryStore, WeatherBundle,
};

use crate::error::AppError;

pub struct AppState {
    pub accounts: AccountStore,
    pub telemetry: TelemetryStore,
    pub gate: AccessGate,
}

impl AppState {
    pub fn from_bundle(bundle: WeatherBundle) -> Self {
        Self {
            accounts: bundle.accounts,
            telemetry: bundle.telemetry,
            gate: bundle.gate,
        }
    }

    /// Opens the configured store and seeds the first TEACHER account if
    /// the store has none. The seeded key is logged once.
    pub fn from_config(config: &SystemConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let bundle = load_from_system_config(config, clock)?;
        if let Some(account) = &bundle.seeded {
            info!(
                account_id = %account.id,
                api_key = %account.api_key,
                "bootstrap TEACHER account created; store this key"
            );
        }
        Ok(Self::from_bundle(bundle))
    }
}

pub fn create_default_config(path: &Path) -> Result<String, AppError> {
    let content = default_config_template();
    std::fs::write(path, content.as_bytes())?;
    Ok(content)
}
