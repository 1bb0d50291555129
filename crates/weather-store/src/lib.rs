pub mod account;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod gate;
pub mod query;
pub mod range;
pub mod reading;
pub mod repository;
pub mod sqlite_repository;
pub mod static_config;
pub mod telemetry;

pub use account::{Account, AccountStore, NewAccount, Role, UnknownRole};
pub use bootstrap::{
    load_from_system_config, seed_admin_if_empty, BootstrapError, WeatherBundle,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{default_config_template, ConfigError, SystemConfig, SystemConfigLoader};
pub use connection::{Backend, ConnectionProvider};
pub use document::{Document, InvalidObjectId, ObjectId};
pub use error::StoreError;
pub use gate::{AccessError, AccessGate, DEFAULT_API_KEY_HEADER};
pub use query::{Filter, Operator, Pattern, Scope, Update};
pub use range::TimeRange;
pub use reading::{
    Measurements, PrecipitationSummary, Reading, ReadingInput, ReadingPresentation,
    ReadingSnapshot, TemperatureSummary,
};
pub use repository::{
    Collection, Database, DocumentStore, InMemoryDocumentStore, RepositoryError,
    SledDocumentStore,
};
pub use sqlite_repository::SqliteDocumentStore;
pub use telemetry::{NullTemperature, TelemetryOptions, TelemetryStore};
