use std::sync::Arc;

use tracing::info;

use crate::config::SystemConfig;
use crate::repository::{
    Database, DocumentStore, InMemoryDocumentStore, RepositoryError, SledDocumentStore,
};
use crate::sqlite_repository::SqliteDocumentStore;

/// Backend chosen from `storage.dsn`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Sqlite(String),
    Sled(String),
    Memory,
}

impl Backend {
    /// An empty DSN falls back to SQLite at `sqlite_path`.
    pub fn from_dsn(dsn: &str, sqlite_path: &str) -> Result<Self, RepositoryError> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Ok(Backend::Sqlite(sqlite_path.to_string()));
        }
        let lowered = dsn.to_lowercase();
        if lowered.starts_with("memory:") {
            return Ok(Backend::Memory);
        }
        if let Some(path) = strip_scheme(dsn, "sled") {
            return Ok(Backend::Sled(path.to_string()));
        }
        if let Some(path) = strip_scheme(dsn, "sqlite") {
            return Ok(Backend::Sqlite(path.to_string()));
        }
        Err(RepositoryError::Store(format!("unsupported storage dsn: {dsn}")))
    }

    fn describe(&self) -> &'static str {
        match self {
            Backend::Sqlite(_) => "sqlite",
            Backend::Sled(_) => "sled",
            Backend::Memory => "memory",
        }
    }
}

fn strip_scheme<'a>(dsn: &'a str, scheme: &str) -> Option<&'a str> {
    let prefix = format!("{scheme}:");
    let head = dsn.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(&prefix) {
        return None;
    }
    let rest = &dsn[prefix.len()..];
    Some(rest.strip_prefix("//").unwrap_or(rest))
}

/// Opens the configured backend once and hands out the same database
/// handle to every store built on top of it.
#[derive(Clone)]
pub struct ConnectionProvider {
    backend: Backend,
    database: Database,
}

impl ConnectionProvider {
    pub fn from_config(config: &SystemConfig) -> Result<Self, RepositoryError> {
        let backend = Backend::from_dsn(
            &config.get_string("storage.dsn"),
            &config.get_string("storage.sqlite_path"),
        )?;
        let name = config.get_string("storage.database");
        Self::open(backend, &name)
    }

    pub fn open(backend: Backend, database: &str) -> Result<Self, RepositoryError> {
        let store: Arc<dyn DocumentStore> = match &backend {
            Backend::Sqlite(path) => {
                let store = SqliteDocumentStore::open(path)?;
                store.ensure_schema()?;
                Arc::new(store)
            }
            Backend::Sled(path) => Arc::new(SledDocumentStore::open(path)?),
            Backend::Memory => InMemoryDocumentStore::shared(),
        };
        info!(backend = backend.describe(), database, "document store opened");
        Ok(Self {
            backend,
            database: Database::new(database, store),
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn database_handle(&self) -> Database {
        self.database.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dsn_schemes() {
        assert_eq!(
            Backend::from_dsn("", "weather.sqlite").unwrap(),
            Backend::Sqlite("weather.sqlite".into())
        );
        assert_eq!(
            Backend::from_dsn("sqlite://data/w.db", "x").unwrap(),
            Backend::Sqlite("data/w.db".into())
        );
        assert_eq!(
            Backend::from_dsn("sqlite:w.db", "x").unwrap(),
            Backend::Sqlite("w.db".into())
        );
        assert_eq!(
            Backend::from_dsn("SLED:///var/lib/w", "x").unwrap(),
            Backend::Sled("/var/lib/w".into())
        );
        assert_eq!(Backend::from_dsn("memory://", "x").unwrap(), Backend::Memory);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = Backend::from_dsn("mongodb://localhost:27017", "x").unwrap_err();
        assert!(matches!(err, RepositoryError::Store(_)));
    }
}
