use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, Transaction};

use crate::document::Document;
use crate::query::{Filter, Scope, Update};
use crate::repository::{DocumentStore, RepositoryError};

/// Documents stored as JSON text in a single table; `seq` gives the natural
/// order. Filters are evaluated on the decoded bodies.
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    pub fn open(path: &str) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS documents_collection ON documents (collection, seq);",
        )
        .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(())
    }
}

fn load_matching(
    tx: &Transaction<'_>,
    collection: &str,
    filter: &Filter,
    scope: Scope,
) -> Result<Vec<(i64, Document)>, RepositoryError> {
    let mut stmt = tx
        .prepare("SELECT seq, body FROM documents WHERE collection = ?1 ORDER BY seq ASC")
        .map_err(|err| RepositoryError::Store(err.to_string()))?;
    let mut rows = stmt
        .query(params![collection])
        .map_err(|err| RepositoryError::Store(err.to_string()))?;
    let mut matched = Vec::new();
    while let Some(row) = rows.next().map_err(|err| RepositoryError::Store(err.to_string()))? {
        let seq: i64 = row
            .get(0)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        let body: String = row
            .get(1)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        let document: Document = serde_json::from_str(&body)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        if filter.evaluate(&document) {
            matched.push((seq, document));
            if scope == Scope::One {
                break;
            }
        }
    }
    Ok(matched)
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&self, collection: &str, documents: Vec<Document>) -> Result<(), RepositoryError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        for document in &documents {
            let body = serde_json::to_string(document)
                .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
            tx.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection, body],
            )
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        }
        tx.commit()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(())
    }

    fn insert_unless(
        &self,
        collection: &str,
        guard: &Filter,
        document: Document,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        if !load_matching(&tx, collection, guard, Scope::One)?.is_empty() {
            return Ok(false);
        }
        let body = serde_json::to_string(&document)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        tx.execute(
            "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
            params![collection, body],
        )
        .map_err(|err| RepositoryError::Store(err.to_string()))?;
        tx.commit()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(true)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RepositoryError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        let matched = load_matching(&tx, collection, filter, Scope::Many)?;
        Ok(matched.into_iter().map(|(_, document)| document).collect())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        let matched = load_matching(&tx, collection, filter, scope)?;
        for (seq, mut document) in matched.iter().cloned() {
            update.apply(&mut document);
            let body = serde_json::to_string(&document)
                .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
            tx.execute(
                "UPDATE documents SET body = ?1 WHERE seq = ?2",
                params![body, seq],
            )
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        }
        tx.commit()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(matched.len() as u64)
    }

    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        let matched = load_matching(&tx, collection, filter, scope)?;
        for (seq, _) in &matched {
            tx.execute("DELETE FROM documents WHERE seq = ?1", params![seq])
                .map_err(|err| RepositoryError::Store(err.to_string()))?;
        }
        tx.commit()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(matched.len() as u64)
    }
}
