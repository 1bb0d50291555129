use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::document::Document;
use crate::query::{Filter, Scope, Update};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("pattern error: {0}")]
    Pattern(String),
}

impl From<regex::Error> for RepositoryError {
    fn from(err: regex::Error) -> Self {
        RepositoryError::Pattern(err.to_string())
    }
}

/// Backing document store. Collections are created on first use; `find`
/// returns documents in natural (insertion) order.
///
/// Each call is atomic only as far as the backend makes it so.
pub trait DocumentStore: Send + Sync {
    fn insert(&self, collection: &str, documents: Vec<Document>) -> Result<(), RepositoryError>;
    /// Inserts `document` only if nothing in the collection matches `guard`.
    /// The check and the write happen as one step. Returns whether the
    /// document was stored.
    fn insert_unless(
        &self,
        collection: &str,
        guard: &Filter,
        document: Document,
    ) -> Result<bool, RepositoryError>;
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RepositoryError>;
    /// Returns the number of matched documents.
    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        scope: Scope,
    ) -> Result<u64, RepositoryError>;
    /// Returns the number of removed documents.
    fn delete(&self, collection: &str, filter: &Filter, scope: Scope)
        -> Result<u64, RepositoryError>;
}

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert(&self, collection: &str, documents: Vec<Document>) -> Result<(), RepositoryError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(())
    }

    fn insert_unless(
        &self,
        collection: &str,
        guard: &Filter,
        document: Document,
    ) -> Result<bool, RepositoryError> {
        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.iter().any(|existing| guard.evaluate(existing)) {
            return Ok(false);
        }
        documents.push(document);
        Ok(true)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RepositoryError> {
        let collections = self.collections.read();
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|document| filter.evaluate(document))
            .cloned()
            .collect())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut matched = 0;
        for document in documents.iter_mut() {
            if !filter.evaluate(document) {
                continue;
            }
            update.apply(document);
            matched += 1;
            if scope == Scope::One {
                break;
            }
        }
        Ok(matched)
    }

    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut removed = 0;
        documents.retain(|document| {
            if scope == Scope::One && removed > 0 {
                return true;
            }
            if filter.evaluate(document) {
                removed += 1;
                return false;
            }
            true
        });
        Ok(removed)
    }
}

/// One sled tree per collection, keyed by the big-endian ids from
/// `generate_id`, which keeps iteration in insertion order.
#[derive(Clone)]
pub struct SledDocumentStore {
    db: sled::Db,
    guarded: Arc<Mutex<()>>,
}

impl SledDocumentStore {
    pub fn open(path: &str) -> Result<Self, RepositoryError> {
        let db = sled::open(path).map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(Self {
            db,
            guarded: Arc::new(Mutex::new(())),
        })
    }

    fn batch_insert(
        &self,
        batch: &mut sled::Batch,
        document: &Document,
    ) -> Result<(), RepositoryError> {
        let key = self
            .db
            .generate_id()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        let payload = serde_json::to_vec(document)
            .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
        batch.insert(key.to_be_bytes().to_vec(), payload);
        Ok(())
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree, RepositoryError> {
        self.db
            .open_tree(collection)
            .map_err(|err| RepositoryError::Store(err.to_string()))
    }

    fn matching(
        &self,
        tree: &sled::Tree,
        filter: &Filter,
    ) -> Result<Vec<(sled::IVec, Document)>, RepositoryError> {
        let mut matched = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry.map_err(|err| RepositoryError::Store(err.to_string()))?;
            let document: Document = serde_json::from_slice(&value)
                .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
            if filter.evaluate(&document) {
                matched.push((key, document));
            }
        }
        Ok(matched)
    }

    fn commit(&self, tree: &sled::Tree, batch: sled::Batch) -> Result<(), RepositoryError> {
        tree.apply_batch(batch)
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        self.db
            .flush()
            .map_err(|err| RepositoryError::Store(err.to_string()))?;
        Ok(())
    }
}

impl DocumentStore for SledDocumentStore {
    fn insert(&self, collection: &str, documents: Vec<Document>) -> Result<(), RepositoryError> {
        let tree = self.tree(collection)?;
        let mut batch = sled::Batch::default();
        for document in &documents {
            self.batch_insert(&mut batch, document)?;
        }
        self.commit(&tree, batch)
    }

    // Serialized on a lock shared by clones of this store.
    fn insert_unless(
        &self,
        collection: &str,
        guard: &Filter,
        document: Document,
    ) -> Result<bool, RepositoryError> {
        let _guarded = self.guarded.lock();
        let tree = self.tree(collection)?;
        if !self.matching(&tree, guard)?.is_empty() {
            return Ok(false);
        }
        let mut batch = sled::Batch::default();
        self.batch_insert(&mut batch, &document)?;
        self.commit(&tree, batch)?;
        Ok(true)
    }

    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RepositoryError> {
        let tree = self.tree(collection)?;
        Ok(self
            .matching(&tree, filter)?
            .into_iter()
            .map(|(_, document)| document)
            .collect())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let tree = self.tree(collection)?;
        let mut matched = self.matching(&tree, filter)?;
        if scope == Scope::One {
            matched.truncate(1);
        }
        let mut batch = sled::Batch::default();
        for (key, mut document) in matched.iter().cloned() {
            update.apply(&mut document);
            let payload = serde_json::to_vec(&document)
                .map_err(|err| RepositoryError::Serialization(err.to_string()))?;
            batch.insert(key, payload);
        }
        self.commit(&tree, batch)?;
        Ok(matched.len() as u64)
    }

    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        scope: Scope,
    ) -> Result<u64, RepositoryError> {
        let tree = self.tree(collection)?;
        let mut matched = self.matching(&tree, filter)?;
        if scope == Scope::One {
            matched.truncate(1);
        }
        let mut batch = sled::Batch::default();
        for (key, _) in &matched {
            batch.remove(key.clone());
        }
        self.commit(&tree, batch)?;
        Ok(matched.len() as u64)
    }
}

/// Named database handle: every collection it hands out lives under
/// `<database>.<collection>` in the backing store.
#[derive(Clone)]
pub struct Database {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl Database {
    pub fn new(name: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, InMemoryDocumentStore::shared())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, name: &str) -> Collection {
        Collection {
            name: format!("{}.{}", self.name, name),
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert_one(&self, document: Document) -> Result<(), RepositoryError> {
        self.store.insert(&self.name, vec![document])
    }

    pub fn insert_many(&self, documents: Vec<Document>) -> Result<(), RepositoryError> {
        if documents.is_empty() {
            return Ok(());
        }
        self.store.insert(&self.name, documents)
    }

    pub fn insert_unless(
        &self,
        guard: &Filter,
        document: Document,
    ) -> Result<bool, RepositoryError> {
        self.store.insert_unless(&self.name, guard, document)
    }

    pub fn find(&self, filter: &Filter) -> Result<Vec<Document>, RepositoryError> {
        self.store.find(&self.name, filter)
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<Document>, RepositoryError> {
        Ok(self.find(filter)?.into_iter().next())
    }

    pub fn count(&self, filter: &Filter) -> Result<usize, RepositoryError> {
        Ok(self.find(filter)?.len())
    }

    pub fn update_one(&self, filter: &Filter, update: &Update) -> Result<u64, RepositoryError> {
        self.store.update(&self.name, filter, update, Scope::One)
    }

    pub fn update_many(&self, filter: &Filter, update: &Update) -> Result<u64, RepositoryError> {
        self.store.update(&self.name, filter, update, Scope::Many)
    }

    pub fn delete_one(&self, filter: &Filter) -> Result<u64, RepositoryError> {
        self.store.delete(&self.name, filter, Scope::One)
    }

    pub fn delete_many(&self, filter: &Filter) -> Result<u64, RepositoryError> {
        self.store.delete(&self.name, filter, Scope::Many)
    }
}
