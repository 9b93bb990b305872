use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::document::ServiceDocument;
use super::query::{SearchHits, SearchQuery};
use crate::marketplace::domain::ServiceId;

/// Text-search backend holding the denormalized service mirror.
pub trait SearchIndex: Send + Sync {
    fn upsert(&self, document: ServiceDocument) -> Result<(), IndexError>;
    fn remove(&self, id: ServiceId) -> Result<(), IndexError>;
    fn search(&self, query: &SearchQuery) -> Result<SearchHits, IndexError>;
    fn clear(&self) -> Result<(), IndexError>;
    fn len(&self) -> Result<usize, IndexError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
}

/// Single-shard, in-process index.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<BTreeMap<ServiceId, ServiceDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ServiceId, ServiceDocument>>, IndexError> {
        self.documents
            .read()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, BTreeMap<ServiceId, ServiceDocument>>, IndexError> {
        self.documents
            .write()
            .map_err(|_| IndexError::Unavailable("index lock poisoned".to_string()))
    }

    pub fn document(&self, id: ServiceId) -> Option<ServiceDocument> {
        self.read().ok().and_then(|documents| documents.get(&id).cloned())
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn upsert(&self, document: ServiceDocument) -> Result<(), IndexError> {
        self.write()?.insert(document.id, document);
        Ok(())
    }

    fn remove(&self, id: ServiceId) -> Result<(), IndexError> {
        self.write()?.remove(&id);
        Ok(())
    }

    fn search(&self, query: &SearchQuery) -> Result<SearchHits, IndexError> {
        let documents = self.read()?;
        Ok(query.execute(documents.values()))
    }

    fn clear(&self) -> Result<(), IndexError> {
        self.write()?.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, IndexError> {
        Ok(self.read()?.len())
    }
}
