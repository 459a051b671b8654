//! In-process document store for tests and local experiments.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Document, DocumentStore, DocumentWriter, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<Document, Value>>,
    locks: [Mutex<()>; 3],
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slot(doc: Document) -> usize {
        match doc {
            Document::Servers => 0,
            Document::Votes => 1,
            Document::Registrations => 2,
        }
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, doc: Document) -> Value {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&doc)
            .cloned()
            .unwrap_or_else(|| doc.empty())
    }

    fn lock(&self, doc: Document) -> Result<Box<dyn DocumentWriter + '_>, StoreError> {
        let guard = self.locks[Self::lock_slot(doc)]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(Box::new(MemoryWriter {
            store: self,
            doc,
            _guard: guard,
        }))
    }
}

struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    doc: Document,
    _guard: MutexGuard<'a, ()>,
}

impl DocumentWriter for MemoryWriter<'_> {
    fn document(&self) -> Document {
        self.doc
    }

    fn write(&mut self, value: &Value) -> Result<(), StoreError> {
        self.store
            .docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.doc, value.clone());
        Ok(())
    }
}
