//! # Document Store
//!
//! Read-modify-write access to the three JSON documents that make up the
//! directory's persistent state.
//!
//! ## Contract
//!
//! - [`DocumentStore::read`] never fails: a missing or unparseable document
//!   reads as its empty container (`[]` or `{}`).
//! - Writes only happen through a [`DocumentWriter`], which holds an
//!   exclusive lock on the document for as long as it lives.
//! - Reads take no lock. A reader racing a writer may see the previous
//!   contents.
//! - Typed access goes through [`RecordList`] / [`RecordMap`], which decode
//!   record by record and write unreadable records back verbatim.
//!
//! Mutating operations lock every document they touch *before* reading it,
//! always in [`Document`] declaration order, so concurrent read-modify-write
//! cycles serialize instead of losing updates.
//!
//! ## Implementations
//!
//! - [`FileStore`]: JSON files on disk, guarded by OS advisory locks
//! - [`MemoryStore`]: in-process fake for tests

pub mod file;
pub mod memory;
pub mod records;

use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use records::{RecordList, RecordMap};

/// The persisted documents.
///
/// Declaration order is lock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Document {
    /// Ordered sequence of server records
    Servers,
    /// Vote ledger: `"{client}_{serverId}"` -> vote record
    Votes,
    /// Registration guard: client identifier -> guard record
    Registrations,
}

impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Servers => "servers.json",
            Document::Votes => "votes.json",
            Document::Registrations => "user_servers.json",
        }
    }

    /// What the document reads as before it has ever been written.
    pub fn empty(self) -> Value {
        match self {
            Document::Servers => Value::Array(Vec::new()),
            Document::Votes | Document::Registrations => Value::Object(Default::default()),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Exclusive write access to one document. The lock is released on drop.
pub trait DocumentWriter {
    fn document(&self) -> Document;

    /// Replace the document's full contents.
    fn write(&mut self, value: &Value) -> Result<(), StoreError>;
}

pub trait DocumentStore: Send + Sync {
    fn read(&self, doc: Document) -> Value;

    /// Block until the exclusive lock on `doc` is held.
    fn lock(&self, doc: Document) -> Result<Box<dyn DocumentWriter + '_>, StoreError>;

    /// One-shot locked write.
    fn write(&self, doc: Document, value: &Value) -> Result<(), StoreError> {
        self.lock(doc)?.write(value)
    }
}
