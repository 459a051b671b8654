//! Typed views over a document, decoded one record at a time.
//!
//! A record that doesn't decode is logged and hidden from the typed API but
//! kept verbatim, so saving the collection writes it back untouched. One
//! hand-edited entry can never wipe its neighbours.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{Document, DocumentStore, DocumentWriter, StoreError};

type Entry<T> = Result<T, Value>;

fn decode<T: DeserializeOwned>(doc: Document, at: &str, raw: Value) -> Entry<T> {
    T::deserialize(&raw).map_err(|e| {
        warn!("⚠️  Skipping unreadable record {} in {}: {}", at, doc.file_name(), e);
        raw
    })
}

fn encode<T: Serialize>(entry: &Entry<T>) -> Result<Value, StoreError> {
    match entry {
        Ok(record) => Ok(serde_json::to_value(record)?),
        Err(raw) => Ok(raw.clone()),
    }
}

/// An array document, e.g. `servers.json`.
#[derive(Debug)]
pub struct RecordList<T> {
    entries: Vec<Entry<T>>,
}

impl<T> RecordList<T>
where
    T: DeserializeOwned + Serialize,
{
    pub fn load(store: &dyn DocumentStore, doc: Document) -> Self {
        let entries = match store.read(doc) {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, raw)| decode(doc, &format!("#{}", i), raw))
                .collect(),
            other => {
                warn!("⚠️  {} is not a list ({}), treating as empty", doc.file_name(), kind(&other));
                Vec::new()
            }
        };
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| e.as_ref().ok())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().filter_map(|e| e.as_mut().ok())
    }

    /// Records kept only in their stored form.
    pub fn unreadable(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter_map(|e| e.as_ref().err())
    }

    pub fn push(&mut self, record: T) {
        self.entries.push(Ok(record));
    }

    pub fn into_records(self) -> Vec<T> {
        self.entries.into_iter().filter_map(Result::ok).collect()
    }

    pub fn save(&self, writer: &mut (dyn DocumentWriter + '_)) -> Result<(), StoreError> {
        let items = self.entries.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        writer.write(&Value::Array(items))
    }
}

/// An object document keyed by string, e.g. `votes.json`.
#[derive(Debug)]
pub struct RecordMap<T> {
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> RecordMap<T>
where
    T: DeserializeOwned + Serialize,
{
    pub fn load(store: &dyn DocumentStore, doc: Document) -> Self {
        let entries = match store.read(doc) {
            Value::Object(fields) => fields
                .into_iter()
                .map(|(key, raw)| {
                    let entry = decode(doc, &format!("'{}'", key), raw);
                    (key, entry)
                })
                .collect(),
            other => {
                warn!("⚠️  {} is not an object ({}), treating as empty", doc.file_name(), kind(&other));
                BTreeMap::new()
            }
        };
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|e| e.as_ref().ok())
    }

    /// True for readable and unreadable entries alike.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Replaces whatever was stored under `key`, readable or not.
    pub fn insert(&mut self, key: String, record: T) {
        self.entries.insert(key, Ok(record));
    }

    pub fn save(&self, writer: &mut (dyn DocumentWriter + '_)) -> Result<(), StoreError> {
        let mut fields = Map::new();
        for (key, entry) in &self.entries {
            fields.insert(key.clone(), encode(entry)?);
        }
        writer.write(&Value::Object(fields))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
