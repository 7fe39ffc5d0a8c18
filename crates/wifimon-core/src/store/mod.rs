//! Sample persistence.
//!
//! The store is a mapping from location name to an append-only list of
//! samples. [`SampleStore`] is the whole contract: append one sample, or scan
//! everything. Scans hand back raw JSON entries so readers decide what to do
//! with entries that do not parse as a [`Sample`].

mod json_file;

pub use json_file::JsonFileStore;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use serde_json::{Map, Value};

use crate::model::Sample;

/// Errors raised by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store is corrupt: {0}")]
    Corrupt(String),

    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// All entries stored under one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub location: String,
    pub entries: Vec<Value>,
}

pub trait SampleStore: Send + Sync {
    /// Durably append `sample` under its location, creating the record if needed.
    fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Every record, in location-name order.
    fn scan(&self) -> Result<Vec<LocationRecord>, StoreError>;

    /// Append several samples in order. Stops at the first failure.
    fn append_batch(&self, samples: &[Sample]) -> Result<(), StoreError> {
        samples.iter().try_for_each(|s| self.append(s))
    }
}

impl<T: SampleStore + ?Sized> SampleStore for Arc<T> {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        (**self).append(sample)
    }

    fn scan(&self) -> Result<Vec<LocationRecord>, StoreError> {
        (**self).scan()
    }

    fn append_batch(&self, samples: &[Sample]) -> Result<(), StoreError> {
        (**self).append_batch(samples)
    }
}

// ---------------------------------------------------------------------------
// Document helpers shared by the implementations
// ---------------------------------------------------------------------------

pub(crate) type Document = Map<String, Value>;

/// Parse a store document.
///
/// Accepts the canonical `{ "LOC": [ ... ] }` mapping and the older
/// `[ { "LOC": [ ... ] }, ... ]` list-of-mappings layout, which is merged.
pub(crate) fn parse_document(text: &str) -> Result<Document, StoreError> {
    if text.trim().is_empty() {
        return Ok(Document::new());
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        Value::Array(items) => {
            let mut doc = Document::new();
            for item in items {
                let Value::Object(map) = item else {
                    warn!("skipping non-object item in list-style store document");
                    continue;
                };
                for (location, entries) in map {
                    if let Some(existing) = doc.get_mut(&location) {
                        match (existing, entries) {
                            (Value::Array(existing), Value::Array(more)) => existing.extend(more),
                            _ => warn!("skipping duplicate record for '{location}'"),
                        }
                    } else {
                        doc.insert(location, entries);
                    }
                }
            }
            Ok(doc)
        }
        other => Err(StoreError::Corrupt(format!(
            "top-level value is {}, expected an object",
            json_kind(&other)
        ))),
    }
}

/// Push `sample` onto its location's list, creating the list when absent.
pub(crate) fn push_sample(doc: &mut Document, sample: &Sample) -> Result<(), StoreError> {
    let entry = serde_json::to_value(sample)?;
    let name = &sample.location.name;
    match doc
        .entry(name.clone())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(list) => {
            list.push(entry);
            Ok(())
        }
        other => Err(StoreError::Corrupt(format!(
            "record for '{name}' is {}, expected a list",
            json_kind(other)
        ))),
    }
}

/// Records of a document. Values that are not lists are skipped with a warning.
pub(crate) fn records_from_document(doc: &Document) -> Vec<LocationRecord> {
    doc.iter()
        .filter_map(|(location, value)| match value {
            Value::Array(entries) => Some(LocationRecord {
                location: location.clone(),
                entries: entries.clone(),
            }),
            other => {
                warn!(
                    "skipping malformed record '{location}': {} instead of a list",
                    json_kind(other)
                );
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store kept in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a raw JSON document (either layout accepted by the file store).
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        let doc = parse_document(&value.to_string())?;
        Ok(Self {
            doc: Mutex::new(doc),
        })
    }

    /// Snapshot of the whole document.
    pub fn to_json(&self) -> Value {
        Value::Object(self.lock().clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SampleStore for MemoryStore {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        push_sample(&mut self.lock(), sample)
    }

    fn scan(&self) -> Result<Vec<LocationRecord>, StoreError> {
        Ok(records_from_document(&self.lock()))
    }
}

// ---------------------------------------------------------------------------
// Mirrored store
// ---------------------------------------------------------------------------

/// Writes go to `primary` and then to `mirror`; reads come from `primary`.
///
/// A failed mirror write is logged and otherwise ignored, so the mirror may
/// lag the primary but never blocks collection.
pub struct MirroredStore<P, M> {
    primary: P,
    mirror: M,
}

impl<P: SampleStore, M: SampleStore> MirroredStore<P, M> {
    pub fn new(primary: P, mirror: M) -> Self {
        Self { primary, mirror }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }
}

impl<P: SampleStore, M: SampleStore> SampleStore for MirroredStore<P, M> {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        self.primary.append(sample)?;
        if let Err(e) = self.mirror.append(sample) {
            warn!(
                "mirror write failed for {} run {}: {e}",
                sample.location.name, sample.run_no
            );
        }
        Ok(())
    }

    fn scan(&self) -> Result<Vec<LocationRecord>, StoreError> {
        self.primary.scan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, local_now};
    use serde_json::json;

    fn sample(location: &str, run_no: u32) -> Sample {
        Sample {
            timestamp: local_now(),
            run_no,
            location: Location::new(location, 1.0, 2.0),
            download_speed: Some(10.0),
            upload_speed: Some(5.0),
            latency_ms: 20.0,
            jitter_ms: 0.0,
            packet_loss: 0.0,
            rssi: None,
        }
    }

    struct BrokenStore;

    impl SampleStore for BrokenStore {
        fn append(&self, _: &Sample) -> Result<(), StoreError> {
            Err(StoreError::Corrupt("disk on fire".into()))
        }
        fn scan(&self) -> Result<Vec<LocationRecord>, StoreError> {
            Err(StoreError::Corrupt("disk on fire".into()))
        }
    }

    #[test]
    fn memory_store_upserts_and_appends() {
        let store = MemoryStore::new();
        store.append(&sample("ECC", 1)).unwrap();
        store.append(&sample("GEC", 1)).unwrap();
        store.append(&sample("ECC", 2)).unwrap();

        let records = store.scan().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].location, "ECC");
        assert_eq!(records[0].entries.len(), 2);
        assert_eq!(records[0].entries[1]["run_no"], 2);
        assert_eq!(records[1].location, "GEC");
    }

    #[test]
    fn list_layout_is_merged() {
        let doc = parse_document(
            &json!([
                {"ECC": [{"run_no": 1}]},
                {"GEC": [{"run_no": 1}]},
                {"ECC": [{"run_no": 2}]},
                "junk"
            ])
            .to_string(),
        )
        .unwrap();
        assert_eq!(doc["ECC"].as_array().unwrap().len(), 2);
        assert_eq!(doc["GEC"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn scalar_document_is_corrupt() {
        assert!(matches!(parse_document("42"), Err(StoreError::Corrupt(_))));
        assert!(matches!(parse_document("{not json"), Err(StoreError::Json(_))));
        assert!(parse_document("  \n").unwrap().is_empty());
    }

    #[test]
    fn non_list_records_are_skipped_on_scan() {
        let store = MemoryStore::from_json(json!({
            "ECC": [{"run_no": 1}],
            "BAD": {"run_no": 7}
        }))
        .unwrap();
        let records = store.scan().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "ECC");
    }

    #[test]
    fn append_refuses_to_clobber_non_list_record() {
        let store = MemoryStore::from_json(json!({"ECC": "oops"})).unwrap();
        let err = store.append(&sample("ECC", 1)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert_eq!(store.to_json(), json!({"ECC": "oops"}));
    }

    #[test]
    fn mirror_failure_does_not_fail_append() {
        let store = MirroredStore::new(MemoryStore::new(), BrokenStore);
        store.append(&sample("ECC", 1)).unwrap();
        assert_eq!(store.scan().unwrap()[0].entries.len(), 1);
    }

    #[test]
    fn primary_failure_fails_append_and_skips_mirror() {
        let store = MirroredStore::new(BrokenStore, MemoryStore::new());
        assert!(store.append(&sample("ECC", 1)).is_err());
        assert!(store.mirror().scan().unwrap().is_empty());
    }

    #[test]
    fn mirror_receives_identical_entries() {
        let store = MirroredStore::new(MemoryStore::new(), MemoryStore::new());
        store.append(&sample("ECC", 4)).unwrap();
        assert_eq!(store.primary().to_json(), store.mirror().to_json());
    }
}
