//! Single-file JSON store.
//!
//! The whole mapping lives in one pretty-printed JSON file. Every append
//! rewrites the file: the new document goes to a temporary file in the same
//! directory, is fsynced, then renamed over the old one. A crash at any point
//! leaves either the old or the new document on disk, never a torn one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::debug;
use tempfile::NamedTempFile;

use super::{
    Document, LocationRecord, SampleStore, StoreError, parse_document, push_sample,
    records_from_document,
};
use crate::model::Sample;

pub struct JsonFileStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Swap the whole file for a document holding exactly `samples`.
    ///
    /// The new document is fully built before anything is written, and the
    /// rename is atomic, so on error the previous file is untouched.
    pub fn replace(&self, samples: &[Sample]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = Document::new();
        for sample in samples {
            push_sample(&mut doc, sample)?;
        }
        self.write_document(&doc)?;
        debug!("replaced {} with {} samples", self.path.display(), samples.len());
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Current document. A missing file is an empty store.
    fn read_document(&self) -> Result<Document, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => parse_document(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_document(&self, doc: &Document) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n").map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl SampleStore for JsonFileStore {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.read_document()?;
        push_sample(&mut doc, sample)?;
        self.write_document(&doc)?;
        debug!(
            "appended run {} for {} to {}",
            sample.run_no,
            sample.location.name,
            self.path.display()
        );
        Ok(())
    }

    /// One read-modify-write for the whole batch.
    fn append_batch(&self, samples: &[Sample]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.read_document()?;
        for sample in samples {
            push_sample(&mut doc, sample)?;
        }
        self.write_document(&doc)?;
        debug!("appended {} samples to {}", samples.len(), self.path.display());
        Ok(())
    }

    fn scan(&self) -> Result<Vec<LocationRecord>, StoreError> {
        let doc = self.read_document()?;
        Ok(records_from_document(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;
    use chrono::NaiveDate;

    fn sample(location: &str, run_no: u32) -> Sample {
        Sample {
            timestamp: NaiveDate::from_ymd_opt(2025, 4, 5)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            run_no,
            location: Location::new(location, 67.12, -43.45),
            download_speed: Some(87.654321),
            upload_speed: Some(12.5),
            latency_ms: 14.0,
            jitter_ms: 0.0,
            packet_loss: 0.0,
            rssi: Some(64),
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("wifi_data.json"));
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn append_creates_parent_directories_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("wifi_data.json");
        let store = JsonFileStore::new(&path);
        store.append(&sample("ECC", 1)).unwrap();

        assert!(path.exists());
        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["ECC"][0]["run_no"], 1);
        assert_eq!(doc["ECC"][0]["location"]["name"], "ECC");
    }

    #[test]
    fn appends_accumulate_per_location() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("wifi_data.json"));
        store.append(&sample("ECC", 1)).unwrap();
        store.append(&sample("SDB", 1)).unwrap();
        store.append(&sample("ECC", 2)).unwrap();

        // A fresh handle sees the same data.
        let reopened = JsonFileStore::new(store.path());
        let records = reopened.scan().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].location, "ECC");
        assert_eq!(records[0].entries.len(), 2);
        assert_eq!(records[1].location, "SDB");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("wifi_data.json"));
        for run in 1..=3 {
            store.append(&sample("ECC", run)).unwrap();
        }
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("wifi_data.json")]);
    }

    #[test]
    fn corrupt_file_is_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifi_data.json");
        fs::write(&path, "{\"ECC\": [ {\"run_no\": 1},").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.append(&sample("ECC", 2)).is_err());
        assert!(store.scan().is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"ECC\": [ {\"run_no\": 1},"
        );
    }

    #[test]
    fn legacy_list_layout_is_rewritten_canonically_on_append() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifi_data.json");
        fs::write(&path, r#"[{"ECC": [{"run_no": 1}]}, {"GEC": [{"run_no": 1}]}]"#).unwrap();

        let store = JsonFileStore::new(&path);
        store.append(&sample("ECC", 2)).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc.is_object());
        assert_eq!(doc["ECC"].as_array().unwrap().len(), 2);
        assert_eq!(doc["GEC"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn batch_append_is_all_or_nothing_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifi_data.json");
        fs::write(&path, r#"{"ECC": [], "GEC": "not a list"}"#).unwrap();
        let store = JsonFileStore::new(&path);

        let batch = [sample("ECC", 1), sample("GEC", 1)];
        assert!(store.append_batch(&batch).is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            r#"{"ECC": [], "GEC": "not a list"}"#
        );

        store.append_batch(&[sample("ECC", 1), sample("ECC", 2)]).unwrap();
        assert_eq!(store.scan().unwrap()[0].entries.len(), 2);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::new(tmp.path().join("wifi_data.json")));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for run in 0..5 {
                        store.append(&sample(&format!("LOC{i}"), run + 1)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let total: usize = store.scan().unwrap().iter().map(|r| r.entries.len()).sum();
        assert_eq!(total, 20);
    }

    #[test]
    fn replace_discards_previous_content_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifi_data.json");
        fs::write(&path, "not even json").unwrap();
        let store = JsonFileStore::new(&path);

        store.replace(&[sample("GEC", 1), sample("GEC", 2)]).unwrap();
        let records = store.scan().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "GEC");
        assert_eq!(records[0].entries.len(), 2);

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("wifi_data.json")]);
    }
}
