//! JSON-file registry store.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use skylift_core::AppName;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ControlError, ControlResult};
use crate::types::AppRecord;

use super::{AppStore, Mutation};

/// Registry persisted as one pretty-printed JSON file.
///
/// The whole file is re-read and rewritten on every mutation, under an
/// internal lock that serialises all writers. The file stays
/// human-inspectable: one object keyed by application name.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    /// Create a store backed by `path`.
    ///
    /// The file is created on first write; a missing file reads as an empty
    /// registry.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> ControlResult<BTreeMap<String, AppRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ControlError::store(format!("corrupt registry file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ControlError::store(format!(
                "failed to read registry file: {e}"
            ))),
        }
    }

    async fn save(&self, records: &BTreeMap<String, AppRecord>) -> ControlResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ControlError::store(format!("failed to create registry dir: {e}")))?;
        }

        let body = serde_json::to_vec_pretty(records)
            .map_err(|e| ControlError::store(format!("failed to serialise registry: {e}")))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| ControlError::store(format!("failed to write registry file: {e}")))?;

        debug!(path = %self.path.display(), entries = records.len(), "registry saved");
        Ok(())
    }
}

#[async_trait]
impl AppStore for JsonStore {
    async fn insert(&self, record: &AppRecord) -> ControlResult<()> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let key = record.name.to_string();
        if records.contains_key(&key) {
            return Err(ControlError::Conflict(key));
        }

        records.insert(key, record.clone());
        self.save(&records).await
    }

    async fn get(&self, name: &AppName) -> ControlResult<AppRecord> {
        let _guard = self.lock.lock().await;

        let records = self.load().await?;
        records
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    async fn list(&self) -> ControlResult<Vec<AppRecord>> {
        let _guard = self.lock.lock().await;

        let records = self.load().await?;
        Ok(records.into_values().collect())
    }

    async fn update(&self, name: &AppName, mutate: Mutation) -> ControlResult<AppRecord> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let record = records
            .get_mut(name.as_str())
            .ok_or_else(|| ControlError::NotFound(name.to_string()))?;

        mutate(record);
        let updated = record.clone();
        self.save(&records).await?;

        Ok(updated)
    }

    async fn remove(&self, name: &AppName) -> ControlResult<()> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        if records.remove(name.as_str()).is_none() {
            return Err(ControlError::NotFound(name.to_string()));
        }

        self.save(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppStatus;
    use skylift_core::{BuildVersion, TemplateKind};

    fn record(name: &str) -> AppRecord {
        AppRecord::new(
            AppName::parse(name).expect("valid name"),
            TemplateKind::SimpleApi,
            "",
            format!("/tmp/apps/{name}.git"),
            "127.0.0.1",
        )
    }

    fn store_in(dir: &tempfile::TempDir) -> JsonStore {
        JsonStore::new(dir.path().join("registry.json"))
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        assert!(store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn insert_get_and_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let rec = record("demo");

        store.insert(&rec).await.expect("insert");

        let loaded = store.get(&rec.name).await.expect("get");
        assert_eq!(loaded, rec);

        let result = store.insert(&rec).await;
        assert!(matches!(result, Err(ControlError::Conflict(name)) if name == "demo"));
    }

    #[tokio::test]
    async fn update_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.json");
        let name = AppName::parse("demo").expect("valid name");

        {
            let store = JsonStore::new(&path);
            store.insert(&record("demo")).await.expect("insert");
            store
                .update(
                    &name,
                    Box::new(|rec| {
                        rec.preview_version = Some(BuildVersion::new("20260101.000000"));
                        rec.status = AppStatus::BuiltPreview;
                    }),
                )
                .await
                .expect("update");
        }

        let reopened = JsonStore::new(&path);
        let loaded = reopened.get(&name).await.expect("get");
        assert_eq!(
            loaded.preview_version,
            Some(BuildVersion::new("20260101.000000"))
        );
        assert_eq!(loaded.status, AppStatus::BuiltPreview);
    }

    #[tokio::test]
    async fn update_unknown_app_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let name = AppName::parse("ghost").expect("valid name");

        let result = store.update(&name, Box::new(|_| {})).await;
        assert!(matches!(result, Err(ControlError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_then_get_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);
        let rec = record("demo");

        store.insert(&rec).await.expect("insert");
        store.remove(&rec.name).await.expect("remove");

        assert!(matches!(
            store.get(&rec.name).await,
            Err(ControlError::NotFound(_))
        ));
        assert!(matches!(
            store.remove(&rec.name).await,
            Err(ControlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&dir);

        for name in ["zeta", "alpha", "mid"] {
            store.insert(&record(name)).await.expect("insert");
        }

        let names: Vec<String> = store
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
