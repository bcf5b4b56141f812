//! Record storage seam.
//!
//! The engine hands finished measurements, annotations and saved selections
//! to a [`PersistenceClient`]. Calls are fallible and happen at most once per
//! invocation; the client never retries on its own.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use meshmark_records::{
    Annotation, AnnotationUpdate, Measurement, ModelId, RecordError, RecordId, RecordKind, SavedSelection,
    SelectionUpdate, StoredRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Errors returned by a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("No {kind:?} record with id {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Rejected record: {0}")]
    Record(#[from] RecordError),
}

/// Backend that stores records per model.
///
/// List calls return records newest first.
#[allow(async_fn_in_trait)]
pub trait PersistenceClient {
    async fn save_measurement(
        &mut self,
        measurement: Measurement,
    ) -> Result<StoredRecord<Measurement>, PersistenceError>;

    async fn save_annotation(
        &mut self,
        annotation: Annotation,
    ) -> Result<StoredRecord<Annotation>, PersistenceError>;

    async fn save_selection(
        &mut self,
        selection: SavedSelection,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError>;

    /// Apply a partial edit to a stored selection
    async fn update_selection(
        &mut self,
        id: RecordId,
        update: SelectionUpdate,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError>;

    /// Apply a partial edit to a stored annotation
    async fn update_annotation(
        &mut self,
        id: RecordId,
        update: AnnotationUpdate,
    ) -> Result<StoredRecord<Annotation>, PersistenceError>;

    async fn delete_measurement(&mut self, id: RecordId) -> Result<(), PersistenceError>;

    async fn delete_annotation(&mut self, id: RecordId) -> Result<(), PersistenceError>;

    async fn delete_selection(&mut self, id: RecordId) -> Result<(), PersistenceError>;

    /// Remove every saved selection of a model; returns how many were removed
    async fn delete_selections_by_model(
        &mut self,
        model_id: ModelId,
    ) -> Result<usize, PersistenceError>;

    async fn list_measurements(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Measurement>>, PersistenceError>;

    async fn list_annotations(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Annotation>>, PersistenceError>;

    async fn list_selections(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<SavedSelection>>, PersistenceError>;
}

trait ModelScoped {
    fn owner(&self) -> ModelId;
}

impl ModelScoped for Measurement {
    fn owner(&self) -> ModelId {
        self.model_id()
    }
}

impl ModelScoped for Annotation {
    fn owner(&self) -> ModelId {
        self.model_id()
    }
}

impl ModelScoped for SavedSelection {
    fn owner(&self) -> ModelId {
        self.model_id()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// All records of a store, as written to disk by [`JsonFileStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    next_id: RecordId,
    measurements: Vec<StoredRecord<Measurement>>,
    annotations: Vec<StoredRecord<Annotation>>,
    selections: Vec<StoredRecord<SavedSelection>>,
}

impl StoreDocument {
    fn stamp<T>(&mut self, record: T) -> StoredRecord<T> {
        self.next_id += 1;
        StoredRecord::new(self.next_id, now_ms(), record)
    }

    fn save_measurement(&mut self, record: Measurement) -> StoredRecord<Measurement> {
        let stored = self.stamp(record);
        self.measurements.push(stored.clone());
        stored
    }

    fn save_annotation(&mut self, record: Annotation) -> StoredRecord<Annotation> {
        let stored = self.stamp(record);
        self.annotations.push(stored.clone());
        stored
    }

    fn save_selection(&mut self, record: SavedSelection) -> StoredRecord<SavedSelection> {
        let stored = self.stamp(record);
        self.selections.push(stored.clone());
        stored
    }

    fn update_selection(
        &mut self,
        id: RecordId,
        update: SelectionUpdate,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError> {
        let stored = self
            .selections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(PersistenceError::NotFound {
                kind: RecordKind::Selection,
                id,
            })?;
        stored.record.apply(update)?;
        Ok(stored.clone())
    }

    fn update_annotation(
        &mut self,
        id: RecordId,
        update: AnnotationUpdate,
    ) -> Result<StoredRecord<Annotation>, PersistenceError> {
        let stored = self
            .annotations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(PersistenceError::NotFound {
                kind: RecordKind::Annotation,
                id,
            })?;
        stored.record.apply(update)?;
        Ok(stored.clone())
    }

    fn delete_selections_by_model(&mut self, model_id: ModelId) -> usize {
        let before = self.selections.len();
        self.selections.retain(|s| s.record.model_id() != model_id);
        before - self.selections.len()
    }
}

fn remove_record<T>(
    records: &mut Vec<StoredRecord<T>>,
    kind: RecordKind,
    id: RecordId,
) -> Result<(), PersistenceError> {
    let position = records
        .iter()
        .position(|r| r.id == id)
        .ok_or(PersistenceError::NotFound { kind, id })?;
    records.remove(position);
    Ok(())
}

/// Records of `model_id`, newest first; ties on time go to the higher id
fn newest_first<T: Clone + ModelScoped>(
    records: &[StoredRecord<T>],
    model_id: ModelId,
) -> Vec<StoredRecord<T>> {
    let mut listed: Vec<_> = records
        .iter()
        .filter(|r| r.record.owner() == model_id)
        .cloned()
        .collect();
    listed.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| b.id.cmp(&a.id))
    });
    listed
}

/// In-process store.
///
/// [`MemoryStore::set_offline`] makes every call fail with
/// [`PersistenceError::Unavailable`] until switched back.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: StoreDocument,
    offline: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    fn check_online(&self) -> Result<(), PersistenceError> {
        if self.offline {
            return Err(PersistenceError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl PersistenceClient for MemoryStore {
    async fn save_measurement(
        &mut self,
        measurement: Measurement,
    ) -> Result<StoredRecord<Measurement>, PersistenceError> {
        self.check_online()?;
        Ok(self.document.save_measurement(measurement))
    }

    async fn save_annotation(
        &mut self,
        annotation: Annotation,
    ) -> Result<StoredRecord<Annotation>, PersistenceError> {
        self.check_online()?;
        Ok(self.document.save_annotation(annotation))
    }

    async fn save_selection(
        &mut self,
        selection: SavedSelection,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError> {
        self.check_online()?;
        Ok(self.document.save_selection(selection))
    }

    async fn update_selection(
        &mut self,
        id: RecordId,
        update: SelectionUpdate,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError> {
        self.check_online()?;
        self.document.update_selection(id, update)
    }

    async fn update_annotation(
        &mut self,
        id: RecordId,
        update: AnnotationUpdate,
    ) -> Result<StoredRecord<Annotation>, PersistenceError> {
        self.check_online()?;
        self.document.update_annotation(id, update)
    }

    async fn delete_measurement(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.check_online()?;
        remove_record(&mut self.document.measurements, RecordKind::Measurement, id)
    }

    async fn delete_annotation(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.check_online()?;
        remove_record(&mut self.document.annotations, RecordKind::Annotation, id)
    }

    async fn delete_selection(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.check_online()?;
        remove_record(&mut self.document.selections, RecordKind::Selection, id)
    }

    async fn delete_selections_by_model(
        &mut self,
        model_id: ModelId,
    ) -> Result<usize, PersistenceError> {
        self.check_online()?;
        Ok(self.document.delete_selections_by_model(model_id))
    }

    async fn list_measurements(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Measurement>>, PersistenceError> {
        self.check_online()?;
        Ok(newest_first(&self.document.measurements, model_id))
    }

    async fn list_annotations(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Annotation>>, PersistenceError> {
        self.check_online()?;
        Ok(newest_first(&self.document.annotations, model_id))
    }

    async fn list_selections(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<SavedSelection>>, PersistenceError> {
        self.check_online()?;
        Ok(newest_first(&self.document.selections, model_id))
    }
}

/// Store backed by a single JSON document on disk.
///
/// Every mutation rewrites the file. A failed write leaves both the file and
/// the in-memory state as they were.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    document: StoreDocument,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened record store at {}", path.display());
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the document, write it, then commit
    async fn mutate<R>(
        &mut self,
        change: impl FnOnce(&mut StoreDocument) -> Result<R, PersistenceError>,
    ) -> Result<R, PersistenceError> {
        let mut next = self.document.clone();
        let result = change(&mut next)?;

        let json = serde_json::to_string_pretty(&next)?;
        let tmp = self.path.with_extension("tmp");
        if let Err(e) = write_replace(&tmp, &self.path, json).await {
            warn!("Failed to write record store {}: {}", self.path.display(), e);
            return Err(e.into());
        }

        self.document = next;
        Ok(result)
    }
}

async fn write_replace(tmp: &Path, path: &Path, contents: String) -> std::io::Result<()> {
    tokio::fs::write(tmp, contents).await?;
    tokio::fs::rename(tmp, path).await
}

impl PersistenceClient for JsonFileStore {
    async fn save_measurement(
        &mut self,
        measurement: Measurement,
    ) -> Result<StoredRecord<Measurement>, PersistenceError> {
        self.mutate(|doc| Ok(doc.save_measurement(measurement))).await
    }

    async fn save_annotation(
        &mut self,
        annotation: Annotation,
    ) -> Result<StoredRecord<Annotation>, PersistenceError> {
        self.mutate(|doc| Ok(doc.save_annotation(annotation))).await
    }

    async fn save_selection(
        &mut self,
        selection: SavedSelection,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError> {
        self.mutate(|doc| Ok(doc.save_selection(selection))).await
    }

    async fn update_selection(
        &mut self,
        id: RecordId,
        update: SelectionUpdate,
    ) -> Result<StoredRecord<SavedSelection>, PersistenceError> {
        self.mutate(|doc| doc.update_selection(id, update)).await
    }

    async fn update_annotation(
        &mut self,
        id: RecordId,
        update: AnnotationUpdate,
    ) -> Result<StoredRecord<Annotation>, PersistenceError> {
        self.mutate(|doc| doc.update_annotation(id, update)).await
    }

    async fn delete_measurement(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.mutate(|doc| remove_record(&mut doc.measurements, RecordKind::Measurement, id))
            .await
    }

    async fn delete_annotation(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.mutate(|doc| remove_record(&mut doc.annotations, RecordKind::Annotation, id))
            .await
    }

    async fn delete_selection(&mut self, id: RecordId) -> Result<(), PersistenceError> {
        self.mutate(|doc| remove_record(&mut doc.selections, RecordKind::Selection, id))
            .await
    }

    async fn delete_selections_by_model(
        &mut self,
        model_id: ModelId,
    ) -> Result<usize, PersistenceError> {
        self.mutate(|doc| Ok(doc.delete_selections_by_model(model_id)))
            .await
    }

    async fn list_measurements(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Measurement>>, PersistenceError> {
        Ok(newest_first(&self.document.measurements, model_id))
    }

    async fn list_annotations(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<Annotation>>, PersistenceError> {
        Ok(newest_first(&self.document.annotations, model_id))
    }

    async fn list_selections(
        &self,
        model_id: ModelId,
    ) -> Result<Vec<StoredRecord<SavedSelection>>, PersistenceError> {
        Ok(newest_first(&self.document.selections, model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshmark_records::{Coordinates, Rgb, SelectionCategory};

    fn measurement(model_id: ModelId, z: f32) -> Measurement {
        Measurement::new(
            model_id,
            Coordinates::new(0.0, 0.0, 0.0),
            Coordinates::new(0.0, 0.0, z),
            None,
        )
    }

    fn selection(model_id: ModelId, faces: Vec<u32>) -> SavedSelection {
        SavedSelection::new(
            model_id,
            SelectionCategory::Tooth,
            Some("11".to_string()),
            faces,
            Rgb::default(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_lists_are_newest_first_per_model() {
        let mut store = MemoryStore::new();
        let first = store.save_measurement(measurement(1, 1.0)).await.unwrap();
        store.save_measurement(measurement(2, 2.0)).await.unwrap();
        let third = store.save_measurement(measurement(1, 3.0)).await.unwrap();

        let listed = store.list_measurements(1).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
        assert_eq!(listed[0].record.distance(), 3.0);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let mut store = MemoryStore::new();
        store.set_offline(true);

        let err = store.save_measurement(measurement(1, 1.0)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Unavailable(_)));
        assert!(store.list_annotations(1).await.is_err());

        store.set_offline(false);
        assert!(store.list_measurements(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let mut store = MemoryStore::new();
        let err = store.delete_annotation(42).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::NotFound {
                kind: RecordKind::Annotation,
                id: 42
            }
        ));
    }

    #[tokio::test]
    async fn test_update_selection() {
        let mut store = MemoryStore::new();
        let saved = store.save_selection(selection(1, vec![4, 5])).await.unwrap();

        let updated = store
            .update_selection(
                saved.id,
                SelectionUpdate {
                    faces: Some(vec![9]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.faces(), &[9]);
        assert_eq!(updated.created_at_ms, saved.created_at_ms);

        let err = store
            .update_selection(
                saved.id,
                SelectionUpdate {
                    faces: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Record(RecordError::EmptySelection)
        ));
        let listed = store.list_selections(1).await.unwrap();
        assert_eq!(listed[0].record.faces(), &[9]);
    }

    #[tokio::test]
    async fn test_delete_selections_by_model() {
        let mut store = MemoryStore::new();
        store.save_selection(selection(1, vec![1])).await.unwrap();
        store.save_selection(selection(1, vec![2])).await.unwrap();
        store.save_selection(selection(2, vec![3])).await.unwrap();

        assert_eq!(store.delete_selections_by_model(1).await.unwrap(), 2);
        assert!(store.list_selections(1).await.unwrap().is_empty());
        assert_eq!(store.list_selections(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let mut store = JsonFileStore::open(&path).await.unwrap();
        let kept = store
            .save_annotation(Annotation::new(1, Coordinates::new(1.0, 2.0, 3.0), "margem").unwrap())
            .await
            .unwrap();
        let dropped = store.save_measurement(measurement(1, 2.0)).await.unwrap();
        store.delete_measurement(dropped.id).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let annotations = reopened.list_annotations(1).await.unwrap();
        assert_eq!(annotations, vec![kept]);
        assert!(reopened.list_measurements(1).await.unwrap().is_empty());

        // Ids keep increasing after reopen
        let mut reopened = reopened;
        let next = reopened.save_measurement(measurement(1, 1.0)).await.unwrap();
        assert!(next.id > dropped.id);
    }

    #[tokio::test]
    async fn test_file_store_updates_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let mut store = JsonFileStore::open(&path).await.unwrap();
        let saved = store
            .save_annotation(Annotation::new(1, Coordinates::default(), "draft").unwrap())
            .await
            .unwrap();
        store
            .update_annotation(
                saved.id,
                AnnotationUpdate {
                    text: Some("final".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = store
            .update_annotation(
                saved.id,
                AnnotationUpdate {
                    text: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Record(RecordError::EmptyText)));

        let err = store
            .update_annotation(99, AnnotationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::NotFound {
                kind: RecordKind::Annotation,
                id: 99
            }
        ));

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let listed = reopened.list_annotations(1).await.unwrap();
        assert_eq!(listed[0].record.text(), "final");
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_file_store_write_failure_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("records.json");

        let mut store = JsonFileStore::open(&path).await.unwrap();
        let err = store.save_measurement(measurement(1, 1.0)).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));
        assert!(store.list_measurements(1).await.unwrap().is_empty());
    }
}
