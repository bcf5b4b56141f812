//! A viewing session: one mesh, its live selection, the interaction router,
//! and the records created while the mesh is open.
//!
//! The session owns the mesh outright. Derived state (adjacency, cached
//! partitions) refers to it by [`MeshId`](crate::mesh::MeshId) and is rebuilt
//! when the mesh is replaced.
//!
//! Records are created optimistically: a completed measurement or annotation
//! is kept locally as [`SyncStatus::Pending`] until [`ViewingSession::save_pending`]
//! hands it to the store. A failed save marks the record
//! [`SyncStatus::Failed`] and keeps it for [`ViewingSession::retry_failed`];
//! the live selection is never rolled back by a failed save.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use meshmark_config::EngineConfig;
use meshmark_records::{
    Annotation, AnnotationUpdate, Coordinates, InteractionModeKind, Measurement, ModelId, RecordId, RecordKind, Rgb,
    SavedSelection, SelectionCategory, SelectionUpdate, StoredRecord, ViewerEvent,
};
use tracing::{info, warn};

use crate::annotate::place_annotation;
use crate::error::SessionError;
use crate::loader::MeshLoader;
use crate::measure::measurement_between;
use crate::mesh::TriangleMesh;
use crate::mesh_index::FaceAdjacency;
use crate::partition::{MeshPartition, PartitionCache};
use crate::persistence::{PersistenceClient, PersistenceError};
use crate::raycast::{PickHit, Ray, pick_normalized, ray_from_ndc};
use crate::router::{ClickOutcome, InteractionRouter, SelectBehavior};
use crate::selection::SelectionState;

/// Opacity of unselected geometry while faces are selected in select mode
const SELECTING_BASE_OPACITY: f32 = 0.5;

/// Session-local handle for a record, stable across saves and reloads
pub type LocalId = u64;

/// Where a local record stands with the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Created locally, not yet sent
    Pending,
    /// Accepted by the store under this id
    Saved(RecordId),
    /// Last save attempt failed
    Failed(String),
}

/// A record as the session knows it
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord<T> {
    pub local_id: LocalId,
    pub record: T,
    pub status: SyncStatus,
    /// Store creation time, once saved
    pub created_at_ms: Option<u64>,
}

impl<T> LocalRecord<T> {
    fn pending(local_id: LocalId, record: T) -> Self {
        Self {
            local_id,
            record,
            status: SyncStatus::Pending,
            created_at_ms: None,
        }
    }

    pub fn store_id(&self) -> Option<RecordId> {
        match self.status {
            SyncStatus::Saved(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.store_id().is_some()
    }
}

/// Queue of events for the UI, drained by the host
#[derive(Debug, Default)]
pub struct OutboundEvents {
    events: Vec<ViewerEvent>,
}

impl OutboundEvents {
    pub fn send(&mut self, event: ViewerEvent) {
        self.events.push(event);
    }

    /// Take all queued events, leaving the queue empty
    pub fn drain(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Everything the renderer needs for one frame.
///
/// Points are in mesh space; draw them with `model_transform`.
#[derive(Debug, Clone)]
pub struct RenderView {
    pub partition: Arc<MeshPartition>,
    pub model_transform: Mat4,
    pub highlight: Rgb,
    pub base: Rgb,
    pub base_opacity: f32,
    /// Points of the gesture in progress
    pub markers: Vec<Vec3>,
    pub measurements: Vec<[Vec3; 2]>,
    pub annotations: Vec<(Vec3, String)>,
    /// Saved selections drawn in their own colors
    pub saved_selections: Vec<(Rgb, Vec<u32>)>,
}

/// Per-record-type access to the store
trait Persisted: Clone + Sized {
    const KIND: RecordKind;

    async fn save<P: PersistenceClient>(
        self,
        store: &mut P,
    ) -> Result<StoredRecord<Self>, PersistenceError>;

    async fn delete<P: PersistenceClient>(
        store: &mut P,
        id: RecordId,
    ) -> Result<(), PersistenceError>;
}

impl Persisted for Measurement {
    const KIND: RecordKind = RecordKind::Measurement;

    async fn save<P: PersistenceClient>(
        self,
        store: &mut P,
    ) -> Result<StoredRecord<Self>, PersistenceError> {
        store.save_measurement(self).await
    }

    async fn delete<P: PersistenceClient>(
        store: &mut P,
        id: RecordId,
    ) -> Result<(), PersistenceError> {
        store.delete_measurement(id).await
    }
}

impl Persisted for Annotation {
    const KIND: RecordKind = RecordKind::Annotation;

    async fn save<P: PersistenceClient>(
        self,
        store: &mut P,
    ) -> Result<StoredRecord<Self>, PersistenceError> {
        store.save_annotation(self).await
    }

    async fn delete<P: PersistenceClient>(
        store: &mut P,
        id: RecordId,
    ) -> Result<(), PersistenceError> {
        store.delete_annotation(id).await
    }
}

impl Persisted for SavedSelection {
    const KIND: RecordKind = RecordKind::Selection;

    async fn save<P: PersistenceClient>(
        self,
        store: &mut P,
    ) -> Result<StoredRecord<Self>, PersistenceError> {
        store.save_selection(self).await
    }

    async fn delete<P: PersistenceClient>(
        store: &mut P,
        id: RecordId,
    ) -> Result<(), PersistenceError> {
        store.delete_selection(id).await
    }
}

/// One open model
pub struct ViewingSession<P> {
    model_id: ModelId,
    config: EngineConfig,
    highlight: Rgb,
    base: Rgb,
    mesh: TriangleMesh,
    adjacency: FaceAdjacency,
    selection: SelectionState,
    router: InteractionRouter,
    partitions: PartitionCache,
    store: P,
    measurements: Vec<LocalRecord<Measurement>>,
    annotations: Vec<LocalRecord<Annotation>>,
    selections: Vec<LocalRecord<SavedSelection>>,
    events: OutboundEvents,
    next_local_id: LocalId,
}

impl<P: PersistenceClient> ViewingSession<P> {
    /// Load `reference` through `loader` and open a session on it.
    ///
    /// Fails without building any state if the config is invalid or the
    /// mesh is unavailable or malformed.
    pub async fn open<L: MeshLoader>(
        loader: &L,
        reference: &str,
        model_id: ModelId,
        config: EngineConfig,
        store: P,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let mesh = loader.load(reference).await?;
        info!("Opened {} as model {}", reference, model_id);
        Self::new(mesh, model_id, config, store)
    }

    /// Open a session on an already built mesh
    pub fn new(
        mesh: TriangleMesh,
        model_id: ModelId,
        config: EngineConfig,
        store: P,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let highlight = Rgb::from_hex(&config.highlight_color)?;
        let base = Rgb::from_hex(&config.base_color)?;
        let adjacency = FaceAdjacency::build(&mesh);

        Ok(Self {
            model_id,
            highlight,
            base,
            adjacency,
            mesh,
            selection: SelectionState::new(config.history_limit),
            router: InteractionRouter::new(),
            partitions: PartitionCache::new(),
            store,
            measurements: Vec::new(),
            annotations: Vec::new(),
            selections: Vec::new(),
            events: OutboundEvents::default(),
            next_local_id: 1,
            config,
        })
    }

    /// Swap in a new mesh. The selection, cached geometry and in-flight
    /// gesture are reset; records are dropped if the model changes.
    pub fn replace_mesh(&mut self, mesh: TriangleMesh, model_id: ModelId) {
        self.adjacency = FaceAdjacency::build(&mesh);
        self.mesh = mesh;
        self.selection = SelectionState::new(self.config.history_limit);
        self.partitions.invalidate();

        let kind = self.router.mode().kind();
        self.router.activate(kind);

        if model_id != self.model_id {
            self.model_id = model_id;
            self.measurements.clear();
            self.annotations.clear();
            self.selections.clear();
        }
        info!("Replaced mesh for model {}", model_id);
        self.send_selection_changed();
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn adjacency(&self) -> &FaceAdjacency {
        &self.adjacency
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn router(&self) -> &InteractionRouter {
        &self.router
    }

    pub fn measurements(&self) -> &[LocalRecord<Measurement>] {
        &self.measurements
    }

    pub fn annotations(&self) -> &[LocalRecord<Annotation>] {
        &self.annotations
    }

    pub fn selections(&self) -> &[LocalRecord<SavedSelection>] {
        &self.selections
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut P {
        &mut self.store
    }

    /// Take queued UI events
    pub fn take_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain()
    }

    // ---- modes ----

    /// Switch interaction mode; any in-flight point is discarded
    pub fn set_mode(&mut self, mode: InteractionModeKind) {
        self.router.activate(mode);
        self.events.send(ViewerEvent::ModeChanged { mode });
    }

    /// Enter select mode with the given click behavior
    pub fn set_select_behavior(&mut self, behavior: SelectBehavior) {
        let was_selecting = self.router.select_behavior().is_some();
        self.router.set_select_behavior(behavior);
        if !was_selecting {
            self.events.send(ViewerEvent::ModeChanged {
                mode: InteractionModeKind::Select,
            });
        }
    }

    // ---- input ----

    /// Handle a click with an already computed pick result
    pub fn click(&mut self, hit: Option<PickHit>) -> Option<ClickOutcome> {
        let outcome = self.router.handle_click(
            hit.as_ref(),
            &mut self.selection,
            &self.adjacency,
            &self.config,
        )?;

        match &outcome {
            ClickOutcome::SelectionChanged { truncated, .. } => {
                if *truncated {
                    let face_budget = match self.router.select_behavior() {
                        Some(SelectBehavior::Nearby) => self.config.nearby_face_limit,
                        _ => self.config.group_face_budget,
                    };
                    self.events.send(ViewerEvent::GroupTruncated { face_budget });
                }
                self.send_selection_changed();
            }
            ClickOutcome::MeasurementPointPlaced { point } => {
                self.events.send(ViewerEvent::MeasurementPointPlaced {
                    point: coords(*point),
                });
            }
            ClickOutcome::MeasurementCompleted {
                point_a, point_b, ..
            } => {
                let measurement = measurement_between(self.model_id, *point_a, *point_b, None);
                self.events.send(ViewerEvent::MeasurementCompleted {
                    point_a: measurement.point_a(),
                    point_b: measurement.point_b(),
                    distance: measurement.distance(),
                });
                let local_id = self.allocate_local_id();
                self.measurements
                    .insert(0, LocalRecord::pending(local_id, measurement));
            }
            ClickOutcome::AnnotationPending { point } => {
                self.events.send(ViewerEvent::AnnotationPending {
                    point: coords(*point),
                });
            }
        }
        Some(outcome)
    }

    /// Pick with a world-space ray against the normalized mesh, then click
    pub fn click_ray(&mut self, ray: &Ray) -> Option<ClickOutcome> {
        let hit = pick_normalized(ray, &self.mesh);
        self.click(hit)
    }

    /// Pick from a pointer position in normalized device coordinates
    pub fn click_ndc(
        &mut self,
        ndc: Vec2,
        inverse_view_projection: Mat4,
    ) -> Option<ClickOutcome> {
        let ray = ray_from_ndc(ndc, inverse_view_projection)?;
        self.click_ray(&ray)
    }

    /// Attach `text` to the pending annotation point.
    ///
    /// Blank text is rejected and the point stays pending.
    pub fn annotate(&mut self, text: &str) -> Result<LocalId, SessionError> {
        let point = self
            .router
            .pending_annotation()
            .ok_or(SessionError::NoPendingAnnotation)?;
        let annotation = place_annotation(self.model_id, point, text)?;
        self.router.take_pending_annotation();

        let local_id = self.allocate_local_id();
        self.annotations
            .insert(0, LocalRecord::pending(local_id, annotation));
        Ok(local_id)
    }

    /// Drop the pending annotation point
    pub fn cancel_annotation(&mut self) {
        self.router.take_pending_annotation();
    }

    // ---- selection history ----

    pub fn undo(&mut self) -> bool {
        let moved = self.selection.undo();
        if moved {
            self.send_selection_changed();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.selection.redo();
        if moved {
            self.send_selection_changed();
        }
        moved
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.send_selection_changed();
    }

    // ---- persistence ----

    /// Send every pending record to the store. Returns how many were saved.
    pub async fn save_pending(&mut self) -> usize {
        self.push_all(false).await
    }

    /// Re-send every record whose last save failed. Returns how many were saved.
    pub async fn retry_failed(&mut self) -> usize {
        self.push_all(true).await
    }

    async fn push_all(&mut self, retry: bool) -> usize {
        let store = &mut self.store;
        let events = &mut self.events;
        let mut saved = push_records(store, &mut self.measurements, retry, events).await;
        saved += push_records(store, &mut self.annotations, retry, events).await;
        saved += push_records(store, &mut self.selections, retry, events).await;
        saved
    }

    /// Save the live selection as a named record.
    ///
    /// `color` defaults to the configured highlight color. On success the
    /// live selection is cleared when `clear_after_save` is set. On failure
    /// the record is kept as [`SyncStatus::Failed`] and the live selection is
    /// left alone.
    pub async fn save_selection(
        &mut self,
        category: SelectionCategory,
        label: Option<String>,
        color: Option<Rgb>,
        note: Option<String>,
    ) -> Result<LocalId, SessionError> {
        let record = SavedSelection::new(
            self.model_id,
            category,
            label,
            self.selection.faces().iter().copied(),
            color.unwrap_or(self.highlight),
            note,
        )?;

        let local_id = self.allocate_local_id();
        let mut local = LocalRecord::pending(local_id, record);
        let saved = save_one(&mut self.store, &mut local, &mut self.events).await;
        self.selections.insert(0, local);

        saved?;
        if self.config.clear_after_save {
            self.clear_selection();
        }
        Ok(local_id)
    }

    /// Edit a saved selection. Records that never reached the store are
    /// edited locally and sent with their next save.
    pub async fn update_selection(
        &mut self,
        local_id: LocalId,
        update: SelectionUpdate,
    ) -> Result<(), SessionError> {
        let index = self
            .selections
            .iter()
            .position(|r| r.local_id == local_id)
            .ok_or(SessionError::UnknownRecord(local_id))?;

        match self.selections[index].store_id() {
            Some(id) => {
                let stored = self.store.update_selection(id, update).await?;
                self.selections[index].record = stored.record;
                self.events.send(ViewerEvent::RecordSaved {
                    kind: RecordKind::Selection,
                    id,
                });
            }
            None => self.selections[index].record.apply(update)?,
        }
        Ok(())
    }

    /// Edit an annotation's text or position. Unsaved annotations are edited
    /// locally; blank text is rejected and the record is left unchanged.
    pub async fn update_annotation(
        &mut self,
        local_id: LocalId,
        update: AnnotationUpdate,
    ) -> Result<(), SessionError> {
        let index = self
            .annotations
            .iter()
            .position(|r| r.local_id == local_id)
            .ok_or(SessionError::UnknownRecord(local_id))?;

        match self.annotations[index].store_id() {
            Some(id) => {
                let stored = self.store.update_annotation(id, update).await?;
                self.annotations[index].record = stored.record;
                self.events.send(ViewerEvent::RecordSaved {
                    kind: RecordKind::Annotation,
                    id,
                });
            }
            None => self.annotations[index].record.apply(update)?,
        }
        Ok(())
    }

    pub async fn delete_measurement(&mut self, local_id: LocalId) -> Result<(), SessionError> {
        delete_local(&mut self.store, &mut self.measurements, local_id, &mut self.events).await
    }

    pub async fn delete_annotation(&mut self, local_id: LocalId) -> Result<(), SessionError> {
        delete_local(&mut self.store, &mut self.annotations, local_id, &mut self.events).await
    }

    pub async fn delete_selection(&mut self, local_id: LocalId) -> Result<(), SessionError> {
        delete_local(&mut self.store, &mut self.selections, local_id, &mut self.events).await
    }

    /// Remove every saved selection of this model, locally and in the store
    pub async fn delete_all_selections(&mut self) -> Result<usize, SessionError> {
        let removed = self.store.delete_selections_by_model(self.model_id).await?;
        for local in self.selections.drain(..) {
            if let Some(id) = local.store_id() {
                self.events.send(ViewerEvent::RecordDeleted {
                    kind: RecordKind::Selection,
                    id,
                });
            }
        }
        Ok(removed)
    }

    /// Fetch this model's records from the store.
    ///
    /// Unsaved local records are kept ahead of the fetched ones. Nothing
    /// changes if any list call fails.
    pub async fn load_records(&mut self) -> Result<(), SessionError> {
        let measurements = self.store.list_measurements(self.model_id).await?;
        let annotations = self.store.list_annotations(self.model_id).await?;
        let selections = self.store.list_selections(self.model_id).await?;

        merge_fetched(&mut self.measurements, measurements, &mut self.next_local_id);
        merge_fetched(&mut self.annotations, annotations, &mut self.next_local_id);
        merge_fetched(&mut self.selections, selections, &mut self.next_local_id);
        info!(
            "Loaded records for model {}: {} measurements, {} annotations, {} selections",
            self.model_id,
            self.measurements.len(),
            self.annotations.len(),
            self.selections.len()
        );
        Ok(())
    }

    // ---- rendering ----

    /// Geometry and overlays for the current frame.
    ///
    /// The selected/unselected split is only recomputed when the selection
    /// snapshot or the mesh changed since the last call.
    pub fn render_view(&mut self) -> RenderView {
        let partition = self
            .partitions
            .get_or_compute(&self.mesh, self.selection.current());
        let selecting = self.router.select_behavior().is_some();
        let base_opacity = if selecting && !self.selection.faces().is_empty() {
            SELECTING_BASE_OPACITY
        } else {
            1.0
        };

        RenderView {
            partition,
            model_transform: self.mesh.normalization_transform(),
            highlight: self.highlight,
            base: self.base,
            base_opacity,
            markers: self.router.in_flight_markers(),
            measurements: self
                .measurements
                .iter()
                .map(|m| [vec3(m.record.point_a()), vec3(m.record.point_b())])
                .collect(),
            annotations: self
                .annotations
                .iter()
                .map(|a| (vec3(a.record.position()), a.record.text().to_string()))
                .collect(),
            saved_selections: self
                .selections
                .iter()
                .map(|s| (s.record.color(), s.record.faces().to_vec()))
                .collect(),
        }
    }

    fn allocate_local_id(&mut self) -> LocalId {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }

    fn send_selection_changed(&mut self) {
        self.events.send(ViewerEvent::SelectionChanged {
            face_count: self.selection.faces().len(),
            can_undo: self.selection.can_undo(),
            can_redo: self.selection.can_redo(),
        });
    }
}

/// Send one record and record the outcome on it
async fn save_one<T: Persisted, P: PersistenceClient>(
    store: &mut P,
    local: &mut LocalRecord<T>,
    events: &mut OutboundEvents,
) -> Result<RecordId, PersistenceError> {
    match local.record.clone().save(store).await {
        Ok(stored) => {
            local.status = SyncStatus::Saved(stored.id);
            local.created_at_ms = Some(stored.created_at_ms);
            local.record = stored.record;
            events.send(ViewerEvent::RecordSaved {
                kind: T::KIND,
                id: stored.id,
            });
            Ok(stored.id)
        }
        Err(e) => {
            warn!("Failed to save {:?} record: {}", T::KIND, e);
            local.status = SyncStatus::Failed(e.to_string());
            events.send(ViewerEvent::RecordSaveFailed {
                kind: T::KIND,
                reason: e.to_string(),
            });
            Err(e)
        }
    }
}

async fn push_records<T: Persisted, P: PersistenceClient>(
    store: &mut P,
    records: &mut [LocalRecord<T>],
    retry: bool,
    events: &mut OutboundEvents,
) -> usize {
    let mut saved = 0;
    for local in records.iter_mut() {
        let due = match local.status {
            SyncStatus::Pending => !retry,
            SyncStatus::Failed(_) => retry,
            SyncStatus::Saved(_) => false,
        };
        if due && save_one(store, local, events).await.is_ok() {
            saved += 1;
        }
    }
    saved
}

async fn delete_local<T: Persisted, P: PersistenceClient>(
    store: &mut P,
    records: &mut Vec<LocalRecord<T>>,
    local_id: LocalId,
    events: &mut OutboundEvents,
) -> Result<(), SessionError> {
    let index = records
        .iter()
        .position(|r| r.local_id == local_id)
        .ok_or(SessionError::UnknownRecord(local_id))?;

    // Records that never reached the store only exist here
    if let Some(id) = records[index].store_id() {
        T::delete(store, id).await?;
        events.send(ViewerEvent::RecordDeleted { kind: T::KIND, id });
    }
    records.remove(index);
    Ok(())
}

fn merge_fetched<T>(
    local: &mut Vec<LocalRecord<T>>,
    fetched: Vec<StoredRecord<T>>,
    next_local_id: &mut LocalId,
) {
    let known: HashMap<RecordId, LocalId> = local
        .iter()
        .filter_map(|r| r.store_id().map(|id| (id, r.local_id)))
        .collect();
    local.retain(|r| !r.is_saved());

    for stored in fetched {
        let local_id = match known.get(&stored.id) {
            Some(&local_id) => local_id,
            None => {
                let id = *next_local_id;
                *next_local_id += 1;
                id
            }
        };
        local.push(LocalRecord {
            local_id,
            record: stored.record,
            status: SyncStatus::Saved(stored.id),
            created_at_ms: Some(stored.created_at_ms),
        });
    }
}

fn coords(v: Vec3) -> Coordinates {
    Coordinates::from_array(v.to_array())
}

fn vec3(c: Coordinates) -> Vec3 {
    Vec3::from_array(c.to_array())
}
