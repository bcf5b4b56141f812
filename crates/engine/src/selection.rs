//! Live face selection with linear undo/redo over immutable snapshots.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a selection snapshot; used to memoize derived geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(u64);

impl SnapshotId {
    fn next() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable set of selected faces at one point in history.
///
/// Cloning shares the face set; no snapshot can observe later edits.
#[derive(Debug, Clone)]
pub struct SelectionSnapshot {
    id: SnapshotId,
    faces: Arc<BTreeSet<u32>>,
}

impl SelectionSnapshot {
    fn new(faces: BTreeSet<u32>) -> Self {
        Self {
            id: SnapshotId::next(),
            faces: Arc::new(faces),
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn faces(&self) -> &BTreeSet<u32> {
        &self.faces
    }

    pub fn contains(&self, face: u32) -> bool {
        self.faces.contains(&face)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Mutable selection plus a bounded history of snapshots.
///
/// `history[cursor]` is always the current snapshot and the history is never
/// empty: the initial empty selection is `history[0]`. Every mutation drops
/// the snapshots after the cursor before appending, so redo is impossible
/// after a fresh edit. When the history grows past its limit the oldest
/// snapshots are discarded.
#[derive(Debug, Clone)]
pub struct SelectionState {
    history: VecDeque<SelectionSnapshot>,
    cursor: usize,
    limit: usize,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(meshmark_config::DEFAULT_HISTORY_LIMIT)
    }
}

impl SelectionState {
    /// Empty selection keeping at most `limit` snapshots (at least one)
    pub fn new(limit: usize) -> Self {
        let mut history = VecDeque::new();
        history.push_back(SelectionSnapshot::new(BTreeSet::new()));
        Self {
            history,
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn current(&self) -> &SelectionSnapshot {
        &self.history[self.cursor]
    }

    pub fn faces(&self) -> &BTreeSet<u32> {
        self.current().faces()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Flip membership of `face`. Returns whether it is now selected.
    pub fn toggle_face(&mut self, face: u32) -> bool {
        let mut faces = self.faces().clone();
        let selected = if faces.remove(&face) {
            false
        } else {
            faces.insert(face);
            true
        };
        debug!("Toggle face {} -> {}", face, selected);
        self.push(faces);
        selected
    }

    /// Union `faces` into the selection as a single undo step.
    /// Returns how many faces were newly selected.
    pub fn add_faces(&mut self, faces: impl IntoIterator<Item = u32>) -> usize {
        let mut next = self.faces().clone();
        let before = next.len();
        next.extend(faces);
        let added = next.len() - before;
        debug!("Add {} faces ({} total)", added, next.len());
        self.push(next);
        added
    }

    /// Empty the selection; undoable like any other edit.
    pub fn clear(&mut self) {
        debug!("Clear selection ({} faces)", self.current().len());
        self.push(BTreeSet::new());
    }

    /// Step back one snapshot. Returns false at the start of history.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            debug!("Undo: at start of history");
            return false;
        }
        self.cursor -= 1;
        debug!("Undo -> snapshot {}/{}", self.cursor, self.history.len());
        true
    }

    /// Step forward one snapshot. Returns false at the end of history.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            debug!("Redo: at end of history");
            return false;
        }
        self.cursor += 1;
        debug!("Redo -> snapshot {}/{}", self.cursor, self.history.len());
        true
    }

    fn push(&mut self, faces: BTreeSet<u32>) {
        self.history.truncate(self.cursor + 1);
        self.history.push_back(SelectionSnapshot::new(faces));
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
        self.cursor = self.history.len() - 1;
    }
}
