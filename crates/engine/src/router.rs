//! Interaction mode state and click dispatch
//!
//! The router is the single entry point for pointer clicks. It receives the
//! nearest [`PickHit`] (or `None` on a miss) and routes it to exactly one
//! behavior depending on the active mode.

use glam::Vec3;
use meshmark_config::EngineConfig;
use meshmark_records::InteractionModeKind;
use tracing::{debug, info};

use crate::grouping::{expand_region, faces_within_rings};
use crate::measure::distance;
use crate::mesh_index::FaceAdjacency;
use crate::raycast::PickHit;
use crate::selection::SelectionState;

/// What a click does while selecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectBehavior {
    /// Flip membership of the clicked face
    #[default]
    Toggle,
    /// Add the whole connected region containing the clicked face
    Region,
    /// Add the clicked face and its topological neighborhood
    Nearby,
}

/// Progress of a two-click measurement gesture
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MeasureStep {
    #[default]
    AwaitingFirst,
    AwaitingSecond { first: Vec3 },
}

/// Active interaction mode. At most one mode is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Select(SelectBehavior),
    Measure(MeasureStep),
    /// `pending` holds the last picked point until text is supplied
    Annotate { pending: Option<Vec3> },
}

impl InteractionMode {
    pub fn kind(&self) -> InteractionModeKind {
        match self {
            Self::Idle => InteractionModeKind::Idle,
            Self::Select(_) => InteractionModeKind::Select,
            Self::Measure(_) => InteractionModeKind::Measure,
            Self::Annotate { .. } => InteractionModeKind::Annotate,
        }
    }
}

/// Effect of a click that hit the mesh
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The live selection gained a new snapshot
    SelectionChanged {
        /// Faces the click toggled or added
        faces: Vec<u32>,
        /// A region or nearby fill stopped at its face limit
        truncated: bool,
    },
    /// First measurement point stored
    MeasurementPointPlaced { point: Vec3 },
    /// Second point placed; the gesture is reset
    MeasurementCompleted {
        point_a: Vec3,
        point_b: Vec3,
        distance: f32,
    },
    /// Surface point picked for an annotation
    AnnotationPending { point: Vec3 },
}

/// Routes pointer clicks according to the active [`InteractionMode`].
#[derive(Debug, Clone, Default)]
pub struct InteractionRouter {
    mode: InteractionMode,
    /// Last select behavior chosen, restored when select mode is re-entered
    select_behavior: SelectBehavior,
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Switch to `kind`, discarding any in-flight point state.
    ///
    /// Re-activating the current mode also starts over. Select mode keeps its
    /// behavior across re-activation.
    pub fn activate(&mut self, kind: InteractionModeKind) {
        self.mode = match kind {
            InteractionModeKind::Idle => InteractionMode::Idle,
            InteractionModeKind::Select => InteractionMode::Select(self.select_behavior),
            InteractionModeKind::Measure => InteractionMode::Measure(MeasureStep::AwaitingFirst),
            InteractionModeKind::Annotate => InteractionMode::Annotate { pending: None },
        };
        info!("Entered {:?} mode", kind);
    }

    /// Return to idle; in-flight points are dropped silently
    pub fn deactivate(&mut self) {
        if self.mode != InteractionMode::Idle {
            info!("Exited {:?} mode", self.mode.kind());
        }
        self.mode = InteractionMode::Idle;
    }

    /// Enter select mode with `behavior`
    pub fn set_select_behavior(&mut self, behavior: SelectBehavior) {
        self.select_behavior = behavior;
        self.mode = InteractionMode::Select(behavior);
        debug!("Select behavior set to {:?}", behavior);
    }

    pub fn select_behavior(&self) -> Option<SelectBehavior> {
        match self.mode {
            InteractionMode::Select(behavior) => Some(behavior),
            _ => None,
        }
    }

    /// Handle a click. A miss, or a click while idle, changes nothing and
    /// returns `None`.
    pub fn handle_click(
        &mut self,
        hit: Option<&PickHit>,
        selection: &mut SelectionState,
        adjacency: &FaceAdjacency,
        config: &EngineConfig,
    ) -> Option<ClickOutcome> {
        let hit = hit?;

        match &mut self.mode {
            InteractionMode::Idle => None,
            InteractionMode::Select(behavior) => {
                Some(select_face(*behavior, hit.face, selection, adjacency, config))
            }
            InteractionMode::Measure(step) => match *step {
                MeasureStep::AwaitingFirst => {
                    *step = MeasureStep::AwaitingSecond { first: hit.point };
                    debug!("Measurement start at {:?}", hit.point);
                    Some(ClickOutcome::MeasurementPointPlaced { point: hit.point })
                }
                MeasureStep::AwaitingSecond { first } => {
                    *step = MeasureStep::AwaitingFirst;
                    let distance = distance(first, hit.point);
                    debug!("Measurement complete: {:.3}", distance);
                    Some(ClickOutcome::MeasurementCompleted {
                        point_a: first,
                        point_b: hit.point,
                        distance,
                    })
                }
            },
            InteractionMode::Annotate { pending } => {
                *pending = Some(hit.point);
                Some(ClickOutcome::AnnotationPending { point: hit.point })
            }
        }
    }

    /// Points the renderer should draw as markers for the gesture in progress
    pub fn in_flight_markers(&self) -> Vec<Vec3> {
        match self.mode {
            InteractionMode::Measure(MeasureStep::AwaitingSecond { first }) => vec![first],
            InteractionMode::Annotate {
                pending: Some(point),
            } => vec![point],
            _ => Vec::new(),
        }
    }

    pub fn pending_annotation(&self) -> Option<Vec3> {
        match self.mode {
            InteractionMode::Annotate { pending } => pending,
            _ => None,
        }
    }

    /// Take the pending annotation point, leaving annotate mode active
    pub fn take_pending_annotation(&mut self) -> Option<Vec3> {
        match &mut self.mode {
            InteractionMode::Annotate { pending } => pending.take(),
            _ => None,
        }
    }
}

fn select_face(
    behavior: SelectBehavior,
    face: u32,
    selection: &mut SelectionState,
    adjacency: &FaceAdjacency,
    config: &EngineConfig,
) -> ClickOutcome {
    match behavior {
        SelectBehavior::Toggle => {
            selection.toggle_face(face);
            ClickOutcome::SelectionChanged {
                faces: vec![face],
                truncated: false,
            }
        }
        SelectBehavior::Region => {
            let expansion = expand_region(adjacency, face, config.group_face_budget);
            selection.add_faces(expansion.faces.iter().copied());
            ClickOutcome::SelectionChanged {
                faces: expansion.faces,
                truncated: expansion.truncated,
            }
        }
        SelectBehavior::Nearby => {
            let expansion = faces_within_rings(
                adjacency,
                face,
                config.nearby_rings,
                config.nearby_face_limit,
            );
            selection.add_faces(expansion.faces.iter().copied());
            ClickOutcome::SelectionChanged {
                faces: expansion.faces,
                truncated: expansion.truncated,
            }
        }
    }
}
