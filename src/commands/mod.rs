//! # Commands
//!
//! Every read or mutation of host state is expressed as one [`Command`] - an opcode
//! plus its parameters - addressed to a document and submitted through the
//! [channel](crate::channel). The host answers with a [`Payload`].
//!
//! Commands are data, not behavior: all validation happens in the proxies before
//! construction, and all application happens host-side.

use crate::constants::{
    AnchorPosition, BlendMode, ResampleMethod, SaveDialogBehavior,
};
use crate::save::{FileEntry, SaveOptions};
use crate::state::{
    CloseOutcome, DocumentId, DocumentSnapshot, HistorySnapshot, LayerId, LayerSnapshot,
    LayerTreeSnapshot, Rect,
};

/// Requested properties for a new layer or layer group. Omitted fields take host
/// defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerCreateOptions {
    pub name: Option<String>,
    /// 0.0 ..= 1.0
    pub opacity: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    /// Group to insert into, or None for the document root.
    pub parent: Option<LayerId>,
}

/// Most batch operations touch a couple of layers at a time.
pub type LayerIdBatch = smallvec::SmallVec<[LayerId; 4]>;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Open the document behind a capability entry. The only command addressed to
    /// no document.
    Open { entry: FileEntry },
    Close {
        behavior: SaveDialogBehavior,
    },
    CloseWithoutSaving,
    Crop {
        bounds: Rect,
        /// Clockwise, degrees.
        angle: f32,
    },
    Flatten,
    MergeVisible,
    ResizeCanvas {
        width: u32,
        height: u32,
        anchor: AnchorPosition,
    },
    ResizeImage {
        width: u32,
        height: u32,
        /// None keeps the document's current resolution.
        resolution: Option<f32>,
        /// None uses the host's default interpolation.
        method: Option<ResampleMethod>,
    },
    Rotate {
        /// Clockwise, degrees. The host expands the canvas to avoid clipping.
        degrees: f32,
    },
    Save,
    SaveAs {
        entry: FileEntry,
        options: SaveOptions,
        /// True leaves the document's own saved-path state untouched.
        as_copy: bool,
    },
    DuplicateLayers {
        layers: LayerIdBatch,
        /// None duplicates within the source document.
        target: Option<DocumentId>,
    },
    LinkLayers {
        layers: LayerIdBatch,
    },
    CreateLayer {
        options: LayerCreateOptions,
    },
    CreateLayerGroup {
        options: LayerCreateOptions,
    },
    GroupLayers {
        layers: LayerIdBatch,
    },
    SetActiveHistoryState {
        index: usize,
    },
    SetActiveHistoryBrushSource {
        index: usize,
    },
    SetPixelAspectRatio {
        ratio: f64,
    },
    // Reads. Collection views are stale-until-refetched, so each is a round-trip.
    FetchDocument,
    FetchLayerTree,
    FetchHistory,
}
impl Command {
    /// Opcode name for tracing.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::CloseWithoutSaving => "closeWithoutSaving",
            Self::Crop { .. } => "crop",
            Self::Flatten => "flatten",
            Self::MergeVisible => "mergeVisible",
            Self::ResizeCanvas { .. } => "resizeCanvas",
            Self::ResizeImage { .. } => "resizeImage",
            Self::Rotate { .. } => "rotate",
            Self::Save => "save",
            Self::SaveAs { .. } => "saveAs",
            Self::DuplicateLayers { .. } => "duplicateLayers",
            Self::LinkLayers { .. } => "linkLayers",
            Self::CreateLayer { .. } => "createLayer",
            Self::CreateLayerGroup { .. } => "createLayerGroup",
            Self::GroupLayers { .. } => "groupLayers",
            Self::SetActiveHistoryState { .. } => "setActiveHistoryState",
            Self::SetActiveHistoryBrushSource { .. } => "setActiveHistoryBrushSource",
            Self::SetPixelAspectRatio { .. } => "setPixelAspectRatio",
            Self::FetchDocument => "fetchDocument",
            Self::FetchLayerTree => "fetchLayerTree",
            Self::FetchHistory => "fetchHistory",
        }
    }
    /// Reads never change host state and record no history entry.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::FetchDocument | Self::FetchLayerTree | Self::FetchHistory
        )
    }
}

/// The typed result of a completed command.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    None,
    /// Result of `Open`: the host-assigned id and the initial snapshot.
    Opened(DocumentId, DocumentSnapshot),
    /// Result of `Close` and `CloseWithoutSaving`.
    CloseOutcome(CloseOutcome),
    /// New handles minted by `DuplicateLayers`, in the duplicated set's order.
    Layers(Vec<LayerSnapshot>),
    /// Result of `CreateLayer` / `CreateLayerGroup` / `GroupLayers`. `None` when
    /// the host could not create in the current state - that is not a failure.
    Layer(Option<LayerSnapshot>),
    /// The achieved subset of a `LinkLayers` request.
    LinkedLayers(Vec<LayerId>),
    /// Result of `FetchDocument`.
    Document(DocumentSnapshot),
    /// Result of `FetchLayerTree`.
    LayerTree(LayerTreeSnapshot),
    /// Result of `FetchHistory`.
    History(HistorySnapshot),
}
impl Payload {
    #[must_use]
    pub fn close_outcome(&self) -> Option<CloseOutcome> {
        match self {
            Self::CloseOutcome(outcome) => Some(*outcome),
            _ => None,
        }
    }
    #[must_use]
    pub fn layers(&self) -> Option<&[LayerSnapshot]> {
        match self {
            Self::Layers(layers) => Some(layers),
            _ => None,
        }
    }
    #[must_use]
    pub fn layer(&self) -> Option<Option<&LayerSnapshot>> {
        match self {
            Self::Layer(layer) => Some(layer.as_ref()),
            _ => None,
        }
    }
    #[must_use]
    pub fn linked_layers(&self) -> Option<&[LayerId]> {
        match self {
            Self::LinkedLayers(ids) => Some(ids),
            _ => None,
        }
    }
    #[must_use]
    pub fn document(&self) -> Option<&DocumentSnapshot> {
        match self {
            Self::Document(snapshot) => Some(snapshot),
            _ => None,
        }
    }
    #[must_use]
    pub fn layer_tree(&self) -> Option<&LayerTreeSnapshot> {
        match self {
            Self::LayerTree(tree) => Some(tree),
            _ => None,
        }
    }
    #[must_use]
    pub fn history(&self) -> Option<&HistorySnapshot> {
        match self {
            Self::History(history) => Some(history),
            _ => None,
        }
    }
}
