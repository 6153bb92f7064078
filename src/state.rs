//! Snapshot types: the host's answer to "what does this object look like right now".
//!
//! Snapshots are plain data, valid only as of the round-trip that produced them.
//! The host may mutate its state at any time from sources outside this crate's own
//! commands (user interaction, other scripts), so nothing here is a live view -
//! the registry caches the most recent snapshot per handle and every collection
//! read refetches.

use crate::constants::{BlendMode, LayerKind};

pub type DocumentId = crate::Id<DocumentSnapshot>;
pub type LayerId = crate::Id<LayerSnapshot>;

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    /// Title shown by the host, inferred from the path or generated.
    pub title: String,
    /// The file-system path the document saves to, or None if never saved there.
    pub path: Option<std::path::PathBuf>,
    /// Cloud identifier, for documents that live host-side rather than on disk.
    pub cloud_id: Option<String>,
    /// Canvas extent in pixels.
    pub width: u32,
    pub height: u32,
    /// Pixels per inch.
    pub resolution: f32,
    /// Custom pixel aspect ratio. 1.0 for square pixels.
    pub pixel_aspect_ratio: f64,
    /// Whether the document has no unsaved changes.
    pub saved: bool,
}
impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self {
            title: "Untitled".into(),
            path: None,
            cloud_id: None,
            width: 1920,
            height: 1080,
            resolution: 72.0,
            pixel_aspect_ratio: 1.0,
            saved: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub blend_mode: BlendMode,
    /// 0.0 ..= 1.0
    pub opacity: f32,
    /// Owning group, or None for a top-level child of the document root.
    pub parent: Option<LayerId>,
    /// Position within the parent's ordered children, where top = 0.
    pub index: usize,
    /// Whether the layer is part of the host's current selection.
    pub selected: bool,
    /// The link-set this layer belongs to, if any.
    pub link_set: Option<u32>,
}

/// A flat, parent-linked description of one document's whole layer tree.
///
/// Invariant (host contract): the described structure is a forest - acyclic, with
/// sibling indices forming a strict total order within each parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerTreeSnapshot {
    pub layers: Vec<LayerSnapshot>,
}
impl LayerTreeSnapshot {
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|layer| layer.id == id)
    }
    /// Top-level children of the document root, in z-order (top first).
    pub fn top_level(&self) -> impl Iterator<Item = &LayerSnapshot> {
        let mut level: Vec<_> = self
            .layers
            .iter()
            .filter(|layer| layer.parent.is_none())
            .collect();
        level.sort_by_key(|layer| layer.index);
        level.into_iter()
    }
    /// Ordered children of the given group (top first). Empty for non-groups.
    pub fn children_of(&self, parent: LayerId) -> impl Iterator<Item = &LayerSnapshot> {
        let mut level: Vec<_> = self
            .layers
            .iter()
            .filter(move |layer| layer.parent == Some(parent))
            .collect();
        level.sort_by_key(|layer| layer.index);
        level.into_iter()
    }
    #[must_use]
    pub fn background(&self) -> Option<&LayerSnapshot> {
        self.layers
            .iter()
            .find(|layer| layer.kind == LayerKind::Background)
    }
    /// Check the forest invariant: every parent id resolves, and no layer is its
    /// own ancestor. Hosts are trusted, but a malformed tree would otherwise send
    /// the view iterators into nonsense, so the channel checks on absorb.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.layers.iter().all(|layer| {
            let mut hops = 0usize;
            let mut cursor = layer.parent;
            while let Some(parent) = cursor {
                if parent == layer.id || hops > self.layers.len() {
                    return false;
                }
                let Some(node) = self.get(parent) else {
                    return false;
                };
                cursor = node.parent;
                hops += 1;
            }
            true
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryStateSnapshot {
    /// Description of the recorded edit, e.g. "Crop".
    pub label: String,
}

/// The ordered per-document history sequence with its two independent pointers.
///
/// Invariant (host contract): both pointers index into `states`, and exactly one
/// state is active. The brush-source pointer moves independently of the active one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub states: Vec<HistoryStateSnapshot>,
    pub active: usize,
    pub brush_source: usize,
}

/// How a [`close`](crate::proxy::document::Document::close) request resolved.
/// Cancellation is an outcome, not an error - the document stays open and valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    Saved,
    Discarded,
    Cancelled,
}

/// An axis-aligned rectangle in canvas space, y-down.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}
impl Rect {
    #[must_use]
    pub fn from_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }
    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
    /// Finite with non-negative extent. Degenerate (zero-area) rects are
    /// well-formed here; whether they make sense is per-operation.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|component| component.is_finite())
            && self.right >= self.left
            && self.bottom >= self.top
    }
}
