//! # Handle registry
//!
//! Maps host-assigned ids to live entries holding the most recent snapshot, and is
//! the single structure mutated by command completions. Every mutation goes through
//! the one `RwLock` around the map, so two completions can never race on the same
//! id's cached fields.
//!
//! Validity is a pair: `(id, generation)`. The registry mints a fresh generation on
//! every registration, so a host that reuses an integer id after closing its
//! referent can never resurrect an old handle - the old generation no longer
//! matches. Resolving an invalidated or superseded handle yields
//! [`Error::StaleHandle`], never a stale success.

use std::sync::Arc;

use crate::state::{DocumentId, DocumentSnapshot, LayerId, LayerSnapshot, LayerTreeSnapshot};
use crate::Error;

/// Registry-local validity counter. Never reused within one registry.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Generation(std::num::NonZeroU64);
impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// A document id paired with the generation it was registered under.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DocumentHandle {
    pub(crate) id: DocumentId,
    pub(crate) generation: Generation,
}
impl DocumentHandle {
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }
}
impl std::fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.generation)
    }
}

/// A layer id, the document scoping it, and the generation it was registered
/// under. Layer ids are only unique within their owning document - two open
/// documents may legitimately share a raw layer id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LayerHandle {
    pub(crate) document: DocumentId,
    pub(crate) id: LayerId,
    pub(crate) generation: Generation,
}
impl LayerHandle {
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }
}
impl std::fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.document, self.id, self.generation)
    }
}

/// Live registry entry for a document. Shared by every resolution of the same
/// handle - pointer identity is the identity-stability guarantee.
pub struct DocumentEntry {
    generation: Generation,
    cached: parking_lot::RwLock<DocumentSnapshot>,
}
impl DocumentEntry {
    /// The most recent snapshot the host reported. Stale-until-refetched: valid as
    /// of the last completed round-trip, no longer.
    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        self.cached.read().clone()
    }
    fn update(&self, snapshot: DocumentSnapshot) {
        *self.cached.write() = snapshot;
    }
}

/// Live registry entry for a layer, scoped to its owning document.
pub struct LayerEntry {
    generation: Generation,
    document: DocumentId,
    cached: parking_lot::RwLock<LayerSnapshot>,
}
impl LayerEntry {
    #[must_use]
    pub fn snapshot(&self) -> LayerSnapshot {
        self.cached.read().clone()
    }
    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }
}

#[derive(Default)]
struct Inner {
    documents: hashbrown::HashMap<DocumentId, Arc<DocumentEntry>>,
    // Layer ids are document-scoped, so the key carries the owning document.
    layers: hashbrown::HashMap<(DocumentId, LayerId), Arc<LayerEntry>>,
}

pub struct HandleRegistry {
    // Single-writer discipline: completions mutate entries only through this lock.
    inner: parking_lot::RwLock<Inner>,
    next_generation: std::sync::atomic::AtomicU64,
}
impl Default for HandleRegistry {
    fn default() -> Self {
        Self {
            inner: parking_lot::RwLock::new(Inner::default()),
            next_generation: 1.into(),
        }
    }
}
impl HandleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    fn bump(&self) -> Generation {
        let raw = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        // Counter starts at 1 and a u64 of generations cannot plausibly exhaust.
        Generation(std::num::NonZeroU64::new(raw).unwrap())
    }

    /// Bind a freshly opened document's id to a new live entry.
    ///
    /// A registration colliding with a currently valid id is a host protocol
    /// violation; the old entry is superseded (its handles become stale) rather
    /// than wedging the client.
    pub fn register_document(&self, id: DocumentId, snapshot: DocumentSnapshot) -> DocumentHandle {
        let generation = self.bump();
        let mut inner = self.inner.write();
        if inner.documents.contains_key(&id) {
            log::warn!("host reused live document id {id}; superseding the old entry");
        }
        inner.documents.insert(
            id,
            Arc::new(DocumentEntry {
                generation,
                cached: parking_lot::RwLock::new(snapshot),
            }),
        );
        DocumentHandle { id, generation }
    }
    /// Bind a host-reported layer to a new live entry scoped to `document`.
    pub fn register_layer(&self, document: DocumentId, snapshot: LayerSnapshot) -> LayerHandle {
        let generation = self.bump();
        let id = snapshot.id;
        let mut inner = self.inner.write();
        if inner.layers.contains_key(&(document, id)) {
            log::warn!("host reused live layer id {id} within {document}; superseding the old entry");
        }
        inner.layers.insert(
            (document, id),
            Arc::new(LayerEntry {
                generation,
                document,
                cached: parking_lot::RwLock::new(snapshot),
            }),
        );
        LayerHandle {
            document,
            id,
            generation,
        }
    }

    /// Resolve a document handle to its live entry. Two resolutions of the same
    /// live handle return the same `Arc`.
    pub fn resolve_document(&self, handle: DocumentHandle) -> Result<Arc<DocumentEntry>, Error> {
        let inner = self.inner.read();
        inner
            .documents
            .get(&handle.id)
            .filter(|entry| entry.generation == handle.generation)
            .cloned()
            .ok_or_else(|| Error::stale(handle))
    }
    pub fn resolve_layer(&self, handle: LayerHandle) -> Result<Arc<LayerEntry>, Error> {
        let inner = self.inner.read();
        inner
            .layers
            .get(&(handle.document, handle.id))
            .filter(|entry| entry.generation == handle.generation)
            .cloned()
            .ok_or_else(|| Error::stale(handle))
    }

    /// Current-generation handle for a document id, if it is live.
    #[must_use]
    pub fn document_handle(&self, id: DocumentId) -> Option<DocumentHandle> {
        let inner = self.inner.read();
        inner.documents.get(&id).map(|entry| DocumentHandle {
            id,
            generation: entry.generation,
        })
    }
    /// Current-generation handle for a layer id within its owning document, if
    /// it is live.
    #[must_use]
    pub fn layer_handle(&self, document: DocumentId, id: LayerId) -> Option<LayerHandle> {
        let inner = self.inner.read();
        inner.layers.get(&(document, id)).map(|entry| LayerHandle {
            document,
            id,
            generation: entry.generation,
        })
    }

    /// Drop a document and every layer entry scoped to it. Subsequent operations
    /// against any of those handles fail with [`Error::StaleHandle`].
    pub fn invalidate_document(&self, id: DocumentId) {
        let mut inner = self.inner.write();
        if inner.documents.remove(&id).is_some() {
            log::debug!("invalidated document {id}");
        }
        inner.layers.retain(|&(document, _), _| document != id);
    }
    pub fn invalidate_layer(&self, document: DocumentId, id: LayerId) {
        let mut inner = self.inner.write();
        if inner.layers.remove(&(document, id)).is_some() {
            log::debug!("invalidated layer {id} in {document}");
        }
    }

    /// Overwrite a live document's cached fields with a fresh snapshot.
    /// No-op if the document is no longer live.
    pub fn update_document(&self, id: DocumentId, snapshot: DocumentSnapshot) {
        let inner = self.inner.read();
        if let Some(entry) = inner.documents.get(&id) {
            entry.update(snapshot);
        }
    }

    /// Apply a fresh layer-tree snapshot for one document: update survivors,
    /// register unseen layers, and invalidate entries the tree no longer contains.
    /// This is how flatten/merge/group invalidate the handles of layers that
    /// ceased to exist as distinct entities.
    pub fn reconcile_layers(&self, document: DocumentId, tree: &LayerTreeSnapshot) {
        let mut inner = self.inner.write();
        for layer in &tree.layers {
            match inner.layers.get(&(document, layer.id)) {
                Some(entry) => {
                    *entry.cached.write() = layer.clone();
                }
                None => {
                    let generation = self.bump();
                    inner.layers.insert(
                        (document, layer.id),
                        Arc::new(LayerEntry {
                            generation,
                            document,
                            cached: parking_lot::RwLock::new(layer.clone()),
                        }),
                    );
                }
            }
        }
        inner.layers.retain(|&(owner, id), _| {
            let keep = owner != document || tree.get(id).is_some();
            if !keep {
                log::debug!("layer {id} dropped by tree reconcile");
            }
            keep
        });
    }
}
