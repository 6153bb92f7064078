//! Layer proxies and the tree views over one document's layers.
//!
//! The tree exposes four views of the same authoritative structure: top-level
//! layers, the current selection, artboards, and the background layer. Each view
//! is a fresh fetch - the host mutates the tree from outside this crate's
//! commands, so no collection result is reused across calls.

use std::sync::Arc;

use crate::channel::CommandChannel;
use crate::commands::{Command, Payload};
use crate::constants::{BlendMode, LayerKind};
use crate::registry::{DocumentHandle, LayerEntry, LayerHandle};
use crate::state::{DocumentId, LayerId, LayerSnapshot, LayerTreeSnapshot};
use crate::Error;

/// A handle-backed view of one layer.
///
/// Equality is handle equality: two proxies are equal iff they refer to the same
/// live registration. A handle from before a cross-document duplicate never
/// equals the handle of the copy.
#[derive(Clone)]
pub struct Layer {
    handle: LayerHandle,
    document: DocumentHandle,
    channel: Arc<CommandChannel>,
}
impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}
impl Eq for Layer {}
impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Layer({})", self.handle)
    }
}
impl Layer {
    pub(crate) fn bind(
        channel: &Arc<CommandChannel>,
        document: DocumentHandle,
        id: LayerId,
    ) -> Result<Self, Error> {
        let handle = channel
            .registry()
            .layer_handle(document.id(), id)
            .ok_or_else(|| Error::stale(id))?;
        Ok(Self {
            handle,
            document,
            channel: channel.clone(),
        })
    }
    pub(crate) fn handle(&self) -> LayerHandle {
        self.handle
    }
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.handle.id()
    }
    #[must_use]
    pub fn document_id(&self) -> DocumentId {
        self.document.id()
    }
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.channel.registry().resolve_layer(self.handle).is_err()
    }
    fn entry(&self) -> Result<Arc<LayerEntry>, Error> {
        self.channel.registry().resolve_layer(self.handle)
    }

    // Cached-field reads: the value as of the last completed round-trip. For a
    // guaranteed-fresh value, `refresh` first.
    pub fn name(&self) -> Result<String, Error> {
        Ok(self.entry()?.snapshot().name)
    }
    pub fn kind(&self) -> Result<LayerKind, Error> {
        Ok(self.entry()?.snapshot().kind)
    }
    pub fn visible(&self) -> Result<bool, Error> {
        Ok(self.entry()?.snapshot().visible)
    }
    pub fn blend_mode(&self) -> Result<BlendMode, Error> {
        Ok(self.entry()?.snapshot().blend_mode)
    }
    pub fn opacity(&self) -> Result<f32, Error> {
        Ok(self.entry()?.snapshot().opacity)
    }
    /// Position within the parent's ordered children, top = 0.
    pub fn index(&self) -> Result<usize, Error> {
        Ok(self.entry()?.snapshot().index)
    }
    pub fn parent(&self) -> Result<Option<LayerId>, Error> {
        Ok(self.entry()?.snapshot().parent)
    }
    pub fn is_selected(&self) -> Result<bool, Error> {
        Ok(self.entry()?.snapshot().selected)
    }

    /// Round-trip re-read: refetches the owning document's tree and returns this
    /// layer's snapshot from it. Fails stale if the layer did not survive.
    pub async fn refresh(&self) -> Result<LayerSnapshot, Error> {
        self.channel
            .send(self.document, Command::FetchLayerTree)
            .await?;
        Ok(self.entry()?.snapshot())
    }
}

/// The hierarchical, ordered collection of one document's layers.
#[derive(Clone)]
pub struct LayerTree {
    document: DocumentHandle,
    channel: Arc<CommandChannel>,
}
impl LayerTree {
    pub(crate) fn new(channel: Arc<CommandChannel>, document: DocumentHandle) -> Self {
        Self { document, channel }
    }

    /// Fetch the authoritative tree. Every view below goes through here.
    pub async fn fetch(&self) -> Result<LayerTreeSnapshot, Error> {
        let payload = self
            .channel
            .send(self.document, Command::FetchLayerTree)
            .await?;
        match payload {
            Payload::LayerTree(tree) => Ok(tree),
            _ => Err(Error::malformed_response("fetchLayerTree")),
        }
    }
    fn bind_all<'t>(
        &self,
        layers: impl Iterator<Item = &'t LayerSnapshot>,
    ) -> Result<Vec<Layer>, Error> {
        layers
            .map(|snapshot| Layer::bind(&self.channel, self.document, snapshot.id))
            .collect()
    }

    /// Top-level children of the document root, in z-order (top first).
    pub async fn all(&self) -> Result<Vec<Layer>, Error> {
        let tree = self.fetch().await?;
        self.bind_all(tree.top_level())
    }
    /// The host's current selection. May be empty.
    pub async fn active_layers(&self) -> Result<Vec<Layer>, Error> {
        let tree = self.fetch().await?;
        self.bind_all(tree.layers.iter().filter(|layer| layer.selected))
    }
    /// Layers of artboard kind.
    pub async fn artboards(&self) -> Result<Vec<Layer>, Error> {
        let tree = self.fetch().await?;
        self.bind_all(
            tree.layers
                .iter()
                .filter(|layer| layer.kind == LayerKind::Artboard),
        )
    }
    /// The background layer, if the document has one.
    pub async fn background_layer(&self) -> Result<Option<Layer>, Error> {
        let tree = self.fetch().await?;
        tree.background()
            .map(|snapshot| Layer::bind(&self.channel, self.document, snapshot.id))
            .transpose()
    }
    /// Ordered children of a group layer (top first). Empty for non-groups.
    pub async fn children_of(&self, group: &Layer) -> Result<Vec<Layer>, Error> {
        let tree = self.fetch().await?;
        self.bind_all(tree.children_of(group.id()))
    }
}
