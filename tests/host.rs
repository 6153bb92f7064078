//! Integration tests driving the full proxy stack against an in-memory host.
//!
//! `FakeHost` models the *observable* host contract - ordered layer forest,
//! linear history with destructive truncation, link sets, close prompting, save
//! path retargeting - and nothing below it (no pixels, no codecs).

use std::collections::VecDeque;
use std::sync::Arc;

use remotedoc::channel::{CommandChannel, HostResponse, HostTransport, Request};
use remotedoc::commands::{Command, LayerCreateOptions, Payload};
use remotedoc::constants::{AnchorPosition, BlendMode, LayerKind, SaveDialogBehavior};
use remotedoc::save::{FileEntry, JpegSaveOptions, SaveOptions};
use remotedoc::state::{
    CloseOutcome, DocumentId, DocumentSnapshot, HistorySnapshot, HistoryStateSnapshot, LayerId,
    LayerSnapshot, LayerTreeSnapshot, Rect,
};
use remotedoc::{Document, Error};

/// Save-as against this capability token is refused by the storage subsystem.
const DENIED_TOKEN: u64 = 666;

struct HostLayer {
    name: String,
    kind: LayerKind,
    visible: bool,
    blend: BlendMode,
    opacity: f32,
    selected: bool,
    link_set: Option<u32>,
}
impl HostLayer {
    fn normal(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Normal,
            visible: true,
            blend: BlendMode::Normal,
            opacity: 1.0,
            selected: false,
            link_set: None,
        }
    }
}

struct HostDoc {
    title: String,
    path: Option<std::path::PathBuf>,
    width: u32,
    height: u32,
    resolution: f32,
    pixel_aspect_ratio: f64,
    saved: bool,
    layers: hashbrown::HashMap<u64, HostLayer>,
    /// Sibling order per parent (None = document root), top first.
    children: hashbrown::HashMap<Option<u64>, Vec<u64>>,
    history: Vec<String>,
    active: usize,
    brush: usize,
    next_link: u32,
}
impl HostDoc {
    /// Record a new history state: truncate the forward portion, append, advance.
    fn record(&mut self, label: impl Into<String>) {
        self.history.truncate(self.active + 1);
        self.history.push(label.into());
        self.active = self.history.len() - 1;
        self.brush = self.brush.min(self.history.len() - 1);
        self.saved = false;
    }
    fn siblings(&mut self, parent: Option<u64>) -> &mut Vec<u64> {
        self.children.entry(parent).or_default()
    }
    fn parent_of(&self, id: u64) -> Option<u64> {
        self.children
            .iter()
            .find(|(_, list)| list.contains(&id))
            .and_then(|(parent, _)| *parent)
    }
    fn detach(&mut self, id: u64) {
        for list in self.children.values_mut() {
            list.retain(|child| *child != id);
        }
    }
    fn remove_layer(&mut self, id: u64) {
        self.layers.remove(&id);
        self.detach(id);
        self.children.remove(&Some(id));
    }
    /// Depth-first z-order, top first.
    fn z_order(&self) -> Vec<u64> {
        fn walk(doc: &HostDoc, parent: Option<u64>, out: &mut Vec<u64>) {
            if let Some(list) = doc.children.get(&parent) {
                for id in list {
                    out.push(*id);
                    walk(doc, Some(*id), out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, None, &mut out);
        out
    }
    fn doc_snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            title: self.title.clone(),
            path: self.path.clone(),
            cloud_id: None,
            width: self.width,
            height: self.height,
            resolution: self.resolution,
            pixel_aspect_ratio: self.pixel_aspect_ratio,
            saved: self.saved,
        }
    }
    fn layer_snapshot(&self, id: u64) -> LayerSnapshot {
        let layer = &self.layers[&id];
        let parent = self.parent_of(id);
        let index = self
            .children
            .get(&parent)
            .and_then(|list| list.iter().position(|child| *child == id))
            .unwrap();
        LayerSnapshot {
            id: LayerId::from_raw(id).unwrap(),
            name: layer.name.clone(),
            kind: layer.kind,
            visible: layer.visible,
            blend_mode: layer.blend,
            opacity: layer.opacity,
            parent: parent.map(|p| LayerId::from_raw(p).unwrap()),
            index,
            selected: layer.selected,
            link_set: layer.link_set,
        }
    }
    fn tree_snapshot(&self) -> LayerTreeSnapshot {
        LayerTreeSnapshot {
            layers: self
                .z_order()
                .into_iter()
                .map(|id| self.layer_snapshot(id))
                .collect(),
        }
    }
    fn history_snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            states: self
                .history
                .iter()
                .map(|label| HistoryStateSnapshot {
                    label: label.clone(),
                })
                .collect(),
            active: self.active,
            brush_source: self.brush,
        }
    }
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    docs: hashbrown::HashMap<u64, HostDoc>,
    close_answers: VecDeque<CloseOutcome>,
    applied: Vec<String>,
}
impl HostState {
    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct FakeHost {
    state: parking_lot::Mutex<HostState>,
}
impl FakeHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: parking_lot::Mutex::new(HostState::default()),
        })
    }
    /// Queue the user's answer to the next unsaved-changes prompt.
    fn script_close_answer(&self, outcome: CloseOutcome) {
        self.state.lock().close_answers.push_back(outcome);
    }
    /// Close a document host-side, as if the user hit the window's close button.
    fn drop_document(&self, id: DocumentId) {
        self.state.lock().docs.remove(&id.raw());
    }
    fn applied(&self) -> Vec<String> {
        self.state.lock().applied.clone()
    }

    /// The standard seeded document: an artboard, two normal layers (topmost
    /// selected), and a background.
    fn open_document(state: &mut HostState, title: String) -> u64 {
        let doc_id = state.mint();
        let mut doc = HostDoc {
            title,
            path: None,
            width: 1000,
            height: 800,
            resolution: 72.0,
            pixel_aspect_ratio: 1.0,
            saved: true,
            layers: hashbrown::HashMap::new(),
            children: hashbrown::HashMap::new(),
            history: vec!["Open".into()],
            active: 0,
            brush: 0,
            next_link: 1,
        };
        let artboard = state.mint();
        let top = state.mint();
        let middle = state.mint();
        let background = state.mint();
        doc.layers.insert(artboard, {
            let mut layer = HostLayer::normal("Artboard 1");
            layer.kind = LayerKind::Artboard;
            layer
        });
        doc.layers.insert(top, {
            let mut layer = HostLayer::normal("Layer 2");
            layer.selected = true;
            layer
        });
        doc.layers.insert(middle, HostLayer::normal("Layer 1"));
        doc.layers.insert(background, {
            let mut layer = HostLayer::normal("Background");
            layer.kind = LayerKind::Background;
            layer
        });
        doc.children
            .insert(None, vec![artboard, top, middle, background]);
        state.docs.insert(doc_id, doc);
        doc_id
    }
}

#[async_trait::async_trait]
impl HostTransport for FakeHost {
    async fn submit(&self, request: Request) -> Result<HostResponse, Error> {
        let mut state = self.state.lock();
        state.applied.push(request.command.name().to_string());

        if let Command::Open { entry } = &request.command {
            let doc_id = FakeHost::open_document(&mut state, entry.name().to_string());
            let snapshot = state.docs[&doc_id].doc_snapshot();
            let tree = state.docs[&doc_id].tree_snapshot();
            return Ok(HostResponse::of(Payload::Opened(
                DocumentId::from_raw(doc_id).unwrap(),
                snapshot,
            ))
            .with_tree(tree));
        }

        let doc_id = request
            .document
            .map(|id| id.raw())
            .ok_or(Error::DocumentClosed)?;
        if !state.docs.contains_key(&doc_id) {
            return Err(Error::DocumentClosed);
        }

        macro_rules! doc {
            () => {
                state.docs.get_mut(&doc_id).unwrap()
            };
        }
        let respond = |state: &HostState, payload: Payload| {
            let doc = &state.docs[&doc_id];
            Ok(HostResponse::of(payload)
                .with_document(doc.doc_snapshot())
                .with_tree(doc.tree_snapshot()))
        };

        let is_group_create = matches!(request.command, Command::CreateLayerGroup { .. });
        match request.command {
            Command::Open { .. } => unreachable!(),
            Command::Close { behavior } => {
                let outcome = if state.docs[&doc_id].saved {
                    CloseOutcome::Saved
                } else {
                    match behavior {
                        SaveDialogBehavior::Prompt => state
                            .close_answers
                            .pop_front()
                            .unwrap_or(CloseOutcome::Cancelled),
                        SaveDialogBehavior::Save => CloseOutcome::Saved,
                        SaveDialogBehavior::DontSave => CloseOutcome::Discarded,
                    }
                };
                if outcome != CloseOutcome::Cancelled {
                    state.docs.remove(&doc_id);
                }
                Ok(HostResponse::of(Payload::CloseOutcome(outcome)))
            }
            Command::CloseWithoutSaving => {
                state.docs.remove(&doc_id);
                Ok(HostResponse::of(Payload::CloseOutcome(
                    CloseOutcome::Discarded,
                )))
            }
            Command::Crop { bounds, .. } => {
                let doc = doc!();
                let outside = bounds.left >= f64::from(doc.width)
                    || bounds.top >= f64::from(doc.height)
                    || bounds.right <= 0.0
                    || bounds.bottom <= 0.0;
                if outside {
                    return Err(Error::HostRejected {
                        reason: "crop bounds do not overlap the canvas".into(),
                    });
                }
                doc.width = bounds.width().round() as u32;
                doc.height = bounds.height().round() as u32;
                doc.record("Crop");
                respond(&state, Payload::None)
            }
            Command::Flatten => {
                let doc = doc!();
                let background = doc
                    .z_order()
                    .into_iter()
                    .find(|id| doc.layers[id].kind == LayerKind::Background);
                for id in doc.z_order() {
                    if Some(id) != background {
                        doc.remove_layer(id);
                    }
                }
                let keep = match background {
                    Some(id) => id,
                    None => {
                        let id = state.mint();
                        let doc = doc!();
                        let mut layer = HostLayer::normal("Background");
                        layer.kind = LayerKind::Background;
                        doc.layers.insert(id, layer);
                        id
                    }
                };
                let doc = doc!();
                doc.children.clear();
                doc.children.insert(None, vec![keep]);
                doc.record("Flatten Image");
                respond(&state, Payload::None)
            }
            Command::MergeVisible => {
                let doc = doc!();
                // Visible normal layers merge downward into the visible
                // background if present, else into the bottom-most visible
                // normal layer. Hidden and non-raster kinds survive.
                let mergeable: Vec<u64> = doc
                    .z_order()
                    .into_iter()
                    .filter(|id| {
                        let layer = &doc.layers[id];
                        layer.visible
                            && matches!(layer.kind, LayerKind::Normal | LayerKind::Background)
                    })
                    .collect();
                if let Some((_keep, rest)) = mergeable.split_last() {
                    for id in rest.to_vec() {
                        doc.remove_layer(id);
                    }
                }
                doc.record("Merge Visible");
                respond(&state, Payload::None)
            }
            Command::ResizeCanvas { width, height, .. } => {
                let doc = doc!();
                doc.width = width;
                doc.height = height;
                doc.record("Canvas Size");
                respond(&state, Payload::None)
            }
            Command::ResizeImage {
                width,
                height,
                resolution,
                ..
            } => {
                let doc = doc!();
                doc.width = width;
                doc.height = height;
                if let Some(resolution) = resolution {
                    doc.resolution = resolution;
                }
                doc.record("Image Size");
                respond(&state, Payload::None)
            }
            Command::Rotate { degrees } => {
                let doc = doc!();
                if (degrees / 90.0).round() as i64 % 2 != 0 {
                    std::mem::swap(&mut doc.width, &mut doc.height);
                }
                doc.record("Rotate Canvas");
                respond(&state, Payload::None)
            }
            Command::Save => {
                let doc = doc!();
                if doc.path.is_none() {
                    // Never-saved documents go through the host's picker.
                    doc.path = Some(format!("{}.psd", doc.title).into());
                }
                doc.saved = true;
                respond(&state, Payload::None)
            }
            Command::SaveAs { entry, as_copy, .. } => {
                if entry.token() == DENIED_TOKEN {
                    return Err(Error::PermissionDenied {
                        reason: format!("no write grant for `{}`", entry.name()),
                    });
                }
                let doc = doc!();
                if !as_copy {
                    doc.path = Some(entry.name().into());
                    doc.saved = true;
                }
                respond(&state, Payload::None)
            }
            Command::DuplicateLayers { layers, target } => {
                let target_id = target.map_or(doc_id, |id| id.raw());
                if !state.docs.contains_key(&target_id) {
                    return Err(Error::DocumentClosed);
                }
                let source = &state.docs[&doc_id];
                for id in &layers {
                    if !source.layers.contains_key(&id.raw()) {
                        return Err(Error::HostRejected {
                            reason: format!("unknown layer {id}"),
                        });
                    }
                }
                // Source z-order among the duplicated set is the preserved order.
                let order: Vec<u64> = source
                    .z_order()
                    .into_iter()
                    .filter(|id| layers.iter().any(|l| l.raw() == *id))
                    .collect();
                let attrs: Vec<(String, LayerKind, bool, BlendMode, f32)> = order
                    .iter()
                    .map(|id| {
                        let layer = &source.layers[id];
                        (
                            format!("{} copy", layer.name),
                            layer.kind,
                            layer.visible,
                            layer.blend,
                            layer.opacity,
                        )
                    })
                    .collect();
                let minted: Vec<u64> = attrs.iter().map(|_| state.mint()).collect();
                {
                    let destination = state.docs.get_mut(&target_id).unwrap();
                    for (new_id, (name, kind, visible, blend, opacity)) in
                        minted.iter().zip(attrs)
                    {
                        destination.layers.insert(
                            *new_id,
                            HostLayer {
                                name,
                                kind,
                                visible,
                                blend,
                                opacity,
                                selected: false,
                                link_set: None,
                            },
                        );
                    }
                    // Above the current topmost, relative order preserved.
                    let root = destination.siblings(None);
                    let mut reordered = minted.clone();
                    reordered.extend(root.iter().copied());
                    *root = reordered;
                    destination.record("Duplicate Layers");
                }
                let snapshots: Vec<LayerSnapshot> = minted
                    .iter()
                    .map(|id| state.docs[&target_id].layer_snapshot(*id))
                    .collect();
                respond(&state, Payload::Layers(snapshots))
            }
            Command::LinkLayers { layers } => {
                let doc = doc!();
                let accepted: Vec<u64> = layers
                    .iter()
                    .map(|id| id.raw())
                    .filter(|id| {
                        doc.layers.get(id).is_some_and(|layer| {
                            layer.kind.is_linkable() && layer.link_set.is_none()
                        })
                    })
                    .collect();
                if !accepted.is_empty() {
                    let set = doc.next_link;
                    doc.next_link += 1;
                    for id in &accepted {
                        doc.layers.get_mut(id).unwrap().link_set = Some(set);
                    }
                    doc.record("Link Layers");
                }
                let linked = accepted
                    .into_iter()
                    .map(|id| LayerId::from_raw(id).unwrap())
                    .collect();
                respond(&state, Payload::LinkedLayers(linked))
            }
            Command::CreateLayer { options } | Command::CreateLayerGroup { options } => {
                let group = is_group_create;
                let parent = options.parent.map(|id| id.raw());
                {
                    let doc = doc!();
                    // Only a live group is a valid insertion target.
                    if let Some(parent) = parent {
                        let valid = doc
                            .layers
                            .get(&parent)
                            .is_some_and(|layer| layer.kind == LayerKind::Group);
                        if !valid {
                            return respond(&state, Payload::Layer(None));
                        }
                    }
                }
                let id = state.mint();
                let doc = doc!();
                let name = options.name.unwrap_or_else(|| {
                    if group {
                        format!("Group {id}")
                    } else {
                        format!("Layer {id}")
                    }
                });
                let mut layer = HostLayer::normal(&name);
                if group {
                    layer.kind = LayerKind::Group;
                }
                if let Some(opacity) = options.opacity {
                    layer.opacity = opacity;
                }
                if let Some(blend) = options.blend_mode {
                    layer.blend = blend;
                }
                layer.selected = true;
                for other in doc.layers.values_mut() {
                    other.selected = false;
                }
                doc.layers.insert(id, layer);
                doc.siblings(parent).insert(0, id);
                doc.record(format!("Make {name}"));
                let snapshot = state.docs[&doc_id].layer_snapshot(id);
                respond(&state, Payload::Layer(Some(snapshot)))
            }
            Command::GroupLayers { layers } => {
                {
                    let doc = doc!();
                    let refused = layers.iter().any(|id| {
                        doc.layers
                            .get(&id.raw())
                            .map_or(true, |layer| layer.kind == LayerKind::Background)
                    });
                    if refused {
                        return respond(&state, Payload::Layer(None));
                    }
                }
                let group_id = state.mint();
                let doc = doc!();
                let members: Vec<u64> = doc
                    .z_order()
                    .into_iter()
                    .filter(|id| layers.iter().any(|l| l.raw() == *id))
                    .collect();
                for id in &members {
                    doc.detach(*id);
                }
                let mut group = HostLayer::normal(&format!("Group {group_id}"));
                group.kind = LayerKind::Group;
                doc.layers.insert(group_id, group);
                doc.siblings(None).insert(0, group_id);
                doc.children.insert(Some(group_id), members);
                doc.record("Group Layers");
                let snapshot = state.docs[&doc_id].layer_snapshot(group_id);
                respond(&state, Payload::Layer(Some(snapshot)))
            }
            Command::SetActiveHistoryState { index } => {
                let doc = doc!();
                if index >= doc.history.len() {
                    return Err(Error::HostRejected {
                        reason: format!("no history state at {index}"),
                    });
                }
                doc.active = index;
                respond(&state, Payload::None)
            }
            Command::SetActiveHistoryBrushSource { index } => {
                let doc = doc!();
                if index >= doc.history.len() {
                    return Err(Error::HostRejected {
                        reason: format!("no history state at {index}"),
                    });
                }
                doc.brush = index;
                respond(&state, Payload::None)
            }
            Command::SetPixelAspectRatio { ratio } => {
                let doc = doc!();
                doc.pixel_aspect_ratio = ratio;
                doc.record("Pixel Aspect Ratio");
                respond(&state, Payload::None)
            }
            Command::FetchDocument => {
                let snapshot = state.docs[&doc_id].doc_snapshot();
                Ok(HostResponse::of(Payload::Document(snapshot)))
            }
            Command::FetchLayerTree => {
                let tree = state.docs[&doc_id].tree_snapshot();
                Ok(HostResponse::of(Payload::LayerTree(tree)))
            }
            Command::FetchHistory => {
                let history = state.docs[&doc_id].history_snapshot();
                Ok(HostResponse::of(Payload::History(history)))
            }
        }
    }
}

async fn open(host: &Arc<FakeHost>) -> (Arc<CommandChannel>, Document) {
    let channel = Arc::new(CommandChannel::new(host.clone()));
    let entry = FileEntry::from_token(1, "flowers").unwrap();
    let document = Document::open(channel.clone(), entry).await.unwrap();
    (channel, document)
}

/// Top-level layer names, top first.
async fn top_level_names(document: &Document) -> Vec<String> {
    let mut names = Vec::new();
    for layer in document.layers().all().await.unwrap() {
        names.push(layer.name().unwrap());
    }
    names
}

#[tokio::test]
async fn operations_after_close_are_stale() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    document.close_without_saving().await.unwrap();

    let result = document.crop(Rect::from_size(0.0, 0.0, 10.0, 10.0), 0.0).await;
    assert!(matches!(result, Err(Error::StaleHandle { .. })));
    assert!(!document.is_open());
}

#[tokio::test]
async fn host_side_closure_invalidates_the_handle() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    host.drop_document(document.id());

    // The first command after the host-side close surfaces the closure and
    // reclaims the handle; everything after fails fast as stale.
    let result = document.rotate(90.0).await;
    assert!(matches!(result, Err(Error::DocumentClosed)));
    assert!(!document.is_open());

    let before = host.applied().len();
    let result = document.flatten().await;
    assert!(matches!(result, Err(Error::StaleHandle { .. })));
    assert_eq!(host.applied().len(), before);
}

#[tokio::test]
async fn layer_views_are_consistent_with_the_tree() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;

    assert_eq!(
        top_level_names(&document).await,
        ["Artboard 1", "Layer 2", "Layer 1", "Background"]
    );
    let active = document.layers().active_layers().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name().unwrap(), "Layer 2");

    let artboards = document.layers().artboards().await.unwrap();
    assert_eq!(artboards.len(), 1);
    assert_eq!(artboards[0].kind().unwrap(), LayerKind::Artboard);

    let background = document.layers().background_layer().await.unwrap().unwrap();
    assert_eq!(background.name().unwrap(), "Background");
}

#[tokio::test]
async fn duplicate_layers_mints_fresh_handles_above_the_top() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let layers = document.layers().all().await.unwrap();
    let (upper, lower) = (layers[1].clone(), layers[2].clone());

    let duplicates = document
        .duplicate_layers(&[lower.clone(), upper.clone()], None)
        .await
        .unwrap();
    assert_eq!(duplicates.len(), 2);
    for duplicate in &duplicates {
        assert!(!duplicate.is_stale());
        assert_ne!(duplicate.id(), upper.id());
        assert_ne!(duplicate.id(), lower.id());
    }
    // Relative order preserved (upper above lower), above the prior top.
    assert_eq!(
        top_level_names(&document).await,
        [
            "Layer 2 copy",
            "Layer 1 copy",
            "Artboard 1",
            "Layer 2",
            "Layer 1",
            "Background"
        ]
    );
    // Originals are untouched and still live.
    assert!(!upper.is_stale());
}

#[tokio::test]
async fn duplicate_into_another_document_scopes_handles_to_it() {
    let host = FakeHost::new();
    let channel = Arc::new(CommandChannel::new(host.clone()));
    let source = Document::open(channel.clone(), FileEntry::from_token(1, "a").unwrap())
        .await
        .unwrap();
    let destination = Document::open(channel.clone(), FileEntry::from_token(2, "b").unwrap())
        .await
        .unwrap();

    let layers = source.layers().all().await.unwrap();
    let copies = source
        .duplicate_layers(&[layers[1].clone()], Some(&destination))
        .await
        .unwrap();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].document_id(), destination.id());
    assert_ne!(copies[0].id(), layers[1].id());
    assert_eq!(top_level_names(&destination).await[0], "Layer 2 copy");
}

#[tokio::test]
async fn duplicate_with_foreign_layer_fails_whole_batch() {
    let host = FakeHost::new();
    let channel = Arc::new(CommandChannel::new(host.clone()));
    let mine = Document::open(channel.clone(), FileEntry::from_token(1, "a").unwrap())
        .await
        .unwrap();
    let theirs = Document::open(channel.clone(), FileEntry::from_token(2, "b").unwrap())
        .await
        .unwrap();

    let my_layer = &mine.layers().all().await.unwrap()[1];
    let their_layer = &theirs.layers().all().await.unwrap()[1];
    let before = host.applied().len();

    let result = mine
        .duplicate_layers(&[my_layer.clone(), their_layer.clone()], None)
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    // Nothing was submitted and nothing changed.
    assert_eq!(host.applied().len(), before);
    assert_eq!(top_level_names(&mine).await.len(), 4);
}

#[tokio::test]
async fn group_layers_moves_members_in_order() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let layers = document.layers().all().await.unwrap();
    let (upper, lower) = (layers[1].clone(), layers[2].clone());

    let group = document
        .group_layers(&[lower.clone(), upper.clone()])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.kind().unwrap(), LayerKind::Group);

    // Members left the root order and are exactly the group's children, in
    // their original relative order.
    assert_eq!(
        top_level_names(&document).await,
        [group.name().unwrap(), "Artboard 1".into(), "Background".to_string()]
    );
    let children = document.layers().children_of(&group).await.unwrap();
    assert_eq!(children, [upper, lower]);
}

#[tokio::test]
async fn grouping_the_background_is_declined() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let background = document.layers().background_layer().await.unwrap().unwrap();

    let group = document.group_layers(&[background]).await.unwrap();
    assert!(group.is_none());
}

#[tokio::test]
async fn link_layers_returns_the_achieved_subset() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let layers = document.layers().all().await.unwrap();
    let (upper, lower) = (layers[1].clone(), layers[2].clone());

    // First link occupies `lower` with an incompatible set.
    let first = document.link_layers(&[lower.clone()]).await.unwrap();
    assert_eq!(first, [lower.clone()]);

    // Second request: one linkable, one already incompatibly linked.
    let second = document
        .link_layers(&[upper.clone(), lower.clone()])
        .await
        .unwrap();
    assert_eq!(second, [upper]);
}

#[tokio::test]
async fn linking_a_background_layer_is_skipped() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let layers = document.layers().all().await.unwrap();
    let background = document.layers().background_layer().await.unwrap().unwrap();

    let linked = document
        .link_layers(&[layers[1].clone(), background])
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].name().unwrap(), "Layer 2");
}

#[tokio::test]
async fn flatten_invalidates_merged_away_handles() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let layers = document.layers().all().await.unwrap();
    let background = document.layers().background_layer().await.unwrap().unwrap();

    document.flatten().await.unwrap();
    assert_eq!(top_level_names(&document).await, ["Background"]);
    assert!(layers[1].is_stale());
    assert!(layers[2].is_stale());
    assert!(!background.is_stale());
}

#[tokio::test]
async fn merge_visible_preserves_hidden_and_special_kinds() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let artboard = document.layers().artboards().await.unwrap().remove(0);

    document.merge_visible_layers().await.unwrap();
    assert_eq!(top_level_names(&document).await, ["Artboard 1", "Background"]);
    assert!(!artboard.is_stale());
}

#[tokio::test]
async fn resize_canvas_round_trips() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let (width, height) = (document.width().unwrap(), document.height().unwrap());

    document
        .resize_canvas(width + 100, height + 100, AnchorPosition::Center)
        .await
        .unwrap();
    assert_eq!(document.width().unwrap(), width + 100);

    document
        .resize_canvas(width, height, AnchorPosition::Center)
        .await
        .unwrap();
    assert_eq!(document.width().unwrap(), width);
    assert_eq!(document.height().unwrap(), height);
}

#[tokio::test]
async fn crop_validation_and_rejection() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;

    // Malformed bounds never reach the host.
    let before = host.applied().len();
    let inverted = Rect {
        left: 50.0,
        top: 0.0,
        right: 10.0,
        bottom: 40.0,
    };
    assert!(matches!(
        document.crop(inverted, 0.0).await,
        Err(Error::InvalidArgument { .. })
    ));
    assert_eq!(host.applied().len(), before);

    // Well-formed but off-canvas bounds are the host's call.
    let off_canvas = Rect::from_size(5000.0, 5000.0, 10.0, 10.0);
    assert!(matches!(
        document.crop(off_canvas, 0.0).await,
        Err(Error::HostRejected { .. })
    ));

    document
        .crop(Rect::from_size(0.0, 0.0, 300.0, 200.0), 0.0)
        .await
        .unwrap();
    assert_eq!(document.width().unwrap(), 300);
    assert_eq!(document.height().unwrap(), 200);
}

#[tokio::test]
async fn rewind_then_edit_truncates_forward_history() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let history = document.history();

    for name in ["one", "two"] {
        document
            .create_layer(LayerCreateOptions {
                name: Some(name.into()),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    let full = history.snapshot().await.unwrap();
    assert_eq!(full.states.len(), 3); // Open, Make one, Make two
    assert_eq!(full.active, 2);

    history.set_active(1).await.unwrap();
    document
        .create_layer(LayerCreateOptions {
            name: Some("three".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let truncated = history.snapshot().await.unwrap();
    let labels: Vec<&str> = truncated
        .states
        .iter()
        .map(|state| state.label.as_str())
        .collect();
    // "Make two" is no longer reachable as a forward state.
    assert_eq!(labels, ["Open", "Make one", "Make three"]);
    assert_eq!(truncated.active, 2);
}

#[tokio::test]
async fn brush_source_pointer_is_independent() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let history = document.history();

    document
        .create_layer(LayerCreateOptions::default())
        .await
        .unwrap();
    history.set_brush_source(0).await.unwrap();

    document
        .create_layer(LayerCreateOptions::default())
        .await
        .unwrap();
    let snapshot = history.snapshot().await.unwrap();
    assert_eq!(snapshot.brush_source, 0);
    assert_eq!(snapshot.active, snapshot.states.len() - 1);

    let states = history.states().await.unwrap();
    assert!(states[0].brush_source);
    assert!(states.last().unwrap().active);

    // Out-of-range pointer moves are the host's refusal.
    assert!(matches!(
        history.set_active(99).await,
        Err(Error::HostRejected { .. })
    ));
}

#[tokio::test]
async fn save_as_copy_leaves_the_save_path_alone() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    document.save().await.unwrap();
    let original = document.path().unwrap();
    assert!(original.is_some());

    let copy_entry = FileEntry::from_token(7, "export.jpg").unwrap();
    document
        .save_as()
        .jpg(copy_entry.clone(), JpegSaveOptions::with_quality(12), true)
        .await
        .unwrap();
    assert_eq!(document.snapshot().await.unwrap().path, original);

    document
        .save_as()
        .jpg(copy_entry, JpegSaveOptions::with_quality(12), false)
        .await
        .unwrap();
    assert_eq!(
        document.snapshot().await.unwrap().path,
        Some("export.jpg".into())
    );
}

#[tokio::test]
async fn invalid_save_options_never_reach_the_host() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let before = host.applied().len();

    let entry = FileEntry::from_token(7, "export.jpg").unwrap();
    let result = document
        .save_as()
        .jpg(entry.clone(), JpegSaveOptions::with_quality(13), true)
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));

    // Mismatched variant through the untyped path.
    let result = document
        .save_as()
        .save_with(
            remotedoc::constants::SaveFormat::Gif,
            SaveOptions::Jpeg(JpegSaveOptions::with_quality(5)),
            entry,
            true,
        )
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    assert_eq!(host.applied().len(), before);
}

#[tokio::test]
async fn denied_save_target_surfaces_permission_denied() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let entry = FileEntry::from_token(DENIED_TOKEN, "locked.png").unwrap();

    let result = document
        .save_as()
        .png(entry, Default::default(), true)
        .await;
    assert!(matches!(result, Err(Error::PermissionDenied { .. })));
}

#[tokio::test]
async fn prompted_close_can_be_cancelled() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    // Dirty the document so the prompt fires.
    document
        .create_layer(LayerCreateOptions::default())
        .await
        .unwrap();

    host.script_close_answer(CloseOutcome::Cancelled);
    let outcome = document.close(SaveDialogBehavior::Prompt).await.unwrap();
    assert_eq!(outcome, CloseOutcome::Cancelled);
    // Cancellation is not a close: the document is still fully usable.
    assert!(document.is_open());
    document.rotate(90.0).await.unwrap();

    host.script_close_answer(CloseOutcome::Discarded);
    let outcome = document.close(SaveDialogBehavior::Prompt).await.unwrap();
    assert_eq!(outcome, CloseOutcome::Discarded);
    assert!(!document.is_open());
}

#[tokio::test]
async fn create_layer_reports_no_insertion_target_as_none() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let not_a_group = document.layers().all().await.unwrap()[1].clone();

    let created = document
        .create_layer(LayerCreateOptions {
            parent: Some(not_a_group.id()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(created.is_none());

    // Into a real group it succeeds.
    let group = document
        .create_layer_group(LayerCreateOptions {
            name: Some("Folder".into()),
            ..Default::default()
        })
        .await
        .unwrap()
        .unwrap();
    let nested = document
        .create_layer(LayerCreateOptions {
            parent: Some(group.id()),
            ..Default::default()
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nested.parent().unwrap(), Some(group.id()));
    let children = document.layers().children_of(&group).await.unwrap();
    assert_eq!(children, [nested]);
}

#[tokio::test]
async fn same_document_commands_apply_in_submission_order() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;

    document.rotate(90.0).await.unwrap();
    document
        .resize_canvas(500, 500, AnchorPosition::default())
        .await
        .unwrap();
    document.set_pixel_aspect_ratio(2.0).await.unwrap();

    let applied = host.applied();
    let tail: Vec<&str> = applied.iter().map(String::as_str).skip(1).collect();
    assert_eq!(tail, ["rotate", "resizeCanvas", "setPixelAspectRatio"]);

    let history = document.history().snapshot().await.unwrap();
    let labels: Vec<&str> = history
        .states
        .iter()
        .map(|state| state.label.as_str())
        .collect();
    assert_eq!(
        labels,
        ["Open", "Rotate Canvas", "Canvas Size", "Pixel Aspect Ratio"]
    );
}

#[tokio::test]
async fn pixel_aspect_ratio_is_validated_client_side() {
    let host = FakeHost::new();
    let (_, document) = open(&host).await;
    let before = host.applied().len();

    assert!(matches!(
        document.set_pixel_aspect_ratio(0.0).await,
        Err(Error::InvalidArgument { .. })
    ));
    assert!(matches!(
        document.set_pixel_aspect_ratio(f64::NAN).await,
        Err(Error::InvalidArgument { .. })
    ));
    assert_eq!(host.applied().len(), before);

    document.set_pixel_aspect_ratio(1.5).await.unwrap();
    assert_eq!(document.pixel_aspect_ratio().unwrap(), 1.5);
}
