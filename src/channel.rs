//! # Command channel
//!
//! The asynchronous request/response path between the proxies and the host.
//!
//! The channel guarantees per-document ordering: commands issued against the same
//! document apply in submission order, enforced by holding that document's order
//! lock across the round-trip. Commands against different documents carry no
//! relative ordering. There is no automatic retry (many operations are not
//! idempotent), no cancellation, and no channel-level timeout - a
//! transport-reported [`Error::Timeout`] does not guarantee the host skipped the
//! operation, so callers re-query instead of assuming non-application.
//!
//! After every completion the channel folds the response's snapshot fields back
//! into the [registry](crate::registry) before the caller sees the payload, so no
//! cached state outlives one round-trip.

use std::sync::Arc;

use crate::commands::{Command, Payload};
use crate::registry::{DocumentHandle, HandleRegistry};
use crate::state::{CloseOutcome, DocumentId, DocumentSnapshot, LayerTreeSnapshot};
use crate::Error;

/// One command addressed to one document. `document` is `None` only for
/// [`Command::Open`].
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub document: Option<DocumentId>,
    pub command: Command,
}

/// The host's answer: a typed payload, plus whatever snapshot state the command
/// refreshed. Hosts should attach `document` and `tree` on every mutation so the
/// client's caches never trail by more than the one round-trip.
#[derive(Clone, Debug, PartialEq)]
pub struct HostResponse {
    pub payload: Payload,
    pub document: Option<DocumentSnapshot>,
    pub tree: Option<LayerTreeSnapshot>,
}
impl HostResponse {
    #[must_use]
    pub fn of(payload: Payload) -> Self {
        Self {
            payload,
            document: None,
            tree: None,
        }
    }
    #[must_use]
    pub fn with_document(mut self, snapshot: DocumentSnapshot) -> Self {
        self.document = Some(snapshot);
        self
    }
    #[must_use]
    pub fn with_tree(mut self, tree: LayerTreeSnapshot) -> Self {
        self.tree = Some(tree);
        self
    }
}

/// The seam the embedding application implements: deliver one request to the host
/// and resolve with its response.
///
/// The transport owns failure classification - it maps host-level failures onto
/// the [`Error`] taxonomy itself, and the channel passes them through verbatim.
#[async_trait::async_trait]
pub trait HostTransport: Send + Sync {
    async fn submit(&self, request: Request) -> Result<HostResponse, Error>;
}

pub struct CommandChannel {
    transport: Arc<dyn HostTransport>,
    registry: HandleRegistry,
    // One order lock per open document. Guards submission order, not state - all
    // state lives in the registry.
    order: parking_lot::Mutex<hashbrown::HashMap<DocumentId, Arc<tokio::sync::Mutex<()>>>>,
}
impl CommandChannel {
    #[must_use]
    pub fn new(transport: Arc<dyn HostTransport>) -> Self {
        Self {
            transport,
            registry: HandleRegistry::new(),
            order: parking_lot::Mutex::new(hashbrown::HashMap::new()),
        }
    }
    #[must_use]
    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    fn order_lock(&self, document: DocumentId) -> Arc<tokio::sync::Mutex<()>> {
        self.order
            .lock()
            .entry(document)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Open the document behind `entry` and register its handle.
    pub async fn open(&self, command: Command) -> Result<DocumentHandle, Error> {
        debug_assert!(matches!(command, Command::Open { .. }));
        log::trace!("submit open");
        let response = self
            .transport
            .submit(Request {
                document: None,
                command,
            })
            .await?;
        let Payload::Opened(id, snapshot) = response.payload else {
            return Err(Error::malformed_response("open"));
        };
        let handle = self.registry.register_document(id, snapshot);
        if let Some(tree) = &response.tree {
            self.absorb_tree(id, tree);
        }
        log::trace!("opened {handle}");
        Ok(handle)
    }

    /// Submit one command against an open document, in order with every other
    /// command against that document, and fold the response into the registry.
    ///
    /// Fails fast with [`Error::StaleHandle`] - without a host round-trip - when
    /// the handle no longer resolves.
    pub async fn send(&self, handle: DocumentHandle, command: Command) -> Result<Payload, Error> {
        self.registry.resolve_document(handle)?;
        let lock = self.order_lock(handle.id());
        let _ordering = lock.lock().await;
        // A predecessor holding the lock may have closed the document.
        self.registry.resolve_document(handle)?;

        log::trace!("submit {} -> {handle}", command.name());
        let response = match self
            .transport
            .submit(Request {
                document: Some(handle.id()),
                command: command.clone(),
            })
            .await
        {
            Ok(response) => response,
            Err(err) => {
                // Host-reported closure reclaims the entry, so later calls
                // fail fast as stale instead of round-tripping again.
                if matches!(err, Error::DocumentClosed) {
                    self.registry.invalidate_document(handle.id());
                    self.order.lock().remove(&handle.id());
                }
                return Err(err);
            }
        };
        self.absorb(handle.id(), &command, &response);
        log::trace!("completed {} -> {handle}", command.name());
        Ok(response.payload)
    }

    fn absorb(&self, document: DocumentId, command: &Command, response: &HostResponse) {
        match response.payload.close_outcome() {
            Some(CloseOutcome::Saved | CloseOutcome::Discarded) => {
                self.registry.invalidate_document(document);
                self.order.lock().remove(&document);
                // The close already severed everything; snapshots, if any, are moot.
                return;
            }
            // Cancelled close leaves the document live.
            Some(CloseOutcome::Cancelled) | None => {}
        }
        if let Some(snapshot) = &response.document {
            self.registry.update_document(document, snapshot.clone());
        }
        if let Some(tree) = &response.tree {
            self.absorb_tree(document, tree);
        }
        // New handles can also arrive inside the payload itself.
        match &response.payload {
            Payload::LayerTree(tree) => self.absorb_tree(document, tree),
            Payload::Layers(layers) => {
                // Duplicates are scoped to the destination document.
                let scope = match command {
                    Command::DuplicateLayers {
                        target: Some(target),
                        ..
                    } => *target,
                    _ => document,
                };
                for snapshot in layers {
                    if self.registry.layer_handle(scope, snapshot.id).is_none() {
                        self.registry.register_layer(scope, snapshot.clone());
                    }
                }
            }
            Payload::Layer(Some(snapshot)) => {
                if self.registry.layer_handle(document, snapshot.id).is_none() {
                    self.registry.register_layer(document, snapshot.clone());
                }
            }
            _ => {}
        }
    }
    fn absorb_tree(&self, document: DocumentId, tree: &LayerTreeSnapshot) {
        if tree.is_well_formed() {
            self.registry.reconcile_layers(document, tree);
        } else {
            // Protocol violation. Keeping the previous (consistent) cache beats
            // reconciling against nonsense.
            log::warn!("host sent a malformed layer tree for {document}; ignoring it");
        }
    }
}
