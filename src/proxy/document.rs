//! The document proxy: a handle-backed view of one open, host-owned document, and
//! the save coordinator that maps output formats onto validated save commands.
//!
//! Every method that touches host state suspends until the channel resolves the
//! round-trip. Argument problems this crate can see (malformed bounds, mixed-up
//! layer batches, option schema violations) fail before submission; everything
//! else is the host's verdict, passed through verbatim.

use std::sync::Arc;

use crate::channel::CommandChannel;
use crate::commands::{Command, LayerCreateOptions, LayerIdBatch, Payload};
use crate::constants::{AnchorPosition, ResampleMethod, SaveDialogBehavior, SaveFormat};
use crate::proxy::history::History;
use crate::proxy::layers::{Layer, LayerTree};
use crate::registry::DocumentHandle;
use crate::save::{
    BmpSaveOptions, FileEntry, GifSaveOptions, JpegSaveOptions, PngSaveOptions, PsbSaveOptions,
    PsdSaveOptions, SaveOptions,
};
use crate::state::{CloseOutcome, DocumentId, DocumentSnapshot, Rect};
use crate::Error;

/// A handle-backed view of one open document.
///
/// Cloning is cheap and clones share the handle; equality is handle equality.
#[derive(Clone)]
pub struct Document {
    handle: DocumentHandle,
    channel: Arc<CommandChannel>,
}
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}
impl Eq for Document {}
impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document({})", self.handle)
    }
}

impl Document {
    /// Ask the host to open the document behind a capability entry.
    pub async fn open(channel: Arc<CommandChannel>, entry: FileEntry) -> Result<Self, Error> {
        let handle = channel.open(Command::Open { entry }).await?;
        Ok(Self { handle, channel })
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.handle.id()
    }
    /// Whether the handle still resolves. A `false` here is already stale by the
    /// time the caller sees it; treat it as a hint, not a guarantee.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.channel
            .registry()
            .resolve_document(self.handle)
            .is_ok()
    }

    async fn send(&self, command: Command) -> Result<Payload, Error> {
        self.channel.send(self.handle, command).await
    }
    fn expect_none(payload: Payload, opcode: &'static str) -> Result<(), Error> {
        match payload {
            Payload::None => Ok(()),
            _ => Err(Error::malformed_response(opcode)),
        }
    }

    // ---- reads ----

    /// Round-trip fetch of the document's current attributes.
    pub async fn snapshot(&self) -> Result<DocumentSnapshot, Error> {
        match self.send(Command::FetchDocument).await? {
            Payload::Document(snapshot) => Ok(snapshot),
            _ => Err(Error::malformed_response("fetchDocument")),
        }
    }
    fn cached(&self) -> Result<DocumentSnapshot, Error> {
        Ok(self.channel.registry().resolve_document(self.handle)?.snapshot())
    }
    // Cached-field reads: the value as of the last completed round-trip against
    // this document. For a guaranteed-fresh value use `snapshot`.
    pub fn title(&self) -> Result<String, Error> {
        Ok(self.cached()?.title)
    }
    pub fn path(&self) -> Result<Option<std::path::PathBuf>, Error> {
        Ok(self.cached()?.path)
    }
    pub fn width(&self) -> Result<u32, Error> {
        Ok(self.cached()?.width)
    }
    pub fn height(&self) -> Result<u32, Error> {
        Ok(self.cached()?.height)
    }
    pub fn resolution(&self) -> Result<f32, Error> {
        Ok(self.cached()?.resolution)
    }
    pub fn pixel_aspect_ratio(&self) -> Result<f64, Error> {
        Ok(self.cached()?.pixel_aspect_ratio)
    }
    pub fn is_saved(&self) -> Result<bool, Error> {
        Ok(self.cached()?.saved)
    }

    /// The layer tree views scoped to this document.
    #[must_use]
    pub fn layers(&self) -> LayerTree {
        LayerTree::new(self.channel.clone(), self.handle)
    }
    /// The history stack scoped to this document.
    #[must_use]
    pub fn history(&self) -> History {
        History::new(self.channel.clone(), self.handle)
    }

    // ---- lifecycle ----

    /// Close the document. With unsaved changes and [`SaveDialogBehavior::Prompt`]
    /// the host presents an interactive choice; this call resolves only after the
    /// user answers, and [`CloseOutcome::Cancelled`] leaves the document open and
    /// every handle valid. Saved/discarded outcomes invalidate this document's
    /// handles.
    pub async fn close(&self, behavior: SaveDialogBehavior) -> Result<CloseOutcome, Error> {
        let payload = self.send(Command::Close { behavior }).await?;
        payload
            .close_outcome()
            .ok_or_else(|| Error::malformed_response("close"))
    }
    /// Discard unsaved changes unconditionally; no prompt, cannot cancel.
    pub async fn close_without_saving(&self) -> Result<(), Error> {
        let payload = self.send(Command::CloseWithoutSaving).await?;
        match payload.close_outcome() {
            Some(CloseOutcome::Discarded | CloseOutcome::Saved) => Ok(()),
            _ => Err(Error::malformed_response("closeWithoutSaving")),
        }
    }

    // ---- geometry ----

    /// Crop to `bounds`, rotated by `angle` degrees. Bounds must be a well-formed
    /// rectangle; whether it overlaps the canvas is the host's call.
    pub async fn crop(&self, bounds: Rect, angle: f32) -> Result<(), Error> {
        if !bounds.is_well_formed() {
            return Err(Error::invalid(format!("malformed crop bounds: {bounds:?}")));
        }
        if !angle.is_finite() {
            return Err(Error::invalid("crop angle must be finite"));
        }
        Self::expect_none(self.send(Command::Crop { bounds, angle }).await?, "crop")
    }
    /// Change canvas extents without resampling pixel content. The anchor selects
    /// which edge or corner stays fixed.
    pub async fn resize_canvas(
        &self,
        width: u32,
        height: u32,
        anchor: AnchorPosition,
    ) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::invalid("canvas dimensions must be non-zero"));
        }
        Self::expect_none(
            self.send(Command::ResizeCanvas {
                width,
                height,
                anchor,
            })
            .await?,
            "resizeCanvas",
        )
    }
    /// Resample pixel content to new dimensions. `resolution` defaults to the
    /// document's current value, `method` to the host's default interpolation.
    pub async fn resize_image(
        &self,
        width: u32,
        height: u32,
        resolution: Option<f32>,
        method: Option<ResampleMethod>,
    ) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Err(Error::invalid("image dimensions must be non-zero"));
        }
        if let Some(resolution) = resolution {
            if !resolution.is_finite() || resolution <= 0.0 {
                return Err(Error::invalid("resolution must be finite and positive"));
            }
        }
        Self::expect_none(
            self.send(Command::ResizeImage {
                width,
                height,
                resolution,
                method,
            })
            .await?,
            "resizeImage",
        )
    }
    /// Rotate the whole canvas clockwise, expanding bounds as needed.
    pub async fn rotate(&self, degrees: f32) -> Result<(), Error> {
        if !degrees.is_finite() {
            return Err(Error::invalid("rotation angle must be finite"));
        }
        Self::expect_none(self.send(Command::Rotate { degrees }).await?, "rotate")
    }
    pub async fn set_pixel_aspect_ratio(&self, ratio: f64) -> Result<(), Error> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::invalid("pixel aspect ratio must be finite and positive"));
        }
        Self::expect_none(
            self.send(Command::SetPixelAspectRatio { ratio }).await?,
            "setPixelAspectRatio",
        )
    }

    // ---- layer tree mutation ----

    /// Collapse the whole tree to the fewest layers. Handles of layers that cease
    /// to exist as distinct entities become stale; background semantics are
    /// preserved if present.
    pub async fn flatten(&self) -> Result<(), Error> {
        Self::expect_none(self.send(Command::Flatten).await?, "flatten")
    }
    /// Merge visible layers into one, leaving hidden layers in place. Handles of
    /// merged-away layers become stale.
    pub async fn merge_visible_layers(&self) -> Result<(), Error> {
        Self::expect_none(self.send(Command::MergeVisible).await?, "mergeVisible")
    }

    /// Validate a batch: non-empty, nothing stale, everything owned by this
    /// document. Whole-batch failure - one bad input layer fails the call before
    /// anything is submitted.
    fn batch_ids(&self, layers: &[Layer]) -> Result<LayerIdBatch, Error> {
        if layers.is_empty() {
            return Err(Error::invalid("layer batch is empty"));
        }
        let mut ids = LayerIdBatch::with_capacity(layers.len());
        for layer in layers {
            let entry = self.channel.registry().resolve_layer(layer.handle())?;
            if entry.document() != self.id() {
                return Err(Error::invalid(format!(
                    "layer {} belongs to {}, not {}",
                    layer.id(),
                    entry.document(),
                    self.id(),
                )));
            }
            ids.push(layer.id());
        }
        Ok(ids)
    }

    /// Duplicate `layers` into `target` (or this document), positioned above the
    /// destination's current topmost layer with relative order preserved. Returns
    /// new handles scoped to the destination.
    ///
    /// All-or-nothing: any stale or foreign input layer fails the whole batch.
    /// Cross-document duplicates are forwarded as one request and treated as a
    /// single host-side transaction; the channel orders it only against the
    /// *source* document, so independent edits to the destination may land before
    /// or after it, never inside.
    pub async fn duplicate_layers(
        &self,
        layers: &[Layer],
        target: Option<&Document>,
    ) -> Result<Vec<Layer>, Error> {
        let ids = self.batch_ids(layers)?;
        let destination = match target {
            Some(document) => {
                // Fail fast if the destination is already gone.
                self.channel.registry().resolve_document(document.handle)?;
                Some(document)
            }
            None => None,
        };
        let payload = self
            .send(Command::DuplicateLayers {
                layers: ids,
                target: destination.map(Document::id),
            })
            .await?;
        let Some(snapshots) = payload.layers() else {
            return Err(Error::malformed_response("duplicateLayers"));
        };
        let dest_handle = destination.map_or(self.handle, |document| document.handle);
        snapshots
            .iter()
            .map(|snapshot| Layer::bind(&self.channel, dest_handle, snapshot.id))
            .collect()
    }

    /// Link compatible layers into a link-set. Partial by design: the result is
    /// the achieved subset, and callers diff it against their input to detect
    /// layers the host could not link (wrong kind, incompatible existing link).
    pub async fn link_layers(&self, layers: &[Layer]) -> Result<Vec<Layer>, Error> {
        let ids = self.batch_ids(layers)?;
        let payload = self.send(Command::LinkLayers { layers: ids }).await?;
        let Some(linked) = payload.linked_layers() else {
            return Err(Error::malformed_response("linkLayers"));
        };
        linked
            .iter()
            .map(|id| Layer::bind(&self.channel, self.handle, *id))
            .collect()
    }

    fn check_create_options(options: &LayerCreateOptions) -> Result<(), Error> {
        if let Some(opacity) = options.opacity {
            if !(0.0..=1.0).contains(&opacity) {
                return Err(Error::invalid("layer opacity must be within 0.0..=1.0"));
            }
        }
        Ok(())
    }
    /// Create a new layer. `Ok(None)` means the host had no valid insertion
    /// target in its current state - that is an answer, not a failure.
    pub async fn create_layer(&self, options: LayerCreateOptions) -> Result<Option<Layer>, Error> {
        Self::check_create_options(&options)?;
        let payload = self.send(Command::CreateLayer { options }).await?;
        let Some(created) = payload.layer() else {
            return Err(Error::malformed_response("createLayer"));
        };
        created
            .map(|snapshot| Layer::bind(&self.channel, self.handle, snapshot.id))
            .transpose()
    }
    /// Create a new, empty layer group. Same `Ok(None)` semantics as
    /// [`create_layer`](Self::create_layer).
    pub async fn create_layer_group(
        &self,
        options: LayerCreateOptions,
    ) -> Result<Option<Layer>, Error> {
        Self::check_create_options(&options)?;
        let payload = self.send(Command::CreateLayerGroup { options }).await?;
        let Some(created) = payload.layer() else {
            return Err(Error::malformed_response("createLayerGroup"));
        };
        created
            .map(|snapshot| Layer::bind(&self.channel, self.handle, snapshot.id))
            .transpose()
    }
    /// Move exactly `layers` into a new group, preserving their relative order.
    /// All-or-nothing on input validation; `Ok(None)` when the host declines
    /// (e.g. the batch includes the background layer).
    pub async fn group_layers(&self, layers: &[Layer]) -> Result<Option<Layer>, Error> {
        let ids = self.batch_ids(layers)?;
        let payload = self.send(Command::GroupLayers { layers: ids }).await?;
        let Some(created) = payload.layer() else {
            return Err(Error::malformed_response("groupLayers"));
        };
        created
            .map(|snapshot| Layer::bind(&self.channel, self.handle, snapshot.id))
            .transpose()
    }

    // ---- saving ----

    /// Save to the existing path. If the document has never been saved the host
    /// presents a destination picker. A no-op save of unchanged content succeeds.
    pub async fn save(&self) -> Result<(), Error> {
        Self::expect_none(self.send(Command::Save).await?, "save")
    }
    /// The per-format save coordinator.
    #[must_use]
    pub fn save_as(&self) -> SaveAs<'_> {
        SaveAs { document: self }
    }
}

/// Maps a requested output kind to a validated save command.
///
/// The per-format methods make a format/options mismatch unrepresentable; the
/// untyped [`save_with`](Self::save_with) escape hatch checks it at runtime.
/// `as_copy = true` writes a copy and leaves the document's own saved-path state
/// untouched; `false` retargets the document to the new entry.
pub struct SaveAs<'doc> {
    document: &'doc Document,
}
impl SaveAs<'_> {
    pub async fn psd(self, entry: FileEntry, options: PsdSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Psd(options), as_copy).await
    }
    pub async fn psb(self, entry: FileEntry, options: PsbSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Psb(options), as_copy).await
    }
    pub async fn jpg(self, entry: FileEntry, options: JpegSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Jpeg(options), as_copy).await
    }
    pub async fn gif(self, entry: FileEntry, options: GifSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Gif(options), as_copy).await
    }
    pub async fn png(self, entry: FileEntry, options: PngSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Png(options), as_copy).await
    }
    pub async fn bmp(self, entry: FileEntry, options: BmpSaveOptions, as_copy: bool) -> Result<(), Error> {
        self.submit(entry, SaveOptions::Bmp(options), as_copy).await
    }
    /// Untyped entry point for callers carrying a format selector and a loose
    /// options variant. The variant must match `format`.
    pub async fn save_with(
        self,
        format: SaveFormat,
        options: SaveOptions,
        entry: FileEntry,
        as_copy: bool,
    ) -> Result<(), Error> {
        options.check_matches(format)?;
        self.submit(entry, options, as_copy).await
    }
    async fn submit(self, entry: FileEntry, options: SaveOptions, as_copy: bool) -> Result<(), Error> {
        options.validate()?;
        Document::expect_none(
            self.document
                .send(Command::SaveAs {
                    entry,
                    options,
                    as_copy,
                })
                .await?,
            "saveAs",
        )
    }
}
