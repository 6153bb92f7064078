//! Constant enumerations consumed as command inputs: close-dialog behavior, the
//! nine-point canvas anchor grid, resample kinds, blend modes, layer kinds, and
//! the save-format selector.

/// What the host should do about unsaved changes when a document is closed.
#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum SaveDialogBehavior {
    /// Present an interactive choice to the user. The close resolves only once
    /// the user answers, and may resolve as cancelled.
    Prompt,
    Save,
    DontSave,
}
impl Default for SaveDialogBehavior {
    fn default() -> Self {
        Self::Prompt
    }
}

/// Which edge or corner of the canvas stays fixed during a canvas resize.
#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum AnchorPosition {
    TopLeft,
    Top,
    TopRight,
    Left,
    /// Growth and shrink distribute evenly on all sides.
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}
impl Default for AnchorPosition {
    fn default() -> Self {
        Self::Center
    }
}

/// Host-defined interpolation kinds for image resampling.
#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum ResampleMethod {
    NearestNeighbor,
    Bilinear,
    Bicubic,
    BicubicSmoother,
    BicubicSharper,
    /// The host picks based on the resize direction.
    Automatic,
}
impl Default for ResampleMethod {
    fn default() -> Self {
        Self::Automatic
    }
}

#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum BlendMode {
    Normal,
    Dissolve,
    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    Overlay,
    SoftLight,
    HardLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}
impl Default for BlendMode {
    fn default() -> Self {
        Self::Normal
    }
}

/// The kind of a layer, as reported by the host.
#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum LayerKind {
    Normal,
    Group,
    Artboard,
    Background,
    Adjustment,
    Text,
    SmartObject,
}
impl LayerKind {
    /// Group and background layers cannot join a link-set.
    #[must_use]
    pub fn is_linkable(self) -> bool {
        !matches!(self, Self::Group | Self::Background)
    }
}
impl Default for LayerKind {
    fn default() -> Self {
        Self::Normal
    }
}

/// Output format selector for save-as operations. Each format has its own closed
/// option schema in [`crate::save`].
#[derive(strum::AsRefStr, strum::EnumIter, Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum SaveFormat {
    Psd,
    Psb,
    Jpeg,
    Gif,
    Png,
    Bmp,
}
