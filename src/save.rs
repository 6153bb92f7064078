//! Save-option schemas, one closed configuration object per output format.
//!
//! Two rules from the external interface contract live here:
//! - unrecognized fields are rejected, not ignored (`deny_unknown_fields` on every
//!   schema, for options arriving as loose JSON from an embedding script);
//! - the option variant must match the save target's format. Mismatch is a caller
//!   error, checked before anything reaches the host.
//!
//! The file *entry* passed alongside the options is an opaque capability token
//! minted by an external storage-permission subsystem. This crate never resolves
//! paths to entries itself.

use crate::constants::SaveFormat;

/// An opaque, capability-scoped file handle. Obtained from the host's storage
/// permission subsystem, not from this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    token: std::num::NonZeroU64,
    name: String,
}
impl FileEntry {
    /// Wrap a capability token granted by the storage subsystem. `None` for the
    /// reserved zero token.
    #[must_use]
    pub fn from_token(token: u64, name: impl Into<String>) -> Option<Self> {
        Some(Self {
            token: std::num::NonZeroU64::new(token)?,
            name: name.into(),
        })
    }
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token.get()
    }
    /// Display name of the target, e.g. `flowers.jpg`. Informational only.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveOptionsError {
    /// Unknown field, wrong type, or otherwise un-deserializable option object.
    #[error("option schema violation: {}", .0)]
    Schema(String),
    #[error("option `{}` out of range: {}", .field, .detail)]
    OutOfRange {
        field: &'static str,
        detail: String,
    },
    #[error("options are for {} but the save target is {}", .options.as_ref(), .requested.as_ref())]
    FormatMismatch {
        requested: SaveFormat,
        options: SaveFormat,
    },
}

fn default_true() -> bool {
    true
}

/// Options shared by PSD and PSB targets.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PsdSaveOptions {
    #[serde(default = "default_true")]
    pub embed_color_profile: bool,
    /// Write the composite image alongside layer data for readers that cannot
    /// composite themselves.
    #[serde(default = "default_true")]
    pub maximize_compatibility: bool,
    #[serde(default)]
    pub alpha_channels: bool,
    #[serde(default = "default_true")]
    pub layers: bool,
    #[serde(default)]
    pub annotations: bool,
    #[serde(default)]
    pub spot_colors: bool,
}
impl Default for PsdSaveOptions {
    fn default() -> Self {
        Self {
            embed_color_profile: true,
            maximize_compatibility: true,
            alpha_channels: false,
            layers: true,
            annotations: false,
            spot_colors: false,
        }
    }
}
/// PSB recognizes exactly the PSD fields; only the container differs.
pub type PsbSaveOptions = PsdSaveOptions;

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum JpegFormatKind {
    Standard,
    Optimized,
    Progressive,
}
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum MatteColor {
    None,
    White,
    Black,
    Gray,
    Background,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JpegSaveOptions {
    /// 0 ..= 12, the host's quality scale.
    pub quality: u8,
    #[serde(default = "default_true")]
    pub embed_color_profile: bool,
    #[serde(default = "JpegSaveOptions::default_format")]
    pub format_options: JpegFormatKind,
    /// Scan count, 3 ..= 5. Only meaningful for [`JpegFormatKind::Progressive`].
    #[serde(default = "JpegSaveOptions::default_scans")]
    pub scans: u8,
    #[serde(default = "JpegSaveOptions::default_matte")]
    pub matte: MatteColor,
}
impl JpegSaveOptions {
    fn default_format() -> JpegFormatKind {
        JpegFormatKind::Standard
    }
    fn default_scans() -> u8 {
        3
    }
    fn default_matte() -> MatteColor {
        MatteColor::None
    }
    #[must_use]
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            embed_color_profile: true,
            format_options: Self::default_format(),
            scans: Self::default_scans(),
            matte: Self::default_matte(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum PaletteKind {
    Exact,
    System,
    Web,
    Uniform,
    LocalPerceptual,
    LocalSelective,
    LocalAdaptive,
}
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum DitherKind {
    None,
    Diffusion,
    Pattern,
    Noise,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GifSaveOptions {
    #[serde(default = "GifSaveOptions::default_palette")]
    pub palette: PaletteKind,
    /// 2 ..= 256.
    #[serde(default = "GifSaveOptions::default_colors")]
    pub colors: u16,
    #[serde(default = "GifSaveOptions::default_dither")]
    pub dither: DitherKind,
    #[serde(default)]
    pub interlaced: bool,
    #[serde(default = "default_true")]
    pub transparency: bool,
}
impl GifSaveOptions {
    fn default_palette() -> PaletteKind {
        PaletteKind::LocalSelective
    }
    fn default_colors() -> u16 {
        256
    }
    fn default_dither() -> DitherKind {
        DitherKind::Diffusion
    }
}
impl Default for GifSaveOptions {
    fn default() -> Self {
        Self {
            palette: Self::default_palette(),
            colors: Self::default_colors(),
            dither: Self::default_dither(),
            interlaced: false,
            transparency: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PngSaveOptions {
    /// 0 ..= 9, deflate effort.
    #[serde(default)]
    pub compression: u8,
    #[serde(default)]
    pub interlaced: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum BmpDepth {
    One,
    Four,
    Eight,
    Sixteen,
    TwentyFour,
    ThirtyTwo,
}
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BmpSaveOptions {
    #[serde(default)]
    pub alpha_channels: bool,
    #[serde(default = "BmpSaveOptions::default_depth")]
    pub depth: BmpDepth,
    #[serde(default)]
    pub rle_compression: bool,
}
impl BmpSaveOptions {
    fn default_depth() -> BmpDepth {
        BmpDepth::TwentyFour
    }
}
impl Default for BmpSaveOptions {
    fn default() -> Self {
        Self {
            alpha_channels: false,
            depth: Self::default_depth(),
            rle_compression: false,
        }
    }
}

/// One options variant per save format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOptions {
    Psd(PsdSaveOptions),
    Psb(PsbSaveOptions),
    Jpeg(JpegSaveOptions),
    Gif(GifSaveOptions),
    Png(PngSaveOptions),
    Bmp(BmpSaveOptions),
}
impl SaveOptions {
    #[must_use]
    pub fn format(&self) -> SaveFormat {
        match self {
            Self::Psd(_) => SaveFormat::Psd,
            Self::Psb(_) => SaveFormat::Psb,
            Self::Jpeg(_) => SaveFormat::Jpeg,
            Self::Gif(_) => SaveFormat::Gif,
            Self::Png(_) => SaveFormat::Png,
            Self::Bmp(_) => SaveFormat::Bmp,
        }
    }
    /// Deserialize a loose option object against the schema of `format`.
    /// Unknown fields and range violations are both rejections.
    pub fn from_value(
        format: SaveFormat,
        value: serde_json::Value,
    ) -> Result<Self, SaveOptionsError> {
        let schema = |err: serde_json::Error| SaveOptionsError::Schema(err.to_string());
        let options = match format {
            SaveFormat::Psd => Self::Psd(serde_json::from_value(value).map_err(schema)?),
            SaveFormat::Psb => Self::Psb(serde_json::from_value(value).map_err(schema)?),
            SaveFormat::Jpeg => Self::Jpeg(serde_json::from_value(value).map_err(schema)?),
            SaveFormat::Gif => Self::Gif(serde_json::from_value(value).map_err(schema)?),
            SaveFormat::Png => Self::Png(serde_json::from_value(value).map_err(schema)?),
            SaveFormat::Bmp => Self::Bmp(serde_json::from_value(value).map_err(schema)?),
        };
        options.validate()?;
        Ok(options)
    }
    /// Range-check recognized fields. Runs for directly-constructed values too,
    /// invoked by the save coordinator before submission.
    pub fn validate(&self) -> Result<(), SaveOptionsError> {
        match self {
            Self::Psd(_) | Self::Psb(_) => Ok(()),
            Self::Jpeg(jpeg) => {
                if jpeg.quality > 12 {
                    return Err(SaveOptionsError::OutOfRange {
                        field: "quality",
                        detail: format!("{} is not within 0..=12", jpeg.quality),
                    });
                }
                if !(3..=5).contains(&jpeg.scans) {
                    return Err(SaveOptionsError::OutOfRange {
                        field: "scans",
                        detail: format!("{} is not within 3..=5", jpeg.scans),
                    });
                }
                Ok(())
            }
            Self::Gif(gif) => {
                if !(2..=256).contains(&gif.colors) {
                    return Err(SaveOptionsError::OutOfRange {
                        field: "colors",
                        detail: format!("{} is not within 2..=256", gif.colors),
                    });
                }
                Ok(())
            }
            Self::Png(png) => {
                if png.compression > 9 {
                    return Err(SaveOptionsError::OutOfRange {
                        field: "compression",
                        detail: format!("{} is not within 0..=9", png.compression),
                    });
                }
                Ok(())
            }
            Self::Bmp(_) => Ok(()),
        }
    }
    /// The format-match rule: options must be the variant for `requested`.
    pub fn check_matches(&self, requested: SaveFormat) -> Result<(), SaveOptionsError> {
        if self.format() == requested {
            Ok(())
        } else {
            Err(SaveOptionsError::FormatMismatch {
                requested,
                options: self.format(),
            })
        }
    }
}

impl From<SaveOptionsError> for crate::Error {
    fn from(err: SaveOptionsError) -> Self {
        Self::InvalidArgument {
            reason: err.to_string(),
        }
    }
}
