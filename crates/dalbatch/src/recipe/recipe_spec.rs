//! Recipe file parser
//!
//! This module parses the YAML recipe files that drive a pipeline run. Every
//! field is optional at this level; defaults and required-field checks are
//! applied when the raw spec is turned into a [`Recipe`](super::Recipe).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Channel layout of a converted texture
///
/// Selects the pixel format prefix handed to the texture codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// One channel (`R8`)
    Single,
    /// Two channels (`R8G8`)
    Dual,
    /// Three channels (`R8G8B8`)
    Triple,
    /// Four channels (`R8G8B8A8`)
    Quad,
}

impl ChannelLayout {
    /// Number of color channels in this layout
    pub fn channel_count(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Triple => 3,
            Self::Quad => 4,
        }
    }

    /// Pixel format prefix understood by the codec
    pub fn format_prefix(self) -> &'static str {
        match self {
            Self::Single => "R8",
            Self::Dual => "R8G8",
            Self::Triple => "R8G8B8",
            Self::Quad => "R8G8B8A8",
        }
    }
}

impl TryFrom<u32> for ChannelLayout {
    type Error = ChannelLayoutParseError;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(Self::Single),
            2 => Ok(Self::Dual),
            3 => Ok(Self::Triple),
            4 => Ok(Self::Quad),
            other => Err(ChannelLayoutParseError(other)),
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ch", self.channel_count())
    }
}

impl<'de> Deserialize<'de> for ChannelLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let count = u32::deserialize(deserializer)?;
        ChannelLayout::try_from(count).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ChannelLayout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.channel_count())
    }
}

/// Error for channel counts outside 1..=4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayoutParseError(pub u32);

impl fmt::Display for ChannelLayoutParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid channel count {}, expected 1, 2, 3 or 4", self.0)
    }
}

impl std::error::Error for ChannelLayoutParseError {}

/// Color space of a converted texture
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ColorSpace {
    /// Linear data such as normal or roughness maps
    #[serde(rename = "linear")]
    Linear,
    /// Perceptually encoded color data
    #[default]
    #[serde(rename = "srgb")]
    Srgb,
}

impl ColorSpace {
    /// Pixel format suffix understood by the codec
    pub fn format_suffix(self) -> &'static str {
        match self {
            Self::Linear => "UNORM",
            Self::Srgb => "SRGB",
        }
    }

    /// Transfer function name for the codec's assign/convert flags
    pub fn transfer_function(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Srgb => "srgb",
        }
    }
}

/// Compression method handed to the scene compiler
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum SceneCompression {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "zip")]
    Zip,
    #[default]
    #[serde(rename = "brotli")]
    Brotli,
}

impl SceneCompression {
    /// Selector string passed on the compiler command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zip => "zip",
            Self::Brotli => "brotli",
        }
    }
}

/// A group of source textures converted with the same parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionSpec {
    /// Channel layout (required)
    #[serde(default)]
    pub channels: Option<ChannelLayout>,
    /// Color space (defaults to sRGB)
    #[serde(default)]
    pub color_space: Option<ColorSpace>,
    /// Logical source texture identifiers
    #[serde(default)]
    pub files: Vec<String>,
}

/// Archive output settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub compression_level: Option<u32>,
}

/// Texture codec settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KtxSpec {
    /// Zstandard supercompression level for the codec output
    #[serde(default)]
    pub zstd_level: Option<u32>,
}

/// Raw recipe as parsed from YAML
///
/// Contains the unvalidated recipe before defaults are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeSpec {
    /// Scene document path relative to the recipe
    #[serde(default)]
    pub scene: Option<String>,
    /// Extra texture search roots, relative to the recipe
    #[serde(default, alias = "texture_lookup_pathes")]
    pub texture_search_roots: Vec<String>,
    /// Conversion directives
    #[serde(default)]
    pub conversions: Vec<ConversionSpec>,
    #[serde(default)]
    pub scene_compression: Option<SceneCompression>,
    #[serde(default)]
    pub archive: Option<ArchiveSpec>,
    #[serde(default)]
    pub ktx: Option<KtxSpec>,
    /// Output root relative to the recipe
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl RecipeSpec {
    /// Parses a raw recipe from YAML content
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the recipe
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(yaml_content)
    }
}
