//! Codec configuration.
//!
//! [`CodecParameters`] is shared by all codecs of one
//! [registry](crate::CodecRegistry),
//! while [`RepresentationParameters`] and [`DecodeOptions`]
//! are given per call.
//! The core never mutates any of them.

use byteordered::Endianness;
use std::fmt;
use std::str::FromStr;

/// Progression order of the codestream packets.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgressionOrder {
    /// Layer-resolution-component-position
    #[default]
    Lrcp,
    /// Resolution-layer-component-position
    Rlcp,
    /// Resolution-position-component-layer
    Rpcl,
    /// Position-component-resolution-layer
    Pcrl,
    /// Component-position-resolution-layer
    Cprl,
}

impl ProgressionOrder {
    /// The value of this progression order in the COD marker segment.
    pub fn code(self) -> u8 {
        match self {
            ProgressionOrder::Lrcp => 0,
            ProgressionOrder::Rlcp => 1,
            ProgressionOrder::Rpcl => 2,
            ProgressionOrder::Pcrl => 3,
            ProgressionOrder::Cprl => 4,
        }
    }

    /// Obtain the progression order from its COD marker segment value.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ProgressionOrder::Lrcp),
            1 => Some(ProgressionOrder::Rlcp),
            2 => Some(ProgressionOrder::Rpcl),
            3 => Some(ProgressionOrder::Pcrl),
            4 => Some(ProgressionOrder::Cprl),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressionOrder::Lrcp => "LRCP",
            ProgressionOrder::Rlcp => "RLCP",
            ProgressionOrder::Rpcl => "RPCL",
            ProgressionOrder::Pcrl => "PCRL",
            ProgressionOrder::Cprl => "CPRL",
        }
    }
}

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown configuration keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParameterError {
    value: String,
}

impl fmt::Display for ParseParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized value `{}`", self.value)
    }
}

impl std::error::Error for ParseParameterError {}

impl FromStr for ProgressionOrder {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRCP" => Ok(ProgressionOrder::Lrcp),
            "RLCP" => Ok(ProgressionOrder::Rlcp),
            "RPCL" => Ok(ProgressionOrder::Rpcl),
            "PCRL" => Ok(ProgressionOrder::Pcrl),
            "CPRL" => Ok(ProgressionOrder::Cprl),
            _ => Err(ParseParameterError { value: s.into() }),
        }
    }
}

/// How the planar configuration of decoded color images is decided.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlanarConfigurationPolicy {
    /// Use the _Planar Configuration_ attribute if valid,
    /// otherwise detect it automatically.
    #[default]
    Restore,
    /// Decide from the SOP class and photometric interpretation.
    Auto,
    /// Always lay out samples interleaved per pixel.
    ForceByPixel,
    /// Always lay out samples in one plane per component.
    ForceByPlane,
}

impl FromStr for PlanarConfigurationPolicy {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restore" => Ok(PlanarConfigurationPolicy::Restore),
            "auto" => Ok(PlanarConfigurationPolicy::Auto),
            "pixel" | "by-pixel" => Ok(PlanarConfigurationPolicy::ForceByPixel),
            "plane" | "by-plane" => Ok(PlanarConfigurationPolicy::ForceByPlane),
            _ => Err(ParseParameterError { value: s.into() }),
        }
    }
}

/// When a new SOP instance UID is requested after transcoding.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UidCreation {
    /// Only after lossy compression.
    #[default]
    Default,
    /// After any encoding or decoding.
    Always,
    /// Never, even after lossy compression.
    Never,
}

impl FromStr for UidCreation {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(UidCreation::Default),
            "always" => Ok(UidCreation::Always),
            "never" => Ok(UidCreation::Never),
            _ => Err(ParseParameterError { value: s.into() }),
        }
    }
}

/// Codec parameters shared by all HTJ2K codecs of a registry.
///
/// The coding options `decompositions`, `block_width`, `block_height`
/// and `progression_order` only take effect when `custom_options` is enabled.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CodecParameters {
    /// enable the custom coding options below
    pub custom_options: bool,
    /// number of wavelet decomposition levels
    pub decompositions: u8,
    /// code block width
    pub block_width: u16,
    /// code block height
    pub block_height: u16,
    /// packet progression order, LRCP unless custom options are enabled
    pub progression_order: ProgressionOrder,
    /// encode through the image renderer instead of the stored pixel cells
    pub prefer_rendered: bool,
    /// maximum fragment size in bytes, 0 for one fragment per frame
    pub fragment_size: u32,
    /// fill in the basic offset table on encoding
    pub create_offset_table: bool,
    /// do not trust the basic offset table on decoding
    pub ignore_offset_table: bool,
    /// planar configuration of decoded color images
    pub planar_configuration: PlanarConfigurationPolicy,
    /// SOP instance UID policy
    pub uid_creation: UidCreation,
}

impl Default for CodecParameters {
    fn default() -> Self {
        CodecParameters {
            custom_options: false,
            decompositions: 5,
            block_width: 64,
            block_height: 64,
            progression_order: ProgressionOrder::Lrcp,
            prefer_rendered: true,
            fragment_size: 0,
            create_offset_table: true,
            ignore_offset_table: false,
            planar_configuration: PlanarConfigurationPolicy::Restore,
            uid_creation: UidCreation::Default,
        }
    }
}

impl CodecParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable custom coding options
    /// with the given decomposition levels and code block size.
    pub fn with_custom_options(
        mut self,
        decompositions: u8,
        block_width: u16,
        block_height: u16,
    ) -> Self {
        self.custom_options = true;
        self.decompositions = decompositions;
        self.block_width = block_width;
        self.block_height = block_height;
        self
    }

    pub fn with_progression_order(mut self, progression_order: ProgressionOrder) -> Self {
        self.progression_order = progression_order;
        self
    }

    pub fn with_prefer_rendered(mut self, prefer_rendered: bool) -> Self {
        self.prefer_rendered = prefer_rendered;
        self
    }

    pub fn with_fragment_size(mut self, fragment_size: u32) -> Self {
        self.fragment_size = fragment_size;
        self
    }

    pub fn with_offset_table(mut self, create_offset_table: bool) -> Self {
        self.create_offset_table = create_offset_table;
        self
    }

    pub fn with_ignore_offset_table(mut self, ignore_offset_table: bool) -> Self {
        self.ignore_offset_table = ignore_offset_table;
        self
    }

    pub fn with_planar_configuration(mut self, policy: PlanarConfigurationPolicy) -> Self {
        self.planar_configuration = policy;
        self
    }

    pub fn with_uid_creation(mut self, uid_creation: UidCreation) -> Self {
        self.uid_creation = uid_creation;
        self
    }
}

/// Parameters of the target representation when encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RepresentationParameters {
    /// use the reversible (lossless) process,
    /// ignored by lossless-only transfer syntaxes
    pub lossless: bool,
}

impl Default for RepresentationParameters {
    fn default() -> Self {
        RepresentationParameters { lossless: true }
    }
}

impl RepresentationParameters {
    pub fn lossless() -> Self {
        RepresentationParameters { lossless: true }
    }

    pub fn near_lossless() -> Self {
        RepresentationParameters { lossless: false }
    }
}

/// Options when decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DecodeOptions {
    /// byte order of decoded samples wider than 8 bits
    pub byte_order: Endianness,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            byte_order: Endianness::Little,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte_order(mut self, byte_order: Endianness) -> Self {
        self.byte_order = byte_order;
        self
    }
}
