//! The boundary to the external HTJ2K codestream library.
//!
//! Wavelet transforms, entropy coding and rate control
//! are not implemented in this crate.
//! A codestream library is plugged in through the [`Codestream`] trait,
//! which compresses component sample planes of a known geometry
//! into a codestream and back.
//!
//! Library errors are reported as [`CodestreamError`] values
//! and converted into [`Error::Codestream`](crate::Error::Codestream)
//! by the frame transcoder.

use crate::params::ProgressionOrder;

/// The error type reported by codestream library implementations.
pub type CodestreamError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The marker sequence at the start of every codestream:
/// SOC followed by the start of the SIZ marker segment.
pub const SOC_SIZ: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Check whether the given bytes start with a codestream header.
#[inline]
pub fn starts_with_codestream(data: &[u8]) -> bool {
    data.len() > 3 && data[..4] == SOC_SIZ
}

/// Image properties declared in a codestream's main header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CodestreamHeader {
    /// image width in samples
    pub width: u32,
    /// image height in samples
    pub height: u32,
    /// number of image components
    pub components: u16,
    /// sample precision of the first component in bits
    pub bit_depth: u16,
    /// whether samples of the first component are signed
    pub signed: bool,
}

impl CodestreamHeader {
    /// Read the image properties from the SIZ marker segment
    /// at the start of a codestream.
    ///
    /// Returns `None` if the data does not start with SOC and SIZ
    /// or the segment is truncated.
    pub fn from_siz(data: &[u8]) -> Option<Self> {
        if !starts_with_codestream(data) {
            return None;
        }
        let u32_at = |i: usize| -> Option<u32> {
            let bytes = data.get(i..i + 4)?;
            Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };
        let u16_at = |i: usize| -> Option<u16> {
            let bytes = data.get(i..i + 2)?;
            Some(u16::from_be_bytes([bytes[0], bytes[1]]))
        };
        // Lsiz, Rsiz, Xsiz, Ysiz, XOsiz, YOsiz, tile size and offset, Csiz
        let width = u32_at(8)?.checked_sub(u32_at(16)?)?;
        let height = u32_at(12)?.checked_sub(u32_at(20)?)?;
        let components = u16_at(40)?;
        // Ssiz of the first component
        let ssiz = *data.get(42)?;
        Some(CodestreamHeader {
            width,
            height,
            components,
            bit_depth: u16::from(ssiz & 0x7F) + 1,
            signed: ssiz & 0x80 != 0,
        })
    }
}

/// Coding parameters for compressing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CodingParameters {
    pub width: u32,
    pub height: u32,
    pub components: u16,
    /// sample precision in bits, the same for all components
    pub bit_depth: u16,
    pub signed: bool,
    /// apply the multi-component (color) transform
    pub color_transform: bool,
    /// use the reversible 5/3 wavelet transform
    pub reversible: bool,
    pub progression_order: ProgressionOrder,
    /// number of wavelet decomposition levels
    pub decompositions: u8,
    /// code block width and height, `None` for the library defaults
    pub block_size: Option<(u16, u16)>,
}

/// Image samples held as one plane per component,
/// each in row-major order.
///
/// Samples are widened to 32 bits,
/// as the codestream library works with them internally.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlanes {
    width: u32,
    height: u32,
    planes: Vec<Vec<i32>>,
}

impl ImagePlanes {
    /// Create zero-filled sample planes.
    pub fn new(width: u32, height: u32, components: u16) -> Self {
        let len = width as usize * height as usize;
        ImagePlanes {
            width,
            height,
            planes: vec![vec![0; len]; components as usize],
        }
    }

    /// Create sample planes from existing sample vectors.
    ///
    /// Returns `None` if any of the planes
    /// does not have exactly `width * height` samples.
    pub fn from_planes(width: u32, height: u32, planes: Vec<Vec<i32>>) -> Option<Self> {
        let len = width as usize * height as usize;
        if planes.iter().any(|p| p.len() != len) {
            return None;
        }
        Some(ImagePlanes {
            width,
            height,
            planes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn components(&self) -> u16 {
        self.planes.len() as u16
    }

    /// All samples of one component.
    pub fn plane(&self, component: u16) -> Option<&[i32]> {
        self.planes.get(component as usize).map(|p| p.as_slice())
    }

    /// One line of samples of one component.
    pub fn line(&self, component: u16, row: u32) -> Option<&[i32]> {
        let width = self.width as usize;
        let start = row as usize * width;
        self.planes
            .get(component as usize)?
            .get(start..start + width)
    }

    /// One mutable line of samples of one component.
    pub fn line_mut(&mut self, component: u16, row: u32) -> Option<&mut [i32]> {
        let width = self.width as usize;
        let start = row as usize * width;
        self.planes
            .get_mut(component as usize)?
            .get_mut(start..start + width)
    }
}

/// An HTJ2K codestream library.
///
/// Implementations see one complete codestream per call
/// and know nothing about DICOM encapsulation.
pub trait Codestream {
    /// Read the main header of a codestream
    /// without decoding any sample data.
    fn read_header(&self, data: &[u8]) -> Result<CodestreamHeader, CodestreamError>;

    /// Decode a complete codestream into component sample planes.
    fn decompress(&self, data: &[u8]) -> Result<ImagePlanes, CodestreamError>;

    /// Encode component sample planes into a complete codestream.
    fn compress(
        &self,
        params: &CodingParameters,
        image: &ImagePlanes,
    ) -> Result<Vec<u8>, CodestreamError>;
}

impl<T> Codestream for &T
where
    T: Codestream + ?Sized,
{
    fn read_header(&self, data: &[u8]) -> Result<CodestreamHeader, CodestreamError> {
        (**self).read_header(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<ImagePlanes, CodestreamError> {
        (**self).decompress(data)
    }

    fn compress(
        &self,
        params: &CodingParameters,
        image: &ImagePlanes,
    ) -> Result<Vec<u8>, CodestreamError> {
        (**self).compress(params, image)
    }
}

impl<T> Codestream for Box<T>
where
    T: Codestream + ?Sized,
{
    fn read_header(&self, data: &[u8]) -> Result<CodestreamHeader, CodestreamError> {
        (**self).read_header(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<ImagePlanes, CodestreamError> {
        (**self).decompress(data)
    }

    fn compress(
        &self,
        params: &CodingParameters,
        image: &ImagePlanes,
    ) -> Result<Vec<u8>, CodestreamError> {
        (**self).compress(params, image)
    }
}
