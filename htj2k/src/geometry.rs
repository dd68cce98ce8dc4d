//! Description of the pixel geometry of one frame.

use crate::color;
use crate::document::{ImageDocument, MalformedAttribute};
use crate::error::{
    InvalidAttributeSnafu, MissingAttributeSnafu, Result, UnsupportedBitDepthSnafu,
    UnsupportedImageShapeSnafu,
};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use snafu::{ensure, OptionExt, ResultExt};

/// Whether pixel samples are signed integers (_Pixel Representation_).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelRepresentation {
    /// unsigned samples (0)
    #[default]
    Unsigned,
    /// two's complement samples (1)
    Signed,
}

/// How the samples of a multi-component pixel are laid out
/// (_Planar Configuration_).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlanarConfiguration {
    /// samples interleaved per pixel (0), such as `R1 G1 B1 R2 G2 B2 ...`
    #[default]
    ByPixel,
    /// one contiguous plane per component (1), such as `R1 R2 ... G1 G2 ... B1 B2 ...`
    ByPlane,
}

impl PlanarConfiguration {
    /// The value of the _Planar Configuration_ attribute.
    pub fn value(self) -> u16 {
        match self {
            PlanarConfiguration::ByPixel => 0,
            PlanarConfiguration::ByPlane => 1,
        }
    }

    /// Interpret a _Planar Configuration_ attribute value.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(PlanarConfiguration::ByPixel),
            1 => Some(PlanarConfiguration::ByPlane),
            _ => None,
        }
    }
}

/// The shape and sample format of the frames of an image.
///
/// Obtained from the document before transcoding
/// and left untouched for the duration of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    pub rows: u16,
    pub columns: u16,
    /// 1 or 3
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub pixel_representation: PixelRepresentation,
    /// the declared planar configuration, by pixel when absent
    pub planar_configuration: PlanarConfiguration,
    pub photometric_interpretation: String,
    /// at least 1
    pub number_of_frames: u32,
}

fn int_attribute(
    document: &dyn ImageDocument,
    tag: Tag,
    name: &'static str,
) -> Result<Option<i64>> {
    document.int(tag).context(InvalidAttributeSnafu { name })
}

fn u16_attribute(
    document: &dyn ImageDocument,
    tag: Tag,
    name: &'static str,
) -> Result<Option<u16>> {
    int_attribute(document, tag, name)?
        .map(|v| {
            u16::try_from(v)
                .map_err(|_| MalformedAttribute { tag })
                .context(InvalidAttributeSnafu { name })
        })
        .transpose()
}

fn required_u16(document: &dyn ImageDocument, tag: Tag, name: &'static str) -> Result<u16> {
    u16_attribute(document, tag, name)?.context(MissingAttributeSnafu { name })
}

impl GeometryDescriptor {
    /// Read the image pixel attributes from a document
    /// and check that the image can be transcoded.
    ///
    /// _Rows_, _Columns_ and _Bits Allocated_ are required.
    /// Otherwise, the usual defaults apply:
    /// one sample per pixel, _Bits Stored_ equal to _Bits Allocated_,
    /// _High Bit_ one below _Bits Stored_, unsigned samples,
    /// interleaved pixels, a single frame,
    /// and a monochrome or RGB photometric interpretation.
    pub fn from_document(document: &dyn ImageDocument) -> Result<Self> {
        let rows = required_u16(document, tags::ROWS, "Rows")?;
        let columns = required_u16(document, tags::COLUMNS, "Columns")?;
        let samples_per_pixel =
            u16_attribute(document, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?.unwrap_or(1);
        let bits_allocated = required_u16(document, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let bits_stored =
            u16_attribute(document, tags::BITS_STORED, "BitsStored")?.unwrap_or(bits_allocated);
        let high_bit = u16_attribute(document, tags::HIGH_BIT, "HighBit")?
            .unwrap_or_else(|| bits_stored.saturating_sub(1));

        let pixel_representation =
            match int_attribute(document, tags::PIXEL_REPRESENTATION, "PixelRepresentation")? {
                None | Some(0) => PixelRepresentation::Unsigned,
                Some(1) => PixelRepresentation::Signed,
                Some(_) => {
                    return Err(MalformedAttribute {
                        tag: tags::PIXEL_REPRESENTATION,
                    })
                    .context(InvalidAttributeSnafu {
                        name: "PixelRepresentation",
                    })
                }
            };

        let planar_configuration =
            int_attribute(document, tags::PLANAR_CONFIGURATION, "PlanarConfiguration")?
                .and_then(PlanarConfiguration::from_value)
                .unwrap_or_default();

        let photometric_interpretation = document
            .text(tags::PHOTOMETRIC_INTERPRETATION)
            .context(InvalidAttributeSnafu {
                name: "PhotometricInterpretation",
            })?
            .map(|pi| pi.trim().to_string())
            .filter(|pi| !pi.is_empty())
            .unwrap_or_else(|| {
                color::default_photometric_interpretation(samples_per_pixel).to_string()
            });

        let number_of_frames = int_attribute(document, tags::NUMBER_OF_FRAMES, "NumberOfFrames")?
            .unwrap_or(1)
            .clamp(1, i64::from(u32::MAX)) as u32;

        let geometry = GeometryDescriptor {
            rows,
            columns,
            samples_per_pixel,
            bits_allocated,
            bits_stored,
            high_bit,
            pixel_representation,
            planar_configuration,
            photometric_interpretation,
            number_of_frames,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check that the geometry can be handled by the transcoder:
    /// at least one row and column,
    /// one or three samples per pixel,
    /// and between 1 and 16 bits stored, not exceeding bits allocated.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.rows > 0
                && self.columns > 0
                && (self.samples_per_pixel == 1 || self.samples_per_pixel == 3),
            UnsupportedImageShapeSnafu {
                columns: u32::from(self.columns),
                rows: u32::from(self.rows),
                samples_per_pixel: self.samples_per_pixel,
            }
        );
        ensure!(
            (1..=16).contains(&self.bits_allocated)
                && (1..=self.bits_allocated).contains(&self.bits_stored)
                && self.high_bit < self.bits_allocated,
            UnsupportedBitDepthSnafu {
                bits_allocated: self.bits_allocated,
                bits_stored: self.bits_stored,
            }
        );
        Ok(())
    }

    /// The number of bytes of each sample in a native frame buffer:
    /// 2 if more than 8 bits are stored or allocated, 1 otherwise.
    pub fn bytes_per_sample(&self) -> usize {
        if self.bits_stored > 8 || self.bits_allocated > 8 {
            2
        } else {
            1
        }
    }

    /// The number of samples in one frame.
    pub fn samples_per_frame(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns) * usize::from(self.samples_per_pixel)
    }

    /// The number of bytes of one native frame.
    pub fn frame_len(&self) -> usize {
        self.samples_per_frame() * self.bytes_per_sample()
    }

    pub fn is_signed(&self) -> bool {
        self.pixel_representation == PixelRepresentation::Signed
    }

    /// The size of all frames in bytes
    /// if each sample only took _Bits Stored_ bits.
    pub fn stored_size(&self) -> f64 {
        self.samples_per_frame() as f64
            * f64::from(self.bits_stored)
            * f64::from(self.number_of_frames)
            / 8.
    }
}
