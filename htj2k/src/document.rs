//! Collaborators provided by the surrounding DICOM document.
//!
//! The core does not own the DICOM data set.
//! It reads attributes through [`ImageDocument`],
//! reports changes as [attribute operations](dicom_core::ops::AttributeOp),
//! and asks an [`ImageRenderer`] for normalized sample planes
//! when encoding through the rendered strategy.

use crate::codestream::ImagePlanes;
use crate::error::{BufferTooSmallSnafu, Result};
use crate::geometry::GeometryDescriptor;
use crate::layout::SampleLayout;
use byteordered::Endianness;
use dicom_core::Tag;
use snafu::{ensure, OptionExt, Snafu};
use std::borrow::Cow;
use tracing::debug;

/// An attribute value which could not be converted to the expected type.
#[derive(Debug, Snafu)]
#[snafu(display("Could not interpret the value of attribute {}", tag))]
pub struct MalformedAttribute {
    /// the tag of the offending attribute
    pub tag: Tag,
}

/// Attribute lookup in the data set holding the pixel data.
///
/// Absent and empty attributes are both reported as `Ok(None)`.
pub trait ImageDocument {
    /// Retrieve an attribute as an integer.
    fn int(&self, tag: Tag) -> Result<Option<i64>, MalformedAttribute>;

    /// Retrieve an attribute as text,
    /// without trailing padding.
    fn text(&self, tag: Tag) -> Result<Option<Cow<'_, str>>, MalformedAttribute>;

    /// Check whether the attribute is present in the data set.
    fn contains(&self, tag: Tag) -> bool;
}

impl<T> ImageDocument for &T
where
    T: ImageDocument + ?Sized,
{
    fn int(&self, tag: Tag) -> Result<Option<i64>, MalformedAttribute> {
        (**self).int(tag)
    }

    fn text(&self, tag: Tag) -> Result<Option<Cow<'_, str>>, MalformedAttribute> {
        (**self).text(tag)
    }

    fn contains(&self, tag: Tag) -> bool {
        (**self).contains(tag)
    }
}

/// An overlay plane lifted out of the stored pixel cells.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlane {
    /// the overlay repeating group (0x6000 to 0x601E)
    pub group: u16,
    /// overlay bits of all frames, packed 8 pixels per byte
    /// starting from the least significant bit, padded to even length
    pub data: Vec<u8>,
}

/// The image as produced by a renderer,
/// ready to be compressed without further interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    /// precision of each sample in bits
    pub depth: u16,
    /// whether samples are signed
    pub signed: bool,
    /// photometric interpretation of the rendered samples
    pub photometric_interpretation: String,
    /// component sample planes of each frame
    pub frames: Vec<ImagePlanes>,
    /// overlays which were embedded in the stored pixel cells
    pub overlays: Vec<OverlayPlane>,
}

impl RenderedImage {
    /// The _Bits Allocated_ value for this image once stored natively.
    pub fn bits_allocated(&self) -> u16 {
        if self.depth > 8 {
            16
        } else {
            8
        }
    }
}

/// Produces normalized sample planes from native pixel data,
/// separating overlays from the image samples.
pub trait ImageRenderer {
    fn render(
        &self,
        document: &dyn ImageDocument,
        geometry: &GeometryDescriptor,
        pixel_data: &[u8],
    ) -> Result<RenderedImage>;
}

/// The renderer for native pixel cells of up to 16 bits.
///
/// Samples are taken from the bits between _High Bit_
/// and _High Bit_ - _Bits Stored_ + 1,
/// and sign extended if the pixel representation is signed.
/// Overlays embedded in unused bits of the pixel cell
/// are extracted into separate overlay planes.
#[derive(Debug, Default, Copy, Clone)]
pub struct StoredPixelRenderer;

impl StoredPixelRenderer {
    fn embedded_overlays(
        document: &dyn ImageDocument,
        geometry: &GeometryDescriptor,
    ) -> Vec<(u16, u16)> {
        (0x6000..=0x601E_u16)
            .step_by(2)
            .filter_map(|group| {
                let bits_allocated = document.int(Tag(group, 0x0100)).ok()??;
                let bit_position = document.int(Tag(group, 0x0102)).ok()??;
                if bits_allocated <= 1 || document.contains(Tag(group, 0x3000)) {
                    return None;
                }
                let bit_position = u16::try_from(bit_position).ok()?;
                if bit_position >= geometry.bits_allocated {
                    return None;
                }
                Some((group, bit_position))
            })
            .collect()
    }
}

impl ImageRenderer for StoredPixelRenderer {
    fn render(
        &self,
        document: &dyn ImageDocument,
        geometry: &GeometryDescriptor,
        pixel_data: &[u8],
    ) -> Result<RenderedImage> {
        geometry.validate()?;

        let layout = SampleLayout::from_geometry(geometry, geometry.planar_configuration);
        let frame_count = geometry.number_of_frames as usize;
        let needed = layout.frame_len() * frame_count;
        ensure!(
            pixel_data.len() >= needed,
            BufferTooSmallSnafu {
                needed: needed as u64,
                available: pixel_data.len() as u64,
            }
        );

        let (columns, rows) = (u32::from(geometry.columns), u32::from(geometry.rows));
        let depth = geometry.bits_stored;
        let shift = (geometry.high_bit + 1).saturating_sub(depth);
        let mask = (1_u32 << depth) - 1;
        let sign_bit = 1_u32 << (depth - 1);
        let signed = geometry.is_signed();

        let overlays = Self::embedded_overlays(document, geometry);
        let pixels_per_frame = columns as usize * rows as usize;
        let overlay_len = (pixels_per_frame * frame_count).div_ceil(8);
        let mut overlay_bits = vec![vec![0_u8; overlay_len]; overlays.len()];

        let mut frames = Vec::with_capacity(frame_count);
        let mut cells = vec![0_i32; columns as usize];
        for (frame, data) in pixel_data
            .chunks_exact(layout.frame_len())
            .take(frame_count)
            .enumerate()
        {
            let view = layout.view(data).context(BufferTooSmallSnafu {
                needed: layout.frame_len() as u64,
                available: data.len() as u64,
            })?;
            let mut image = ImagePlanes::new(columns, rows, geometry.samples_per_pixel);
            for component in 0..geometry.samples_per_pixel {
                for row in 0..rows {
                    view.read_line(component, row, false, Endianness::Little, &mut cells);

                    if component == 0 {
                        let first = frame * pixels_per_frame + row as usize * columns as usize;
                        for ((_, bit_position), bits) in overlays.iter().zip(&mut overlay_bits) {
                            for (i, cell) in cells.iter().enumerate() {
                                if ((*cell as u32) >> bit_position) & 1 == 1 {
                                    let index = first + i;
                                    bits[index / 8] |= 1 << (index % 8);
                                }
                            }
                        }
                    }

                    if let Some(line) = image.line_mut(component, row) {
                        for (out, cell) in line.iter_mut().zip(&cells) {
                            let value = ((*cell as u32) >> shift) & mask;
                            *out = if signed && value & sign_bit != 0 {
                                (value | !mask) as i32
                            } else {
                                value as i32
                            };
                        }
                    }
                }
            }
            frames.push(image);
        }

        debug!(
            "Rendered {} frame(s) at {} bits with {} embedded overlay(s)",
            frames.len(),
            depth,
            overlays.len()
        );

        let overlays = overlays
            .into_iter()
            .zip(overlay_bits)
            .map(|((group, _), mut data)| {
                if data.len() % 2 == 1 {
                    data.push(0);
                }
                OverlayPlane { group, data }
            })
            .collect();

        Ok(RenderedImage {
            depth,
            signed,
            photometric_interpretation: geometry.photometric_interpretation.clone(),
            frames,
            overlays,
        })
    }
}
