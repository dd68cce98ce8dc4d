//! Frame transcoding between native sample buffers and codestreams.
//!
//! Decoding turns the codestream of one frame
//! into a native frame buffer in the requested planar configuration,
//! while encoding turns either a native frame buffer
//! or already rendered sample planes into a codestream.
//! Errors reported by the codestream library
//! are converted into [`Error::Codestream`](crate::Error::Codestream) here.

use crate::codestream::{Codestream, CodingParameters, ImagePlanes};
use crate::error::{
    BufferTooSmallSnafu, CodestreamSnafu, ImageDataMismatchSnafu, Result,
    UnsupportedBitDepthSnafu, UnsupportedImageShapeSnafu,
};
use crate::geometry::{GeometryDescriptor, PlanarConfiguration};
use crate::layout::SampleLayout;
use crate::params::ProgressionOrder;
use byteordered::Endianness;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::debug;

/// The maximum number of automatically chosen decomposition levels.
pub const MAX_AUTO_DECOMPOSITIONS: u8 = 6;

/// Remove the padding byte which may follow a codestream
/// stored in an odd number of bytes.
///
/// A codestream always ends with the EOC marker (`FF D9`),
/// so a trailing zero can only be padding.
pub fn strip_trailing_pad(codestream: &[u8]) -> &[u8] {
    match codestream.split_last() {
        Some((0, rest)) => rest,
        _ => codestream,
    }
}

/// Choose the number of wavelet decomposition levels for an image:
/// the number of times both dimensions can be halved
/// while still exceeding 64 samples,
/// up to [`MAX_AUTO_DECOMPOSITIONS`].
pub fn auto_decompositions(width: u32, height: u32) -> u8 {
    let (mut width, mut height) = (width, height);
    let mut levels = 0;
    while width > 64 && height > 64 && levels < MAX_AUTO_DECOMPOSITIONS {
        levels += 1;
        width /= 2;
        height /= 2;
    }
    levels
}

fn check_shape(
    geometry: &GeometryDescriptor,
    width: u32,
    height: u32,
    components: u16,
) -> Result<()> {
    ensure!(
        width == u32::from(geometry.columns)
            && height == u32::from(geometry.rows)
            && components == geometry.samples_per_pixel,
        ImageDataMismatchSnafu {
            columns: width,
            rows: height,
            components,
            expected_columns: u32::from(geometry.columns),
            expected_rows: u32::from(geometry.rows),
            expected_components: geometry.samples_per_pixel,
        }
    );
    Ok(())
}

/// Decode the codestream of one frame into a native frame buffer.
///
/// The samples are laid out in the given planar configuration,
/// with 16-bit samples in the given byte order.
/// The codestream must describe exactly the image of `geometry`.
pub fn decode_frame(
    engine: &dyn Codestream,
    codestream: &[u8],
    geometry: &GeometryDescriptor,
    planar_configuration: PlanarConfiguration,
    byte_order: Endianness,
) -> Result<Vec<u8>> {
    let data = strip_trailing_pad(codestream);

    let header = engine.read_header(data).context(CodestreamSnafu)?;
    check_shape(geometry, header.width, header.height, header.components)?;
    ensure!(
        (1..=16).contains(&header.bit_depth),
        UnsupportedBitDepthSnafu {
            bits_allocated: geometry.bits_allocated,
            bits_stored: header.bit_depth,
        }
    );

    let image = engine.decompress(data).context(CodestreamSnafu)?;
    check_shape(geometry, image.width(), image.height(), image.components())?;

    let layout = SampleLayout::from_geometry(geometry, planar_configuration);
    let mut buffer = vec![0; layout.frame_len()];
    if let Some(mut view) = layout.view_mut(&mut buffer) {
        for component in 0..image.components() {
            for row in 0..image.height() {
                if let Some(line) = image.line(component, row) {
                    view.write_line(component, row, byte_order, line);
                }
            }
        }
    }

    debug!(
        "Decoded {} byte codestream into {}x{}x{} samples of {} bits",
        data.len(),
        header.width,
        header.height,
        header.components,
        header.bit_depth
    );
    Ok(buffer)
}

/// How one frame is to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEncoding {
    pub progression_order: ProgressionOrder,
    /// decomposition levels, `None` to choose them from the image size
    pub decompositions: Option<u8>,
    /// code block size, `None` for the library defaults
    pub block_size: Option<(u16, u16)>,
    /// lossless (reversible) coding
    pub reversible: bool,
}

impl Default for FrameEncoding {
    fn default() -> Self {
        FrameEncoding {
            progression_order: ProgressionOrder::Lrcp,
            decompositions: None,
            block_size: None,
            reversible: true,
        }
    }
}

/// Encode component sample planes into a codestream.
///
/// All components share the same precision and signedness.
pub fn encode_planes(
    engine: &dyn Codestream,
    image: &ImagePlanes,
    bit_depth: u16,
    signed: bool,
    encoding: &FrameEncoding,
) -> Result<Vec<u8>> {
    ensure!(
        image.width() > 0
            && image.height() > 0
            && (image.components() == 1 || image.components() == 3),
        UnsupportedImageShapeSnafu {
            columns: image.width(),
            rows: image.height(),
            samples_per_pixel: image.components(),
        }
    );
    ensure!(
        (1..=16).contains(&bit_depth),
        UnsupportedBitDepthSnafu {
            bits_allocated: bit_depth,
            bits_stored: bit_depth,
        }
    );

    let params = CodingParameters {
        width: image.width(),
        height: image.height(),
        components: image.components(),
        bit_depth,
        signed,
        color_transform: image.components() > 1,
        reversible: encoding.reversible,
        progression_order: encoding.progression_order,
        decompositions: encoding
            .decompositions
            .unwrap_or_else(|| auto_decompositions(image.width(), image.height())),
        block_size: encoding.block_size,
    };

    let codestream = engine.compress(&params, image).context(CodestreamSnafu)?;
    debug!(
        "Encoded {}x{}x{} samples of {} bits into {} bytes ({}, {} levels, {})",
        params.width,
        params.height,
        params.components,
        bit_depth,
        codestream.len(),
        params.progression_order,
        params.decompositions,
        if params.reversible { "reversible" } else { "irreversible" },
    );
    Ok(codestream)
}

/// Read a native frame buffer into component sample planes.
///
/// Samples are widened from the full pixel cell,
/// sign extended if the pixel representation is signed.
pub fn frame_planes(frame: &[u8], geometry: &GeometryDescriptor) -> Result<ImagePlanes> {
    let layout = SampleLayout::from_geometry(geometry, geometry.planar_configuration);
    let view = layout.view(frame).context(BufferTooSmallSnafu {
        needed: layout.frame_len() as u64,
        available: frame.len() as u64,
    })?;

    let (columns, rows) = (u32::from(geometry.columns), u32::from(geometry.rows));
    let mut image = ImagePlanes::new(columns, rows, geometry.samples_per_pixel);
    for component in 0..geometry.samples_per_pixel {
        for row in 0..rows {
            if let Some(line) = image.line_mut(component, row) {
                view.read_line(
                    component,
                    row,
                    geometry.is_signed(),
                    Endianness::Little,
                    line,
                );
            }
        }
    }
    Ok(image)
}

/// Encode one native frame buffer as is,
/// taking every bit of the pixel cell as sample precision.
///
/// Only 8 or 16 bits allocated can be encoded this way.
pub fn encode_frame(
    engine: &dyn Codestream,
    frame: &[u8],
    geometry: &GeometryDescriptor,
    encoding: &FrameEncoding,
) -> Result<Vec<u8>> {
    ensure!(
        geometry.bits_allocated == 8 || geometry.bits_allocated == 16,
        UnsupportedBitDepthSnafu {
            bits_allocated: geometry.bits_allocated,
            bits_stored: geometry.bits_stored,
        }
    );
    let image = frame_planes(frame, geometry)?;
    encode_planes(
        engine,
        &image,
        geometry.bits_allocated,
        geometry.is_signed(),
        encoding,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::geometry::PixelRepresentation;
    use crate::tests::MockCodestream;
    use rstest::rstest;

    fn geometry(columns: u16, rows: u16, samples_per_pixel: u16, bits: u16) -> GeometryDescriptor {
        GeometryDescriptor {
            rows,
            columns,
            samples_per_pixel,
            bits_allocated: bits,
            bits_stored: bits,
            high_bit: bits - 1,
            pixel_representation: PixelRepresentation::Unsigned,
            planar_configuration: PlanarConfiguration::ByPixel,
            photometric_interpretation: if samples_per_pixel == 3 {
                "RGB".into()
            } else {
                "MONOCHROME2".into()
            },
            number_of_frames: 1,
        }
    }

    #[rstest]
    #[case(&[0xFF, 0xD9, 0x00], &[0xFF, 0xD9])]
    #[case(&[0xFF, 0xD9], &[0xFF, 0xD9])]
    #[case(&[0x12, 0x00, 0x00], &[0x12, 0x00])]
    #[case(&[0x00], &[])]
    #[case(&[], &[])]
    fn trailing_pad(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(strip_trailing_pad(input), expected);
    }

    #[rstest]
    #[case(64, 64, 0)]
    #[case(65, 65, 1)]
    #[case(128, 128, 1)]
    #[case(256, 256, 2)]
    #[case(512, 100, 1)]
    #[case(4096, 4096, 6)]
    #[case(1 << 20, 1 << 20, 6)]
    fn decomposition_levels(#[case] width: u32, #[case] height: u32, #[case] levels: u8) {
        assert_eq!(auto_decompositions(width, height), levels);
    }

    #[test]
    fn encode_uses_policy() {
        let engine = MockCodestream::default();
        let geometry = geometry(300, 200, 3, 8);
        let frame = vec![7; geometry.frame_len()];
        let encoding = FrameEncoding {
            progression_order: ProgressionOrder::Rpcl,
            decompositions: None,
            block_size: Some((32, 32)),
            reversible: false,
        };
        encode_frame(&engine, &frame, &geometry, &encoding).unwrap();

        let params = engine.last_parameters().expect("compress should be called");
        assert_eq!((params.width, params.height, params.components), (300, 200, 3));
        assert_eq!(params.bit_depth, 8);
        assert!(params.color_transform);
        assert!(!params.reversible);
        assert_eq!(params.progression_order, ProgressionOrder::Rpcl);
        assert_eq!(params.decompositions, 2);
        assert_eq!(params.block_size, Some((32, 32)));
    }

    #[test]
    fn no_color_transform_for_one_component() {
        let engine = MockCodestream::default();
        let geometry = geometry(8, 8, 1, 16);
        let frame = vec![1; geometry.frame_len()];
        let encoding = FrameEncoding {
            decompositions: Some(3),
            ..FrameEncoding::default()
        };
        encode_frame(&engine, &frame, &geometry, &encoding).unwrap();
        let params = engine.last_parameters().expect("compress should be called");
        assert!(!params.color_transform);
        assert!(params.reversible);
        assert_eq!(params.decompositions, 3);
        assert_eq!(params.bit_depth, 16);
    }

    #[rstest]
    #[case(PlanarConfiguration::ByPixel)]
    #[case(PlanarConfiguration::ByPlane)]
    fn color_round_trip(#[case] planar_configuration: PlanarConfiguration) {
        let engine = MockCodestream::default();
        let mut geometry = geometry(5, 3, 3, 8);
        geometry.planar_configuration = planar_configuration;
        let frame: Vec<u8> = (0..geometry.frame_len() as u8).collect();

        let codestream =
            encode_frame(&engine, &frame, &geometry, &FrameEncoding::default()).unwrap();
        let decoded = decode_frame(
            &engine,
            &codestream,
            &geometry,
            planar_configuration,
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_into_other_planar_configuration() {
        let engine = MockCodestream::default();
        let geometry = geometry(2, 1, 3, 8);
        // R G B R G B
        let frame = [1, 2, 3, 4, 5, 6];
        let codestream =
            encode_frame(&engine, &frame, &geometry, &FrameEncoding::default()).unwrap();
        let decoded = decode_frame(
            &engine,
            &codestream,
            &geometry,
            PlanarConfiguration::ByPlane,
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(decoded, vec![1, 4, 2, 5, 3, 6]);
    }

    #[rstest]
    #[case(PixelRepresentation::Unsigned)]
    #[case(PixelRepresentation::Signed)]
    fn sixteen_bit_round_trip(#[case] pixel_representation: PixelRepresentation) {
        let engine = MockCodestream::default();
        let mut geometry = geometry(4, 4, 1, 16);
        geometry.pixel_representation = pixel_representation;
        let frame: Vec<u8> = (0..32_u8).map(|i| i.wrapping_mul(37)).collect();

        let codestream =
            encode_frame(&engine, &frame, &geometry, &FrameEncoding::default()).unwrap();
        assert_eq!(
            engine.last_parameters().map(|p| p.signed),
            Some(pixel_representation == PixelRepresentation::Signed)
        );
        let decoded = decode_frame(
            &engine,
            &codestream,
            &geometry,
            PlanarConfiguration::ByPixel,
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(decoded, frame);

        // same samples, other byte order
        let decoded = decode_frame(
            &engine,
            &codestream,
            &geometry,
            PlanarConfiguration::ByPixel,
            Endianness::Big,
        )
        .unwrap();
        let swapped: Vec<u8> = frame.chunks(2).flat_map(|s| [s[1], s[0]]).collect();
        assert_eq!(decoded, swapped);
    }

    #[test]
    fn padded_codestream_is_accepted() {
        let engine = MockCodestream::default();
        let geometry = geometry(3, 1, 1, 8);
        let mut codestream =
            encode_frame(&engine, &[9, 8, 7], &geometry, &FrameEncoding::default()).unwrap();
        codestream.push(0);
        let decoded = decode_frame(
            &engine,
            &codestream,
            &geometry,
            PlanarConfiguration::ByPixel,
            Endianness::Little,
        )
        .unwrap();
        assert_eq!(decoded, vec![9, 8, 7]);
    }

    #[test]
    fn mismatching_codestream() {
        let engine = MockCodestream::default();
        let codestream = encode_frame(
            &engine,
            &[0; 16],
            &geometry(4, 4, 1, 8),
            &FrameEncoding::default(),
        )
        .unwrap();
        let err = decode_frame(
            &engine,
            &codestream,
            &geometry(4, 2, 1, 8),
            PlanarConfiguration::ByPixel,
            Endianness::Little,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ImageDataMismatch {
                rows: 4,
                expected_rows: 2,
                ..
            }
        ));
    }

    #[test]
    fn library_errors_are_wrapped() {
        let engine = MockCodestream::default();
        let err = decode_frame(
            &engine,
            &[0xFF, 0x4F, 0x12, 0x34],
            &geometry(4, 4, 1, 8),
            PlanarConfiguration::ByPixel,
            Endianness::Little,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Codestream { .. }));
    }

    #[test]
    fn short_frame_buffer() {
        let engine = MockCodestream::default();
        let err = encode_frame(
            &engine,
            &[0; 15],
            &geometry(4, 4, 1, 8),
            &FrameEncoding::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooSmall {
                needed: 16,
                available: 15
            }
        ));
        assert!(engine.last_parameters().is_none());
    }

    #[test]
    fn raw_encoding_needs_whole_bytes() {
        let engine = MockCodestream::default();
        let geometry = geometry(4, 4, 1, 12);
        let err = encode_frame(&engine, &[0; 32], &geometry, &FrameEncoding::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedBitDepth {
                bits_allocated: 12,
                ..
            }
        ));
    }
}
