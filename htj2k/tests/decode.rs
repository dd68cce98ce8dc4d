//! Test suite for HTJ2K decoding,
//! from pixel data encoded by the same codecs.

mod common;

use common::{pattern_u16_le, pattern_u8, FixtureCodestream, TestImage};
use dicom_dictionary_std::tags;
use dicom_htj2k::entries::{HTJ2K, HTJ2K_LOSSLESS_ONLY, HTJ2K_RPCL_LOSSLESS_ONLY};
use dicom_htj2k::{
    ops, CodecParameters, CodecRegistry, DecodeOptions, Endianness, Error, FragmentedStream,
    PlanarConfiguration, PlanarConfigurationPolicy, RepresentationParameters,
    StoredPixelRenderer, UidCreation,
};
use rstest::rstest;

fn encode(
    params: CodecParameters,
    transfer_syntax: &str,
    image: &TestImage,
    data: &[u8],
) -> FragmentedStream {
    CodecRegistry::with_codecs(params, FixtureCodestream)
        .encoder(transfer_syntax)
        .unwrap()
        .encode(
            image,
            data,
            &RepresentationParameters::lossless(),
            &StoredPixelRenderer,
        )
        .unwrap()
        .pixel_data
}

fn decoder_registry(params: CodecParameters) -> CodecRegistry {
    CodecRegistry::with_codecs(params, FixtureCodestream)
}

#[test]
fn monochrome_8bit_round_trip() {
    let image = TestImage::new(256, 256, 1, 8);
    let data = pattern_u8(256 * 256);
    let stream = encode(CodecParameters::new(), HTJ2K_LOSSLESS_ONLY, &image, &data);

    let decoded = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K_LOSSLESS_ONLY)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();

    assert_eq!(decoded.data.len(), 65_536);
    assert_eq!(decoded.data, data);
    assert_eq!(decoded.frames, 1);
    assert!(decoded.attribute_ops.is_empty());
    assert!(!decoded.new_instance_required);
}

#[test]
fn rgb_by_pixel_round_trip() {
    let image = TestImage::new(128, 128, 3, 8).with(tags::PLANAR_CONFIGURATION, 0);
    let data = pattern_u8(128 * 128 * 3);
    let stream = encode(CodecParameters::new(), HTJ2K, &image, &data);

    let decoded = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();

    assert_eq!(decoded.data.len(), 49_152);
    assert_eq!(decoded.data, data);
    assert_eq!(decoded.planar_configuration, PlanarConfiguration::ByPixel);
    assert_eq!(
        decoded.attribute_ops,
        vec![ops::planar_configuration(PlanarConfiguration::ByPixel)]
    );
}

#[rstest]
#[case(PlanarConfigurationPolicy::Restore, PlanarConfiguration::ByPlane)]
#[case(PlanarConfigurationPolicy::ForceByPlane, PlanarConfiguration::ByPlane)]
#[case(PlanarConfigurationPolicy::ForceByPixel, PlanarConfiguration::ByPixel)]
fn rgb_by_plane_decoding(
    #[case] policy: PlanarConfigurationPolicy,
    #[case] expected: PlanarConfiguration,
) {
    let (rows, columns) = (5, 7);
    let len = rows * columns;
    let image = TestImage::new(rows as u16, columns as u16, 3, 8)
        .with(tags::PLANAR_CONFIGURATION, 1);
    let data = pattern_u8(len * 3);
    let stream = encode(
        CodecParameters::new().with_prefer_rendered(false),
        HTJ2K,
        &image,
        &data,
    );

    let decoded = decoder_registry(CodecParameters::new().with_planar_configuration(policy))
        .decoder(HTJ2K)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();

    assert_eq!(decoded.planar_configuration, expected);
    // odd number of bytes, padded
    assert_eq!(decoded.data.len(), len * 3 + 1);
    assert_eq!(decoded.data[len * 3], 0);
    let expected_data: Vec<u8> = match expected {
        PlanarConfiguration::ByPlane => data.clone(),
        PlanarConfiguration::ByPixel => (0..len * 3)
            .map(|i| data[(i % 3) * len + i / 3])
            .collect(),
    };
    assert_eq!(&decoded.data[..len * 3], &expected_data[..]);
    assert!(decoded
        .attribute_ops
        .contains(&ops::planar_configuration(expected)));
}

fn signed_12bit_samples(len: usize) -> Vec<u8> {
    (0..len)
        .flat_map(|i| (((i * 37) % 4096) as i16 - 2048).to_le_bytes())
        .collect()
}

#[rstest]
#[case(true)]
#[case(false)]
fn signed_16bit_round_trip(#[case] prefer_rendered: bool) {
    let image = TestImage::new(12, 10, 1, 16)
        .with(tags::BITS_STORED, 12)
        .with(tags::HIGH_BIT, 11)
        .with(tags::PIXEL_REPRESENTATION, 1);
    let data = signed_12bit_samples(120);
    let stream = encode(
        CodecParameters::new().with_prefer_rendered(prefer_rendered),
        HTJ2K_LOSSLESS_ONLY,
        &image,
        &data,
    );

    let decoder = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K_LOSSLESS_ONLY)
        .unwrap();
    let decoded = decoder
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();
    assert_eq!(decoded.data, data);

    let decoded = decoder
        .decode(
            &image,
            &stream,
            &DecodeOptions::new().with_byte_order(Endianness::Big),
        )
        .unwrap();
    let swapped: Vec<u8> = data.chunks(2).flat_map(|s| [s[1], s[0]]).collect();
    assert_eq!(decoded.data, swapped);
}

#[test]
fn unsigned_16bit_round_trip() {
    let image = TestImage::new(20, 20, 1, 16);
    let data = pattern_u16_le(400, 16);
    let stream = encode(CodecParameters::new(), HTJ2K_RPCL_LOSSLESS_ONLY, &image, &data);

    let decoded = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K_RPCL_LOSSLESS_ONLY)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();
    assert_eq!(decoded.data, data);
}

#[test]
fn multi_frame_round_trip() {
    let image = TestImage::new(8, 6, 1, 8).with(tags::NUMBER_OF_FRAMES, 5);
    let data = pattern_u8(48 * 5);
    let stream = encode(CodecParameters::new(), HTJ2K, &image, &data);
    assert_eq!(stream.num_fragments(), 5);

    let decoder = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K)
        .unwrap();
    let decoded = decoder
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();
    assert_eq!(decoded.frames, 5);
    assert_eq!(decoded.data, data);
    assert_eq!(decoded.attribute_ops, vec![ops::number_of_frames(5)]);

    // more frames declared than there are fragments
    let image = image.with(tags::NUMBER_OF_FRAMES, 8);
    let decoded = decoder
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();
    assert_eq!(decoded.frames, 5);
    assert_eq!(decoded.data, data);
    assert_eq!(decoded.attribute_ops, vec![ops::number_of_frames(5)]);
}

/// 10 frames of 4x4 samples, each split over 8 fragments
fn fragmented_frames() -> (TestImage, Vec<u8>, FragmentedStream) {
    let image = TestImage::new(4, 4, 1, 8).with(tags::NUMBER_OF_FRAMES, 10);
    let data = pattern_u8(16 * 10);
    let stream = encode(
        CodecParameters::new().with_fragment_size(16),
        HTJ2K,
        &image,
        &data,
    );
    assert_eq!(stream.num_fragments(), 80);
    (image, data, stream)
}

#[test]
fn corrupted_offset_table_falls_back_to_scanning() {
    let (image, data, mut stream) = fragmented_frames();
    // not a multiple of the number of frames
    stream.set_offset_table_bytes(vec![0; 30]);

    let decoded = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default())
        .unwrap();
    assert_eq!(decoded.frames, 10);
    assert_eq!(decoded.data, data);
}

#[rstest]
#[case(false)]
#[case(true)]
fn frames_one_at_a_time(#[case] ignore_offset_table: bool) {
    let (image, data, stream) = fragmented_frames();
    let decoder = decoder_registry(
        CodecParameters::new().with_ignore_offset_table(ignore_offset_table),
    )
    .decoder(HTJ2K)
    .unwrap();
    let options = DecodeOptions::default();

    // in order, each frame starting where the previous one ended
    let mut start = 1;
    for frame in 0..10 {
        let decoded = decoder
            .decode_frame(&image, &stream, frame, start, &options)
            .unwrap();
        assert_eq!(decoded.fragments.count, 8);
        assert_eq!(decoded.data, &data[frame as usize * 16..][..16]);
        start = decoded.fragments.end();
    }

    // out of order, without a hint
    let decoded = decoder
        .decode_frame(&image, &stream, 7, 0, &options)
        .unwrap();
    assert_eq!(decoded.fragments.first, 57);
    assert_eq!(decoded.data, &data[7 * 16..8 * 16]);

    assert!(matches!(
        decoder.decode_frame(&image, &stream, 10, 0, &options),
        Err(Error::FrameOutOfRange {
            frame: 10,
            frames: 10
        })
    ));
}

#[test]
fn mismatching_image_attributes() {
    let image = TestImage::new(8, 8, 1, 8);
    let stream = encode(CodecParameters::new(), HTJ2K, &image, &pattern_u8(64));

    let result = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K)
        .unwrap()
        .decode(
            &image.with(tags::COLUMNS, 9),
            &stream,
            &DecodeOptions::default(),
        );
    assert!(matches!(
        result,
        Err(Error::ImageDataMismatch {
            columns: 8,
            expected_columns: 9,
            ..
        })
    ));
}

#[test]
fn truncated_codestream() {
    let image = TestImage::new(8, 8, 1, 8);
    let stream = encode(CodecParameters::new(), HTJ2K, &image, &pattern_u8(64));
    let (table, mut fragments) = stream.into_parts();
    fragments[0].truncate(100);
    let stream = FragmentedStream::from_parts(&table, fragments);

    let result = decoder_registry(CodecParameters::new())
        .decoder(HTJ2K)
        .unwrap()
        .decode(&image, &stream, &DecodeOptions::default());
    assert!(matches!(result, Err(Error::Codestream { .. })));
}

#[test]
fn decoding_may_require_a_new_instance() {
    let image = TestImage::new(8, 8, 1, 8);
    let stream = encode(CodecParameters::new(), HTJ2K, &image, &pattern_u8(64));

    for (uid_creation, expected) in [
        (UidCreation::Always, true),
        (UidCreation::Default, false),
        (UidCreation::Never, false),
    ] {
        let decoded = decoder_registry(CodecParameters::new().with_uid_creation(uid_creation))
            .decoder(HTJ2K)
            .unwrap()
            .decode(&image, &stream, &DecodeOptions::default())
            .unwrap();
        assert_eq!(decoded.new_instance_required, expected);
    }
}
