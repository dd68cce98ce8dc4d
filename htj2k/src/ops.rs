//! Attribute operations describing changes to the surrounding document.
//!
//! The codecs never write to the document themselves.
//! Each encode or decode call returns the list of operations
//! which the caller should apply,
//! for instance with [`apply_ops`].

use crate::document::{ImageDocument, OverlayPlane, RenderedImage};
use crate::error::{InvalidAttributeSnafu, Result};
use crate::geometry::PlanarConfiguration;
use dicom_core::ops::{ApplyOp, AttributeAction, AttributeOp};
use dicom_core::{PrimitiveValue, Tag};
use dicom_dictionary_std::tags;
use snafu::ResultExt;

/// The coding method recorded in _Lossy Image Compression Method_.
pub const LOSSY_COMPRESSION_METHOD: &str = "ISO_15444_15";

/// The maximum length of a _Derivation Description_ (ST) value.
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Apply a list of attribute operations to a document, in order.
pub fn apply_ops<T, I>(target: &mut T, ops: I) -> std::result::Result<(), T::Err>
where
    T: ApplyOp + ?Sized,
    I: IntoIterator<Item = AttributeOp>,
{
    for op in ops {
        target.apply(op)?;
    }
    Ok(())
}

/// Set _Number Of Frames_.
pub fn number_of_frames(frames: u32) -> AttributeOp {
    AttributeOp::new(
        tags::NUMBER_OF_FRAMES,
        AttributeAction::SetStr(frames.to_string().into()),
    )
}

/// Set _Planar Configuration_.
pub fn planar_configuration(planar_configuration: PlanarConfiguration) -> AttributeOp {
    AttributeOp::new(
        tags::PLANAR_CONFIGURATION,
        AttributeAction::Set(PrimitiveValue::from(planar_configuration.value())),
    )
}

/// Format a compression ratio the way it is recorded in the document,
/// with up to 5 significant digits.
///
/// Trailing zeros are left out,
/// and very large or small ratios are written in scientific notation.
pub fn format_ratio(ratio: f64) -> String {
    if ratio == 0. || !ratio.is_finite() {
        return format!("{}", ratio).to_uppercase();
    }
    let scientific = format!("{:.4e}", ratio);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..5).contains(&exponent) {
        format!(
            "{}E{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        trim_fraction(&format!("{:.*}", (4 - exponent) as usize, ratio)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

fn text(document: &dyn ImageDocument, tag: Tag, name: &'static str) -> Result<Option<String>> {
    Ok(document
        .text(tag)
        .context(InvalidAttributeSnafu { name })?
        .map(|value| value.trim_end_matches([' ', '\0']).to_string())
        .filter(|value| !value.is_empty()))
}

/// Mark the image as lossy compressed by the given ratio:
/// _Lossy Image Compression_,
/// _Lossy Image Compression Ratio_ and _Method_,
/// _Derivation Description_, _Derivation Code Sequence_ and _Image Type_.
///
/// The derivation code sequence is replaced by a single
/// `(113040, DCM, "Lossy Compression")` item.
///
/// Previous ratios, methods and descriptions are kept,
/// with as many compression methods as compression ratios.
pub fn lossy_compression(document: &dyn ImageDocument, ratio: f64) -> Result<Vec<AttributeOp>> {
    let formatted = format_ratio(ratio);

    let ratios = match text(
        document,
        tags::LOSSY_IMAGE_COMPRESSION_RATIO,
        "LossyImageCompressionRatio",
    )? {
        Some(old) => format!("{}\\{}", old, formatted),
        None => formatted.clone(),
    };
    let ratio_separators = ratios.matches('\\').count();

    let mut methods = match text(
        document,
        tags::LOSSY_IMAGE_COMPRESSION_METHOD,
        "LossyImageCompressionMethod",
    )? {
        Some(old) => old + "\\",
        None => String::new(),
    };
    let method_separators = methods.matches('\\').count();
    for _ in method_separators..ratio_separators {
        methods.push('\\');
    }
    methods.push_str(LOSSY_COMPRESSION_METHOD);

    let mut description = format!("near lossless HT-J2K compression, factor {}", formatted);
    if let Some(old) = text(document, tags::DERIVATION_DESCRIPTION, "DerivationDescription")? {
        description = format!("{} [{}]", description, old);
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            description = description
                .chars()
                .take(MAX_DESCRIPTION_LEN - 4)
                .chain("...]".chars())
                .collect();
        }
    }

    let image_type = match text(document, tags::IMAGE_TYPE, "ImageType")? {
        Some(old) => match old.find('\\') {
            Some(pos) => format!("DERIVED{}", &old[pos..]),
            None => "DERIVED".to_string(),
        },
        None => "DERIVED".to_string(),
    };

    Ok(vec![
        AttributeOp::new(tags::IMAGE_TYPE, AttributeAction::SetStr(image_type.into())),
        AttributeOp::new(
            tags::DERIVATION_DESCRIPTION,
            AttributeAction::SetStr(description.into()),
        ),
        AttributeOp::new(tags::DERIVATION_CODE_SEQUENCE, AttributeAction::Remove),
        AttributeOp::new(
            (tags::DERIVATION_CODE_SEQUENCE, 0, tags::CODE_VALUE),
            AttributeAction::SetStr("113040".into()),
        ),
        AttributeOp::new(
            (tags::DERIVATION_CODE_SEQUENCE, 0, tags::CODING_SCHEME_DESIGNATOR),
            AttributeAction::SetStr("DCM".into()),
        ),
        AttributeOp::new(
            (tags::DERIVATION_CODE_SEQUENCE, 0, tags::CODE_MEANING),
            AttributeAction::SetStr("Lossy Compression".into()),
        ),
        AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION,
            AttributeAction::SetStr("01".into()),
        ),
        AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION_RATIO,
            AttributeAction::SetStr(ratios.into()),
        ),
        AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION_METHOD,
            AttributeAction::SetStr(methods.into()),
        ),
    ])
}

/// Describe the pixel cell of a rendered image once compressed:
/// _Bits Allocated_, _Bits Stored_, _High Bit_,
/// _Pixel Representation_ and _Photometric Interpretation_.
pub fn rendered_geometry(image: &RenderedImage) -> Vec<AttributeOp> {
    vec![
        AttributeOp::new(
            tags::BITS_ALLOCATED,
            AttributeAction::Set(PrimitiveValue::from(image.bits_allocated())),
        ),
        AttributeOp::new(
            tags::BITS_STORED,
            AttributeAction::Set(PrimitiveValue::from(image.depth)),
        ),
        AttributeOp::new(
            tags::HIGH_BIT,
            AttributeAction::Set(PrimitiveValue::from(image.depth.saturating_sub(1))),
        ),
        AttributeOp::new(
            tags::PIXEL_REPRESENTATION,
            AttributeAction::Set(PrimitiveValue::from(u16::from(image.signed))),
        ),
        AttributeOp::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            AttributeAction::SetStr(image.photometric_interpretation.clone().into()),
        ),
    ]
}

/// Record overlays lifted out of the pixel cells
/// as stand-alone overlay planes.
pub fn overlays(overlays: &[OverlayPlane]) -> Vec<AttributeOp> {
    overlays
        .iter()
        .flat_map(|overlay| {
            [
                // overlay data
                AttributeOp::new(
                    Tag(overlay.group, 0x3000),
                    AttributeAction::Set(PrimitiveValue::U8(overlay.data.as_slice().into())),
                ),
                // overlay bits allocated
                AttributeOp::new(
                    Tag(overlay.group, 0x0100),
                    AttributeAction::Set(PrimitiveValue::from(1_u16)),
                ),
                // overlay bit position
                AttributeOp::new(
                    Tag(overlay.group, 0x0102),
                    AttributeAction::Set(PrimitiveValue::from(0_u16)),
                ),
            ]
        })
        .collect()
}
