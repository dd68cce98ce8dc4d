//! Color model decisions for decoded images.

use crate::geometry::PlanarConfiguration;
use crate::params::PlanarConfigurationPolicy;
use dicom_dictionary_std::uids;

/// The photometric interpretation to assume
/// when the attribute is absent.
pub fn default_photometric_interpretation(samples_per_pixel: u16) -> &'static str {
    if samples_per_pixel > 1 {
        "RGB"
    } else {
        "MONOCHROME2"
    }
}

/// Check whether the photometric interpretation
/// can go through the rendered encoding strategy.
pub fn is_renderable(photometric_interpretation: &str) -> bool {
    matches!(
        photometric_interpretation.trim(),
        "MONOCHROME1" | "MONOCHROME2" | "RGB" | "YBR_FULL"
    )
}

/// Detect the planar configuration from the kind of image.
///
/// Hardcopy color images, as well as ultrasound images in `YBR_FULL`,
/// were historically stored with one plane per component.
/// Everything else is interleaved per pixel.
pub fn detect_planar_configuration(
    sop_class_uid: &str,
    photometric_interpretation: &str,
) -> PlanarConfiguration {
    let sop_class_uid = sop_class_uid.trim_end_matches(|c: char| c == '\0' || c == ' ');
    if sop_class_uid == uids::HARDCOPY_COLOR_IMAGE_STORAGE {
        return PlanarConfiguration::ByPlane;
    }
    if photometric_interpretation.trim() == "YBR_FULL"
        && (sop_class_uid == uids::ULTRASOUND_IMAGE_STORAGE
            || sop_class_uid == uids::ULTRASOUND_MULTI_FRAME_IMAGE_STORAGE)
    {
        return PlanarConfiguration::ByPlane;
    }
    PlanarConfiguration::ByPixel
}

/// Decide the planar configuration of a decoded color image.
///
/// `declared` is the raw value of the _Planar Configuration_ attribute, if any.
pub fn resolve_planar_configuration(
    policy: PlanarConfigurationPolicy,
    declared: Option<i64>,
    sop_class_uid: &str,
    photometric_interpretation: &str,
) -> PlanarConfiguration {
    match policy {
        PlanarConfigurationPolicy::ForceByPixel => PlanarConfiguration::ByPixel,
        PlanarConfigurationPolicy::ForceByPlane => PlanarConfiguration::ByPlane,
        PlanarConfigurationPolicy::Auto => {
            detect_planar_configuration(sop_class_uid, photometric_interpretation)
        }
        PlanarConfigurationPolicy::Restore => declared
            .and_then(PlanarConfiguration::from_value)
            .unwrap_or_else(|| {
                detect_planar_configuration(sop_class_uid, photometric_interpretation)
            }),
    }
}
