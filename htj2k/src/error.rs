//! Error types for HTJ2K pixel data encapsulation and transcoding.
//!
//! Every failure of the crate is reported through [`Error`].
//! Nothing is retried internally:
//! each error aborts the current encode or decode call
//! and no partially transcoded frame is handed back to the caller.

use crate::codestream::CodestreamError;
use crate::document::MalformedAttribute;
use snafu::Snafu;

/// The possible error conditions when encoding or decoding HTJ2K pixel data.
///
/// Users of this type are free to handle errors based on their variant,
/// but should not make decisions based on the display message,
/// since that is not considered part of the API
/// and may change on any new release.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A required attribute is missing
    /// from the DICOM object representing the image.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute { name: &'static str },

    /// An attribute is present but its value could not be interpreted.
    #[snafu(display("Malformed value in attribute `{}`", name))]
    InvalidAttribute {
        name: &'static str,
        source: MalformedAttribute,
    },

    /// The image sample depth cannot be handled
    #[snafu(display(
        "Unsupported bit depth: {} bits allocated, {} bits stored",
        bits_allocated,
        bits_stored
    ))]
    UnsupportedBitDepth { bits_allocated: u16, bits_stored: u16 },

    /// The image dimensions or number of samples per pixel
    /// cannot be handled
    #[snafu(display(
        "Unsupported image shape: {}x{} with {} samples per pixel",
        columns,
        rows,
        samples_per_pixel
    ))]
    UnsupportedImageShape {
        columns: u32,
        rows: u32,
        samples_per_pixel: u16,
    },

    /// The photometric interpretation cannot be handled
    /// by the selected encoding strategy
    #[snafu(display(
        "Unsupported photometric interpretation `{}` for near-lossless compression",
        photometric_interpretation
    ))]
    UnsupportedPhotometricInterpretation { photometric_interpretation: String },

    /// The native pixel data does not hold enough bytes
    /// for the image geometry declared in the object
    #[snafu(display(
        "Pixel data buffer too small: {} bytes needed, {} available",
        needed,
        available
    ))]
    BufferTooSmall { needed: u64, available: u64 },

    /// None of the fragment boundary strategies
    /// could tell which fragments belong to a frame
    #[snafu(display("Cannot determine the fragments of frame #{}", frame))]
    UndeterminedFragments { frame: u32 },

    /// The requested frame is outside the object's frame range
    #[snafu(display("Frame #{} is out of range (0..{})", frame, frames))]
    FrameOutOfRange { frame: u32, frames: u32 },

    /// Byte offsets of the encapsulated pixel data
    /// no longer fit in a basic offset table
    #[snafu(display("Frame #{} starts beyond the reach of a 32-bit offset table", frame))]
    OffsetOverflow { frame: u32 },

    /// The codestream does not describe the image declared in the object
    #[snafu(display(
        "Codestream of {}x{} with {} components does not match the image attributes ({}x{} with {} samples per pixel)",
        columns,
        rows,
        components,
        expected_columns,
        expected_rows,
        expected_components
    ))]
    ImageDataMismatch {
        columns: u32,
        rows: u32,
        components: u16,
        expected_columns: u32,
        expected_rows: u32,
        expected_components: u16,
    },

    /// The underlying codestream library reported a failure
    #[snafu(display("Codestream library failure: {}", source))]
    Codestream { source: CodestreamError },

    /// The operation is not available for this codec,
    /// such as decoding with an encoder
    /// or re-compressing already compressed pixel data
    #[snafu(display("Illegal operation: {}", operation))]
    IllegalOperation { operation: &'static str },

    /// The transfer syntax is not one of the HTJ2K transfer syntaxes
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String },

    /// The codec registry was used before registration
    /// or after deregistration
    NotRegistered,

    /// The object's pixel data is not encapsulated
    NotEncapsulated,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
