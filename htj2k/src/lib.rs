//! High-Throughput JPEG 2000 (HTJ2K) support for DICOM pixel data.
//!
//! This crate sits between a DICOM data set and an HTJ2K codestream library.
//! It does not implement the wavelet codec itself,
//! which is plugged in through the [`Codestream`] trait.
//! What it does is:
//!
//! - split the codestreams of a multi-frame image
//!   into the fragments of encapsulated pixel data,
//!   along with the basic offset table
//!   ([`PixelSequenceBuilder`]);
//! - find out which fragments hold each frame when reading,
//!   even if the offset table is missing or cannot be trusted
//!   ([`resolve`]);
//! - convert between native pixel data
//!   (interleaved or planar, 8 or 16 bits, signed or unsigned, any byte order)
//!   and the component sample planes of the codestream library
//!   ([`transcode`]);
//! - choose how to encode an image and
//!   which attributes of the data set change as a result
//!   ([`Htj2kCodec`]).
//!
//! The codecs are obtained from a [`CodecRegistry`],
//! one decoder and one encoder per HTJ2K transfer syntax.
//!
//! # Example
//!
//! Frames built into encapsulated pixel data
//! can be located again,
//! with or without the help of the offset table.
//!
//! ```
//! # use dicom_htj2k::{resolve, PixelSequenceBuilder};
//! // 3 frames, each starting with the SOC and SIZ markers
//! let frames = [
//!     vec![0xFF, 0x4F, 0xFF, 0x51, 0x01, 0x02, 0xFF, 0xD9],
//!     vec![0xFF, 0x4F, 0xFF, 0x51, 0x03, 0xFF, 0xD9],
//!     vec![0xFF, 0x4F, 0xFF, 0x51, 0x04, 0x05, 0x06, 0x07, 0xFF, 0xD9],
//! ];
//! let mut builder = PixelSequenceBuilder::new(4, false);
//! for frame in &frames {
//!     builder.push_frame(frame)?;
//! }
//! let stream = builder.finish();
//!
//! let mut start = 1;
//! for frame in 0..3 {
//!     let range = resolve(frame, 3, start, &stream, true)?;
//!     let codestream = stream.concat(range);
//!     assert!(codestream.starts_with(&[0xFF, 0x4F, 0xFF, 0x51]));
//!     start = range.end();
//! }
//! # Ok::<(), dicom_htj2k::Error>(())
//! ```
//!
//! # Features
//!
//! - `object`: read attributes from and write pixel data to
//!   [`InMemDicomObject`](dicom_object::InMemDicomObject) values.
//! - `openjp2` or `openjpeg-sys`: a decode-only codestream library
//!   based on OpenJPEG, see the [`adapters`] module.

// Check jpeg2k backend conflicts
#[cfg(all(feature = "openjp2", feature = "openjpeg-sys"))]
compile_error!(
    "feature \"openjp2\" and feature \"openjpeg-sys\" cannot be enabled at the same time"
);

pub mod adapters;
pub mod codec;
pub mod codestream;
pub mod color;
pub mod document;
pub mod entries;
mod error;
pub mod fragments;
pub mod geometry;
pub mod layout;
#[cfg(feature = "object")]
pub mod object;
pub mod ops;
pub mod params;
pub mod registry;
pub mod sequence;
pub mod transcode;

pub use crate::codec::{
    CodecRole, DecodedFrame, DecodedImage, EncodedImage, EncodingStrategy, Htj2kCodec,
};
pub use crate::codestream::{Codestream, CodestreamError, CodestreamHeader, ImagePlanes};
pub use crate::document::{ImageDocument, ImageRenderer, StoredPixelRenderer};
pub use crate::entries::Htj2kVariant;
pub use crate::error::{Error, Result};
pub use crate::fragments::{resolve, FragmentRange, FragmentedStream};
pub use crate::geometry::{GeometryDescriptor, PixelRepresentation, PlanarConfiguration};
pub use crate::params::{
    CodecParameters, DecodeOptions, PlanarConfigurationPolicy, ProgressionOrder,
    RepresentationParameters, UidCreation,
};
pub use crate::registry::CodecRegistry;
pub use crate::sequence::PixelSequenceBuilder;

// re-export for configuration
pub use byteordered::Endianness;
