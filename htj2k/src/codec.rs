//! The HTJ2K codecs:
//! one decoder and one encoder for each HTJ2K transfer syntax.
//!
//! Codecs are obtained from a registered [`CodecRegistry`](crate::CodecRegistry),
//! and share its codec parameters and codestream library.
//! Whole-image and single-frame decoding go through
//! the fragment boundary resolver and the frame transcoder,
//! while encoding picks one of two strategies before any compression:
//! the stored pixel cells are either compressed directly ([`EncodingStrategy::Raw`])
//! or through an image renderer ([`EncodingStrategy::Rendered`]).

use crate::codestream::Codestream;
use crate::color;
use crate::document::{ImageDocument, ImageRenderer};
use crate::entries::{is_native_transfer_syntax, Htj2kVariant};
use crate::error::{
    BufferTooSmallSnafu, FrameOutOfRangeSnafu, IllegalOperationSnafu, InvalidAttributeSnafu,
    MissingAttributeSnafu, Result, UnsupportedBitDepthSnafu,
    UnsupportedPhotometricInterpretationSnafu,
};
use crate::fragments::{self, FragmentRange, FragmentedStream};
use crate::geometry::{GeometryDescriptor, PlanarConfiguration};
use crate::ops;
use crate::params::{
    CodecParameters, DecodeOptions, ProgressionOrder, RepresentationParameters, UidCreation,
};
use crate::sequence::PixelSequenceBuilder;
use crate::transcode::{self, FrameEncoding};
use dicom_core::ops::AttributeOp;
use dicom_dictionary_std::tags;
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a codec decodes or encodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CodecRole {
    /// from the HTJ2K transfer syntax to native pixel data
    Decoder,
    /// from native pixel data to the HTJ2K transfer syntax
    Encoder,
}

/// How the pixel data is brought to the codestream library when encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EncodingStrategy {
    /// compress the stored pixel cells as they are
    Raw,
    /// compress the output of the image renderer,
    /// with overlays separated from the image samples
    Rendered,
}

impl EncodingStrategy {
    /// Choose the encoding strategy for an image.
    ///
    /// Near-lossless compression always goes through the renderer,
    /// so that overlay bits are never subjected to lossy coding.
    /// Lossless compression follows `prefer_rendered`,
    /// but switches to the other strategy
    /// if the image cannot be handled by the preferred one.
    pub fn select(
        geometry: &GeometryDescriptor,
        lossless: bool,
        prefer_rendered: bool,
    ) -> Result<Self> {
        let renderable = color::is_renderable(&geometry.photometric_interpretation);

        if !lossless {
            ensure!(
                renderable,
                UnsupportedPhotometricInterpretationSnafu {
                    photometric_interpretation: geometry.photometric_interpretation.clone(),
                }
            );
            return Ok(EncodingStrategy::Rendered);
        }

        if prefer_rendered {
            if renderable {
                return Ok(EncodingStrategy::Rendered);
            }
            warn!(
                "Cannot render photometric interpretation {}, encoding stored pixel cells",
                geometry.photometric_interpretation
            );
            return Ok(EncodingStrategy::Raw);
        }

        if geometry.bits_allocated == 8 || geometry.bits_allocated == 16 {
            return Ok(EncodingStrategy::Raw);
        }
        ensure!(
            renderable,
            UnsupportedBitDepthSnafu {
                bits_allocated: geometry.bits_allocated,
                bits_stored: geometry.bits_stored,
            }
        );
        warn!(
            "Cannot encode {} bits allocated as is, rendering the image first",
            geometry.bits_allocated
        );
        Ok(EncodingStrategy::Rendered)
    }
}

/// The outcome of decoding a whole image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// native pixel data of all frames, padded to even length
    pub data: Vec<u8>,
    /// the number of frames decoded
    pub frames: u32,
    /// the planar configuration of `data`
    pub planar_configuration: PlanarConfiguration,
    /// changes to apply to the document
    pub attribute_ops: Vec<AttributeOp>,
    /// whether the document should receive a new SOP instance UID
    pub new_instance_required: bool,
}

/// The outcome of decoding a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// native pixel data of the frame
    pub data: Vec<u8>,
    /// the fragments which held the frame;
    /// the next frame starts at `fragments.end()`
    pub fragments: FragmentRange,
    /// the planar configuration of `data`
    pub planar_configuration: PlanarConfiguration,
}

/// The outcome of encoding a whole image.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// the encapsulated pixel data
    pub pixel_data: FragmentedStream,
    /// the transfer syntax of the encapsulated pixel data
    pub transfer_syntax: &'static str,
    /// the strategy used
    pub strategy: EncodingStrategy,
    /// uncompressed size (at _Bits Stored_ per sample)
    /// divided by the size of all codestreams
    pub compression_ratio: f64,
    /// changes to apply to the document
    pub attribute_ops: Vec<AttributeOp>,
    /// whether the document should receive a new SOP instance UID
    pub new_instance_required: bool,
}

/// An HTJ2K decoder or encoder for one transfer syntax.
#[derive(Clone)]
pub struct Htj2kCodec {
    variant: Htj2kVariant,
    role: CodecRole,
    params: Arc<CodecParameters>,
    engine: Arc<dyn Codestream + Send + Sync>,
}

impl fmt::Debug for Htj2kCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Htj2kCodec")
            .field("variant", &self.variant)
            .field("role", &self.role)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Htj2kCodec {
    pub(crate) fn new(
        variant: Htj2kVariant,
        role: CodecRole,
        params: Arc<CodecParameters>,
        engine: Arc<dyn Codestream + Send + Sync>,
    ) -> Self {
        Htj2kCodec {
            variant,
            role,
            params,
            engine,
        }
    }

    pub fn variant(&self) -> Htj2kVariant {
        self.variant
    }

    pub fn role(&self) -> CodecRole {
        self.role
    }

    /// The transfer syntax UID decoded or produced by this codec.
    pub fn transfer_syntax(&self) -> &'static str {
        self.variant.uid()
    }

    pub fn parameters(&self) -> &CodecParameters {
        &self.params
    }

    /// Check whether this codec can transcode pixel data
    /// from one transfer syntax to another.
    ///
    /// Decoders go from any HTJ2K transfer syntax to a native one,
    /// while encoders go from a native transfer syntax
    /// to their own HTJ2K transfer syntax.
    pub fn can_change_coding(&self, from: &str, to: &str) -> bool {
        match self.role {
            CodecRole::Decoder => {
                Htj2kVariant::from_uid(from).is_some() && is_native_transfer_syntax(to)
            }
            CodecRole::Encoder => {
                is_native_transfer_syntax(from) && Htj2kVariant::from_uid(to) == Some(self.variant)
            }
        }
    }

    /// Fail with [`IllegalOperation`](crate::Error::IllegalOperation)
    /// unless this codec can transcode between the given transfer syntaxes.
    pub fn ensure_coding(&self, from: &str, to: &str) -> Result<()> {
        ensure!(
            self.can_change_coding(from, to),
            IllegalOperationSnafu {
                operation: match self.role {
                    CodecRole::Decoder => "decoding to a compressed transfer syntax",
                    CodecRole::Encoder if !is_native_transfer_syntax(from) => {
                        "re-encoding compressed pixel data"
                    }
                    CodecRole::Encoder => "encoding to another transfer syntax",
                },
            }
        );
        Ok(())
    }

    fn ensure_role(&self, role: CodecRole, operation: &'static str) -> Result<()> {
        ensure!(self.role == role, IllegalOperationSnafu { operation });
        Ok(())
    }

    /// The number of frames to decode:
    /// _Number Of Frames_, but never more than the available fragments
    /// and never less than 1.
    fn frame_count(&self, geometry: &GeometryDescriptor, stream: &FragmentedStream) -> u32 {
        let fragments = u32::try_from(stream.num_fragments()).unwrap_or(u32::MAX);
        let frames = geometry.number_of_frames.min(fragments).max(1);
        if frames != geometry.number_of_frames {
            warn!(
                "Number of frames is {} but only {} fragment(s) are available, decoding {} frame(s)",
                geometry.number_of_frames, fragments, frames
            );
        }
        frames
    }

    fn decoded_planar_configuration(
        &self,
        document: &dyn ImageDocument,
        geometry: &GeometryDescriptor,
    ) -> Result<PlanarConfiguration> {
        if geometry.samples_per_pixel <= 1 {
            return Ok(PlanarConfiguration::ByPixel);
        }
        let declared = document
            .int(tags::PLANAR_CONFIGURATION)
            .context(InvalidAttributeSnafu {
                name: "PlanarConfiguration",
            })?;
        let sop_class_uid = document
            .text(tags::SOP_CLASS_UID)
            .context(InvalidAttributeSnafu {
                name: "SOPClassUID",
            })?
            .unwrap_or_default();
        Ok(color::resolve_planar_configuration(
            self.params.planar_configuration,
            declared,
            &sop_class_uid,
            &geometry.photometric_interpretation,
        ))
    }

    /// Decode all frames of the encapsulated pixel data.
    ///
    /// Frames are decoded in order,
    /// each one starting at the fragment where the previous one ended.
    pub fn decode(
        &self,
        document: &dyn ImageDocument,
        stream: &FragmentedStream,
        options: &DecodeOptions,
    ) -> Result<DecodedImage> {
        self.ensure_role(CodecRole::Decoder, "decoding with an encoder")?;

        let geometry = GeometryDescriptor::from_document(document)?;
        let frames = self.frame_count(&geometry, stream);
        let planar_configuration = self.decoded_planar_configuration(document, &geometry)?;
        let trust_offset_table = !self.params.ignore_offset_table;

        let mut data = Vec::with_capacity(geometry.frame_len() * frames as usize + 1);
        let mut start = 1;
        for frame in 0..frames {
            let range = fragments::resolve(frame, frames, start, stream, trust_offset_table)?;
            let codestream = stream.concat(range);
            let frame_data = transcode::decode_frame(
                &*self.engine,
                &codestream,
                &geometry,
                planar_configuration,
                options.byte_order,
            )?;
            data.extend_from_slice(&frame_data);
            start = range.end();
        }
        if data.len() % 2 == 1 {
            data.push(0);
        }

        let mut attribute_ops = Vec::new();
        if document.contains(tags::NUMBER_OF_FRAMES) || frames > 1 {
            attribute_ops.push(ops::number_of_frames(frames));
        }
        if geometry.samples_per_pixel > 1 {
            attribute_ops.push(ops::planar_configuration(planar_configuration));
        }

        debug!(
            "Decoded {} frame(s) of {}x{}x{} into {} bytes",
            frames,
            geometry.columns,
            geometry.rows,
            geometry.samples_per_pixel,
            data.len()
        );

        Ok(DecodedImage {
            data,
            frames,
            planar_configuration,
            attribute_ops,
            new_instance_required: self.params.uid_creation == UidCreation::Always,
        })
    }

    /// Decode a single frame of the encapsulated pixel data.
    ///
    /// `start_hint` is the fragment where the frame starts, if known,
    /// or 0 otherwise.
    /// See [`resolve`](crate::resolve) for the limits of random access
    /// without a trusted offset table.
    pub fn decode_frame(
        &self,
        document: &dyn ImageDocument,
        stream: &FragmentedStream,
        frame: u32,
        start_hint: usize,
        options: &DecodeOptions,
    ) -> Result<DecodedFrame> {
        self.ensure_role(CodecRole::Decoder, "decoding with an encoder")?;

        let geometry = GeometryDescriptor::from_document(document)?;
        let frames = self.frame_count(&geometry, stream);
        ensure!(frame < frames, FrameOutOfRangeSnafu { frame, frames });
        let planar_configuration = self.decoded_planar_configuration(document, &geometry)?;

        let range = fragments::resolve(
            frame,
            frames,
            start_hint,
            stream,
            !self.params.ignore_offset_table,
        )?;
        let codestream = stream.concat(range);
        let data = transcode::decode_frame(
            &*self.engine,
            &codestream,
            &geometry,
            planar_configuration,
            options.byte_order,
        )?;

        Ok(DecodedFrame {
            data,
            fragments: range,
            planar_configuration,
        })
    }

    /// The photometric interpretation of the decoded image.
    pub fn determine_decompressed_color_model(
        &self,
        document: &dyn ImageDocument,
    ) -> Result<String> {
        self.ensure_role(CodecRole::Decoder, "determining the color model with an encoder")?;
        document
            .text(tags::PHOTOMETRIC_INTERPRETATION)
            .context(InvalidAttributeSnafu {
                name: "PhotometricInterpretation",
            })?
            .map(|pi| pi.trim().to_string())
            .filter(|pi| !pi.is_empty())
            .context(MissingAttributeSnafu {
                name: "PhotometricInterpretation",
            })
    }

    /// The frame encoding settings of this codec.
    fn frame_encoding(&self, lossless: bool) -> FrameEncoding {
        let params = &self.params;
        FrameEncoding {
            progression_order: self.variant.forced_progression_order().unwrap_or(
                if params.custom_options {
                    params.progression_order
                } else {
                    ProgressionOrder::Lrcp
                },
            ),
            decompositions: params.custom_options.then_some(params.decompositions),
            block_size: params
                .custom_options
                .then_some((params.block_width, params.block_height)),
            reversible: lossless,
        }
    }

    /// Encode all frames of native pixel data.
    ///
    /// `pixel_data` holds the frames of the image described by `document`
    /// in little endian byte order.
    /// The renderer is only used by the rendered strategy.
    pub fn encode(
        &self,
        document: &dyn ImageDocument,
        pixel_data: &[u8],
        representation: &RepresentationParameters,
        renderer: &dyn ImageRenderer,
    ) -> Result<EncodedImage> {
        self.ensure_role(CodecRole::Encoder, "encoding with a decoder")?;

        let geometry = GeometryDescriptor::from_document(document)?;
        let frames = geometry.number_of_frames as usize;
        let frame_len = geometry.frame_len();
        let needed = frame_len as u64 * frames as u64;
        ensure!(
            pixel_data.len() as u64 >= needed,
            BufferTooSmallSnafu {
                needed,
                available: pixel_data.len() as u64,
            }
        );

        let lossless = self.variant.lossless_only() || representation.lossless;
        let strategy =
            EncodingStrategy::select(&geometry, lossless, self.params.prefer_rendered)?;
        let encoding = self.frame_encoding(lossless);
        debug!(
            "Encoding {} frame(s) to {} with the {:?} strategy",
            frames,
            self.variant.name(),
            strategy
        );

        let mut builder =
            PixelSequenceBuilder::new(self.params.fragment_size, self.params.create_offset_table);
        let mut compressed_size = 0;
        let mut attribute_ops = Vec::new();

        match strategy {
            EncodingStrategy::Raw => {
                for frame in pixel_data.chunks_exact(frame_len).take(frames) {
                    let codestream =
                        transcode::encode_frame(&*self.engine, frame, &geometry, &encoding)?;
                    compressed_size += codestream.len();
                    builder.push_frame(&codestream)?;
                }
            }
            EncodingStrategy::Rendered => {
                let image = renderer.render(document, &geometry, pixel_data)?;
                for planes in &image.frames {
                    let codestream = transcode::encode_planes(
                        &*self.engine,
                        planes,
                        image.depth,
                        image.signed,
                        &encoding,
                    )?;
                    compressed_size += codestream.len();
                    builder.push_frame(&codestream)?;
                }
                attribute_ops.extend(ops::rendered_geometry(&image));
                attribute_ops.extend(ops::overlays(&image.overlays));
            }
        }

        let compression_ratio = if compressed_size > 0 {
            geometry.stored_size() / compressed_size as f64
        } else {
            0.
        };

        if !lossless {
            attribute_ops.extend(ops::lossy_compression(document, compression_ratio)?);
        }

        let new_instance_required = match self.params.uid_creation {
            UidCreation::Always => true,
            UidCreation::Default => !lossless,
            UidCreation::Never => false,
        };

        debug!(
            "Encoded {} frame(s) into {} bytes of codestream, compression ratio {:.3}",
            builder.frames(),
            compressed_size,
            compression_ratio
        );

        Ok(EncodedImage {
            pixel_data: builder.finish(),
            transfer_syntax: self.variant.uid(),
            strategy,
            compression_ratio,
            attribute_ops,
            new_instance_required,
        })
    }
}
