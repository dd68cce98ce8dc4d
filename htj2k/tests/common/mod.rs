//! Utility module for testing the HTJ2K codecs
//! without a real codestream library.
#![allow(dead_code)]

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_htj2k::codestream::{
    Codestream, CodestreamError, CodestreamHeader, CodingParameters, ImagePlanes,
};
use dicom_htj2k::document::{ImageDocument, MalformedAttribute};
use dicom_htj2k::ProgressionOrder;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A test image document.
///
/// Attributes are kept as text, the way they would be found in a data set.
#[derive(Debug, Clone)]
pub struct TestImage {
    attributes: BTreeMap<Tag, String>,
}

impl TestImage {
    /// A single frame image with unsigned samples
    /// and all bits allocated in use.
    pub fn new(rows: u16, columns: u16, samples_per_pixel: u16, bits_allocated: u16) -> Self {
        let photometric_interpretation = if samples_per_pixel == 1 {
            "MONOCHROME2"
        } else {
            "RGB"
        };
        TestImage {
            attributes: BTreeMap::new(),
        }
        .with(tags::ROWS, rows)
        .with(tags::COLUMNS, columns)
        .with(tags::SAMPLES_PER_PIXEL, samples_per_pixel)
        .with(tags::BITS_ALLOCATED, bits_allocated)
        .with(tags::BITS_STORED, bits_allocated)
        .with(tags::HIGH_BIT, bits_allocated - 1)
        .with(tags::PIXEL_REPRESENTATION, 0)
        .with(tags::PHOTOMETRIC_INTERPRETATION, photometric_interpretation)
    }

    pub fn with(mut self, tag: Tag, value: impl ToString) -> Self {
        self.attributes.insert(tag, value.to_string());
        self
    }

    pub fn without(mut self, tag: Tag) -> Self {
        self.attributes.remove(&tag);
        self
    }
}

impl ImageDocument for TestImage {
    fn int(&self, tag: Tag) -> Result<Option<i64>, MalformedAttribute> {
        match self.attributes.get(&tag).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| MalformedAttribute { tag }),
        }
    }

    fn text(&self, tag: Tag) -> Result<Option<Cow<'_, str>>, MalformedAttribute> {
        Ok(self
            .attributes
            .get(&tag)
            .map(|v| Cow::Borrowed(v.trim_end_matches([' ', '\0']))))
    }

    fn contains(&self, tag: Tag) -> bool {
        self.attributes.contains_key(&tag)
    }
}

const SOC: [u8; 2] = [0xFF, 0x4F];
const SIZ: [u8; 2] = [0xFF, 0x51];
const COD: [u8; 2] = [0xFF, 0x52];
const SOD: [u8; 2] = [0xFF, 0x93];
const EOC: [u8; 2] = [0xFF, 0xD9];

/// Length of the COD marker segment, marker included.
const COD_LEN: usize = 14;

/// A codestream library producing well-formed main headers
/// (SOC, SIZ and COD marker segments)
/// followed by the samples stored verbatim
/// as 32-bit little endian values, one component after the other.
///
/// Decompression rejects codestreams with trailing bytes.
#[derive(Debug, Default, Copy, Clone)]
pub struct FixtureCodestream;

/// Position of the COD marker in a fixture codestream.
fn cod_position(codestream: &[u8]) -> Option<usize> {
    let lsiz = u16::from_be_bytes([*codestream.get(4)?, *codestream.get(5)?]);
    let position = 4 + usize::from(lsiz);
    (codestream.get(position..position + 2)? == COD).then_some(position)
}

fn cod_field(codestream: &[u8], offset: usize) -> Option<u8> {
    codestream.get(cod_position(codestream)? + offset).copied()
}

/// Read the progression order from the COD marker segment.
pub fn progression_order(codestream: &[u8]) -> Option<ProgressionOrder> {
    ProgressionOrder::from_code(cod_field(codestream, 5)?)
}

/// Read whether the multi-component transform is in use.
pub fn color_transform(codestream: &[u8]) -> Option<bool> {
    cod_field(codestream, 8).map(|mct| mct == 1)
}

/// Read the number of decomposition levels.
pub fn decompositions(codestream: &[u8]) -> Option<u8> {
    cod_field(codestream, 9)
}

/// Read the code block width and height.
pub fn block_size(codestream: &[u8]) -> Option<(u16, u16)> {
    let xcb = cod_field(codestream, 10)?;
    let ycb = cod_field(codestream, 11)?;
    Some((1 << (xcb + 2), 1 << (ycb + 2)))
}

/// Read whether the reversible wavelet transform is in use.
pub fn reversible(codestream: &[u8]) -> Option<bool> {
    cod_field(codestream, 13).map(|transform| transform == 1)
}

fn exponent(size: u16) -> u8 {
    (size.max(4).trailing_zeros() as u8).saturating_sub(2)
}

impl Codestream for FixtureCodestream {
    fn read_header(&self, data: &[u8]) -> Result<CodestreamHeader, CodestreamError> {
        CodestreamHeader::from_siz(data).ok_or_else(|| "bad SIZ marker segment".into())
    }

    fn decompress(&self, data: &[u8]) -> Result<ImagePlanes, CodestreamError> {
        let header = self.read_header(data)?;
        let cod = cod_position(data).ok_or("missing COD marker segment")?;
        let start = cod + COD_LEN + 2;
        if data.get(cod + COD_LEN..start) != Some(&SOD[..]) {
            return Err("missing SOD marker".into());
        }
        let len = header.width as usize * header.height as usize;
        let end = start + len * usize::from(header.components) * 4;
        if data.len() != end + 2 || !data.ends_with(&EOC) {
            return Err(format!(
                "expected {} bytes ending in EOC, found {} bytes",
                end + 2,
                data.len()
            )
            .into());
        }
        let planes = data[start..end]
            .chunks((len * 4).max(1))
            .map(|plane| {
                plane
                    .chunks_exact(4)
                    .map(|s| i32::from_le_bytes([s[0], s[1], s[2], s[3]]))
                    .collect()
            })
            .collect();
        ImagePlanes::from_planes(header.width, header.height, planes)
            .ok_or_else(|| "inconsistent sample planes".into())
    }

    fn compress(
        &self,
        params: &CodingParameters,
        image: &ImagePlanes,
    ) -> Result<Vec<u8>, CodestreamError> {
        if image.components() != params.components
            || image.width() != params.width
            || image.height() != params.height
        {
            return Err("image does not match the coding parameters".into());
        }

        let mut data = Vec::new();
        data.extend_from_slice(&SOC);
        data.extend_from_slice(&SIZ);
        // Lsiz, Rsiz
        data.extend_from_slice(&(38 + 3 * params.components).to_be_bytes());
        data.extend_from_slice(&0x4000_u16.to_be_bytes());
        // image and tile size, no offsets
        for value in [params.width, params.height, 0, 0, params.width, params.height, 0, 0] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(&params.components.to_be_bytes());
        let ssiz = (params.bit_depth as u8 - 1) | if params.signed { 0x80 } else { 0 };
        for _ in 0..params.components {
            data.extend_from_slice(&[ssiz, 1, 1]);
        }

        let (block_width, block_height) = params.block_size.unwrap_or((64, 64));
        data.extend_from_slice(&COD);
        data.extend_from_slice(&12_u16.to_be_bytes());
        data.extend_from_slice(&[
            0,
            params.progression_order.code(),
            0,
            1,
            u8::from(params.color_transform),
            params.decompositions,
            exponent(block_width),
            exponent(block_height),
            0x40,
            u8::from(params.reversible),
        ]);

        data.extend_from_slice(&SOD);
        for component in 0..image.components() {
            for sample in image.plane(component).unwrap_or(&[]) {
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }
        data.extend_from_slice(&EOC);
        Ok(data)
    }
}

/// Deterministic 8-bit samples for an image,
/// never forming a codestream marker.
pub fn pattern_u8(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 13) % 251) as u8).collect()
}

/// Deterministic 16-bit samples in little endian,
/// spanning the given number of bits.
pub fn pattern_u16_le(len: usize, bits: u32) -> Vec<u8> {
    let modulo = 1_usize << bits;
    (0..len)
        .flat_map(|i| (((i * 2_741) % modulo) as u16).to_le_bytes())
        .collect()
}
