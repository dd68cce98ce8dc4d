//! HTJ2K decoding through OpenJPEG, via the `jpeg2k` crate.
//!
//! OpenJPEG reads HTJ2K codestreams but cannot write them,
//! so [`Jpeg2kCodestream`] only decodes.

use crate::codestream::{
    Codestream, CodestreamError, CodestreamHeader, CodingParameters, ImagePlanes,
};
use jpeg2k::Image;
use tracing::warn;

/// Codestream library backed by OpenJPEG.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Jpeg2kCodestream;

impl Codestream for Jpeg2kCodestream {
    fn read_header(&self, data: &[u8]) -> Result<CodestreamHeader, CodestreamError> {
        CodestreamHeader::from_siz(data)
            .ok_or_else(|| "missing or truncated SIZ marker segment".into())
    }

    fn decompress(&self, data: &[u8]) -> Result<ImagePlanes, CodestreamError> {
        let image = Image::from_bytes(data)?;
        let width = image.width();
        let height = image.height();

        // Note: `get_pixels` is not used
        // because it narrows the samples down to 8 bits
        let planes = image
            .components()
            .iter()
            .enumerate()
            .map(|(i, component)| {
                if component.width() != width || component.height() != height {
                    warn!(
                        "Component #{} is subsampled ({}x{} in a {}x{} image)",
                        i,
                        component.width(),
                        component.height(),
                        width,
                        height
                    );
                }
                component.data().to_vec()
            })
            .collect();

        ImagePlanes::from_planes(width, height, planes)
            .ok_or_else(|| "subsampled image components are not supported".into())
    }

    fn compress(
        &self,
        _params: &CodingParameters,
        _image: &ImagePlanes,
    ) -> Result<Vec<u8>, CodestreamError> {
        Err("HTJ2K encoding is not supported by OpenJPEG".into())
    }
}
