//! Assembly of encapsulated pixel data during encoding.

use crate::error::{OffsetOverflowSnafu, Result};
use crate::fragments::{FragmentRange, FragmentedStream, ITEM_HEADER_LEN};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::OptionExt;
use tracing::debug;

/// Accumulates compressed frames into encapsulated pixel data.
///
/// Frames must be pushed in order.
/// Each frame is split into fragments of at most `fragment_size` bytes
/// (rounded down to an even number, at least 2),
/// or kept in a single fragment if `fragment_size` is 0.
/// Fragments of odd length are padded with a trailing zero byte.
///
/// # Example
///
/// ```
/// # use dicom_htj2k::PixelSequenceBuilder;
/// let mut builder = PixelSequenceBuilder::new(4, true);
/// builder.push_frame(&[0xFF, 0x4F, 0xFF, 0x51, 0xFF, 0xD9])?;
/// builder.push_frame(&[0xFF, 0x4F, 0xFF, 0x51, 0x00, 0xFF, 0xD9])?;
/// let stream = builder.finish();
///
/// assert_eq!(stream.offset_table_entries(), vec![0, 22]);
/// assert_eq!(stream.num_fragments(), 4);
/// // odd fragments are padded to even length
/// assert_eq!(stream.fragments()[3], vec![0x00, 0xFF, 0xD9, 0x00]);
/// # Ok::<(), dicom_htj2k::Error>(())
/// ```
#[derive(Debug)]
pub struct PixelSequenceBuilder {
    fragment_size: usize,
    offset_table: bool,
    stream: FragmentedStream,
    offsets: Vec<u32>,
    position: u64,
}

impl PixelSequenceBuilder {
    /// Create a builder with the given fragment size limit in bytes
    /// (0 for no limit),
    /// and whether to fill in the basic offset table.
    pub fn new(fragment_size: u32, offset_table: bool) -> Self {
        let fragment_size = fragment_size as usize;
        PixelSequenceBuilder {
            fragment_size: match fragment_size {
                0 => 0,
                size => (size - size % 2).max(2),
            },
            offset_table,
            stream: FragmentedStream::new(),
            offsets: Vec::new(),
            position: 0,
        }
    }

    /// The number of frames pushed so far.
    pub fn frames(&self) -> usize {
        self.offsets.len()
    }

    /// Append the codestream of the next frame,
    /// returning the fragments which now hold it.
    pub fn push_frame(&mut self, codestream: &[u8]) -> Result<FragmentRange> {
        let frame = self.offsets.len() as u32;
        let offset = u32::try_from(self.position)
            .ok()
            .context(OffsetOverflowSnafu { frame })?;
        self.offsets.push(offset);

        let first = self.stream.num_items();
        let chunk_size = if self.fragment_size == 0 {
            codestream.len().max(1)
        } else {
            self.fragment_size
        };

        let mut count = 0;
        if codestream.is_empty() {
            self.stream.push_fragment(Vec::new());
            self.position += ITEM_HEADER_LEN;
            count = 1;
        }
        for chunk in codestream.chunks(chunk_size) {
            let mut fragment = chunk.to_vec();
            if fragment.len() % 2 == 1 {
                fragment.push(0);
            }
            self.position += fragment.len() as u64 + ITEM_HEADER_LEN;
            self.stream.push_fragment(fragment);
            count += 1;
        }

        debug!(
            "Frame #{} of {} bytes stored in {} fragment(s) at offset {}",
            frame,
            codestream.len(),
            count,
            offset
        );
        Ok(FragmentRange { first, count })
    }

    /// Finish the encapsulated pixel data,
    /// writing the basic offset table if enabled.
    pub fn finish(mut self) -> FragmentedStream {
        if self.offset_table {
            let mut table = vec![0; self.offsets.len() * 4];
            LittleEndian::write_u32_into(&self.offsets, &mut table);
            self.stream.set_offset_table_bytes(table);
        }
        self.stream
    }
}
