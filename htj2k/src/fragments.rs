//! Encapsulated pixel data and the frame to fragment mapping.
//!
//! Encapsulated pixel data is a sequence of items.
//! Item 0 holds the basic offset table,
//! possibly empty,
//! and the remaining items are fragments of the frames' codestreams.
//! A frame may span several consecutive fragments,
//! and nothing in the fragments themselves says where a frame ends.
//! [`resolve`] reconstructs that mapping,
//! from the offset table when it can be trusted
//! or by looking for the start of each codestream otherwise.

use crate::codestream::starts_with_codestream;
use crate::error::{Result, UndeterminedFragmentsSnafu};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::OptionExt;
use tracing::{debug, warn};

/// The size of an item header in the encapsulated pixel data
pub const ITEM_HEADER_LEN: u64 = 8;

/// Encapsulated pixel data:
/// the basic offset table followed by the data fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentedStream {
    /// item 0 is the offset table
    items: Vec<Vec<u8>>,
}

impl Default for FragmentedStream {
    fn default() -> Self {
        FragmentedStream {
            items: vec![Vec::new()],
        }
    }
}

impl FragmentedStream {
    /// Create encapsulated pixel data
    /// with an empty offset table and no fragments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create encapsulated pixel data
    /// from an already parsed offset table and the data fragments.
    pub fn from_parts<I>(offset_table: &[u32], fragments: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut table = vec![0; offset_table.len() * 4];
        LittleEndian::write_u32_into(offset_table, &mut table);
        let mut items = vec![table];
        items.extend(fragments);
        FragmentedStream { items }
    }

    /// Split into the parsed offset table and the data fragments.
    ///
    /// Trailing bytes of the offset table not forming a complete entry are dropped.
    pub fn into_parts(mut self) -> (Vec<u32>, Vec<Vec<u8>>) {
        let table = self.offset_table_entries();
        self.items.remove(0);
        (table, self.items)
    }

    /// The number of items, including the offset table.
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// The number of data fragments, excluding the offset table.
    pub fn num_fragments(&self) -> usize {
        self.items.len() - 1
    }

    /// Retrieve an item by index, where index 0 is the offset table.
    pub fn item(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index).map(|i| i.as_slice())
    }

    /// The data fragments, excluding the offset table.
    pub fn fragments(&self) -> &[Vec<u8>] {
        &self.items[1..]
    }

    /// The raw bytes of the basic offset table.
    pub fn offset_table_bytes(&self) -> &[u8] {
        &self.items[0]
    }

    /// The entries of the basic offset table.
    pub fn offset_table_entries(&self) -> Vec<u32> {
        self.items[0]
            .chunks_exact(4)
            .map(LittleEndian::read_u32)
            .collect()
    }

    /// Replace the raw bytes of the basic offset table.
    pub fn set_offset_table_bytes(&mut self, table: Vec<u8>) {
        self.items[0] = table;
    }

    /// Append a data fragment.
    pub fn push_fragment(&mut self, fragment: Vec<u8>) {
        self.items.push(fragment);
    }

    /// The offset table entries,
    /// if the table holds exactly one 32-bit entry per frame.
    fn well_formed_offset_table(&self, frame_count: u32) -> Option<Vec<u32>> {
        let table = self.offset_table_bytes();
        if table.is_empty() {
            return None;
        }
        if table.len() as u64 != u64::from(frame_count) * 4 {
            warn!(
                "Ignoring basic offset table of {} bytes for {} frames",
                table.len(),
                frame_count
            );
            return None;
        }
        Some(self.offset_table_entries())
    }

    /// The index of the fragment starting at the given offset,
    /// measured from the first fragment and counting item headers.
    fn fragment_at_offset(&self, offset: u32) -> Option<usize> {
        let offset = u64::from(offset);
        let mut position = 0;
        for (index, fragment) in self.items.iter().enumerate().skip(1) {
            if position == offset {
                return Some(index);
            }
            if position > offset {
                break;
            }
            position += fragment.len() as u64 + ITEM_HEADER_LEN;
        }
        None
    }

    /// Concatenate the payload of a range of fragments.
    pub fn concat(&self, range: FragmentRange) -> Vec<u8> {
        let fragments = self.items.get(range.first..range.end()).unwrap_or(&[]);
        let mut data = Vec::with_capacity(fragments.iter().map(Vec::len).sum());
        for fragment in fragments {
            data.extend_from_slice(fragment);
        }
        data
    }
}

/// A contiguous range of fragments holding one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FragmentRange {
    /// index of the first item, never 0
    pub first: usize,
    /// number of items, at least 1
    pub count: usize,
}

impl FragmentRange {
    /// The item index just after this range,
    /// where the next frame starts.
    pub fn end(&self) -> usize {
        self.first + self.count
    }
}

/// Determine the number of fragments of a frame
/// starting at item `start`.
///
/// Returns `None` if no strategy could tell.
fn fragment_count(
    frame: u32,
    frame_count: u32,
    start: usize,
    stream: &FragmentedStream,
    trust_offset_table: bool,
) -> Option<usize> {
    let num_items = stream.num_items();
    if start == 0 || start >= num_items {
        return None;
    }

    // the frame takes everything that is left
    if frame_count <= 1 || frame + 1 >= frame_count {
        return Some(num_items - start);
    }

    // one fragment per frame
    if frame_count as usize + 1 == num_items {
        return Some(1);
    }

    if trust_offset_table {
        if let Some(next) = stream
            .well_formed_offset_table(frame_count)
            .and_then(|table| table.get(frame as usize + 1).copied())
        {
            match stream.fragment_at_offset(next) {
                Some(next_start) if next_start > start => return Some(next_start - start),
                _ => warn!(
                    "Basic offset table entry {} does not lead to a fragment after #{}, scanning for codestream",
                    next, start
                ),
            }
        }
    }

    // look for the start of the next codestream
    (start + 1..num_items)
        .find(|&index| stream.item(index).is_some_and(starts_with_codestream))
        .map(|next_start| next_start - start)
}

/// Determine the item where a frame starts
/// when no hint is available.
fn start_fragment(
    frame: u32,
    frame_count: u32,
    stream: &FragmentedStream,
    trust_offset_table: bool,
) -> Option<usize> {
    if frame == 0 {
        return Some(1);
    }

    if trust_offset_table {
        if let Some(index) = stream
            .well_formed_offset_table(frame_count)
            .and_then(|table| table.get(frame as usize).copied())
            .and_then(|offset| stream.fragment_at_offset(offset))
        {
            return Some(index);
        }
    }

    // walk through all previous frames
    let mut start = 1;
    for f in 0..frame {
        start += fragment_count(f, frame_count, start, stream, trust_offset_table)?;
    }
    Some(start)
}

/// Determine which fragments hold the codestream of a frame.
///
/// `start_hint` is the item where the frame is known to start,
/// or 0 if unknown.
/// When decoding frames in increasing order,
/// the [end](FragmentRange::end) of the previous frame's range
/// is the best hint for the next one.
///
/// The strategies, in order of preference:
/// the last frame (or a single frame) takes all remaining fragments;
/// with as many fragments as frames, each frame has one fragment;
/// a well-formed and trusted offset table tells where the next frame starts;
/// otherwise the next fragment starting with a codestream header
/// is taken as the start of the next frame.
///
/// The last strategy may be fooled by a fragment
/// which happens to start with the codestream marker sequence
/// in the middle of entropy coded data.
pub fn resolve(
    frame: u32,
    frame_count: u32,
    start_hint: usize,
    stream: &FragmentedStream,
    trust_offset_table: bool,
) -> Result<FragmentRange> {
    let first = if start_hint == 0 {
        start_fragment(frame, frame_count, stream, trust_offset_table)
    } else {
        Some(start_hint)
    }
    .context(UndeterminedFragmentsSnafu { frame })?;

    let count = fragment_count(frame, frame_count, first, stream, trust_offset_table)
        .filter(|&count| count > 0)
        .context(UndeterminedFragmentsSnafu { frame })?;

    debug!(
        "Frame #{} spans {} fragment(s) starting at item #{}",
        frame, count, first
    );
    Ok(FragmentRange { first, count })
}
