//! Sample layouts of native frame buffers.
//!
//! A native frame holds `rows × columns × samples per pixel` samples
//! of 1 or 2 bytes each,
//! either interleaved per pixel or grouped in one plane per component.
//! [`SampleLayout`] maps a (component, row) pair
//! to a start offset and a stride in the frame buffer,
//! so that lines of one component can be read or written
//! without manual offset arithmetic at the call site.

use crate::geometry::{GeometryDescriptor, PlanarConfiguration};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;

/// The arrangement of samples in a native frame buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SampleLayout {
    columns: usize,
    rows: usize,
    samples_per_pixel: usize,
    bytes_per_sample: usize,
    planar_configuration: PlanarConfiguration,
}

impl SampleLayout {
    /// Create a sample layout.
    ///
    /// `bytes_per_sample` is expected to be 1 or 2.
    pub fn new(
        columns: u16,
        rows: u16,
        samples_per_pixel: u16,
        bytes_per_sample: usize,
        planar_configuration: PlanarConfiguration,
    ) -> Self {
        SampleLayout {
            columns: columns.into(),
            rows: rows.into(),
            samples_per_pixel: samples_per_pixel.into(),
            bytes_per_sample,
            planar_configuration,
        }
    }

    /// The layout of a native frame of the given geometry.
    ///
    /// Single component images are always treated as interleaved.
    pub fn from_geometry(
        geometry: &GeometryDescriptor,
        planar_configuration: PlanarConfiguration,
    ) -> Self {
        let planar_configuration = if geometry.samples_per_pixel > 1 {
            planar_configuration
        } else {
            PlanarConfiguration::ByPixel
        };
        SampleLayout::new(
            geometry.columns,
            geometry.rows,
            geometry.samples_per_pixel,
            geometry.bytes_per_sample(),
            planar_configuration,
        )
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bytes_per_sample
    }

    /// The number of bytes of one frame in this layout.
    pub fn frame_len(&self) -> usize {
        self.columns * self.rows * self.samples_per_pixel * self.bytes_per_sample
    }

    /// Byte offset of the first sample of a component line,
    /// and the byte distance between consecutive samples of that line.
    fn line_span(&self, component: usize, row: usize) -> (usize, usize) {
        let bps = self.bytes_per_sample;
        match self.planar_configuration {
            PlanarConfiguration::ByPixel => (
                (row * self.columns * self.samples_per_pixel + component) * bps,
                self.samples_per_pixel * bps,
            ),
            PlanarConfiguration::ByPlane => (
                (component * self.rows * self.columns + row * self.columns) * bps,
                bps,
            ),
        }
    }

    /// Obtain a read-only view over a frame buffer.
    ///
    /// Returns `None` if the buffer is shorter than one frame.
    pub fn view<'a>(&self, data: &'a [u8]) -> Option<FrameView<'a>> {
        let data = data.get(..self.frame_len())?;
        Some(FrameView { layout: *self, data })
    }

    /// Obtain a writable view over a frame buffer.
    ///
    /// Returns `None` if the buffer is shorter than one frame.
    pub fn view_mut<'a>(&self, data: &'a mut [u8]) -> Option<FrameViewMut<'a>> {
        let len = self.frame_len();
        let data = data.get_mut(..len)?;
        Some(FrameViewMut { layout: *self, data })
    }
}

/// A frame buffer checked against its sample layout.
#[derive(Debug, Copy, Clone)]
pub struct FrameView<'a> {
    layout: SampleLayout,
    data: &'a [u8],
}

impl FrameView<'_> {
    /// Read one line of samples of one component,
    /// widened to 32 bits.
    ///
    /// At most `out.len()` samples are read.
    /// Lines outside of the frame leave `out` untouched.
    pub fn read_line(
        &self,
        component: u16,
        row: u32,
        signed: bool,
        byte_order: Endianness,
        out: &mut [i32],
    ) {
        let layout = &self.layout;
        if usize::from(component) >= layout.samples_per_pixel || row as usize >= layout.rows {
            return;
        }
        let (start, stride) = layout.line_span(component.into(), row as usize);
        let samples = self.data[start..]
            .chunks(layout.bytes_per_sample)
            .step_by(stride / layout.bytes_per_sample)
            .take(layout.columns);

        match (layout.bytes_per_sample, signed) {
            (1, false) => {
                for (o, s) in out.iter_mut().zip(samples) {
                    *o = i32::from(s[0]);
                }
            }
            (1, true) => {
                for (o, s) in out.iter_mut().zip(samples) {
                    *o = i32::from(s[0] as i8);
                }
            }
            (_, signed) => {
                for (o, s) in out.iter_mut().zip(samples) {
                    let v = read_u16(byte_order, s);
                    *o = if signed {
                        i32::from(v as i16)
                    } else {
                        i32::from(v)
                    };
                }
            }
        }
    }
}

/// A writable frame buffer checked against its sample layout.
#[derive(Debug)]
pub struct FrameViewMut<'a> {
    layout: SampleLayout,
    data: &'a mut [u8],
}

impl FrameViewMut<'_> {
    /// Write one line of samples of one component,
    /// truncating each sample to the layout's sample width.
    ///
    /// Lines outside of the frame are ignored.
    pub fn write_line(&mut self, component: u16, row: u32, byte_order: Endianness, line: &[i32]) {
        let layout = self.layout;
        if usize::from(component) >= layout.samples_per_pixel || row as usize >= layout.rows {
            return;
        }
        let (start, stride) = layout.line_span(component.into(), row as usize);
        let samples = self.data[start..]
            .chunks_mut(layout.bytes_per_sample)
            .step_by(stride / layout.bytes_per_sample)
            .take(layout.columns);

        if layout.bytes_per_sample == 1 {
            for (s, v) in samples.zip(line) {
                s[0] = *v as u8;
            }
        } else {
            for (s, v) in samples.zip(line) {
                write_u16(byte_order, s, *v as u16);
            }
        }
    }
}

fn read_u16(byte_order: Endianness, bytes: &[u8]) -> u16 {
    match (byte_order, bytes) {
        (Endianness::Little, [lo, hi, ..]) => u16::from(*lo) | u16::from(*hi) << 8,
        (Endianness::Big, [hi, lo, ..]) => u16::from(*lo) | u16::from(*hi) << 8,
        (_, [b]) => u16::from(*b),
        (_, []) => 0,
    }
}

fn write_u16(byte_order: Endianness, bytes: &mut [u8], value: u16) {
    if bytes.len() < 2 {
        return;
    }
    match byte_order {
        Endianness::Little => LittleEndian::write_u16(bytes, value),
        Endianness::Big => BigEndian::write_u16(bytes, value),
    }
}

/// Convert a frame with one plane per component
/// into a frame with samples interleaved per pixel.
///
/// Trailing bytes not forming a complete frame are left out.
pub fn interleave(planar: &[u8], samples_per_pixel: usize, bytes_per_sample: usize) -> Vec<u8> {
    let pixel = samples_per_pixel * bytes_per_sample;
    if pixel == 0 {
        return Vec::new();
    }
    let pixels = planar.len() / pixel;
    let plane_len = pixels * bytes_per_sample;
    let mut out = vec![0; pixels * pixel];
    for (component, plane) in planar
        .chunks_exact(plane_len.max(1))
        .take(samples_per_pixel)
        .enumerate()
    {
        let offset = component * bytes_per_sample;
        for (dst, src) in out
            .chunks_exact_mut(pixel)
            .zip(plane.chunks_exact(bytes_per_sample))
        {
            dst[offset..offset + bytes_per_sample].copy_from_slice(src);
        }
    }
    out
}

/// Convert a frame with samples interleaved per pixel
/// into a frame with one plane per component.
///
/// Trailing bytes not forming a complete pixel are left out.
pub fn deinterleave(
    interleaved: &[u8],
    samples_per_pixel: usize,
    bytes_per_sample: usize,
) -> Vec<u8> {
    let pixel = samples_per_pixel * bytes_per_sample;
    if pixel == 0 {
        return Vec::new();
    }
    let pixels = interleaved.len() / pixel;
    let plane_len = pixels * bytes_per_sample;
    let mut out = vec![0; pixels * pixel];
    for (component, plane) in out
        .chunks_exact_mut(plane_len.max(1))
        .take(samples_per_pixel)
        .enumerate()
    {
        let offset = component * bytes_per_sample;
        for (dst, src) in plane
            .chunks_exact_mut(bytes_per_sample)
            .zip(interleaved.chunks_exact(pixel))
        {
            dst.copy_from_slice(&src[offset..offset + bytes_per_sample]);
        }
    }
    out
}
