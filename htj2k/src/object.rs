//! Integration with in-memory DICOM objects.
//!
//! [`InMemDicomObject`] values can be used directly as an [`ImageDocument`],
//! and their _Pixel Data_ converted to and from a [`FragmentedStream`].
//! Attribute operations returned by the codecs
//! are applied with [`apply_ops`](crate::ops::apply_ops).

use crate::document::{ImageDocument, MalformedAttribute};
use crate::error::{NotEncapsulatedSnafu, Result};
use crate::fragments::FragmentedStream;
use dicom_core::value::{PixelFragmentSequence, Value};
use dicom_core::{DataDictionary, DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemFragment;
use dicom_object::InMemDicomObject;
use snafu::OptionExt;
use std::borrow::Cow;

fn is_blank<D>(object: &InMemDicomObject<D>, tag: Tag) -> Option<bool>
where
    D: DataDictionary + Clone,
{
    let element = object.element(tag).ok()?;
    Some(match element.value() {
        Value::Primitive(PrimitiveValue::Empty) => true,
        Value::Primitive(value) => value
            .to_str()
            .trim_end_matches([' ', '\0'])
            .trim_start()
            .is_empty(),
        _ => false,
    })
}

impl<D> ImageDocument for InMemDicomObject<D>
where
    D: DataDictionary + Clone,
{
    fn int(&self, tag: Tag) -> Result<Option<i64>, MalformedAttribute> {
        match is_blank(self, tag) {
            None | Some(true) => Ok(None),
            Some(false) => self
                .element(tag)
                .ok()
                .map(|e| e.to_int::<i64>())
                .transpose()
                .map_err(|_| MalformedAttribute { tag }),
        }
    }

    fn text(&self, tag: Tag) -> Result<Option<Cow<'_, str>>, MalformedAttribute> {
        let Ok(element) = self.element(tag) else {
            return Ok(None);
        };
        let text = element.to_str().map_err(|_| MalformedAttribute { tag })?;
        Ok(Some(match text {
            Cow::Borrowed(text) => Cow::Borrowed(text.trim_end_matches([' ', '\0'])),
            Cow::Owned(text) => Cow::Owned(text.trim_end_matches([' ', '\0']).to_string()),
        }))
    }

    fn contains(&self, tag: Tag) -> bool {
        self.element(tag).is_ok()
    }
}

/// Take a copy of the encapsulated _Pixel Data_ of an object.
///
/// Fails with `NotEncapsulated` if the object has no pixel data
/// or the pixel data is in native form.
pub fn fragmented_stream<D>(object: &InMemDicomObject<D>) -> Result<FragmentedStream>
where
    D: DataDictionary + Clone,
{
    let value = object
        .element(tags::PIXEL_DATA)
        .ok()
        .map(|e| e.value())
        .context(NotEncapsulatedSnafu)?;
    let offset_table = value.offset_table().context(NotEncapsulatedSnafu)?;
    let fragments = value.fragments().context(NotEncapsulatedSnafu)?;
    Ok(FragmentedStream::from_parts(
        offset_table,
        fragments.iter().cloned(),
    ))
}

/// Replace the _Pixel Data_ of an object with encapsulated pixel data.
pub fn put_pixel_sequence<D>(object: &mut InMemDicomObject<D>, stream: FragmentedStream)
where
    D: DataDictionary + Clone,
{
    let (offset_table, fragments) = stream.into_parts();
    let sequence: PixelFragmentSequence<InMemFragment> =
        PixelFragmentSequence::new(offset_table, fragments);
    object.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        Value::PixelSequence(sequence),
    ));
}

/// Replace the _Pixel Data_ of an object with native pixel data.
///
/// Cells wider than 8 bits are recorded as `OW`.
pub fn put_native_pixel_data<D>(
    object: &mut InMemDicomObject<D>,
    data: Vec<u8>,
    bits_allocated: u16,
) where
    D: DataDictionary + Clone,
{
    let vr = if bits_allocated > 8 { VR::OW } else { VR::OB };
    object.put(DataElement::new(
        tags::PIXEL_DATA,
        vr,
        PrimitiveValue::from(data),
    ));
}
