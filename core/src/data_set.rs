//! In-memory representation of a DICOM data set:
//! the data element record and the ordered tag → element map.

use crate::header::{Length, Tag, VR};
use crate::value::Value;
use snafu::Snafu;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// An error raised when looking up an element
/// which is not present in the data set.
#[derive(Debug, Snafu)]
#[snafu(display("Missing data element {}", tag))]
pub struct MissingElement {
    /// The tag of the absent element.
    pub tag: Tag,
}

/// A DICOM data element as read from (or about to be written to) a
/// data set: tag, value representation, value length, decoded value,
/// and the offsets of the value region in the source buffer.
///
/// Equality compares `(tag, vr, value)` only. Value lengths and source
/// offsets are encoding artifacts; two elements that decode to the same
/// content are the same element.
#[derive(Debug, Clone)]
pub struct Element {
    /// DICOM tag.
    pub tag: Tag,
    /// Value representation.
    pub vr: VR,
    /// Value length as found on the wire.
    pub vl: Length,
    /// The decoded value.
    pub value: Value,
    /// Offset of the first value byte in the source buffer.
    pub start: usize,
    /// Offset one past the last value byte in the source buffer.
    pub end: usize,
}

impl Element {
    /// Create an element with no source offsets,
    /// for values built in memory.
    pub fn new(tag: Tag, vr: VR, value: Value) -> Element {
        Element {
            tag,
            vr,
            vl: Length(0),
            value,
            start: 0,
            end: 0,
        }
    }

    /// The canonical map-key form of the element's tag.
    pub fn key(&self) -> String {
        self.tag.key()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        self.tag == other.tag && self.vr == other.vr && self.value == other.value
    }
}

/// An ordered collection of DICOM data elements, keyed by tag.
///
/// Conforming DICOM streams encode data elements in ascending tag
/// order, so tag order is both parse order and write order; the File
/// Meta group (0002) naturally sorts before the data set proper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    entries: BTreeMap<Tag, Element>,
}

impl DataSet {
    /// Create an empty data set.
    pub fn new() -> DataSet {
        DataSet {
            entries: BTreeMap::new(),
        }
    }

    /// Insert an element, replacing and returning any element
    /// previously stored under the same tag.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        self.entries.insert(element.tag, element)
    }

    /// Remove and return the element with the given tag.
    pub fn remove(&mut self, tag: Tag) -> Option<Element> {
        self.entries.remove(&tag)
    }

    /// Gets a reference to the element with the given tag.
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.entries.get(&tag)
    }

    /// Gets a mutable reference to the element with the given tag.
    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Element> {
        self.entries.get_mut(&tag)
    }

    /// Gets a reference to the element stored under the given
    /// canonical key (e.g. `x7fe00010`).
    pub fn get_by_key(&self, key: &str) -> Option<&Element> {
        Tag::from_key(key).and_then(|tag| self.get(tag))
    }

    /// Gets a reference to the element with the given tag,
    /// or a [`MissingElement`] error.
    pub fn require(&self, tag: Tag) -> Result<&Element, MissingElement> {
        self.get(tag).ok_or(MissingElement { tag })
    }

    /// Whether an element with the given tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// The number of data elements in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the elements in tag order.
    pub fn iter(&self) -> btree_map::Values<'_, Tag, Element> {
        self.entries.values()
    }

    /// Iterate mutably over the elements in tag order.
    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, Tag, Element> {
        self.entries.values_mut()
    }

    /// The first string value of the given element, trimmed of
    /// trailing padding, if the element is present and textual.
    pub fn str_value(&self, tag: Tag) -> Option<&str> {
        self.get(tag)
            .and_then(|e| e.value.first_str())
            .map(|s| s.trim_end_matches(|c: char| c.is_whitespace() || c == '\0'))
    }

    /// The first value of the given element as an unsigned 16-bit
    /// integer, if present and convertible.
    pub fn u16_value(&self, tag: Tag) -> Option<u16> {
        self.get(tag).and_then(|e| e.value.to_u16())
    }

    /// The first value of the given element as an unsigned 32-bit
    /// integer, if present and convertible.
    pub fn u32_value(&self, tag: Tag) -> Option<u32> {
        self.get(tag).and_then(|e| e.value.to_u32())
    }

    /// The first value of the given element as a 64-bit float,
    /// if present and convertible (numeric strings are parsed).
    pub fn f64_value(&self, tag: Tag) -> Option<f64> {
        self.get(tag).and_then(|e| e.value.to_f64())
    }
}

impl IntoIterator for DataSet {
    type Item = Element;
    type IntoIter = btree_map::IntoValues<Tag, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a Element;
    type IntoIter = btree_map::Values<'a, Tag, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl std::iter::FromIterator<Element> for DataSet {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> DataSet {
        let mut set = DataSet::new();
        for element in iter {
            set.insert(element);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn element(group: u16, elem: u16, value: Value) -> Element {
        Element::new(Tag(group, elem), VR::LO, value)
    }

    #[test]
    fn iteration_is_in_tag_order() {
        let mut set = DataSet::new();
        set.insert(element(0x0028, 0x0010, Value::from(2u16)));
        set.insert(element(0x0002, 0x0010, Value::from("1.2.840.10008.1.2")));
        set.insert(element(0x0008, 0x0060, Value::from("MR")));

        let tags: Vec<Tag> = set.iter().map(|e| e.tag).collect();
        assert_eq!(
            tags,
            vec![Tag(0x0002, 0x0010), Tag(0x0008, 0x0060), Tag(0x0028, 0x0010)]
        );
    }

    #[test]
    fn equality_ignores_offsets() {
        let mut a = element(0x0008, 0x0060, Value::from("CT"));
        a.start = 100;
        a.end = 102;
        a.vl = Length(2);
        let b = element(0x0008, 0x0060, Value::from("CT"));
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_by_canonical_key() {
        let mut set = DataSet::new();
        set.insert(element(0x7FE0, 0x0010, Value::U16s(vec![42])));
        assert!(set.get_by_key("x7fe00010").is_some());
        assert!(set.get_by_key("x7fe00011").is_none());
    }

    #[test]
    fn trimmed_string_access() {
        let mut set = DataSet::new();
        set.insert(element(0x0002, 0x0010, Value::from("1.2.840.10008.1.2\0")));
        assert_eq!(set.str_value(Tag(0x0002, 0x0010)), Some("1.2.840.10008.1.2"));
        assert!(set.require(Tag(0x0008, 0x0060)).is_err());
    }
}
