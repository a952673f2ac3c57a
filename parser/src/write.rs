//! The DICOM file writer.
//!
//! [`Writer::write`] serializes a parsed element map back to bytes:
//! preamble, `DICM` magic, File Meta group in Explicit VR Little
//! Endian, then the data set in its own transfer syntax. Element
//! values round-trip bit-exact; the writer owns exactly three File
//! Meta elements, which it recomputes on every write: the group
//! length (0002,0000), the implementation class UID (0002,0012) and
//! the implementation version name (0002,0013).

use crate::read::DicomFile;
use crate::rules::{Action, WriteRules};
use medview_core::{DataDictionary, DataSet, Element, Tag, Value, VR};
use medview_dictionary_std::{tags, StandardDataDictionary};
use medview_encoding::cursor::ByteWriter;
use medview_encoding::text::{SpecificCharacterSet, TextCodec};
use medview_encoding::Endianness;
use smallvec::smallvec;
use snafu::{OptionExt, ResultExt, Snafu};

/// The implementation class UID written into (0002,0012).
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.10.1472.1.2";
/// The implementation version name written into (0002,0013),
/// NUL padded to even length on the wire.
pub const IMPLEMENTATION_VERSION_NAME: &str = "MEDVIEW_0.1";

/// An error type for DICOM writing issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A text value could not be encoded
    /// in the character set in effect.
    #[snafu(display("Could not encode text of element {}", tag))]
    EncodeText {
        /// The tag of the offending element.
        tag: Tag,
        /// The underlying text encoding error.
        #[snafu(backtrace)]
        source: medview_encoding::text::EncodeTextError,
    },

    /// An AT element value which does not parse back
    /// into an attribute tag.
    #[snafu(display("Invalid attribute tag value `{}` in element {}", value, tag))]
    InvalidTagValue {
        /// The value found.
        value: String,
        /// The tag of the offending element.
        tag: Tag,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A DICOM file writer with an optional per-element rule table.
#[derive(Debug, Clone)]
pub struct Writer<D = StandardDataDictionary> {
    dict: D,
    rules: Option<WriteRules>,
}

impl Writer<StandardDataDictionary> {
    /// Create a writer backed by the standard dictionary.
    pub fn new() -> Self {
        Writer {
            dict: StandardDataDictionary,
            rules: None,
        }
    }
}

impl Default for Writer<StandardDataDictionary> {
    fn default() -> Self {
        Writer::new()
    }
}

impl<D> Writer<D>
where
    D: DataDictionary,
{
    /// Create a writer backed by the given dictionary.
    pub fn with_dictionary(dict: D) -> Self {
        Writer { dict, rules: None }
    }

    /// Install a rule table applied to every element on write.
    pub fn rules(mut self, rules: WriteRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Serialize the given file back into bytes.
    pub fn write(&self, file: &DicomFile) -> Result<Vec<u8>> {
        let transformed = self.apply_rules(&file.data);
        let charset = dataset_character_set(&transformed);

        // partition into File Meta group and data set proper
        let mut meta = DataSet::new();
        let mut body = DataSet::new();
        for element in transformed {
            if element.tag.group() == 0x0002 {
                meta.insert(element);
            } else {
                body.insert(element);
            }
        }

        // the writer owns these three
        meta.remove(tags::FILE_META_INFORMATION_GROUP_LENGTH);
        meta.insert(Element::new(
            tags::IMPLEMENTATION_CLASS_UID,
            VR::UI,
            Value::from(IMPLEMENTATION_CLASS_UID),
        ));
        let mut version_name = IMPLEMENTATION_VERSION_NAME.to_owned();
        if version_name.len() % 2 != 0 {
            version_name.push('\0');
        }
        meta.insert(Element::new(
            tags::IMPLEMENTATION_VERSION_NAME,
            VR::SH,
            Value::from(version_name),
        ));

        let mut meta_writer = ByteWriter::new(Endianness::Little);
        for element in &meta {
            self.write_element(&mut meta_writer, element, true, &charset)?;
        }
        let meta_bytes = meta_writer.into_bytes();
        // the group length covers its own value bytes
        // plus every meta element after it
        let meta_group_length = 4 + meta_bytes.len() as u32;

        let mut data_writer = ByteWriter::new(file.syntax.endianness());
        let explicit = file.syntax.explicit_vr();
        for element in &body {
            self.write_element(&mut data_writer, element, explicit, &charset)?;
        }

        let mut out = Vec::with_capacity(
            crate::read::PREAMBLE_SIZE + 4 + 12 + meta_bytes.len() + data_writer.position(),
        );
        let mut preamble = file.preamble.clone();
        preamble.resize(crate::read::PREAMBLE_SIZE, 0);
        out.extend_from_slice(&preamble);
        out.extend_from_slice(crate::read::MAGIC_CODE);

        let mut head = ByteWriter::new(Endianness::Little);
        head.write_tag(tags::FILE_META_INFORMATION_GROUP_LENGTH);
        head.write_bytes(&VR::UL.to_bytes());
        head.write_u16(4);
        head.write_u32(meta_group_length);
        out.extend_from_slice(&head.into_bytes());

        out.extend_from_slice(&meta_bytes);
        out.extend_from_slice(&data_writer.into_bytes());
        Ok(out)
    }

    /// Apply the rule table, producing the elements to be written.
    fn apply_rules(&self, data: &DataSet) -> Vec<Element> {
        let rules = match &self.rules {
            Some(rules) if !rules.is_empty() => rules,
            _ => return data.iter().cloned().collect(),
        };
        data.iter()
            .filter_map(|element| match rules.action_for(element, &self.dict) {
                Action::Copy => Some(element.clone()),
                Action::Remove => None,
                Action::Clear => {
                    let mut cleared = element.clone();
                    cleared.value = Value::Empty;
                    cleared.vl = medview_core::Length(0);
                    Some(cleared)
                }
                Action::Replace(replacement) => {
                    let mut replaced = element.clone();
                    replaced.value = Value::Strs(smallvec![replacement.clone()]);
                    replaced.vl = medview_core::Length(replacement.len() as u32);
                    Some(replaced)
                }
            })
            .collect()
    }

    /// Write one data element: prefix, value, and any delimitation
    /// items a sequence form requires.
    fn write_element(
        &self,
        w: &mut ByteWriter,
        element: &Element,
        explicit: bool,
        charset: &SpecificCharacterSet,
    ) -> Result<()> {
        match &element.value {
            Value::Items(items) => {
                let mut content = ByteWriter::new(w.endianness());
                for item in items {
                    self.write_item(&mut content, item, explicit, charset)?;
                }
                let content = content.into_bytes();
                if element.vl.is_undefined() {
                    write_prefix(w, element.tag, element.vr, 0xFFFF_FFFF, explicit);
                    w.write_bytes(&content);
                    write_delimiter(w, Tag::SEQUENCE_DELIMITER);
                } else {
                    write_prefix(w, element.tag, element.vr, content.len() as u32, explicit);
                    w.write_bytes(&content);
                }
            }
            Value::Fragments(fragments) => {
                write_prefix(w, element.tag, element.vr, 0xFFFF_FFFF, explicit);
                for fragment in fragments {
                    w.write_tag(Tag::ITEM);
                    w.write_u32(fragment.len() as u32);
                    w.write_bytes(fragment);
                }
                write_delimiter(w, Tag::SEQUENCE_DELIMITER);
            }
            _ => {
                let bytes = self.encode_primitive(element, w.endianness(), charset)?;
                write_prefix(w, element.tag, element.vr, bytes.len() as u32, explicit);
                w.write_bytes(&bytes);
            }
        }
        Ok(())
    }

    /// Write one sequence item: children in tag order, in the length
    /// form recorded by the parser (explicit length by default).
    /// The item header marker element is never written as a child.
    fn write_item(
        &self,
        w: &mut ByteWriter,
        item: &DataSet,
        explicit: bool,
        charset: &SpecificCharacterSet,
    ) -> Result<()> {
        let undefined = item
            .get(Tag::ITEM)
            .map(|marker| marker.vl.is_undefined())
            .unwrap_or(false);

        let mut content = ByteWriter::new(w.endianness());
        for element in item {
            if element.tag.is_item() {
                continue;
            }
            self.write_element(&mut content, element, explicit, charset)?;
        }
        let content = content.into_bytes();

        w.write_tag(Tag::ITEM);
        if undefined {
            w.write_u32(0xFFFF_FFFF);
            w.write_bytes(&content);
            write_delimiter(w, Tag::ITEM_DELIMITER);
        } else {
            w.write_u32(content.len() as u32);
            w.write_bytes(&content);
        }
        Ok(())
    }

    /// Encode a primitive value into bytes, the inverse of the
    /// parser's per-VR dispatch.
    fn encode_primitive(
        &self,
        element: &Element,
        endianness: Endianness,
        charset: &SpecificCharacterSet,
    ) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new(endianness);
        match &element.value {
            Value::Empty => {}
            Value::U8s(values) => {
                w.write_bytes(values);
            }
            Value::I8s(values) => {
                for &v in values {
                    w.write_i8(v);
                }
            }
            Value::U16s(values) => {
                for &v in values {
                    w.write_u16(v);
                }
            }
            Value::I16s(values) => {
                for &v in values {
                    w.write_i16(v);
                }
            }
            Value::U32s(values) => {
                for &v in values {
                    w.write_u32(v);
                }
            }
            Value::I32s(values) => {
                for &v in values {
                    w.write_i32(v);
                }
            }
            Value::F32s(values) => {
                for &v in values {
                    w.write_f32(v);
                }
            }
            Value::F64s(values) => {
                for &v in values {
                    w.write_f64(v);
                }
            }
            Value::Strs(values) if element.vr == VR::AT => {
                for value in values {
                    let tag = parse_attribute_tag(value).context(InvalidTagValueSnafu {
                        value: value.clone(),
                        tag: element.tag,
                    })?;
                    w.write_tag(tag);
                }
            }
            Value::Strs(values) => {
                let joined = values.join("\\");
                if element.vr.is_special_text() {
                    let encoded = charset
                        .encode(&joined)
                        .context(EncodeTextSnafu { tag: element.tag })?;
                    w.write_bytes(&encoded);
                } else {
                    w.write_str(&joined);
                }
                if w.position() % 2 != 0 {
                    // pad to even length: NUL for UIDs, space for text
                    w.write_u8(if element.vr == VR::UI { 0 } else { b' ' });
                }
            }
            Value::Items(_) | Value::Fragments(_) => unreachable!("handled by write_element"),
        }
        Ok(w.into_bytes())
    }
}

/// Write a data element prefix: 8 bytes for implicit VR and
/// delimitation tags, 8 or 12 bytes for explicit VR depending on the
/// length form of the VR.
fn write_prefix(w: &mut ByteWriter, tag: Tag, vr: VR, vl: u32, explicit: bool) {
    w.write_tag(tag);
    if tag.is_delimiter() || !explicit {
        w.write_u32(vl);
        return;
    }
    let vr = wire_vr(vr);
    w.write_bytes(&vr.to_bytes());
    if vr.has_long_header() {
        w.write_u16(0);
        w.write_u32(vl);
    } else {
        w.write_u16(vl as u16);
    }
}

/// Emit a delimitation item with zero length.
fn write_delimiter(w: &mut ByteWriter, tag: Tag) {
    w.write_tag(tag);
    w.write_u32(0);
}

/// Map the internal VR markers onto a representation
/// that may appear on the wire.
fn wire_vr(vr: VR) -> VR {
    match vr {
        VR::OX | VR::PI => VR::OW,
        VR::NA | VR::NONE => VR::UN,
        other => other,
    }
}

/// Parse an attribute tag value of the form `(GGGG,EEEE)`.
fn parse_attribute_tag(value: &str) -> Option<Tag> {
    let inner = value.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (group, element) = inner.split_once(',')?;
    Some(Tag(
        u16::from_str_radix(group, 16).ok()?,
        u16::from_str_radix(element, 16).ok()?,
    ))
}

/// Resolve the character set used for encoding special text,
/// from the (0008,0005) element about to be written.
fn dataset_character_set(elements: &[Element]) -> SpecificCharacterSet {
    let element = elements
        .iter()
        .find(|e| e.tag == tags::SPECIFIC_CHARACTER_SET);
    let values = match element.map(|e| &e.value) {
        Some(Value::Strs(values)) => values,
        _ => return SpecificCharacterSet::default(),
    };
    let term = if values.len() > 1 {
        &values[1]
    } else {
        match values.first() {
            Some(term) => term,
            None => return SpecificCharacterSet::default(),
        }
    };
    SpecificCharacterSet::from_term(term).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_tag_values_parse_back() {
        assert_eq!(parse_attribute_tag("(7FE0,0010)"), Some(Tag(0x7FE0, 0x0010)));
        assert_eq!(parse_attribute_tag("(0028,0008)"), Some(Tag(0x0028, 0x0008)));
        assert_eq!(parse_attribute_tag("7FE00010"), None);
        assert_eq!(parse_attribute_tag("(XXXX,0010)"), None);
    }

    #[test]
    fn prefix_sizes_follow_the_length_form() {
        // explicit, short form: 8 bytes
        let mut w = ByteWriter::new(Endianness::Little);
        write_prefix(&mut w, Tag(0x0028, 0x0010), VR::US, 2, true);
        assert_eq!(w.position(), 8);

        // explicit, long form: 12 bytes with a reserved gap
        let mut w = ByteWriter::new(Endianness::Little);
        write_prefix(&mut w, Tag(0x7FE0, 0x0010), VR::OW, 4, true);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[4..6], b"OW");
        assert_eq!(&bytes[6..8], &[0, 0]);

        // implicit: 8 bytes, no VR field
        let mut w = ByteWriter::new(Endianness::Little);
        write_prefix(&mut w, Tag(0x0028, 0x0010), VR::US, 2, false);
        assert_eq!(w.position(), 8);

        // delimiters carry no VR even in explicit syntaxes
        let mut w = ByteWriter::new(Endianness::Little);
        write_prefix(&mut w, Tag::SEQUENCE_DELIMITER, VR::NA, 0, true);
        assert_eq!(w.position(), 8);
    }
}
