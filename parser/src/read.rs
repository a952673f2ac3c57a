//! The DICOM file parser.
//!
//! [`Parser::parse`] consumes an in-memory byte buffer holding a DICOM
//! file (preamble, `DICM` magic, File Meta group, data set) and
//! produces an ordered element map. The File Meta group is always read
//! in Explicit VR Little Endian; the data set is read according to the
//! transfer syntax named in (0002,0010). Undefined-length sequences
//! and encapsulated pixel data are traversed by delimiter, everything
//! else by explicit end offset.

use medview_core::{DataDictionary, DataSet, Element, Length, Tag, Value, VR};
use medview_dictionary_std::{tags, StandardDataDictionary};
use medview_encoding::cursor::ByteCursor;
use medview_encoding::text::{SpecificCharacterSet, TextCodec};
use medview_encoding::transfer_syntax::TransferSyntax;
use medview_encoding::Endianness;
use smallvec::SmallVec;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use tracing::warn;

/// The size of the DICOM preamble in bytes.
pub const PREAMBLE_SIZE: usize = 128;
/// The `DICM` magic code.
pub const MAGIC_CODE: &[u8; 4] = b"DICM";

/// An error type for DICOM parsing issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Not a DICOM file: the magic code or the transfer syntax UID
    /// data element is missing.
    #[snafu(display("Invalid DICOM file (missing magic code or transfer syntax)"))]
    NotDicom {
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },

    /// The transfer syntax is recognized but cannot be decoded here,
    /// or is not known at all.
    #[snafu(display("Unsupported transfer syntax `{}`", name))]
    UnsupportedSyntax {
        /// The human-readable syntax name, or the raw UID when unknown.
        name: String,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },

    /// A read beyond the end of the input buffer,
    /// or undecodable text in a data element value.
    #[snafu(display("{}", source))]
    OutOfBounds {
        /// The underlying cursor error.
        #[snafu(backtrace)]
        source: medview_encoding::cursor::Error,
    },

    /// A structurally invalid data element.
    /// Parsing is all-or-nothing: the whole stream is abandoned.
    #[snafu(display("Malformed data element {} at position {}: {}", tag, position, reason))]
    MalformedElement {
        /// The tag of the offending element.
        tag: Tag,
        /// The byte offset at which the problem was detected.
        position: usize,
        /// What is wrong with the element.
        reason: &'static str,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A parsed DICOM file: the preserved preamble, the resolved transfer
/// syntax, and the ordered element map (File Meta group included).
#[derive(Debug, Clone)]
pub struct DicomFile {
    /// The 128-byte preamble, preserved as found.
    pub preamble: Vec<u8>,
    /// The resolved transfer syntax of the data set.
    pub syntax: &'static TransferSyntax,
    /// The File Meta group length as found in (0002,0000).
    pub meta_group_length: u32,
    /// All data elements, File Meta group included, in tag order.
    pub data: DataSet,
}

impl DicomFile {
    /// Structural equality over (tag, VR, value),
    /// ignoring offsets and lengths.
    pub fn same_content(&self, other: &DicomFile) -> bool {
        self.data == other.data
    }
}

/// A DICOM file parser.
///
/// The parser is configured with a data element dictionary (used to
/// resolve implicit VRs) and an optional default character set, in
/// effect until a Specific Character Set (0008,0005) element is
/// encountered.
#[derive(Debug, Clone)]
pub struct Parser<D = StandardDataDictionary> {
    dict: D,
    default_charset: Option<SpecificCharacterSet>,
}

impl Parser<StandardDataDictionary> {
    /// Create a parser backed by the standard dictionary.
    pub fn new() -> Self {
        Parser {
            dict: StandardDataDictionary,
            default_charset: None,
        }
    }
}

impl Default for Parser<StandardDataDictionary> {
    fn default() -> Self {
        Parser::new()
    }
}

impl<D> Parser<D>
where
    D: DataDictionary,
{
    /// Create a parser backed by the given dictionary.
    pub fn with_dictionary(dict: D) -> Self {
        Parser {
            dict,
            default_charset: None,
        }
    }

    /// Set the character set in effect before (0008,0005) is read.
    pub fn default_character_set(mut self, charset: SpecificCharacterSet) -> Self {
        self.default_charset = Some(charset);
        self
    }

    /// Parse a complete DICOM file from the given buffer.
    pub fn parse(&self, buffer: &[u8]) -> Result<DicomFile> {
        ensure!(
            buffer.len() >= PREAMBLE_SIZE + 4 && buffer[128..132] == MAGIC_CODE[..],
            NotDicomSnafu
        );

        let mut charset = self.default_charset.clone().unwrap_or_default();
        let mut data = DataSet::new();

        // File Meta group, always Explicit VR Little Endian
        let meta_cursor = ByteCursor::new(buffer, Endianness::Little);
        let (group_length_element, mut offset) =
            self.read_data_element(&meta_cursor, 132, true, &charset, &data)?;
        ensure!(
            group_length_element.tag == tags::FILE_META_INFORMATION_GROUP_LENGTH,
            MalformedElementSnafu {
                tag: group_length_element.tag,
                position: 132usize,
                reason: "expected FileMetaInformationGroupLength",
            }
        );
        let meta_group_length =
            group_length_element
                .value
                .to_u32()
                .context(MalformedElementSnafu {
                    tag: group_length_element.tag,
                    position: 132usize,
                    reason: "group length value is not an unsigned integer",
                })?;
        data.insert(group_length_element);

        // the group length covers its own value bytes
        // plus every meta element after it
        let meta_end = 132 + 8 + meta_group_length as usize;
        while offset < meta_end {
            let (element, next) =
                self.read_data_element(&meta_cursor, offset, true, &charset, &data)?;
            data.insert(element);
            offset = next;
        }

        let syntax = self.resolve_transfer_syntax(&data)?;

        // data set, in the resolved transfer syntax
        let cursor = ByteCursor::new(buffer, syntax.endianness());
        let explicit = syntax.explicit_vr();
        while offset < buffer.len() {
            let (element, next) = self.read_data_element(&cursor, offset, explicit, &charset, &data)?;
            if element.tag == tags::SPECIFIC_CHARACTER_SET {
                charset = resolve_character_set(&element, &charset);
            }
            data.insert(element);
            offset = next;
        }
        if offset != buffer.len() {
            warn!(
                "input buffer not fully consumed: stopped at {} of {} bytes",
                offset,
                buffer.len()
            );
        }

        self.reshape_pixel_data(&mut data);

        Ok(DicomFile {
            preamble: buffer[..PREAMBLE_SIZE].to_vec(),
            syntax,
            meta_group_length,
            data,
        })
    }

    fn resolve_transfer_syntax(&self, data: &DataSet) -> Result<&'static TransferSyntax> {
        let uid = data
            .str_value(tags::TRANSFER_SYNTAX_UID)
            .context(NotDicomSnafu)?;
        let syntax = TransferSyntax::from_uid(uid).context(UnsupportedSyntaxSnafu { name: uid })?;
        ensure!(
            syntax.is_supported(),
            UnsupportedSyntaxSnafu {
                name: syntax.name(),
            }
        );
        Ok(syntax)
    }

    /// Read one data element at `offset`,
    /// returning it with the offset one past its value.
    fn read_data_element(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
        explicit: bool,
        charset: &SpecificCharacterSet,
        context: &DataSet,
    ) -> Result<(Element, usize)> {
        let tag_position = offset;
        let tag = cursor.read_tag(offset).context(OutOfBoundsSnafu)?;
        let mut offset = offset + 4;

        let vr = if tag.is_delimiter() {
            VR::NA
        } else if explicit {
            let b = [
                cursor.read_u8(offset).context(OutOfBoundsSnafu)?,
                cursor.read_u8(offset + 1).context(OutOfBoundsSnafu)?,
            ];
            VR::from_binary(b).context(MalformedElementSnafu {
                tag,
                position: offset,
                reason: "unrecognized VR",
            })?
        } else {
            self.dict.vr_of(tag)
        };

        let vl = if tag.is_delimiter() || !explicit {
            let vl = cursor.read_u32(offset).context(OutOfBoundsSnafu)?;
            offset += 4;
            Length(vl)
        } else if vr.has_long_header() {
            // 2-byte VR, 2 reserved bytes, 32-bit length
            let vl = cursor.read_u32(offset + 4).context(OutOfBoundsSnafu)?;
            offset += 8;
            Length(vl)
        } else {
            // 2-byte VR, 16-bit length
            let vl = cursor.read_u16(offset + 2).context(OutOfBoundsSnafu)?;
            offset += 4;
            Length(u32::from(vl))
        };

        let start = offset;

        if tag == tags::PIXEL_DATA && vl.is_undefined() {
            let (fragments, end, offset_table_length) =
                self.read_pixel_item_sequence(cursor, offset)?;
            let element = Element {
                tag,
                vr,
                vl: Length::UNDEFINED,
                value: Value::Fragments(fragments),
                start: start + offset_table_length,
                end,
            };
            return Ok((element, end));
        }

        if vr == VR::SQ {
            let (items, end) = self.read_sequence(cursor, offset, explicit, vl, charset)?;
            let element = Element {
                tag,
                vr,
                vl,
                value: Value::Items(items),
                start,
                end,
            };
            return Ok((element, end));
        }

        ensure!(
            vl.is_defined(),
            MalformedElementSnafu {
                tag,
                position: tag_position,
                reason: "undefined length outside of sequences and pixel data",
            }
        );
        let length = vl.get().unwrap_or(0) as usize;
        let value = if length == 0 {
            Value::Empty
        } else {
            self.read_primitive_value(cursor, offset, tag, vr, length, charset, context)?
        };
        let end = start + length;
        Ok((
            Element {
                tag,
                vr,
                vl,
                value,
                start,
                end,
            },
            end,
        ))
    }

    /// Decode a defined-length primitive value according to its VR.
    fn read_primitive_value(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
        tag: Tag,
        vr: VR,
        length: usize,
        charset: &SpecificCharacterSet,
        context: &DataSet,
    ) -> Result<Value> {
        if tag == tags::PIXEL_DATA {
            return self.read_pixel_value(cursor, offset, vr, length, context);
        }
        let value = match vr {
            // OB and OW are unsigned byte and word containers
            VR::OB => Value::U8s(cursor.read_u8_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::OW => Value::U16s(cursor.read_u16_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::OF => Value::F32s(cursor.read_f32_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::OD => Value::F64s(cursor.read_f64_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::US => Value::U16s(cursor.read_u16_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::SS => Value::I16s(cursor.read_i16_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::UL => Value::U32s(cursor.read_u32_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::SL => Value::I32s(cursor.read_i32_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::FL => Value::F32s(cursor.read_f32_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::FD => Value::F64s(cursor.read_f64_array(offset, length).context(OutOfBoundsSnafu)?),
            VR::AT => {
                let mut parts = SmallVec::new();
                for i in 0..length / 4 {
                    let pair = cursor.read_tag(offset + i * 4).context(OutOfBoundsSnafu)?;
                    parts.push(pair.to_string());
                }
                Value::Strs(parts)
            }
            VR::UN => Value::U8s(cursor.read_u8_array(offset, length).context(OutOfBoundsSnafu)?),
            _ => {
                let text = if vr.is_special_text() {
                    cursor
                        .read_text(offset, length, charset)
                        .context(OutOfBoundsSnafu)?
                } else {
                    cursor.read_string(offset, length).context(OutOfBoundsSnafu)?
                };
                Value::Strs(text.split('\\').map(str::to_owned).collect())
            }
        };
        Ok(value)
    }

    /// Decode explicit-length pixel data, typed according to
    /// BitsAllocated and PixelRepresentation.
    fn read_pixel_value(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
        vr: VR,
        length: usize,
        context: &DataSet,
    ) -> Result<Value> {
        let bits_allocated = match context.u16_value(tags::BITS_ALLOCATED) {
            Some(bits) => bits,
            None => {
                warn!("missing BitsAllocated, assuming 16 bits per pixel");
                16
            }
        };
        let signed = context.u16_value(tags::PIXEL_REPRESENTATION) == Some(1);

        match bits_allocated {
            8 => {
                if vr == VR::OW {
                    warn!("pixel data with 8 allocated bits but OW value representation");
                }
                if signed {
                    Ok(Value::I8s(
                        cursor.read_i8_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                } else {
                    Ok(Value::U8s(
                        cursor.read_u8_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                }
            }
            32 => {
                if signed {
                    Ok(Value::I32s(
                        cursor.read_i32_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                } else {
                    Ok(Value::U32s(
                        cursor.read_u32_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                }
            }
            bits => {
                if bits != 16 {
                    warn!("unexpected BitsAllocated {}, reading 16-bit pixels", bits);
                }
                if vr == VR::OB {
                    warn!("pixel data with 16 allocated bits but OB value representation");
                }
                if signed {
                    Ok(Value::I16s(
                        cursor.read_i16_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                } else {
                    Ok(Value::U16s(
                        cursor.read_u16_array(offset, length).context(OutOfBoundsSnafu)?,
                    ))
                }
            }
        }
    }

    /// Read the items of a sequence element. Explicit-length sequences
    /// end at a known offset; undefined-length sequences end at a
    /// Sequence Delimitation Item, which is consumed but not stored.
    fn read_sequence(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
        explicit: bool,
        vl: Length,
        charset: &SpecificCharacterSet,
    ) -> Result<(Vec<DataSet>, usize)> {
        let mut items = Vec::new();
        let mut offset = offset;
        match vl.get() {
            Some(length) => {
                let end = offset + length as usize;
                while offset < end {
                    let (item, next, sequence_done) =
                        self.read_item(cursor, offset, explicit, charset)?;
                    offset = next;
                    if sequence_done {
                        break;
                    }
                    if let Some(item) = item {
                        items.push(item);
                    }
                }
                Ok((items, end))
            }
            None => loop {
                let (item, next, sequence_done) =
                    self.read_item(cursor, offset, explicit, charset)?;
                offset = next;
                if sequence_done {
                    return Ok((items, offset));
                }
                if let Some(item) = item {
                    items.push(item);
                }
            },
        }
    }

    /// Read one sequence item. Returns `(item, next_offset, true)`
    /// when a Sequence Delimitation Item was found instead of an item.
    ///
    /// The item header is recorded inside the item map under its own
    /// tag (FFFE,E000), preserving the explicit/undefined length form
    /// for the writer; item delimiters are consumed but never stored.
    fn read_item(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
        explicit: bool,
        charset: &SpecificCharacterSet,
    ) -> Result<(Option<DataSet>, usize, bool)> {
        let tag = cursor.read_tag(offset).context(OutOfBoundsSnafu)?;
        let vl = Length(cursor.read_u32(offset + 4).context(OutOfBoundsSnafu)?);
        let header_position = offset;
        let mut offset = offset + 8;

        if tag.is_sequence_delimiter() {
            return Ok((None, offset, true));
        }
        ensure!(
            tag.is_item(),
            MalformedElementSnafu {
                tag,
                position: header_position,
                reason: "expected an item or a sequence delimitation item",
            }
        );

        let mut item = DataSet::new();
        item.insert(Element {
            tag: Tag::ITEM,
            vr: VR::NA,
            vl,
            value: Value::Empty,
            start: offset,
            end: offset,
        });

        match vl.get() {
            Some(length) => {
                let end = offset + length as usize;
                while offset < end {
                    let (element, next) =
                        self.read_data_element(cursor, offset, explicit, charset, &item)?;
                    item.insert(element);
                    offset = next;
                }
            }
            None => loop {
                let tag = cursor.read_tag(offset).context(OutOfBoundsSnafu)?;
                if tag.is_item_delimiter() {
                    offset += 8;
                    break;
                }
                let (element, next) =
                    self.read_data_element(cursor, offset, explicit, charset, &item)?;
                item.insert(element);
                offset = next;
            },
        }

        Ok((Some(item), offset, false))
    }

    /// Read an encapsulated pixel data item sequence: the Basic Offset
    /// Table item first, then one item per fragment, until the
    /// Sequence Delimitation Item. The offset table is kept as the
    /// first entry of the returned list.
    fn read_pixel_item_sequence(
        &self,
        cursor: &ByteCursor<'_>,
        offset: usize,
    ) -> Result<(Vec<Vec<u8>>, usize, usize)> {
        let tag = cursor.read_tag(offset).context(OutOfBoundsSnafu)?;
        let offset_table_length = cursor.read_u32(offset + 4).context(OutOfBoundsSnafu)? as usize;
        ensure!(
            tag.is_item(),
            MalformedElementSnafu {
                tag,
                position: offset,
                reason: "expected the basic offset table item",
            }
        );
        let mut offset = offset + 8;
        let offset_table = cursor
            .read_u8_array(offset, offset_table_length)
            .context(OutOfBoundsSnafu)?;
        offset += offset_table_length;

        let mut fragments = vec![offset_table];
        loop {
            let tag = cursor.read_tag(offset).context(OutOfBoundsSnafu)?;
            let vl = Length(cursor.read_u32(offset + 4).context(OutOfBoundsSnafu)?);
            let header_position = offset;
            offset += 8;
            if tag.is_sequence_delimiter() {
                break;
            }
            ensure!(
                tag.is_item(),
                MalformedElementSnafu {
                    tag,
                    position: header_position,
                    reason: "expected a pixel data fragment item",
                }
            );
            let length = vl.get().context(MalformedElementSnafu {
                tag,
                position: header_position,
                reason: "pixel data fragment with undefined length",
            })? as usize;
            fragments.push(
                cursor
                    .read_u8_array(offset, length)
                    .context(OutOfBoundsSnafu)?,
            );
            offset += length;
        }
        Ok((fragments, offset, offset_table_length))
    }

    /// Post-parse pixel data reshaping: group encapsulated fragments
    /// into frames when there are more fragments than frames, and
    /// check the native multi-frame partition invariant.
    fn reshape_pixel_data(&self, data: &mut DataSet) {
        let frames = number_of_frames(data);
        let expected_samples = data
            .u16_value(tags::ROWS)
            .zip(data.u16_value(tags::COLUMNS))
            .map(|(rows, columns)| {
                let samples = data.u16_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
                usize::from(rows) * usize::from(columns) * usize::from(samples)
            });

        let element = match data.get_mut(tags::PIXEL_DATA) {
            Some(element) => element,
            None => return,
        };
        match &mut element.value {
            Value::Fragments(fragments) => {
                // entry 0 is the basic offset table
                let total = fragments.len().saturating_sub(1);
                if frames > 1 && total > frames {
                    if total % frames == 0 {
                        let per_frame = total / frames;
                        let mut rest = std::mem::take(fragments);
                        let offset_table = rest.remove(0);
                        let mut grouped = Vec::with_capacity(frames + 1);
                        grouped.push(offset_table);
                        for chunk in rest.chunks(per_frame) {
                            grouped.push(chunk.concat());
                        }
                        *fragments = grouped;
                    } else {
                        warn!(
                            "{} pixel data fragments cannot be grouped into {} frames",
                            total, frames
                        );
                    }
                }
            }
            value => {
                if let Some(samples) = expected_samples {
                    let expected = samples * frames;
                    let held = value.multiplicity();
                    // one trailing sample may be even-length padding
                    if held < expected || held > expected + 1 {
                        warn!(
                            "pixel data holds {} samples, expected {} ({} frames)",
                            held, expected, frames
                        );
                    }
                }
            }
        }
    }
}

/// The number of frames according to (0028,0008), defaulting to 1.
pub fn number_of_frames(data: &DataSet) -> usize {
    match data.get(tags::NUMBER_OF_FRAMES) {
        None => 1,
        Some(element) => match element.value.to_u32() {
            Some(frames) if frames > 0 => frames as usize,
            _ => {
                warn!("NumberOfFrames value is not a positive integer, assuming 1");
                1
            }
        },
    }
}

/// Resolve the character set named by a Specific Character Set
/// (0008,0005) element. With code extensions (multiple values), the
/// second value is the one used for decoding. Unresolvable terms keep
/// the character set currently in effect.
fn resolve_character_set(
    element: &Element,
    current: &SpecificCharacterSet,
) -> SpecificCharacterSet {
    let values = match &element.value {
        Value::Strs(values) => values,
        _ => return current.clone(),
    };
    let term = if values.len() > 1 {
        warn!(
            "SpecificCharacterSet with code extensions: using `{}`, first value is `{}`",
            values[1].trim(),
            values[0].trim()
        );
        &values[1]
    } else {
        match values.first() {
            Some(term) => term,
            None => return current.clone(),
        }
    };
    match SpecificCharacterSet::from_term(term) {
        Some(charset) => charset,
        None => {
            warn!(
                "unsupported character set `{}`, keeping `{}`",
                term.trim(),
                current.name()
            );
            current.clone()
        }
    }
}
