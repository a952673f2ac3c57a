//! Text decoding for DICOM string values,
//! with support for character repertoires.
//!
//! The character set in effect is selected by the value of the
//! Specific Character Set (0008,0005) data element. Only the
//! "special" text VRs (SH, LO, ST, PN, LT, UT) are decoded with the
//! selected repertoire; all other string VRs are plain ISO-8859-1 /
//! ASCII. Unrecognized terms, including the deliberately unsupported
//! `ISO 2022 IR 149` and `ISO 2022 IR 58`, resolve to `None` so that
//! the caller can keep the codec currently in effect.

use encoding::all::{
    GB18030, GBK, ISO_2022_JP, ISO_8859_1, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5,
    ISO_8859_6, ISO_8859_7, ISO_8859_8, UTF_8, WINDOWS_31J, WINDOWS_874, WINDOWS_1254,
};
use encoding::{DecoderTrap, EncoderTrap, Encoding, RawDecoder, StringWriter};
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;

/// An error type for text encoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EncodeTextError {
    /// A custom error message,
    /// for when the underlying error type does not encode error semantics
    /// into type variants.
    #[snafu(display("{}", message))]
    EncodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}

/// An error type for text decoding issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecodeTextError {
    /// A custom error message,
    /// for when the underlying error type does not encode error semantics
    /// into type variants.
    #[snafu(display("{}", message))]
    DecodeCustom {
        /// The error message in plain text.
        message: Cow<'static, str>,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}

type EncodeResult<T> = Result<T, EncodeTextError>;
type DecodeResult<T> = Result<T, DecodeTextError>;

/// A holder of encoding and decoding mechanisms for text in DICOM
/// content, which depends on the specific character set in effect.
pub trait TextCodec {
    /// Obtain the defined term (unique name) of the text encoding,
    /// as it may appear in a Specific Character Set (0008,0005) value.
    fn name(&self) -> Cow<'static, str>;

    /// Decode the given byte buffer as a single string. The resulting
    /// string _may_ contain backslash characters ('\') to delimit
    /// individual values, and should be split later on if required.
    fn decode(&self, text: &[u8]) -> DecodeResult<String>;

    /// Encode a text value into a byte vector. The input string can
    /// feature multiple text values by using the backslash character
    /// ('\') as the value delimiter.
    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>>;
}

impl<T: ?Sized> TextCodec for Box<T>
where
    T: TextCodec,
{
    fn name(&self) -> Cow<'static, str> {
        self.as_ref().name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        self.as_ref().decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        self.as_ref().encode(text)
    }
}

impl<'a, T: ?Sized> TextCodec for &'a T
where
    T: TextCodec,
{
    fn name(&self) -> Cow<'static, str> {
        (**self).name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        (**self).decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        (**self).encode(text)
    }
}

fn decode_text_trap(
    _decoder: &mut dyn RawDecoder,
    input: &[u8],
    output: &mut dyn StringWriter,
) -> bool {
    let c = input[0];
    let o0 = c & 7;
    let o1 = (c & 56) >> 3;
    let o2 = (c & 192) >> 6;
    output.write_char('\\');
    output.write_char((o2 + b'0') as char);
    output.write_char((o1 + b'0') as char);
    output.write_char((o0 + b'0') as char);
    true
}

/// Create and implement a character set type using the `encoding` crate.
macro_rules! decl_character_set {
    ($typ: ident, $term: literal, $val: expr) => {
        #[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
        #[doc = "Data type for the "]
        #[doc = $term]
        #[doc = "character set encoding."]
        pub struct $typ;

        impl TextCodec for $typ {
            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed($term)
            }

            fn decode(&self, text: &[u8]) -> DecodeResult<String> {
                $val.decode(text, DecoderTrap::Call(decode_text_trap))
                    .map_err(|message| DecodeCustomSnafu { message }.build())
            }

            fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
                $val.encode(text, EncoderTrap::Strict)
                    .map_err(|message| EncodeCustomSnafu { message }.build())
            }
        }
    };
}

/// Data type representing the default character repertoire
/// (plain ISO-8859-1, a superset of the DICOM default ASCII set),
/// used for all string VRs which do not carry special text.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct DefaultCharacterSetCodec;

impl TextCodec for DefaultCharacterSetCodec {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ISO_IR 6")
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        ISO_8859_1
            .decode(text, DecoderTrap::Call(decode_text_trap))
            .map_err(|message| DecodeCustomSnafu { message }.build())
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        ISO_8859_1
            .encode(text, EncoderTrap::Strict)
            .map_err(|message| EncodeCustomSnafu { message }.build())
    }
}

decl_character_set!(IsoIr100CharacterSetCodec, "ISO_IR 100", ISO_8859_1);
decl_character_set!(IsoIr101CharacterSetCodec, "ISO_IR 101", ISO_8859_2);
decl_character_set!(IsoIr109CharacterSetCodec, "ISO_IR 109", ISO_8859_3);
decl_character_set!(IsoIr110CharacterSetCodec, "ISO_IR 110", ISO_8859_4);
decl_character_set!(IsoIr144CharacterSetCodec, "ISO_IR 144", ISO_8859_5);
decl_character_set!(IsoIr127CharacterSetCodec, "ISO_IR 127", ISO_8859_6);
decl_character_set!(IsoIr126CharacterSetCodec, "ISO_IR 126", ISO_8859_7);
decl_character_set!(IsoIr138CharacterSetCodec, "ISO_IR 138", ISO_8859_8);
decl_character_set!(IsoIr148CharacterSetCodec, "ISO_IR 148", WINDOWS_1254);
decl_character_set!(IsoIr166CharacterSetCodec, "ISO_IR 166", WINDOWS_874);
decl_character_set!(IsoIr13CharacterSetCodec, "ISO_IR 13", WINDOWS_31J);
decl_character_set!(IsoIr87CharacterSetCodec, "ISO 2022 IR 87", ISO_2022_JP);
decl_character_set!(Utf8CharacterSetCodec, "ISO_IR 192", UTF_8);
decl_character_set!(Gb18030CharacterSetCodec, "GB18030", GB18030);
decl_character_set!(GbkCharacterSetCodec, "GBK", GBK);

/// A descriptor for a specific character set,
/// taking part in the decoding of special text values.
///
/// Use [`from_term`](SpecificCharacterSet::from_term) to resolve a
/// character set from a Specific Character Set (0008,0005) value.
/// The default character set decodes as UTF-8.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpecificCharacterSet(CharsetImpl);

impl SpecificCharacterSet {
    /// Obtain the specific character set identified by the given
    /// defined term. Returns `None` for unrecognized terms and for
    /// the deliberately unsupported Korean (`ISO 2022 IR 149`) and
    /// simplified-Chinese (`ISO 2022 IR 58`) code extensions.
    pub fn from_term(term: &str) -> Option<Self> {
        CharsetImpl::from_term(term).map(SpecificCharacterSet)
    }
}

impl TextCodec for SpecificCharacterSet {
    fn name(&self) -> Cow<'static, str> {
        self.0.name()
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        self.0.decode(text)
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        self.0.encode(text)
    }
}

/// An enum type for the individual supported character sets.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
#[non_exhaustive]
enum CharsetImpl {
    /// **ISO-IR 192**: Unicode in UTF-8, the default.
    #[default]
    IsoIr192,
    /// **ISO-IR 100** (ISO-8859-1): Western Europe.
    IsoIr100,
    /// **ISO-IR 101** (ISO-8859-2): Central/Eastern Europe.
    IsoIr101,
    /// **ISO-IR 109** (ISO-8859-3): South Europe.
    IsoIr109,
    /// **ISO-IR 110** (ISO-8859-4): North Europe.
    IsoIr110,
    /// **ISO-IR 144** (ISO-8859-5): Latin/Cyrillic.
    IsoIr144,
    /// **ISO-IR 127** (ISO-8859-6): Latin/Arabic.
    IsoIr127,
    /// **ISO-IR 126** (ISO-8859-7): Latin/Greek.
    IsoIr126,
    /// **ISO-IR 138** (ISO-8859-8): Latin/Hebrew.
    IsoIr138,
    /// **ISO-IR 148** (ISO-8859-9): Latin 5, Turkish.
    IsoIr148,
    /// **ISO-IR 166** (TIS 620-2533 / ISO-8859-11): Thai.
    IsoIr166,
    /// **ISO-IR 13** (JIS X 0201): Japanese, decoded as Shift-JIS.
    IsoIr13,
    /// **ISO 2022 IR 87** (JIS X 0208): Japanese, ISO-2022-JP.
    IsoIr87,
    /// **GB18030**: Simplified Chinese.
    Gb18030,
    /// **GBK** (also covering GB2312): Simplified Chinese.
    Gbk,
}

impl CharsetImpl {
    fn from_term(term: &str) -> Option<Self> {
        use self::CharsetImpl::*;
        match term.trim() {
            "ISO_IR 192" | "ISO_IR_192" => Some(IsoIr192),
            "ISO_IR 100" | "ISO_IR_100" | "ISO 2022 IR 100" => Some(IsoIr100),
            "ISO_IR 101" | "ISO_IR_101" | "ISO 2022 IR 101" => Some(IsoIr101),
            "ISO_IR 109" | "ISO_IR_109" | "ISO 2022 IR 109" => Some(IsoIr109),
            "ISO_IR 110" | "ISO_IR_110" | "ISO 2022 IR 110" => Some(IsoIr110),
            "ISO_IR 144" | "ISO_IR_144" | "ISO 2022 IR 144" => Some(IsoIr144),
            "ISO_IR 127" | "ISO_IR_127" | "ISO 2022 IR 127" => Some(IsoIr127),
            "ISO_IR 126" | "ISO_IR_126" | "ISO 2022 IR 126" => Some(IsoIr126),
            "ISO_IR 138" | "ISO_IR_138" | "ISO 2022 IR 138" => Some(IsoIr138),
            "ISO_IR 148" | "ISO_IR_148" | "ISO 2022 IR 148" => Some(IsoIr148),
            "ISO_IR 166" | "ISO_IR_166" | "ISO 2022 IR 166" => Some(IsoIr166),
            "ISO_IR 13" | "ISO_IR_13" | "ISO 2022 IR 13" => Some(IsoIr13),
            "ISO 2022 IR 87" => Some(IsoIr87),
            "GB18030" => Some(Gb18030),
            "GBK" | "GB2312" => Some(Gbk),
            _ => None,
        }
    }
}

impl TextCodec for CharsetImpl {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            CharsetImpl::IsoIr192 => "ISO_IR 192",
            CharsetImpl::IsoIr100 => "ISO_IR 100",
            CharsetImpl::IsoIr101 => "ISO_IR 101",
            CharsetImpl::IsoIr109 => "ISO_IR 109",
            CharsetImpl::IsoIr110 => "ISO_IR 110",
            CharsetImpl::IsoIr144 => "ISO_IR 144",
            CharsetImpl::IsoIr127 => "ISO_IR 127",
            CharsetImpl::IsoIr126 => "ISO_IR 126",
            CharsetImpl::IsoIr138 => "ISO_IR 138",
            CharsetImpl::IsoIr148 => "ISO_IR 148",
            CharsetImpl::IsoIr166 => "ISO_IR 166",
            CharsetImpl::IsoIr13 => "ISO_IR 13",
            CharsetImpl::IsoIr87 => "ISO 2022 IR 87",
            CharsetImpl::Gb18030 => "GB18030",
            CharsetImpl::Gbk => "GBK",
        })
    }

    fn decode(&self, text: &[u8]) -> DecodeResult<String> {
        match self {
            CharsetImpl::IsoIr192 => Utf8CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr100 => IsoIr100CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr101 => IsoIr101CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr109 => IsoIr109CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr110 => IsoIr110CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr144 => IsoIr144CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr127 => IsoIr127CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr126 => IsoIr126CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr138 => IsoIr138CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr148 => IsoIr148CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr166 => IsoIr166CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr13 => IsoIr13CharacterSetCodec.decode(text),
            CharsetImpl::IsoIr87 => IsoIr87CharacterSetCodec.decode(text),
            CharsetImpl::Gb18030 => Gb18030CharacterSetCodec.decode(text),
            CharsetImpl::Gbk => GbkCharacterSetCodec.decode(text),
        }
    }

    fn encode(&self, text: &str) -> EncodeResult<Vec<u8>> {
        match self {
            CharsetImpl::IsoIr192 => Utf8CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr100 => IsoIr100CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr101 => IsoIr101CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr109 => IsoIr109CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr110 => IsoIr110CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr144 => IsoIr144CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr127 => IsoIr127CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr126 => IsoIr126CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr138 => IsoIr138CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr148 => IsoIr148CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr166 => IsoIr166CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr13 => IsoIr13CharacterSetCodec.encode(text),
            CharsetImpl::IsoIr87 => IsoIr87CharacterSetCodec.encode(text),
            CharsetImpl::Gb18030 => Gb18030CharacterSetCodec.encode(text),
            CharsetImpl::Gbk => GbkCharacterSetCodec.encode(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec<T>(codec: T, string: &str, bytes: &[u8])
    where
        T: TextCodec,
    {
        assert_eq!(codec.encode(string).expect("encoding"), bytes);
        assert_eq!(codec.decode(bytes).expect("decoding"), string);
    }

    #[test]
    fn default_is_utf8() {
        let codec = SpecificCharacterSet::default();
        assert_eq!(codec.name(), "ISO_IR 192");
        test_codec(&codec, "Simões^John", "Simões^John".as_bytes());
        test_codec(codec, "Иванков^Андрей", "Иванков^Андрей".as_bytes());
    }

    #[test]
    fn iso_ir_100_baseline() {
        let codec = SpecificCharacterSet::from_term("ISO_IR 100").unwrap();
        test_codec(&codec, "Simões^João", b"Sim\xF5es^Jo\xE3o");
        test_codec(codec, "Günther^Hans", b"G\xfcnther^Hans");
    }

    #[test]
    fn iso_ir_144_baseline() {
        let codec = SpecificCharacterSet::from_term("ISO_IR 144").unwrap();
        test_codec(
            codec,
            "Иванков^Андрей",
            b"\xb8\xd2\xd0\xdd\xda\xde\xd2^\xb0\xdd\xd4\xe0\xd5\xd9",
        );
    }

    #[test]
    fn term_resolution() {
        assert!(SpecificCharacterSet::from_term("ISO_IR 101").is_some());
        assert!(SpecificCharacterSet::from_term("ISO 2022 IR 110").is_some());
        assert!(SpecificCharacterSet::from_term("ISO 2022 IR 87").is_some());
        assert!(SpecificCharacterSet::from_term("GB18030").is_some());
        assert!(SpecificCharacterSet::from_term("GB2312").is_some());
        assert!(SpecificCharacterSet::from_term(" ISO_IR 166 ").is_some());
        // deliberately unsupported code extensions
        assert!(SpecificCharacterSet::from_term("ISO 2022 IR 149").is_none());
        assert!(SpecificCharacterSet::from_term("ISO 2022 IR 58").is_none());
        assert!(SpecificCharacterSet::from_term("KOI-8").is_none());
    }

    #[test]
    fn default_repertoire_is_latin_passthrough() {
        test_codec(DefaultCharacterSetCodec, "Smith^John", b"Smith^John");
    }
}
