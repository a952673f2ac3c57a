//! Basic types for interpreting DICOM data elements:
//! the attribute tag, the value representation code
//! and the value length with its undefined-length sentinel.

use std::cmp::Ordering;
use std::fmt;
use std::str::{from_utf8, FromStr};

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// Tags are an immutable `(group, element)` pair of 16-bit numbers.
/// Both `(u16, u16)` and `[u16; 2]` can be efficiently converted
/// to this type.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// The item tag (FFFE,E000).
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    /// The item delimitation tag (FFFE,E00D).
    pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
    /// The sequence delimitation tag (FFFE,E0DD).
    pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// The canonical map-key form of the tag:
    /// `x` followed by eight lowercase hex digits (e.g. `x7fe00010`).
    /// Keys exist in memory only and never appear on the wire.
    pub fn key(self) -> String {
        format!("x{:04x}{:04x}", self.0, self.1)
    }

    /// Parse a tag back from its canonical key form.
    pub fn from_key(key: &str) -> Option<Tag> {
        let hex = key.strip_prefix('x')?;
        if hex.len() != 8 {
            return None;
        }
        let group = u16::from_str_radix(&hex[..4], 16).ok()?;
        let element = u16::from_str_radix(&hex[4..], 16).ok()?;
        Some(Tag(group, element))
    }

    /// Check whether this is the item tag (FFFE,E000).
    #[inline]
    pub fn is_item(self) -> bool {
        self == Tag::ITEM
    }

    /// Check whether this is the item delimitation tag (FFFE,E00D).
    #[inline]
    pub fn is_item_delimiter(self) -> bool {
        self == Tag::ITEM_DELIMITER
    }

    /// Check whether this is the sequence delimitation tag (FFFE,E0DD).
    #[inline]
    pub fn is_sequence_delimiter(self) -> bool {
        self == Tag::SEQUENCE_DELIMITER
    }

    /// Check whether this is any of the three delimitation tags,
    /// which carry no VR on the wire.
    #[inline]
    pub fn is_delimiter(self) -> bool {
        self.0 == 0xFFFE
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from(value: [u16; 2]) -> Tag {
        Tag(value[0], value[1])
    }
}

/// An enum type for a DICOM value representation.
///
/// Besides the standard two-letter codes, this type carries the
/// internal markers `OX` (pixel data of undetermined OB/OW width),
/// `PI` (pixel item), `NA` (delimitation items) and `NONE`,
/// which never appear on the wire.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Single
    FL,
    /// Floating Point Double
    FD,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Double
    OD,
    /// Other Float
    OF,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unique Identifier (UID)
    UI,
    /// Unsigned Long
    UL,
    /// Unknown
    UN,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
    /// Pixel data with undetermined OB/OW width (internal)
    OX,
    /// Pixel data item (internal)
    PI,
    /// Not applicable, used for delimitation items (internal)
    NA,
    /// No value representation (internal)
    NONE,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    /// Internal markers are never produced by this function.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    pub fn to_string(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            US => "US",
            UT => "UT",
            OX => "ox",
            PI => "pi",
            NA => "na",
            NONE => "",
        }
    }

    /// Retrieve a copy of this VR's byte representation.
    /// The function returns two alphabetic characters in upper case.
    ///
    /// The internal markers (`OX`, `PI`, `NA`, `NONE`) have no wire
    /// form of their own and must be mapped to a real VR before
    /// serialization; asked for their bytes anyway, this function
    /// falls back to `UN`.
    pub fn to_bytes(self) -> [u8; 2] {
        use VR::*;
        match self {
            OX | PI | NA | NONE => {
                debug_assert!(false, "internal marker {:?} has no wire form", self);
                [b'U', b'N']
            }
            other => {
                let bytes = other.to_string().as_bytes();
                [bytes[0], bytes[1]]
            }
        }
    }

    /// Whether this VR uses the long header form in explicit VR syntaxes:
    /// a 2-byte reserved gap followed by a 32-bit value length.
    pub fn has_long_header(self) -> bool {
        use VR::*;
        matches!(self, OB | OW | OF | OD | SQ | UT | UN | OX | PI)
    }

    /// Whether values of this VR are decoded with the specific character
    /// set in effect, rather than as plain ISO-8859-1 text.
    pub fn is_special_text(self) -> bool {
        use VR::*;
        matches!(self, SH | LO | ST | PN | LT | UT)
    }

    /// Whether values of this VR are stored as text strings.
    pub fn is_string(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UI | UT
        )
    }
}

/// Obtain the value representation corresponding to the given string.
/// The string should hold exactly two UTF-8 encoded alphabetic characters
/// in upper case, otherwise no match is made.
impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FL" => Ok(FL),
            "FD" => Ok(FD),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OD" => Ok(OD),
            "OF" => Ok(OF),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(VR::to_string(*self))
    }
}

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

/// A type for representing data set content length, in bytes.
/// An internal value of `0xFFFF_FFFF` represents an undefined
/// (unspecified) length, which has to be determined with a
/// delimiter-driven traversal of the content.
///
/// Numeric comparisons do not function the same way as primitive
/// number types: two undefined lengths are not equal, and any
/// comparison against an undefined length is `false`.
#[derive(Clone, Copy)]
pub struct Length(pub u32);

impl Length {
    /// A length that is undefined.
    pub const UNDEFINED: Self = Length(UNDEFINED_LEN);

    /// Create a new length value with the given number of bytes.
    ///
    /// # Panic
    ///
    /// This function will panic if `len` represents an undefined length.
    pub fn defined(len: u32) -> Self {
        assert_ne!(len, UNDEFINED_LEN);
        Length(len)
    }

    /// Check whether this length is undefined.
    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// Check whether this length is well defined (not undefined).
    #[inline]
    pub fn is_defined(self) -> bool {
        !self.is_undefined()
    }

    /// Fetch the concrete length value, if available.
    /// Returns `None` if it represents an undefined length.
    #[inline]
    pub fn get(self) -> Option<u32> {
        match self.0 {
            UNDEFINED_LEN => None,
            v => Some(v),
        }
    }
}

impl From<u32> for Length {
    fn from(o: u32) -> Self {
        Length(o)
    }
}

impl PartialEq<Length> for Length {
    fn eq(&self, rhs: &Length) -> bool {
        match (self.0, rhs.0) {
            (UNDEFINED_LEN, _) | (_, UNDEFINED_LEN) => false,
            (l1, l2) => l1 == l2,
        }
    }
}

impl PartialOrd<Length> for Length {
    fn partial_cmp(&self, rhs: &Length) -> Option<Ordering> {
        match (self.0, rhs.0) {
            (UNDEFINED_LEN, _) | (_, UNDEFINED_LEN) => None,
            (l1, l2) => Some(l1.cmp(&l2)),
        }
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("Length(Undefined)"),
            l => f.debug_tuple("Length").field(&l).finish(),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("U/L"),
            l => write!(f, "{}", &l),
        }
    }
}
