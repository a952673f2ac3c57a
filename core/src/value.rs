//! A high level abstraction over a DICOM data element's value.
//!
//! Values are stored as a tagged union over the primitive sequence
//! types produced by the parser, plus nested item data sets for `SQ`
//! elements and raw fragment lists for encapsulated pixel data.

use crate::data_set::DataSet;
use smallvec::SmallVec;
use std::convert::TryFrom;

/// An aggregation of one or more string values in an element.
pub type Strings = SmallVec<[String; 2]>;

/// Representation of a full DICOM element value.
///
/// The active variant is decided by the element's value representation,
/// together with the implicit-VR and undefined-length flags,
/// at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value (zero-length element).
    Empty,
    /// Sequence of unsigned 8-bit integers (OB, UN, raw bytes).
    U8s(Vec<u8>),
    /// Sequence of signed 8-bit integers (signed 8-bit pixel data).
    I8s(Vec<i8>),
    /// Sequence of unsigned 16-bit integers (US, OW).
    U16s(Vec<u16>),
    /// Sequence of signed 16-bit integers (SS, signed 16-bit pixel data).
    I16s(Vec<i16>),
    /// Sequence of unsigned 32-bit integers (UL).
    U32s(Vec<u32>),
    /// Sequence of signed 32-bit integers (SL).
    I32s(Vec<i32>),
    /// Sequence of 32-bit floating point numbers (FL, OF).
    F32s(Vec<f32>),
    /// Sequence of 64-bit floating point numbers (FD, OD).
    F64s(Vec<f64>),
    /// Sequence of text values, already split on the `\` separator.
    Strs(Strings),
    /// Item data sets of a sequence (SQ) element.
    Items(Vec<DataSet>),
    /// Raw fragments of an encapsulated pixel data element.
    Fragments(Vec<Vec<u8>>),
}

impl Value {
    /// Construct a value holding a single string.
    pub fn single_str(s: impl Into<String>) -> Value {
        let mut strings = Strings::new();
        strings.push(s.into());
        Value::Strs(strings)
    }

    /// Obtain the number of individual values:
    /// the element count for primitive sequences,
    /// the item count for sequences,
    /// and the fragment count for pixel sequences.
    pub fn multiplicity(&self) -> usize {
        match self {
            Value::Empty => 0,
            Value::U8s(v) => v.len(),
            Value::I8s(v) => v.len(),
            Value::U16s(v) => v.len(),
            Value::I16s(v) => v.len(),
            Value::U32s(v) => v.len(),
            Value::I32s(v) => v.len(),
            Value::F32s(v) => v.len(),
            Value::F64s(v) => v.len(),
            Value::Strs(v) => v.len(),
            Value::Items(v) => v.len(),
            Value::Fragments(v) => v.len(),
        }
    }

    /// Whether the value holds nothing.
    pub fn is_empty(&self) -> bool {
        self.multiplicity() == 0
    }

    /// Gets a reference to the first string value, if textual.
    pub fn first_str(&self) -> Option<&str> {
        match self {
            Value::Strs(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Retrieve the element's text values as a single string,
    /// joined with the `\` multi-value separator.
    pub fn to_str(&self) -> Option<String> {
        match self {
            Value::Strs(v) => Some(v.join("\\")),
            _ => None,
        }
    }

    /// Gets a reference to the sequence items, if this is a sequence value.
    pub fn items(&self) -> Option<&[DataSet]> {
        match self {
            Value::Items(v) => Some(v),
            _ => None,
        }
    }

    /// Gets a reference to the pixel fragments,
    /// if this is an encapsulated pixel data value.
    pub fn fragments(&self) -> Option<&[Vec<u8>]> {
        match self {
            Value::Fragments(v) => Some(v),
            _ => None,
        }
    }

    /// Convert the first individual value to an unsigned 16-bit integer,
    /// if the conversion is lossless.
    pub fn to_u16(&self) -> Option<u16> {
        match self {
            Value::U16s(v) => v.first().copied(),
            Value::I16s(v) => v.first().and_then(|&x| u16::try_from(x).ok()),
            Value::U32s(v) => v.first().and_then(|&x| u16::try_from(x).ok()),
            Value::I32s(v) => v.first().and_then(|&x| u16::try_from(x).ok()),
            Value::U8s(v) => v.first().map(|&x| u16::from(x)),
            Value::Strs(v) => v.first().and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }

    /// Convert the first individual value to an unsigned 32-bit integer,
    /// if the conversion is lossless.
    pub fn to_u32(&self) -> Option<u32> {
        match self {
            Value::U32s(v) => v.first().copied(),
            Value::U16s(v) => v.first().map(|&x| u32::from(x)),
            Value::U8s(v) => v.first().map(|&x| u32::from(x)),
            Value::I32s(v) => v.first().and_then(|&x| u32::try_from(x).ok()),
            Value::Strs(v) => v.first().and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }

    /// Convert the individual value at `index` to a 64-bit float.
    /// Numeric strings (DS, IS) are parsed.
    pub fn to_f64_at(&self, index: usize) -> Option<f64> {
        match self {
            Value::F64s(v) => v.get(index).copied(),
            Value::F32s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::U8s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::I8s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::U16s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::I16s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::U32s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::I32s(v) => v.get(index).map(|&x| f64::from(x)),
            Value::Strs(v) => v.get(index).and_then(|s| s.trim().parse().ok()),
            _ => None,
        }
    }

    /// Convert the first individual value to a 64-bit float.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_f64_at(0)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::single_str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::single_str(s)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Value {
        Value::U16s(vec![v])
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::U32s(vec![v])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplicity_counts_individual_values() {
        let v = Value::Strs(Strings::from_vec(vec![
            "MONOCHROME2".to_owned(),
            "LOSSY".to_owned(),
        ]));
        assert_eq!(v.multiplicity(), 2);
        assert_eq!(Value::U16s(vec![1, 2, 3]).multiplicity(), 3);
        assert_eq!(Value::Empty.multiplicity(), 0);
    }

    #[test]
    fn join_on_backslash() {
        let v = Value::Strs(Strings::from_vec(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(v.to_str().as_deref(), Some("a\\b"));
        assert_eq!(v.first_str(), Some("a"));
    }

    #[test]
    fn numeric_casts() {
        assert_eq!(Value::U16s(vec![512]).to_u32(), Some(512));
        assert_eq!(Value::single_str(" 3 ").to_u16(), Some(3));
        assert_eq!(Value::single_str("1.5").to_f64(), Some(1.5));
        assert_eq!(Value::F64s(vec![0.5, 2.0]).to_f64_at(1), Some(2.0));
        assert_eq!(Value::I16s(vec![-1]).to_u16(), None);
    }
}
