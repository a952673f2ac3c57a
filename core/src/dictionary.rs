//! The data element dictionary abstraction.
//!
//! A dictionary maps attribute tags to their default value
//! representation, value multiplicity and keyword, and group numbers
//! to a display name. The standard dictionary implementation lives in
//! the `medview-dictionary-std` crate.

use crate::header::{Tag, VR};

/// A data element dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DictionaryEntry {
    /// The attribute tag.
    pub tag: Tag,
    /// The default value representation.
    pub vr: VR,
    /// The value multiplicity (e.g. `"1"`, `"2-n"`).
    pub vm: &'static str,
    /// The attribute keyword (e.g. `"PatientName"`).
    pub keyword: &'static str,
}

impl DictionaryEntry {
    /// Create a dictionary entry from its raw parts.
    pub const fn new(
        group: u16,
        element: u16,
        vr: VR,
        vm: &'static str,
        keyword: &'static str,
    ) -> Self {
        DictionaryEntry {
            tag: Tag(group, element),
            vr,
            vm,
            keyword,
        }
    }
}

/// An attribute dictionary of DICOM data elements.
pub trait DataDictionary {
    /// Fetch the entry for the given tag, if known.
    fn by_tag(&self, tag: Tag) -> Option<&'static DictionaryEntry>;

    /// Fetch the entry with the given keyword, if known.
    fn by_keyword(&self, keyword: &str) -> Option<&'static DictionaryEntry>;

    /// Fetch the display name of the given group number, if known.
    fn group_name(&self, group: u16) -> Option<&'static str>;

    /// The default value representation of the given tag.
    /// Unknown tags fall back to `UN`.
    fn vr_of(&self, tag: Tag) -> VR {
        self.by_tag(tag).map(|e| e.vr).unwrap_or(VR::UN)
    }
}

impl<T: DataDictionary + ?Sized> DataDictionary for &T {
    fn by_tag(&self, tag: Tag) -> Option<&'static DictionaryEntry> {
        (**self).by_tag(tag)
    }

    fn by_keyword(&self, keyword: &str) -> Option<&'static DictionaryEntry> {
        (**self).by_keyword(keyword)
    }

    fn group_name(&self, group: u16) -> Option<&'static str> {
        (**self).group_name(group)
    }
}
