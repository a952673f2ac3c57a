#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! The standard DICOM attribute dictionary for the medview engine.
//!
//! The dictionary index is lazily initialized upon first use.
//! Besides the per-tag entries, the implementation resolves the
//! repeating curve (50xx) and overlay (60xx) groups, generic group
//! length elements (gggg,0000), and private creator elements.

mod entries;
mod group_names;
pub mod tags;

pub use entries::ENTRIES;
pub use group_names::group_name;

use medview_core::dictionary::{DataDictionary, DictionaryEntry};
use medview_core::{Tag, VR};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static REGISTRY: Lazy<StandardDictionaryRegistry> = Lazy::new(init_registry);

/// Generic group length dictionary entry, for any (gggg,0000).
static GROUP_LENGTH_ENTRY: DictionaryEntry =
    DictionaryEntry::new(0x0000, 0x0000, VR::UL, "1", "GenericGroupLength");

/// Generic private creator dictionary entry,
/// for odd groups with elements 0010 through 00FF.
static PRIVATE_CREATOR_ENTRY: DictionaryEntry =
    DictionaryEntry::new(0x0000, 0x0010, VR::LO, "1", "PrivateCreator");

/// The data struct actually containing the indexed dictionary.
#[derive(Debug)]
pub struct StandardDictionaryRegistry {
    /// mapping: tag → entry
    by_tag: HashMap<Tag, &'static DictionaryEntry>,
    /// mapping: keyword → entry
    by_keyword: HashMap<&'static str, &'static DictionaryEntry>,
}

impl StandardDictionaryRegistry {
    fn new() -> Self {
        StandardDictionaryRegistry {
            by_tag: HashMap::with_capacity(ENTRIES.len()),
            by_keyword: HashMap::with_capacity(ENTRIES.len()),
        }
    }

    fn index(&mut self, entry: &'static DictionaryEntry) -> &mut Self {
        self.by_tag.insert(entry.tag, entry);
        self.by_keyword.insert(entry.keyword, entry);
        self
    }
}

fn init_registry() -> StandardDictionaryRegistry {
    let mut registry = StandardDictionaryRegistry::new();
    for entry in ENTRIES {
        registry.index(entry);
    }
    registry
}

/// Whether the tag belongs to one of the repeating element families:
/// curves (5000-50FF) or overlays (6000-60FF), even groups only.
fn repeating_base(tag: Tag) -> Option<Tag> {
    match tag.group() {
        g if (0x5000..0x5100).contains(&g) && g % 2 == 0 => Some(Tag(0x5000, tag.element())),
        g if (0x6000..0x6100).contains(&g) && g % 2 == 0 => Some(Tag(0x6000, tag.element())),
        _ => None,
    }
}

/// A data element dictionary which consults
/// the library's lazily initialized attribute registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StandardDataDictionary;

impl DataDictionary for StandardDataDictionary {
    fn by_tag(&self, tag: Tag) -> Option<&'static DictionaryEntry> {
        let registry = &*REGISTRY;
        registry
            .by_tag
            .get(&tag)
            .copied()
            .or_else(|| {
                repeating_base(tag).and_then(|base| registry.by_tag.get(&base).copied())
            })
            .or_else(|| {
                // private creator elements
                if tag.group() % 2 == 1 && (0x0010..=0x00FF).contains(&tag.element()) {
                    return Some(&PRIVATE_CREATOR_ENTRY);
                }
                // group length elements
                if tag.element() == 0x0000 {
                    return Some(&GROUP_LENGTH_ENTRY);
                }
                None
            })
    }

    fn by_keyword(&self, keyword: &str) -> Option<&'static DictionaryEntry> {
        REGISTRY.by_keyword.get(keyword).copied()
    }

    fn group_name(&self, group: u16) -> Option<&'static str> {
        group_names::group_name(group)
    }
}
