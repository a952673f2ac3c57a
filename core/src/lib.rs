#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Core data structures of the medview DICOM engine:
//! attribute tags, value representations, value lengths,
//! element values, ordered data sets,
//! and the data element dictionary abstraction.

pub mod data_set;
pub mod dictionary;
pub mod header;
pub mod value;

pub use data_set::{DataSet, Element};
pub use dictionary::{DataDictionary, DictionaryEntry};
pub use header::{Length, Tag, VR};
pub use value::Value;
