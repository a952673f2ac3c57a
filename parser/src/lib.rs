#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Parsing and writing of DICOM files for the medview engine.
//!
//! The parser turns an in-memory byte buffer into an ordered element
//! map; the writer turns the map back into bytes, optionally applying
//! a per-element rule table (copy, remove, clear, replace) on the way
//! out.

pub mod read;
pub mod rules;
pub mod write;

pub use read::{DicomFile, Parser};
pub use rules::{Action, WriteRules};
pub use write::Writer;
