//! # medview
//!
//! This crate serves as a parent for the library crates of the
//! medview project: a DICOM file-format engine with a round-trip
//! parser and writer for the binary data-set encoding, and a pixel
//! data pipeline producing multi-frame images with geometry and
//! rescale metadata.
//!
//! The modules are also available as independent crates, all carrying
//! the `medview-` prefix:
//!
//! - [`core`] holds the data model: tags ([`Tag`](medview_core::Tag)),
//!   value representations ([`VR`](medview_core::VR)), element values
//!   and the ordered data set map.
//! - [`dictionary_std`] is the standard attribute dictionary, with
//!   named tag constants in [`tags`](medview_dictionary_std::tags).
//! - [`encoding`] contains the byte-level cursor, the specific
//!   character set codecs and the transfer syntax registry.
//! - [`parser`] reads DICOM files into element maps and writes them
//!   back, optionally applying per-element write rules.
//! - [`pixeldata`] extracts and decodes pixel frames and builds the
//!   image entity with its geometry.

pub use medview_core as core;
pub use medview_dictionary_std as dictionary_std;
pub use medview_encoding as encoding;
pub use medview_parser as parser;
pub use medview_pixeldata as pixeldata;

pub use medview_core::{DataSet, Element, Length, Tag, Value, VR};
pub use medview_parser::{DicomFile, Parser, Writer};
pub use medview_pixeldata::{Image, PixelPipeline};
