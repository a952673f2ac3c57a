#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! Byte-level encoding primitives for the medview DICOM engine:
//! the endian-aware byte cursor, specific character set codecs,
//! and the transfer syntax registry.

pub mod cursor;
pub mod text;
pub mod transfer_syntax;

pub use byteordered::Endianness;
pub use cursor::{ByteCursor, ByteWriter};
pub use text::{SpecificCharacterSet, TextCodec};
pub use transfer_syntax::{Codec, TransferSyntax};
