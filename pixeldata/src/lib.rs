#![deny(trivial_casts, trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications, unused_import_braces)]

//! The pixel data side of the medview DICOM engine:
//! frame extraction and decoding, the decoded image entity,
//! and the spatial geometry of image volumes.

pub mod geometry;
pub mod image;
pub mod pipeline;

pub use geometry::{Geometry, Orientation, Point3, Size, Spacing};
pub use image::{FrameBuffer, Image, ImageFactory, ImageMeta, Rsi};
pub use pipeline::{
    DecodeError, DecodeRequest, FrameDecoder, NullObserver, PipelineObserver, PixelPipeline,
};

use snafu::{Backtrace, Snafu};

/// An error type for pixel pipeline and image construction issues.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The data set cannot describe an image
    /// (a mandatory attribute is absent or unusable).
    #[snafu(display("Missing or unusable attribute `{}`", name))]
    MalformedImage {
        /// The name of the offending attribute.
        name: &'static str,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },

    /// The incoming slice is not compatible with the volume.
    /// Only the offending append is rejected.
    #[snafu(display("Cannot append slice: {}", reason))]
    SliceMismatch {
        /// What the mismatch is.
        reason: &'static str,
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },

    /// The external decoder failed on one frame.
    #[snafu(display("Could not decode frame {}", index))]
    DecoderFailure {
        /// The frame index.
        index: usize,
        /// The decoder's error.
        source: pipeline::DecodeError,
    },

    /// The pixel data is encapsulated
    /// but no frame decoder is configured.
    #[snafu(display("No frame decoder is configured for compressed pixel data"))]
    MissingDecoder {
        /// The generated backtrace, if available.
        backtrace: Backtrace,
    },
}
