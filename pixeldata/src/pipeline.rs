//! The pixel data pipeline: slices native frames out of the parsed
//! pixel element, or dispatches encapsulated frames to an external
//! decoder, and hands the result to the image factory.
//!
//! Frame 0 is always decoded synchronously, because the image cannot
//! be constructed before its decoded form is known. The remaining
//! frames are decoded on a thread pool, each landing in its own slot.
//! Progress is monotone in the number of completed frames but may
//! arrive out of frame-index order; `on_load_end` fires exactly once,
//! after every frame completed. `abort` stops undispatched work and
//! makes the run return no image.

use crate::image::{FrameBuffer, Image, ImageFactory};
use crate::{Error, MalformedImageSnafu, MissingDecoderSnafu};
use medview_core::Value;
use medview_dictionary_std::tags;
use medview_encoding::transfer_syntax::Codec;
use medview_parser::read::{number_of_frames, DicomFile};
use rayon::prelude::*;
use snafu::{OptionExt, Snafu};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// An error reported by an external frame decoder.
#[derive(Debug, Snafu)]
#[snafu(display("{}", message))]
pub struct DecodeError {
    /// The decoder's error message.
    pub message: String,
}

impl DecodeError {
    /// Create a decoder error from a message.
    pub fn new(message: impl Into<String>) -> DecodeError {
        DecodeError {
            message: message.into(),
        }
    }
}

/// What a frame decoder needs to know about the frame
/// besides its bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeRequest {
    /// The compression family of the transfer syntax.
    pub codec: Codec,
    /// BitsAllocated of the stored pixels.
    pub bits_allocated: u16,
    /// Whether the stored pixels are signed (PixelRepresentation 1).
    pub is_signed: bool,
}

/// An external frame decoding capability (JPEG baseline, JPEG
/// lossless, JPEG 2000). Implementations must be callable from
/// multiple worker threads at once.
pub trait FrameDecoder: Send + Sync {
    /// Decode one frame's bytes into a typed pixel buffer.
    fn decode(&self, frame: &[u8], request: &DecodeRequest) -> Result<FrameBuffer, DecodeError>;
}

/// Receives pipeline lifecycle events. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Percentage of frames decoded so far, monotone in count.
    fn on_progress(&self, _percent: f32) {}
    /// One frame finished decoding; indices may arrive out of order.
    fn on_frame_decoded(&self, _index: usize) {}
    /// A frame failed to decode. The run continues.
    fn on_error(&self, _error: &Error) {}
    /// Every frame completed; fired exactly once per run.
    fn on_load_end(&self) {}
}

/// An observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {}

/// The pixel data pipeline.
pub struct PixelPipeline {
    decoder: Option<Box<dyn FrameDecoder>>,
    abort: AtomicBool,
}

impl fmt::Debug for PixelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PixelPipeline")
            .field("decoder", &self.decoder.as_ref().map(|_| "dyn FrameDecoder"))
            .field("abort", &self.abort)
            .finish()
    }
}

impl Default for PixelPipeline {
    fn default() -> Self {
        PixelPipeline::new()
    }
}

impl PixelPipeline {
    /// Create a pipeline without a decoder
    /// (native pixel data only).
    pub fn new() -> Self {
        PixelPipeline {
            decoder: None,
            abort: AtomicBool::new(false),
        }
    }

    /// Create a pipeline dispatching encapsulated frames
    /// to the given decoder.
    pub fn with_decoder(decoder: Box<dyn FrameDecoder>) -> Self {
        PixelPipeline {
            decoder: Some(decoder),
            abort: AtomicBool::new(false),
        }
    }

    /// Signal cancellation: undispatched frame decodes are dropped
    /// silently and the run returns no image.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Whether `abort` was called.
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Build the image of a parsed file, reporting lifecycle events
    /// to the observer. Returns `None` when the run was aborted.
    pub fn run(
        &self,
        file: &DicomFile,
        observer: &dyn PipelineObserver,
    ) -> Result<Option<Image>, Error> {
        let data = &file.data;
        let codec = file.syntax.codec();
        let element = data
            .get(tags::PIXEL_DATA)
            .context(MalformedImageSnafu { name: "PixelData" })?;

        match &element.value {
            Value::Fragments(fragments) => self.run_encapsulated(file, fragments, observer),
            value => {
                if codec != Codec::None {
                    warn!(
                        "compressed transfer syntax `{}` without encapsulated pixel data",
                        file.syntax.name()
                    );
                }
                let frames = slice_native_frames(value, number_of_frames(data))?;
                let image = ImageFactory.create(data, codec, frames)?;
                observer.on_progress(100.0);
                observer.on_load_end();
                Ok(Some(image))
            }
        }
    }

    fn run_encapsulated(
        &self,
        file: &DicomFile,
        fragments: &[Vec<u8>],
        observer: &dyn PipelineObserver,
    ) -> Result<Option<Image>, Error> {
        let data = &file.data;
        let decoder = self.decoder.as_ref().context(MissingDecoderSnafu)?;
        let request = DecodeRequest {
            codec: file.syntax.codec(),
            bits_allocated: data.u16_value(tags::BITS_ALLOCATED).unwrap_or(16),
            is_signed: data.u16_value(tags::PIXEL_REPRESENTATION) == Some(1),
        };

        // entry 0 is the basic offset table
        let frames = fragments.get(1..).unwrap_or_default();
        snafu::ensure!(
            !frames.is_empty(),
            MalformedImageSnafu { name: "PixelData" }
        );
        let total = frames.len();

        if self.is_aborted() {
            return Ok(None);
        }

        // frame 0 decodes synchronously: the image factory cannot run
        // before its decoded form is known
        let first = match decoder.decode(&frames[0], &request) {
            Ok(buffer) => buffer,
            Err(source) => {
                let error = Error::DecoderFailure { index: 0, source };
                observer.on_error(&error);
                return Err(error);
            }
        };
        observer.on_frame_decoded(0);
        observer.on_progress(100.0 / total as f32);

        let decoded = AtomicUsize::new(1);
        // progress reports are serialized so that the percentage
        // stays monotone even when completions race
        let report = Mutex::new(());
        let mut slots: Vec<Option<FrameBuffer>> = vec![None; total - 1];
        slots.par_iter_mut().enumerate().for_each(|(offset, slot)| {
            if self.is_aborted() {
                return;
            }
            let index = offset + 1;
            match decoder.decode(&frames[index], &request) {
                Ok(buffer) => *slot = Some(buffer),
                Err(source) => {
                    observer.on_error(&Error::DecoderFailure { index, source });
                }
            }
            let _guard = report.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let done = decoded.fetch_add(1, Ordering::SeqCst) + 1;
            observer.on_progress(done as f32 / total as f32 * 100.0);
            observer.on_frame_decoded(index);
        });

        if self.is_aborted() {
            return Ok(None);
        }

        let template = first.empty_like();
        let mut all = Vec::with_capacity(total);
        all.push(first);
        for slot in slots {
            // frames that failed to decode were already reported;
            // keep an empty placeholder so indices stay stable
            all.push(slot.unwrap_or_else(|| template.clone()));
        }

        let image = ImageFactory.create(data, request.codec, all)?;
        observer.on_load_end();
        Ok(Some(image))
    }
}

/// Partition a native pixel value into `frames` equal typed buffers.
fn slice_native_frames(value: &Value, frames: usize) -> Result<Vec<FrameBuffer>, Error> {
    fn chunked<T: Clone>(
        values: &[T],
        frames: usize,
        wrap: fn(Vec<T>) -> FrameBuffer,
    ) -> Vec<FrameBuffer> {
        if frames > 1 && values.len() % frames == 0 {
            let per_frame = values.len() / frames;
            values.chunks(per_frame).map(|c| wrap(c.to_vec())).collect()
        } else {
            if frames > 1 {
                warn!(
                    "{} pixel samples cannot be split into {} equal frames",
                    values.len(),
                    frames
                );
            }
            vec![wrap(values.to_vec())]
        }
    }

    match value {
        Value::U8s(v) => Ok(chunked(v, frames, FrameBuffer::U8)),
        Value::I8s(v) => Ok(chunked(v, frames, FrameBuffer::I8)),
        Value::U16s(v) => Ok(chunked(v, frames, FrameBuffer::U16)),
        Value::I16s(v) => Ok(chunked(v, frames, FrameBuffer::I16)),
        Value::U32s(v) => Ok(chunked(v, frames, FrameBuffer::U32)),
        Value::I32s(v) => Ok(chunked(v, frames, FrameBuffer::I32)),
        Value::F32s(v) => Ok(chunked(v, frames, FrameBuffer::F32)),
        _ => MalformedImageSnafu { name: "PixelData" }.fail(),
    }
}
