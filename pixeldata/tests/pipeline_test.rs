//! Pipeline tests over hand-crafted encapsulated and native buffers.

use medview_core::Tag;
use medview_dictionary_std::tags;
use medview_encoding::cursor::ByteWriter;
use medview_encoding::Endianness;
use medview_parser::{DicomFile, Parser};
use medview_pixeldata::pipeline::{
    DecodeError, DecodeRequest, FrameDecoder, PipelineObserver, PixelPipeline,
};
use medview_pixeldata::{Error, FrameBuffer, NullObserver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

fn file_head(transfer_syntax: &str) -> ByteWriter {
    let mut uid = transfer_syntax.to_owned();
    if uid.len() % 2 != 0 {
        uid.push('\0');
    }
    let mut w = ByteWriter::new(Endianness::Little);
    w.write_bytes(&[0u8; 128]);
    w.write_str("DICM");
    w.write_tag(Tag(0x0002, 0x0000));
    w.write_str("UL");
    w.write_u16(4);
    w.write_u32(4 + 8 + uid.len() as u32);
    w.write_tag(Tag(0x0002, 0x0010));
    w.write_str("UI");
    w.write_u16(uid.len() as u16);
    w.write_str(&uid);
    w
}

fn element_u16(w: &mut ByteWriter, tag: Tag, value: u16) {
    w.write_tag(tag);
    w.write_str("US");
    w.write_u16(2);
    w.write_u16(value);
}

fn element_str(w: &mut ByteWriter, tag: Tag, vr: &str, value: &str) {
    assert_eq!(value.len() % 2, 0);
    w.write_tag(tag);
    w.write_str(vr);
    w.write_u16(value.len() as u16);
    w.write_str(value);
}

/// A 1x1 RGB image, three frames, one JPEG "fragment" per frame.
fn encapsulated_file() -> DicomFile {
    let mut w = file_head(JPEG_BASELINE);
    element_u16(&mut w, tags::SAMPLES_PER_PIXEL, 3);
    element_str(&mut w, tags::PHOTOMETRIC_INTERPRETATION, "CS", "YBR_FULL_422");
    element_str(&mut w, tags::NUMBER_OF_FRAMES, "IS", "3 ");
    element_u16(&mut w, tags::ROWS, 1);
    element_u16(&mut w, tags::COLUMNS, 1);
    element_u16(&mut w, tags::BITS_ALLOCATED, 8);
    w.write_tag(tags::PIXEL_DATA);
    w.write_str("OB");
    w.write_u16(0);
    w.write_u32(0xFFFF_FFFF);
    // empty basic offset table
    w.write_tag(Tag::ITEM);
    w.write_u32(0);
    for seed in 1..=3u8 {
        w.write_tag(Tag::ITEM);
        w.write_u32(2);
        w.write_bytes(&[seed, seed]);
    }
    w.write_tag(Tag::SEQUENCE_DELIMITER);
    w.write_u32(0);
    Parser::new().parse(&w.into_bytes()).unwrap()
}

/// A native 2x2, 8-bit, two-frame file.
fn native_multi_frame_file() -> DicomFile {
    let mut w = file_head("1.2.840.10008.1.2.1");
    element_u16(&mut w, tags::SAMPLES_PER_PIXEL, 1);
    element_str(&mut w, tags::PHOTOMETRIC_INTERPRETATION, "CS", "MONOCHROME2 ");
    element_str(&mut w, tags::NUMBER_OF_FRAMES, "IS", "2 ");
    element_u16(&mut w, tags::ROWS, 2);
    element_u16(&mut w, tags::COLUMNS, 2);
    element_u16(&mut w, tags::BITS_ALLOCATED, 8);
    w.write_tag(tags::PIXEL_DATA);
    w.write_str("OB");
    w.write_u16(0);
    w.write_u32(8);
    w.write_bytes(&[10, 11, 12, 13, 20, 21, 22, 23]);
    Parser::new().parse(&w.into_bytes()).unwrap()
}

/// Decodes every "fragment" into a deterministic 1x1 RGB buffer.
#[derive(Debug, Default)]
struct StubDecoder;

impl FrameDecoder for StubDecoder {
    fn decode(&self, frame: &[u8], request: &DecodeRequest) -> Result<FrameBuffer, DecodeError> {
        assert_eq!(request.bits_allocated, 8);
        let seed = frame.first().copied().unwrap_or(0);
        Ok(FrameBuffer::U8(vec![seed, seed + 1, seed + 2]))
    }
}

/// A decoder that always fails.
#[derive(Debug, Default)]
struct BrokenDecoder;

impl FrameDecoder for BrokenDecoder {
    fn decode(&self, _frame: &[u8], _request: &DecodeRequest) -> Result<FrameBuffer, DecodeError> {
        Err(DecodeError::new("bitstream damaged"))
    }
}

#[derive(Debug, Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    decoded: AtomicUsize,
    load_ends: AtomicUsize,
}

impl PipelineObserver for RecordingObserver {
    fn on_progress(&self, percent: f32) {
        self.events.lock().unwrap().push(format!("progress {}", percent));
    }

    fn on_frame_decoded(&self, index: usize) {
        self.decoded.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("decoded {}", index));
    }

    fn on_error(&self, error: &Error) {
        self.events.lock().unwrap().push(format!("error {}", error));
    }

    fn on_load_end(&self) {
        self.load_ends.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("load-end".to_owned());
    }
}

#[test]
fn encapsulated_frames_decode_through_the_stub() {
    let file = encapsulated_file();
    let pipeline = PixelPipeline::with_decoder(Box::new(StubDecoder));
    let observer = RecordingObserver::default();

    let image = pipeline.run(&file, &observer).unwrap().unwrap();

    assert_eq!(image.frames().len(), 3);
    assert_eq!(image.frames()[0], FrameBuffer::U8(vec![1, 2, 3]));
    assert_eq!(image.frames()[2], FrameBuffer::U8(vec![3, 4, 5]));
    // codec output contract: compressed color comes back as RGB
    assert_eq!(image.photometric_interpretation(), "RGB");
    assert_eq!(image.number_of_components(), 3);

    // every frame reported, load-end exactly once and last
    assert_eq!(observer.decoded.load(Ordering::SeqCst), 3);
    assert_eq!(observer.load_ends.load(Ordering::SeqCst), 1);
    let events = observer.events.lock().unwrap();
    assert_eq!(events.last().map(String::as_str), Some("load-end"));
    let last_decode = events.iter().rposition(|e| e.starts_with("decoded")).unwrap();
    let load_end = events.iter().position(|e| e == "load-end").unwrap();
    assert!(load_end > last_decode);
}

#[test]
fn frame_zero_decodes_before_the_rest() {
    let file = encapsulated_file();
    let pipeline = PixelPipeline::with_decoder(Box::new(StubDecoder));
    let observer = RecordingObserver::default();
    pipeline.run(&file, &observer).unwrap().unwrap();

    let events = observer.events.lock().unwrap();
    let first_decode = events.iter().find(|e| e.starts_with("decoded")).unwrap();
    assert_eq!(first_decode, "decoded 0");
}

#[test]
fn native_frames_partition_the_pixel_buffer() {
    let file = native_multi_frame_file();
    let pipeline = PixelPipeline::new();
    let image = pipeline.run(&file, &NullObserver).unwrap().unwrap();

    // rows x columns x samples x frames samples in total
    assert_eq!(image.frames().len(), 2);
    let total: usize = image.frames().iter().map(FrameBuffer::len).sum();
    assert_eq!(total, 2 * 2 * 1 * 2);
    assert_eq!(image.frames()[1], FrameBuffer::U8(vec![20, 21, 22, 23]));
    assert_eq!(image.get_value(1, 0, 0, 1), Some(21.0));
}

#[test]
fn missing_decoder_is_an_error() {
    let file = encapsulated_file();
    let pipeline = PixelPipeline::new();
    assert!(matches!(
        pipeline.run(&file, &NullObserver),
        Err(Error::MissingDecoder { .. })
    ));
}

#[test]
fn aborting_returns_no_image() {
    let file = encapsulated_file();
    let pipeline = PixelPipeline::with_decoder(Box::new(StubDecoder));
    pipeline.abort();
    assert!(pipeline.run(&file, &NullObserver).unwrap().is_none());
}

#[test]
fn broken_frames_are_reported_not_fatal_after_frame_zero() {
    // frame 0 failing is fatal: the image cannot be built
    let file = encapsulated_file();
    let pipeline = PixelPipeline::with_decoder(Box::new(BrokenDecoder));
    let observer = RecordingObserver::default();
    let result = pipeline.run(&file, &observer);
    assert!(matches!(result, Err(Error::DecoderFailure { index: 0, .. })));
    let events = observer.events.lock().unwrap();
    assert!(events.iter().any(|e| e.starts_with("error")));
}
