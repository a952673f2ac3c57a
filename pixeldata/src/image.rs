//! The decoded image entity and its factory.
//!
//! An [`Image`] aggregates the typed frame buffers with the geometry,
//! the per-slice rescale transform, and the presentation attributes
//! derived from the data set. Images start as a single slice and grow
//! through [`Image::append_slice`], which keeps slices ordered along
//! the volume normal.

use crate::geometry::{Geometry, Orientation, Point3, Size, Spacing};
use crate::Error;
use crate::{MalformedImageSnafu, SliceMismatchSnafu};
use medview_core::DataSet;
use medview_dictionary_std::tags;
use medview_encoding::transfer_syntax::Codec;
use num_traits::ToPrimitive;
use snafu::{ensure, OptionExt};

/// A linear transform from stored pixel values to modality values:
/// `rescaled = stored * slope + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rsi {
    pub slope: f64,
    pub intercept: f64,
}

impl Rsi {
    /// The identity transform.
    pub const IDENTITY: Rsi = Rsi {
        slope: 1.0,
        intercept: 0.0,
    };

    /// Create a rescale transform from its parts.
    pub fn new(slope: f64, intercept: f64) -> Rsi {
        Rsi { slope, intercept }
    }

    /// Whether the transform leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        self.slope == 1.0 && self.intercept == 0.0
    }

    /// Apply the transform to a stored value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.slope + self.intercept
    }
}

impl Default for Rsi {
    fn default() -> Rsi {
        Rsi::IDENTITY
    }
}

/// A typed pixel buffer holding one frame of the image
/// (all slices of one temporal position).
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBuffer {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
}

macro_rules! for_each_buffer {
    ($value: expr, |$v: ident| $body: expr) => {
        match $value {
            FrameBuffer::U8($v) => $body,
            FrameBuffer::I8($v) => $body,
            FrameBuffer::U16($v) => $body,
            FrameBuffer::I16($v) => $body,
            FrameBuffer::U32($v) => $body,
            FrameBuffer::I32($v) => $body,
            FrameBuffer::F32($v) => $body,
        }
    };
}

impl FrameBuffer {
    /// The number of samples in the buffer.
    pub fn len(&self) -> usize {
        for_each_buffer!(self, |v| v.len())
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at the given position, widened to `f64`.
    pub fn sample(&self, index: usize) -> Option<f64> {
        for_each_buffer!(self, |v| v.get(index).and_then(|s| s.to_f64()))
    }

    /// Whether two buffers hold the same sample type.
    pub fn same_type(&self, other: &FrameBuffer) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// An empty buffer of the same sample type.
    pub fn empty_like(&self) -> FrameBuffer {
        match self {
            FrameBuffer::U8(_) => FrameBuffer::U8(Vec::new()),
            FrameBuffer::I8(_) => FrameBuffer::I8(Vec::new()),
            FrameBuffer::U16(_) => FrameBuffer::U16(Vec::new()),
            FrameBuffer::I16(_) => FrameBuffer::I16(Vec::new()),
            FrameBuffer::U32(_) => FrameBuffer::U32(Vec::new()),
            FrameBuffer::I32(_) => FrameBuffer::I32(Vec::new()),
            FrameBuffer::F32(_) => FrameBuffer::F32(Vec::new()),
        }
    }

    /// Splice the samples of `slice` into this buffer at the given
    /// sample offset. The two buffers must hold the same sample type.
    fn splice(&mut self, offset: usize, slice: &FrameBuffer) -> Result<(), Error> {
        ensure!(
            self.same_type(slice),
            SliceMismatchSnafu {
                reason: "pixel sample types differ",
            }
        );
        match (self, slice) {
            (FrameBuffer::U8(a), FrameBuffer::U8(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::I8(a), FrameBuffer::I8(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::U16(a), FrameBuffer::U16(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::I16(a), FrameBuffer::I16(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::U32(a), FrameBuffer::U32(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::I32(a), FrameBuffer::I32(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            (FrameBuffer::F32(a), FrameBuffer::F32(b)) => {
                a.splice(offset..offset, b.iter().copied());
            }
            _ => unreachable!("type equality checked above"),
        }
        Ok(())
    }
}

/// Identity attributes shared by the slices of a volume.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageMeta {
    pub modality: Option<String>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub bits_stored: Option<u16>,
    pub is_signed: bool,
}

/// A decoded multi-frame image with geometry and rescale metadata.
#[derive(Debug, Clone)]
pub struct Image {
    geometry: Geometry,
    frames: Vec<FrameBuffer>,
    rsi: Vec<Rsi>,
    photometric_interpretation: String,
    planar_configuration: u16,
    number_of_components: u16,
    meta: ImageMeta,
}

impl Image {
    /// The spatial description of the volume.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The frame buffers, one per temporal position.
    pub fn frames(&self) -> &[FrameBuffer] {
        &self.frames
    }

    /// The per-slice rescale transforms.
    pub fn rsi(&self) -> &[Rsi] {
        &self.rsi
    }

    /// The rescale transform of the given slice.
    pub fn rsi_of_slice(&self, slice: usize) -> Rsi {
        self.rsi.get(slice).copied().unwrap_or_default()
    }

    /// Whether every slice carries the identity rescale transform.
    pub fn is_identity_rsi(&self) -> bool {
        self.rsi.iter().all(Rsi::is_identity)
    }

    /// The photometric interpretation (e.g. `MONOCHROME2`, `RGB`).
    pub fn photometric_interpretation(&self) -> &str {
        &self.photometric_interpretation
    }

    /// The planar configuration (0 = interleaved, 1 = planar).
    pub fn planar_configuration(&self) -> u16 {
        self.planar_configuration
    }

    /// The number of samples per pixel.
    pub fn number_of_components(&self) -> u16 {
        self.number_of_components
    }

    /// The identity attributes of the volume.
    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    /// The stored value at (column, row, slice) of the given frame,
    /// first component.
    pub fn get_value(&self, i: u32, j: u32, k: u32, frame: usize) -> Option<f64> {
        let size = self.geometry.size();
        if i >= size.columns || j >= size.rows || k >= size.slices {
            return None;
        }
        let voxel = (k as usize * size.rows as usize + j as usize) * size.columns as usize
            + i as usize;
        self.frames
            .get(frame)?
            .sample(voxel * self.number_of_components as usize)
    }

    /// The modality value at (column, row, slice) of the given frame:
    /// the stored value run through the slice's rescale transform.
    pub fn get_rescaled_value(&self, i: u32, j: u32, k: u32, frame: usize) -> Option<f64> {
        self.get_value(i, j, k, frame)
            .map(|value| self.rsi_of_slice(k as usize).apply(value))
    }

    /// Append a temporal frame. The buffer must hold the same sample
    /// type and count as the existing frames.
    pub fn append_frame(&mut self, frame: FrameBuffer) -> Result<(), Error> {
        if let Some(first) = self.frames.first() {
            ensure!(
                first.same_type(&frame),
                SliceMismatchSnafu {
                    reason: "pixel sample types differ",
                }
            );
            ensure!(
                first.len() == frame.len(),
                SliceMismatchSnafu {
                    reason: "frame sample counts differ",
                }
            );
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Merge a single-slice image into this volume, keeping slices
    /// ordered along the normal. The incoming slice must match in
    /// rows, columns, photometric interpretation and identity
    /// attributes. Its frame data, origin and rescale transform are
    /// spliced in at the position given by
    /// [`Geometry::slice_index`].
    pub fn append_slice(&mut self, other: &Image) -> Result<(), Error> {
        let size = self.geometry.size();
        let other_size = other.geometry.size();
        ensure!(
            size.rows == other_size.rows && size.columns == other_size.columns,
            SliceMismatchSnafu {
                reason: "rows or columns differ",
            }
        );
        ensure!(
            self.photometric_interpretation == other.photometric_interpretation,
            SliceMismatchSnafu {
                reason: "photometric interpretations differ",
            }
        );
        ensure!(
            self.meta == other.meta,
            SliceMismatchSnafu {
                reason: "identity attributes differ",
            }
        );
        ensure!(
            self.frames.len() == other.frames.len(),
            SliceMismatchSnafu {
                reason: "frame counts differ",
            }
        );

        let origin = other.geometry.origin();
        let index = self.geometry.slice_index(&origin);
        let slice_samples = size.slice_len() * self.number_of_components as usize;
        for (frame, other_frame) in self.frames.iter_mut().zip(other.frames.iter()) {
            frame.splice(index * slice_samples, other_frame)?;
        }
        self.geometry.insert_origin(index, origin);
        self.rsi.insert(index, other.rsi_of_slice(0));
        Ok(())
    }
}

/// Builds [`Image`] values out of parsed data sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFactory;

impl ImageFactory {
    /// Derive the image entity from the data set attributes and the
    /// given frame buffers. `codec` names the pixel data compression
    /// of the originating transfer syntax, which constrains the
    /// photometric interpretation of decoder output.
    pub fn create(
        &self,
        data: &DataSet,
        codec: Codec,
        frames: Vec<FrameBuffer>,
    ) -> Result<Image, Error> {
        let rows = data
            .u16_value(tags::ROWS)
            .context(MalformedImageSnafu { name: "Rows" })?;
        let columns = data
            .u16_value(tags::COLUMNS)
            .context(MalformedImageSnafu { name: "Columns" })?;

        let spacing = pixel_spacing(data);
        let origin = image_position(data);
        let orientation = image_orientation(data);
        let size = Size::new(u32::from(columns), u32::from(rows), 1);
        let geometry = Geometry::new(origin, size, spacing, orientation);

        let mut photometric_interpretation = data
            .str_value(tags::PHOTOMETRIC_INTERPRETATION)
            .map(|s| s.trim().to_owned())
            .unwrap_or_else(|| "MONOCHROME2".to_owned());
        // decoder output contract: compressed color comes back as RGB
        if matches!(
            codec,
            Codec::JpegBaseline | Codec::JpegLossless | Codec::Jpeg2000
        ) && photometric_interpretation != "MONOCHROME1"
            && photometric_interpretation != "MONOCHROME2"
        {
            photometric_interpretation = "RGB".to_owned();
        }

        let rsi = Rsi::new(
            data.f64_value(tags::RESCALE_SLOPE).unwrap_or(1.0),
            data.f64_value(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        );

        let meta = ImageMeta {
            modality: data.str_value(tags::MODALITY).map(str::to_owned),
            study_instance_uid: data.str_value(tags::STUDY_INSTANCE_UID).map(str::to_owned),
            series_instance_uid: data.str_value(tags::SERIES_INSTANCE_UID).map(str::to_owned),
            bits_stored: data.u16_value(tags::BITS_STORED),
            is_signed: data.u16_value(tags::PIXEL_REPRESENTATION) == Some(1),
        };

        Ok(Image {
            geometry,
            frames,
            rsi: vec![rsi],
            photometric_interpretation,
            planar_configuration: data.u16_value(tags::PLANAR_CONFIGURATION).unwrap_or(0),
            number_of_components: data.u16_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1),
            meta,
        })
    }
}

/// Column and row spacing from PixelSpacing (values are `row\col`),
/// falling back to ImagerPixelSpacing, defaulting to unit spacing.
fn pixel_spacing(data: &DataSet) -> Spacing {
    let element = data
        .get(tags::PIXEL_SPACING)
        .or_else(|| data.get(tags::IMAGER_PIXEL_SPACING));
    match element {
        Some(element) => {
            let row = element.value.to_f64_at(0).unwrap_or(1.0);
            let column = element.value.to_f64_at(1).unwrap_or(1.0);
            Spacing::new(column, row, 1.0)
        }
        None => Spacing::default(),
    }
}

/// The slice origin from ImagePositionPatient, defaulting to zero.
fn image_position(data: &DataSet) -> Point3 {
    match data.get(tags::IMAGE_POSITION_PATIENT) {
        Some(element) => Point3::new(
            element.value.to_f64_at(0).unwrap_or(0.0),
            element.value.to_f64_at(1).unwrap_or(0.0),
            element.value.to_f64_at(2).unwrap_or(0.0),
        ),
        None => Point3::default(),
    }
}

/// The orientation from ImageOrientationPatient (six cosines),
/// defaulting to the identity.
fn image_orientation(data: &DataSet) -> Orientation {
    match data.get(tags::IMAGE_ORIENTATION_PATIENT) {
        Some(element) if element.value.multiplicity() >= 6 => {
            let c = |i| element.value.to_f64_at(i).unwrap_or(0.0);
            Orientation::from_cosines(
                Point3::new(c(0), c(1), c(2)),
                Point3::new(c(3), c(4), c(5)),
            )
        }
        _ => Orientation::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medview_core::{Element, Tag, Value, VR};

    fn minimal_data_set() -> DataSet {
        let mut data = DataSet::new();
        data.insert(Element::new(tags::ROWS, VR::US, Value::from(2u16)));
        data.insert(Element::new(tags::COLUMNS, VR::US, Value::from(2u16)));
        data.insert(Element::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            Value::from("MONOCHROME2"),
        ));
        data
    }

    fn gray_image(values: Vec<u16>) -> Image {
        let data = minimal_data_set();
        ImageFactory
            .create(&data, Codec::None, vec![FrameBuffer::U16(values)])
            .unwrap()
    }

    #[test]
    fn rsi_defaults_to_identity() {
        let image = gray_image(vec![0, 1, 2, 3]);
        assert!(image.is_identity_rsi());
        assert_eq!(image.get_value(1, 0, 0, 0), Some(1.0));
        // identity law: rescaled == stored
        assert_eq!(
            image.get_rescaled_value(1, 1, 0, 0),
            image.get_value(1, 1, 0, 0)
        );
    }

    #[test]
    fn rescale_applies_slope_and_intercept() {
        let mut data = minimal_data_set();
        data.insert(Element::new(
            Tag(0x0028, 0x1052),
            VR::DS,
            Value::from("-1024"),
        ));
        data.insert(Element::new(Tag(0x0028, 0x1053), VR::DS, Value::from("2")));
        let image = ImageFactory
            .create(&data, Codec::None, vec![FrameBuffer::U16(vec![0, 1, 2, 3])])
            .unwrap();
        assert!(!image.is_identity_rsi());
        assert_eq!(image.get_rescaled_value(1, 0, 0, 0), Some(2.0 - 1024.0));
    }

    #[test]
    fn missing_rows_is_a_malformed_image() {
        let mut data = minimal_data_set();
        data.remove(tags::ROWS);
        let result = ImageFactory.create(&data, Codec::None, vec![]);
        assert!(matches!(result, Err(Error::MalformedImage { .. })));
    }

    #[test]
    fn compressed_color_is_forced_to_rgb() {
        let mut data = minimal_data_set();
        data.insert(Element::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            Value::from("YBR_FULL_422"),
        ));
        let image = ImageFactory
            .create(&data, Codec::JpegBaseline, vec![])
            .unwrap();
        assert_eq!(image.photometric_interpretation(), "RGB");

        // monochrome stays as declared
        let image = gray_image(vec![0; 4]);
        assert_eq!(image.photometric_interpretation(), "MONOCHROME2");
    }

    #[test]
    fn pixel_spacing_is_row_then_column() {
        let mut data = minimal_data_set();
        data.insert(Element::new(
            tags::PIXEL_SPACING,
            VR::DS,
            Value::Strs(["0.5", "0.25"].iter().map(|s| s.to_string()).collect()),
        ));
        let image = ImageFactory
            .create(&data, Codec::None, vec![FrameBuffer::U16(vec![0; 4])])
            .unwrap();
        let spacing = image.geometry().spacing();
        assert_eq!(spacing.row, 0.5);
        assert_eq!(spacing.column, 0.25);
    }

    #[test]
    fn append_slice_splices_in_normal_order() {
        // two 2x2 slices at z = 0 and z = 4
        let make = |z: f64, values: Vec<u16>| {
            let mut data = minimal_data_set();
            data.insert(Element::new(
                tags::IMAGE_POSITION_PATIENT,
                VR::DS,
                Value::Strs(
                    ["0", "0", &z.to_string()]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
            ));
            ImageFactory
                .create(&data, Codec::None, vec![FrameBuffer::U16(values)])
                .unwrap()
        };
        let mut image = make(0.0, vec![0; 4]);
        image.append_slice(&make(4.0, vec![4; 4])).unwrap();
        // a slice at z = 2 lands between the two
        image.append_slice(&make(2.0, vec![2; 4])).unwrap();

        assert_eq!(image.geometry().size().slices, 3);
        assert_eq!(image.get_value(0, 0, 0, 0), Some(0.0));
        assert_eq!(image.get_value(0, 0, 1, 0), Some(2.0));
        assert_eq!(image.get_value(0, 0, 2, 0), Some(4.0));
        let origins = image.geometry().origins();
        assert_eq!(origins[1].z, 2.0);
        assert_eq!(image.rsi().len(), 3);
    }

    #[test]
    fn append_frame_requires_matching_buffers() {
        let mut image = gray_image(vec![0, 1, 2, 3]);
        image.append_frame(FrameBuffer::U16(vec![4, 5, 6, 7])).unwrap();
        assert_eq!(image.frames().len(), 2);
        assert_eq!(image.get_value(0, 0, 0, 1), Some(4.0));

        // wrong sample type
        assert!(matches!(
            image.append_frame(FrameBuffer::U8(vec![0; 4])),
            Err(Error::SliceMismatch { .. })
        ));
        // wrong sample count
        assert!(matches!(
            image.append_frame(FrameBuffer::U16(vec![0; 2])),
            Err(Error::SliceMismatch { .. })
        ));
    }

    #[test]
    fn append_slice_rejects_mismatched_slices() {
        let mut image = gray_image(vec![0; 4]);

        let mut data = minimal_data_set();
        data.insert(Element::new(tags::MODALITY, VR::CS, Value::from("CT")));
        let other = ImageFactory
            .create(&data, Codec::None, vec![FrameBuffer::U16(vec![0; 4])])
            .unwrap();
        assert!(matches!(
            image.append_slice(&other),
            Err(Error::SliceMismatch { .. })
        ));
    }
}
