//! A registry of DICOM transfer syntaxes.
//!
//! Each descriptor names the byte order, VR explicitness and pixel
//! data codec of one transfer syntax UID. Syntaxes this engine cannot
//! decode are kept as stubs so that error messages can carry the
//! human-readable syntax name rather than a bare UID.

use byteordered::Endianness;

/// The pixel data encoding of a transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Uncompressed (native) pixel data.
    None,
    /// JPEG baseline (processes 1, 2 and 4).
    JpegBaseline,
    /// JPEG lossless (processes 14 and 14 SV1).
    JpegLossless,
    /// JPEG 2000 (lossless or lossy).
    Jpeg2000,
    /// Recognized but not decodable by this engine.
    Unsupported,
}

/// A descriptor of a single DICOM transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    endianness: Endianness,
    explicit_vr: bool,
    codec: Codec,
}

impl TransferSyntax {
    /// Create a transfer syntax descriptor.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        endianness: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            endianness,
            explicit_vr,
            codec,
        }
    }

    /// The syntax's unique identifier.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// The syntax's human-readable name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The byte order of data set encoding.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether data elements carry an explicit VR field.
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The pixel data codec.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether this engine can fully decode data sets in this syntax.
    pub fn is_supported(&self) -> bool {
        self.codec != Codec::Unsupported
    }

    /// Whether the pixel data is compressed.
    pub fn is_compressed(&self) -> bool {
        !matches!(self.codec, Codec::None | Codec::Unsupported)
    }

    /// Look up a transfer syntax descriptor by UID.
    /// Trailing whitespace and NUL padding are ignored.
    /// Returns `None` for UIDs not known to the registry.
    pub fn from_uid(uid: &str) -> Option<&'static TransferSyntax> {
        let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
        REGISTRY
            .iter()
            .find(|ts| ts.uid == uid)
            .or_else(|| retired_jpeg_stub(uid))
    }
}

/// The retired JPEG processes (1.2.840.10008.1.2.4.5x other than the
/// four supported ones, and all of 1.2.840.10008.1.2.4.6x) resolve to
/// a single unsupported stub.
fn retired_jpeg_stub(uid: &str) -> Option<&'static TransferSyntax> {
    let process = uid.strip_prefix("1.2.840.10008.1.2.4.")?;
    let number: u8 = process.parse().ok()?;
    if (52..=69).contains(&number) && !matches!(number, 57) {
        Some(&JPEG_RETIRED)
    } else {
        None
    }
}

pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Codec::None,
);

pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    Codec::None,
);

pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Codec::None,
);

pub const JPEG_BASELINE_PROCESS_1: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Endianness::Little,
    true,
    Codec::JpegBaseline,
);

pub const JPEG_EXTENDED_PROCESS_2_4: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Endianness::Little,
    true,
    Codec::JpegBaseline,
);

pub const JPEG_LOSSLESS_NON_HIERARCHICAL: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

pub const JPEG_LOSSLESS_FIRST_ORDER_PREDICTION: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

pub const JPEG_2000_LOSSLESS_ONLY: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    Endianness::Little,
    true,
    Codec::Jpeg2000,
);

pub const JPEG_2000: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Endianness::Little,
    true,
    Codec::Jpeg2000,
);

// --- stubs: recognized, named, not decodable here ---

pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1.99",
    "Deflated Explicit VR Little Endian",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const JPEG_LS_LOSSLESS: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const JPEG_LS_LOSSY: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const JPEG_RETIRED: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.5x",
    "JPEG (retired process)",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const MPEG2_MAIN_PROFILE_MAIN_LEVEL: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.100",
    "MPEG2 Main Profile / Main Level",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

pub const MPEG4_AVC_H264_HIGH_PROFILE: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.102",
    "MPEG-4 AVC/H.264 High Profile / Level 4.1",
    Endianness::Little,
    true,
    Codec::Unsupported,
);

static REGISTRY: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    JPEG_BASELINE_PROCESS_1,
    JPEG_EXTENDED_PROCESS_2_4,
    JPEG_LOSSLESS_NON_HIERARCHICAL,
    JPEG_LOSSLESS_FIRST_ORDER_PREDICTION,
    JPEG_2000_LOSSLESS_ONLY,
    JPEG_2000,
    DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    RLE_LOSSLESS,
    JPEG_LS_LOSSLESS,
    JPEG_LS_LOSSY,
    MPEG2_MAIN_PROFILE_MAIN_LEVEL,
    MPEG4_AVC_H264_HIGH_PROFILE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_syntaxes_resolve() {
        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2").unwrap();
        assert!(!ts.explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Little);
        assert!(ts.is_supported());

        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.2").unwrap();
        assert!(ts.explicit_vr());
        assert_eq!(ts.endianness(), Endianness::Big);
    }

    #[test]
    fn uid_padding_is_ignored() {
        let ts = TransferSyntax::from_uid("1.2.840.10008.1.2.1\0").unwrap();
        assert_eq!(ts.name(), "Explicit VR Little Endian");
    }

    #[test]
    fn compressed_syntaxes_carry_their_codec() {
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.4.50").unwrap().codec(),
            Codec::JpegBaseline
        );
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.4.70").unwrap().codec(),
            Codec::JpegLossless
        );
        assert_eq!(
            TransferSyntax::from_uid("1.2.840.10008.1.2.4.91").unwrap().codec(),
            Codec::Jpeg2000
        );
    }

    #[test]
    fn stubs_are_recognized_but_unsupported() {
        let rle = TransferSyntax::from_uid("1.2.840.10008.1.2.5").unwrap();
        assert!(!rle.is_supported());
        assert_eq!(rle.name(), "RLE Lossless");

        // retired JPEG processes fall into a common stub
        let retired = TransferSyntax::from_uid("1.2.840.10008.1.2.4.55").unwrap();
        assert!(!retired.is_supported());
        let retired = TransferSyntax::from_uid("1.2.840.10008.1.2.4.61").unwrap();
        assert!(!retired.is_supported());
    }

    #[test]
    fn unknown_uids_do_not_resolve() {
        assert!(TransferSyntax::from_uid("1.2.840.10008.5.1.4.1.1.7").is_none());
        assert!(TransferSyntax::from_uid("").is_none());
    }
}
