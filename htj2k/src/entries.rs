//! Transfer syntax identifiers handled by the HTJ2K codecs.
//!
//! The three HTJ2K transfer syntaxes only differ
//! in whether they admit lossy compression
//! and whether they impose a progression order,
//! so they are described by a single table, [`Htj2kVariant`].

use crate::params::ProgressionOrder;
use dicom_dictionary_std::uids;

/// UID of High-Throughput JPEG 2000 Image Compression (Lossless Only)
pub const HTJ2K_LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.201";

/// UID of High-Throughput JPEG 2000 with RPCL Options Image Compression (Lossless Only)
pub const HTJ2K_RPCL_LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.202";

/// UID of High-Throughput JPEG 2000 Image Compression
pub const HTJ2K: &str = "1.2.840.10008.1.2.4.203";

/// One of the HTJ2K transfer syntaxes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Htj2kVariant {
    /// lossless only, with the configured progression order
    LosslessOnly,
    /// lossless only, always in RPCL progression order
    RpclLosslessOnly,
    /// lossless or lossy
    General,
}

impl Htj2kVariant {
    /// All variants, in transfer syntax UID order.
    pub const ALL: [Htj2kVariant; 3] = [
        Htj2kVariant::LosslessOnly,
        Htj2kVariant::RpclLosslessOnly,
        Htj2kVariant::General,
    ];

    /// The transfer syntax UID of this variant.
    pub fn uid(self) -> &'static str {
        match self {
            Htj2kVariant::LosslessOnly => HTJ2K_LOSSLESS_ONLY,
            Htj2kVariant::RpclLosslessOnly => HTJ2K_RPCL_LOSSLESS_ONLY,
            Htj2kVariant::General => HTJ2K,
        }
    }

    /// The transfer syntax name of this variant.
    pub fn name(self) -> &'static str {
        match self {
            Htj2kVariant::LosslessOnly => {
                "High-Throughput JPEG 2000 Image Compression (Lossless Only)"
            }
            Htj2kVariant::RpclLosslessOnly => {
                "High-Throughput JPEG 2000 with RPCL Options Image Compression (Lossless Only)"
            }
            Htj2kVariant::General => "High-Throughput JPEG 2000 Image Compression",
        }
    }

    /// Look up the variant of a transfer syntax UID,
    /// ignoring trailing padding.
    pub fn from_uid(uid: &str) -> Option<Self> {
        let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
        Self::ALL.into_iter().find(|variant| variant.uid() == uid)
    }

    /// The progression order imposed by the transfer syntax, if any.
    pub fn forced_progression_order(self) -> Option<ProgressionOrder> {
        match self {
            Htj2kVariant::RpclLosslessOnly => Some(ProgressionOrder::Rpcl),
            _ => None,
        }
    }

    /// Whether the transfer syntax only admits lossless compression.
    pub fn lossless_only(self) -> bool {
        !matches!(self, Htj2kVariant::General)
    }
}

/// Check whether a transfer syntax keeps pixel data in native form.
pub fn is_native_transfer_syntax(uid: &str) -> bool {
    let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
    [
        uids::IMPLICIT_VR_LITTLE_ENDIAN,
        uids::EXPLICIT_VR_LITTLE_ENDIAN,
        uids::EXPLICIT_VR_BIG_ENDIAN,
        uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        uids::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN,
    ]
    .contains(&uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.840.10008.1.2.4.201", Some(Htj2kVariant::LosslessOnly))]
    #[case("1.2.840.10008.1.2.4.202\0", Some(Htj2kVariant::RpclLosslessOnly))]
    #[case("1.2.840.10008.1.2.4.203 ", Some(Htj2kVariant::General))]
    #[case("1.2.840.10008.1.2.4.90", None)]
    #[case("1.2.840.10008.1.2.1", None)]
    fn variant_lookup(#[case] uid: &str, #[case] variant: Option<Htj2kVariant>) {
        assert_eq!(Htj2kVariant::from_uid(uid), variant);
    }

    #[test]
    fn variant_table() {
        assert!(Htj2kVariant::LosslessOnly.lossless_only());
        assert!(Htj2kVariant::RpclLosslessOnly.lossless_only());
        assert!(!Htj2kVariant::General.lossless_only());

        assert_eq!(Htj2kVariant::LosslessOnly.forced_progression_order(), None);
        assert_eq!(
            Htj2kVariant::RpclLosslessOnly.forced_progression_order(),
            Some(ProgressionOrder::Rpcl)
        );
        assert_eq!(Htj2kVariant::General.forced_progression_order(), None);

        for variant in Htj2kVariant::ALL {
            assert_eq!(Htj2kVariant::from_uid(variant.uid()), Some(variant));
            assert!(variant.name().starts_with("High-Throughput JPEG 2000"));
        }
    }

    #[rstest]
    #[case("1.2.840.10008.1.2", true)]
    #[case("1.2.840.10008.1.2.1\0", true)]
    #[case("1.2.840.10008.1.2.2", true)]
    #[case("1.2.840.10008.1.2.1.99", true)]
    #[case("1.2.840.10008.1.2.1.98", true)]
    #[case("1.2.840.10008.1.2.4.201", false)]
    #[case("1.2.840.10008.1.2.5", false)]
    fn native_transfer_syntaxes(#[case] uid: &str, #[case] native: bool) {
        assert_eq!(is_native_transfer_syntax(uid), native);
    }
}
