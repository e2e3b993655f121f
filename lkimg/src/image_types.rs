//! Image type definitions and the image version classifier

use std::fmt;
use std::str::FromStr;

use crate::error::LkImageError;

/// Image group stored in the high byte of the header's image-type word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageGroup {
    /// Application processor binaries
    Ap = 0x0,
    /// Modem binaries
    Md = 0x1,
    /// Certificate partitions
    Cert = 0x2,
}

impl ImageGroup {
    /// Decode a raw group byte. Unknown values yield `None`.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Self::Ap),
            0x1 => Some(Self::Md),
            0x2 => Some(Self::Cert),
            _ => None,
        }
    }
}

impl fmt::Display for ImageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ap => "AP",
            Self::Md => "MD",
            Self::Cert => "CERT",
        };
        write!(f, "{name}")
    }
}

/// Image type subfield of the extended header.
///
/// On disk this is a 32-bit word holding the type id in the low byte, the
/// group in the high byte and two reserved bytes in between. The raw bytes
/// are preserved so that headers with unrecognized groups still round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageType {
    pub id: u8,
    pub group: u8,
}

impl ImageType {
    pub const AP_BIN: Self = Self {
        id: 0x0,
        group: ImageGroup::Ap as u8,
    };
    pub const MD_LTE: Self = Self {
        id: 0x0,
        group: ImageGroup::Md as u8,
    };
    pub const MD_C2K: Self = Self {
        id: 0x1,
        group: ImageGroup::Md as u8,
    };
    pub const CERT1: Self = Self {
        id: 0x0,
        group: ImageGroup::Cert as u8,
    };
    pub const CERT1_MD: Self = Self {
        id: 0x1,
        group: ImageGroup::Cert as u8,
    };
    pub const CERT2: Self = Self {
        id: 0x2,
        group: ImageGroup::Cert as u8,
    };

    /// Decode from the on-disk little-endian word
    pub fn from_raw(raw: u32) -> Self {
        let bytes = raw.to_le_bytes();
        Self {
            id: bytes[0],
            group: bytes[3],
        }
    }

    /// Encode to the on-disk little-endian word (reserved bytes zeroed)
    pub fn to_raw(self) -> u32 {
        u32::from_le_bytes([self.id, 0, 0, self.group])
    }

    /// The decoded group, if the raw byte is a known value
    pub fn group(self) -> Option<ImageGroup> {
        ImageGroup::from_raw(self.group)
    }
}

impl Default for ImageType {
    fn default() -> Self {
        Self::AP_BIN
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group() {
            Some(group) => write!(f, "{}:{:#04x}", group, self.id),
            None => write!(f, "{:#010x}", self.to_raw()),
        }
    }
}

/// Certificate tag accepted by the add-certificate operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertType {
    Cert1,
    Cert2,
}

impl CertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cert1 => "cert1",
            Self::Cert2 => "cert2",
        }
    }

    /// Image type carried by certificates of this tag
    pub fn image_type(self) -> ImageType {
        match self {
            Self::Cert1 => ImageType::CERT1,
            Self::Cert2 => ImageType::CERT2,
        }
    }
}

impl fmt::Display for CertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CertType {
    type Err = LkImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cert1" => Ok(Self::Cert1),
            "cert2" => Ok(Self::Cert2),
            other => Err(LkImageError::invalid_certificate_type(other)),
        }
    }
}

/// LK image generation, derived from the partitions present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LkVersion {
    V1 = 1,
    V2 = 2,
}

impl LkVersion {
    /// Classify an image by its partition names. Images carrying an `aee`
    /// or `bl2_ext` partition are version 2, everything else is version 1.
    /// Purely informational, parsing and serialization do not depend on it.
    pub fn classify<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let v2 = names
            .into_iter()
            .any(|name| name == "aee" || name == "bl2_ext");
        if v2 { Self::V2 } else { Self::V1 }
    }
}

impl fmt::Display for LkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}
