//! # lkimg
//!
//! A library and CLI tool for parsing, editing and patching MediaTek LK
//! bootloader images.
//!
//! An LK image is a flat byte stream of named partitions. Every partition
//! starts with a fixed 512-byte header, optionally carrying an extended
//! sub-header with 64-bit sizes and addresses, followed by the raw payload
//! and alignment padding. A partition may be trailed by one or two
//! certificate sub-partitions whose names begin with `cert`.
//!
//! ## Example
//!
//! ```rust
//! use lkimg::{LkImage, NewPartition};
//!
//! let mut image = LkImage::from_bytes(Vec::new())?;
//! image.add_partition(
//!     NewPartition::new("lk", b"payload".to_vec()).load_address(0x4c40_0000),
//! )?;
//!
//! let reparsed = LkImage::from_bytes(image.as_bytes().to_vec())?;
//! assert_eq!(reparsed.partition_names(), ["lk"]);
//! # Ok::<(), lkimg::LkImageError>(())
//! ```

pub mod cli;
pub mod error;
pub mod image;
pub mod image_header;
pub mod image_types;
pub mod partition;

// Re-export main types for convenience
pub use error::{LkImageError, Result};
pub use image::{LkImage, NewPartition, ParseOptions, TrailingGarbage};
pub use image_header::LkHeader;
pub use image_types::{CertType, ImageGroup, ImageType, LkVersion};
pub use partition::LkPartition;

/// Current version of the lkimg implementation
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic number identifying an LK partition header
pub const MAGIC: u32 = 0x5888_1688;

/// Magic number identifying the extended sub-header
pub const EXT_MAGIC: u32 = 0x5889_1689;

/// On-disk size of the partition header block
pub const HEADER_SIZE: usize = 512;

/// Maximum length of a partition name in bytes
pub const NAME_SIZE: usize = 32;

/// Padding boundary for partitions without an extended header
pub const LEGACY_ALIGNMENT: u32 = 8;

/// Machine-code pattern preceding the real `lk` load address. The resolved
/// address is the little-endian word 8 bytes after the pattern start.
pub const LOADADDR_PATTERN: [u8; 4] = [0x10, 0xFF, 0x2F, 0xE1];

/// Placeholder load address emitted by some build toolchains
pub const LOADADDR_SENTINEL: u32 = 0xFFFF_FFFF;

/// Leading marker of containers whose first header sits at a fixed offset
pub const SHIFT_MARKER: [u8; 4] = *b"BFBF";

/// Header offset of the first partition in shifted containers
pub const SHIFTED_HEADER_OFFSET: usize = 0x4040;

/// Name prefix marking certificate partitions
pub const CERT_PREFIX: &str = "cert";
