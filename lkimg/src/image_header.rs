//! LK partition header codec
//!
//! Every partition starts with a fixed 512-byte little-endian block. The
//! legacy fields occupy the first 48 bytes; when the word at offset 48
//! equals [`EXT_MAGIC`](crate::EXT_MAGIC) an extended sub-header follows
//! at bytes 52..80 with 64-bit size/address high words, explicit header
//! size and alignment, and the image-list-end flag. The rest of the block
//! is reserved and zero-filled.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{LkImageError, Result};
use crate::image_types::ImageType;
use crate::{EXT_MAGIC, HEADER_SIZE, LEGACY_ALIGNMENT, MAGIC, NAME_SIZE};

/// LK partition header.
///
/// Legacy and extended headers share one structure; `extended` is the
/// discriminant. `data_size` and `load_address` are held as full 64-bit
/// values and split into low/high words on encode. The high words are only
/// composed on decode (and written on encode) for extended headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LkHeader {
    /// Magic number (valid headers carry [`MAGIC`])
    pub magic: u32,
    name: String,
    /// Memory addressing mode field
    pub mode: u32,
    extended: bool,
    data_size: u64,
    load_address: u64,
    /// Size of the header on disk (extended headers only)
    pub header_size: u32,
    /// Version of the extended header
    pub header_version: u32,
    /// Type of image carried by the partition
    pub image_type: ImageType,
    pub(crate) image_list_end: u32,
    alignment: u32,
}

impl LkHeader {
    /// Create a header for a new partition. Fails with `NameTooLong` when
    /// the name exceeds 32 bytes.
    pub fn new(name: &str, extended: bool) -> Result<Self> {
        let mut header = Self {
            magic: MAGIC,
            name: String::new(),
            mode: 0,
            extended,
            data_size: 0,
            load_address: 0,
            header_size: HEADER_SIZE as u32,
            header_version: 1,
            image_type: ImageType::default(),
            image_list_end: 0,
            alignment: LEGACY_ALIGNMENT,
        };
        header.set_name(name)?;
        Ok(header)
    }

    /// Decode a header from the start of `data`.
    ///
    /// Requires a full 512-byte window. The magic is not validated here so
    /// that callers can still inspect malformed fields for diagnostics; use
    /// [`is_valid`](Self::is_valid) to gate on it.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(LkImageError::invalid_partition(format!(
                "truncated header: {} bytes available, {} required",
                data.len(),
                HEADER_SIZE
            )));
        }

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

        let magic = cursor.read_u32::<LittleEndian>()?;
        let data_size_low = cursor.read_u32::<LittleEndian>()?;

        let mut name_bytes = [0u8; NAME_SIZE];
        cursor.read_exact(&mut name_bytes)?;

        let load_address_low = cursor.read_u32::<LittleEndian>()?;
        let mode = cursor.read_u32::<LittleEndian>()?;
        let ext_magic = cursor.read_u32::<LittleEndian>()?;
        let extended = ext_magic == EXT_MAGIC;

        let mut header = Self {
            magic,
            name: decode_name(&name_bytes),
            mode,
            extended,
            data_size: u64::from(data_size_low),
            load_address: u64::from(load_address_low),
            header_size: HEADER_SIZE as u32,
            header_version: 0,
            image_type: ImageType::default(),
            image_list_end: 0,
            alignment: LEGACY_ALIGNMENT,
        };

        if extended {
            header.header_size = cursor.read_u32::<LittleEndian>()?;
            header.header_version = cursor.read_u32::<LittleEndian>()?;
            header.image_type = ImageType::from_raw(cursor.read_u32::<LittleEndian>()?);
            header.image_list_end = cursor.read_u32::<LittleEndian>()?;
            header.alignment = cursor.read_u32::<LittleEndian>()?;
            header.data_size |= u64::from(cursor.read_u32::<LittleEndian>()?) << 32;
            header.load_address |= u64::from(cursor.read_u32::<LittleEndian>()?) << 32;
        }

        Ok(header)
    }

    /// Encode the header as a full 512-byte block.
    ///
    /// Legacy headers leave everything past the ext-magic word zeroed;
    /// writers truncate the block to [`header_byte_len`](Self::header_byte_len).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&(self.data_size as u32).to_le_bytes());

        let name = self.name.as_bytes();
        buf[8..8 + name.len()].copy_from_slice(name);

        buf[40..44].copy_from_slice(&(self.load_address as u32).to_le_bytes());
        buf[44..48].copy_from_slice(&self.mode.to_le_bytes());

        if self.extended {
            buf[48..52].copy_from_slice(&EXT_MAGIC.to_le_bytes());
            buf[52..56].copy_from_slice(&self.header_size.to_le_bytes());
            buf[56..60].copy_from_slice(&self.header_version.to_le_bytes());
            buf[60..64].copy_from_slice(&self.image_type.to_raw().to_le_bytes());
            buf[64..68].copy_from_slice(&self.image_list_end.to_le_bytes());
            buf[68..72].copy_from_slice(&self.alignment.to_le_bytes());
            buf[72..76].copy_from_slice(&((self.data_size >> 32) as u32).to_le_bytes());
            buf[76..80].copy_from_slice(&((self.load_address >> 32) as u32).to_le_bytes());
        }

        buf
    }

    /// Whether the header carries the valid partition magic
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    /// Whether the header uses the extended format
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Name of the partition
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the partition name. Fails with `NameTooLong` past 32 bytes and
    /// leaves the header unchanged in that case.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.len() > NAME_SIZE {
            return Err(LkImageError::name_too_long(name.len()));
        }
        self.name = name;
        Ok(())
    }

    /// Effective payload size, composed from both size words when extended
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub(crate) fn set_data_size(&mut self, size: u64) {
        self.data_size = size;
    }

    /// Effective load address, composed from both address words when extended
    pub fn load_address(&self) -> u64 {
        self.load_address
    }

    pub fn set_load_address(&mut self, address: u64) {
        self.load_address = address;
    }

    /// The low load-address word reinterpreted as a signed value, which is
    /// how the legacy layout expresses the addressing mode
    pub fn addressing_mode(&self) -> i32 {
        self.load_address as u32 as i32
    }

    /// Image-list-end flag. Normalized by the image rebuild so that exactly
    /// one unit in the stream carries 1.
    pub fn image_list_end(&self) -> u32 {
        self.image_list_end
    }

    /// Padding boundary for the partition. Fixed at 8 for legacy headers;
    /// extended headers carry their own, where 0 means no padding.
    pub fn alignment(&self) -> u32 {
        if self.extended {
            self.alignment
        } else {
            LEGACY_ALIGNMENT
        }
    }

    pub fn set_alignment(&mut self, alignment: u32) {
        self.alignment = alignment;
    }

    /// Number of header bytes on disk: always 512 for legacy headers, the
    /// header's own size field for extended ones
    pub fn header_byte_len(&self) -> usize {
        if self.extended {
            self.header_size as usize
        } else {
            HEADER_SIZE
        }
    }

    /// End offset of the partition starting at `offset`, before alignment
    pub fn end_offset(&self, offset: usize) -> usize {
        offset + self.header_byte_len() + self.data_size as usize
    }

    /// Human-readable header summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Partition Name  : {}\n\
             Data Size       : {} bytes\n\
             Addressing Mode : 0x{:08x}\n\
             Memory Address  : 0x{:08x}",
            self.name, self.data_size, self.mode, self.load_address,
        );
        if self.extended {
            out.push_str(&format!(
                "\nHeader Size     : {} bytes\n\
                 Header Version  : {}\n\
                 Image Type      : {}\n\
                 Image List End  : {}\n\
                 Alignment       : {} bytes",
                self.header_size,
                self.header_version,
                self.image_type,
                self.image_list_end,
                self.alignment,
            ));
        }
        out
    }
}

fn decode_name(bytes: &[u8; NAME_SIZE]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new_defaults() {
        let header = LkHeader::new("lk", true).unwrap();
        assert_eq!(header.magic, MAGIC);
        assert!(header.is_valid());
        assert!(header.is_extended());
        assert_eq!(header.name(), "lk");
        assert_eq!(header.data_size(), 0);
        assert_eq!(header.load_address(), 0);
        assert_eq!(header.header_byte_len(), HEADER_SIZE);
        assert_eq!(header.alignment(), LEGACY_ALIGNMENT);
        assert_eq!(header.image_list_end(), 0);
    }

    #[test]
    fn test_name_too_long() {
        let long_name = "a".repeat(NAME_SIZE + 1);
        assert!(matches!(
            LkHeader::new(&long_name, false),
            Err(LkImageError::NameTooLong { len: 33, max: 32 })
        ));

        let mut header = LkHeader::new("boot", false).unwrap();
        assert!(header.set_name(long_name).is_err());
        assert_eq!(header.name(), "boot");
    }

    #[test]
    fn test_extended_round_trip() {
        let mut header = LkHeader::new("test", true).unwrap();
        header.mode = 474;
        header.set_data_size(8);
        header.set_load_address(0xBEEF_DEED_DEAD_BEEF);
        header.image_type = ImageType::CERT2;
        header.image_list_end = 1;
        header.set_alignment(8);

        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(encoded[0..4], MAGIC.to_le_bytes());
        assert_eq!(encoded[4..8], 8u32.to_le_bytes());
        assert_eq!(&encoded[8..12], b"test");
        assert_eq!(encoded[40..44], 0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(encoded[44..48], 474u32.to_le_bytes());
        assert_eq!(encoded[48..52], EXT_MAGIC.to_le_bytes());
        assert_eq!(encoded[76..80], 0xBEEF_DEEDu32.to_le_bytes());

        let decoded = LkHeader::decode(&encoded).unwrap();
        assert_eq!(decoded.magic, MAGIC);
        assert!(decoded.is_extended());
        assert_eq!(decoded.mode, 474);
        assert_eq!(decoded.name(), "test");
        assert_eq!(decoded.data_size(), 8);
        assert_eq!(decoded.load_address(), 0xBEEF_DEED_DEAD_BEEF);
        assert_eq!(decoded.image_type, ImageType::CERT2);
        assert_eq!(decoded, header);

        // Re-encoding must reproduce the identical 512-byte block.
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_legacy_reads_low_words_only() {
        let mut header = LkHeader::new("lk", false).unwrap();
        header.set_data_size(0x1000);
        header.set_load_address(0x4800_0000);

        let encoded = header.encode();
        // Nothing past the legacy prefix is written.
        assert!(encoded[48..].iter().all(|&b| b == 0));

        let decoded = LkHeader::decode(&encoded).unwrap();
        assert!(!decoded.is_extended());
        assert_eq!(decoded.data_size(), 0x1000);
        assert_eq!(decoded.load_address(), 0x4800_0000);
        assert_eq!(decoded.header_byte_len(), HEADER_SIZE);
        assert_eq!(decoded.alignment(), LEGACY_ALIGNMENT);
    }

    #[test]
    fn test_addressing_mode_is_signed() {
        let mut header = LkHeader::new("lk", false).unwrap();
        header.set_load_address(0xFFFF_FFFF);
        assert_eq!(header.addressing_mode(), -1);
        header.set_load_address(0);
        assert_eq!(header.addressing_mode(), 0);
    }

    #[test]
    fn test_decode_truncated() {
        let err = LkHeader::decode(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, LkImageError::InvalidPartition { .. }));
    }

    #[test]
    fn test_decode_keeps_invalid_magic_for_diagnostics() {
        let mut block = [0u8; HEADER_SIZE];
        block[0..4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let header = LkHeader::decode(&block).unwrap();
        assert!(!header.is_valid());
        assert_eq!(header.magic, 0x1234_5678);
    }

    #[test]
    fn test_name_padding_stripped() {
        let mut header = LkHeader::new("lk_main_dtb", true).unwrap();
        header.set_data_size(1);
        let decoded = LkHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.name(), "lk_main_dtb");
    }
}
