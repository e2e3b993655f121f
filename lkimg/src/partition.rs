//! LK partition parsing and serialization
//!
//! A partition is one payload unit of the image: its header, the raw
//! payload bytes and any certificate partitions that trail it in the byte
//! stream. Parsing operates on a window starting at the partition's own
//! offset; serialization emits the truncated header block, the payload and
//! zero padding up to the partition's alignment boundary.

use crate::error::{LkImageError, Result};
use crate::image_header::LkHeader;
use crate::image_types::CertType;
use crate::{
    CERT_PREFIX, HEADER_SIZE, LOADADDR_PATTERN, LOADADDR_SENTINEL, SHIFT_MARKER,
    SHIFTED_HEADER_OFFSET,
};

/// One named partition of an LK image
#[derive(Debug, Clone)]
pub struct LkPartition {
    pub(crate) header: LkHeader,
    data: Vec<u8>,
    pub(crate) end_offset: usize,
    pub(crate) certs: Vec<LkPartition>,
    resolved_load_address: Option<u32>,
}

impl LkPartition {
    /// Create a partition from a header and payload. The header's data size
    /// is synchronized with the payload length.
    pub fn new(header: LkHeader, data: impl Into<Vec<u8>>) -> Self {
        let mut partition = Self {
            header,
            data: Vec::new(),
            end_offset: 0,
            certs: Vec::new(),
            resolved_load_address: None,
        };
        partition.set_data(data);
        partition
    }

    /// Parse one partition from `window`, the image bytes starting at the
    /// partition's absolute `offset`.
    ///
    /// Containers whose stream begins with the `BFBF` marker keep their
    /// first header at a fixed sub-offset; the payload slice stays relative
    /// to the window start regardless.
    pub fn parse(window: &[u8], offset: usize) -> Result<Self> {
        let shift = if window.starts_with(&SHIFT_MARKER) {
            SHIFTED_HEADER_OFFSET
        } else {
            0
        };

        let header = LkHeader::decode(window.get(shift..).unwrap_or(&[]))?;
        if !header.is_valid() {
            return Err(LkImageError::invalid_partition(format!(
                "invalid magic 0x{:08x} at offset 0x{:x}",
                header.magic, offset
            )));
        }

        let data_size = usize::try_from(header.data_size()).map_err(|_| {
            LkImageError::invalid_partition(format!(
                "partition '{}' data size does not fit in memory",
                header.name()
            ))
        })?;
        let header_len = header.header_byte_len();

        // Slice the payload before doing any offset arithmetic, so that an
        // absurd declared size fails here instead of overflowing below.
        let data_end = header_len.checked_add(data_size).ok_or_else(|| {
            LkImageError::invalid_partition(format!(
                "partition '{}' data size overflows",
                header.name()
            ))
        })?;
        let data = window
            .get(header_len..data_end)
            .ok_or_else(|| {
                LkImageError::invalid_partition(format!(
                    "partition '{}' payload extends past the end of the image",
                    header.name()
                ))
            })?
            .to_vec();

        let mut end_offset = header.end_offset(offset);
        let alignment = header.alignment() as usize;
        if alignment > 0 && end_offset % alignment != 0 {
            end_offset += alignment - end_offset % alignment;
        }

        // The build toolchain sometimes leaves a placeholder load address in
        // the lk header; the real one sits next to a fixed instruction
        // pattern further into the image.
        let resolved_load_address = if header.name().eq_ignore_ascii_case("lk")
            && header.load_address() as u32 == LOADADDR_SENTINEL
        {
            recover_load_address(window)
        } else {
            None
        };

        Ok(Self {
            header,
            data,
            end_offset,
            certs: Vec::new(),
            resolved_load_address,
        })
    }

    /// The partition header
    pub fn header(&self) -> &LkHeader {
        &self.header
    }

    /// Name of the partition
    pub fn name(&self) -> &str {
        self.header.name()
    }

    /// Raw payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload. The header's data size is updated in the same
    /// step so the two can never desynchronize.
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        self.header.set_data_size(data.len() as u64);
        self.data = data;
    }

    /// Absolute offset of the next unit in the stream this partition was
    /// parsed from, or the running image length after the last rebuild
    pub fn end_offset(&self) -> usize {
        self.end_offset
    }

    /// Certificate partitions attached to this partition
    pub fn certs(&self) -> &[LkPartition] {
        &self.certs
    }

    /// The first attached certificate, if any
    pub fn cert1(&self) -> Option<&LkPartition> {
        self.certs.first()
    }

    /// The second attached certificate, if any
    pub fn cert2(&self) -> Option<&LkPartition> {
        self.certs.get(1)
    }

    /// Whether any certificates are attached
    pub fn has_certs(&self) -> bool {
        !self.certs.is_empty()
    }

    /// Whether a certificate of the given tag is attached
    pub fn has_cert(&self, cert_type: CertType) -> bool {
        self.certs
            .iter()
            .any(|cert| cert.name().starts_with(cert_type.as_str()))
    }

    /// Whether this partition is itself a certificate
    pub fn is_certificate(&self) -> bool {
        self.name().starts_with(CERT_PREFIX)
    }

    /// Load address of the partition, preferring the address recovered by
    /// the pattern-search heuristic over the header's placeholder
    pub fn load_address(&self) -> u64 {
        match self.resolved_load_address {
            Some(address) => u64::from(address),
            None => self.header.load_address(),
        }
    }

    /// Address recovered by the `lk` load-address heuristic, if it ran
    pub fn resolved_load_address(&self) -> Option<u32> {
        self.resolved_load_address
    }

    /// Attach a certificate built from raw data. The certificate is named
    /// after its tag for the `lk` partition and `{tag}_{owner}` otherwise,
    /// and inherits the owner's header format and alignment.
    ///
    /// The image must be rebuilt before its byte stream reflects the new
    /// certificate.
    pub fn add_certificate(&mut self, data: impl Into<Vec<u8>>, cert_type: CertType) -> Result<()> {
        let name = if self.name().eq_ignore_ascii_case("lk") {
            cert_type.as_str().to_string()
        } else {
            format!("{}_{}", cert_type, self.name())
        };

        let mut header = LkHeader::new(&name, self.header.is_extended())?;
        header.image_type = cert_type.image_type();
        header.set_alignment(self.header.alignment());

        self.certs.push(LkPartition::new(header, data));
        Ok(())
    }

    /// Replace the first occurrence of `needle` in the payload with
    /// `patch`. The payload and header size stay consistent; rebuilding the
    /// image afterwards is the caller's responsibility when the lengths
    /// differ.
    pub fn apply_patch(&mut self, needle: &[u8], patch: &[u8]) -> Result<()> {
        let pos = find_bytes(&self.data, needle)
            .ok_or_else(|| LkImageError::needle_not_found(needle))?;
        let mut patched = Vec::with_capacity(self.data.len() - needle.len() + patch.len());
        patched.extend_from_slice(&self.data[..pos]);
        patched.extend_from_slice(patch);
        patched.extend_from_slice(&self.data[pos + needle.len()..]);
        self.set_data(patched);
        Ok(())
    }

    /// Serialize this partition: truncated header block, payload, zero
    /// padding to the alignment boundary
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_block = self.header.encode();
        let header_len = self.header.header_byte_len().min(HEADER_SIZE);

        let mut out = Vec::with_capacity(header_len + self.data.len());
        out.extend_from_slice(&header_block[..header_len]);
        out.extend_from_slice(&self.data);

        let alignment = self.header.alignment() as usize;
        if alignment > 0 && out.len() % alignment != 0 {
            let padded = out.len() + alignment - out.len() % alignment;
            out.resize(padded, 0);
        }

        out
    }

    /// Serialize this partition followed by all of its certificates
    pub fn full_bytes(&self) -> Vec<u8> {
        let mut out = self.to_bytes();
        for cert in &self.certs {
            out.extend_from_slice(&cert.to_bytes());
        }
        out
    }

    /// Human-readable partition summary
    pub fn summary(&self) -> String {
        let mut out = self.header.summary();
        if let Some(address) = self.resolved_load_address {
            out.push_str(&format!("\nResolved Address: 0x{address:08x}"));
        }
        out
    }
}

// end_offset and the recovered address are positional bookkeeping, not part
// of the partition's identity.
impl PartialEq for LkPartition {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.data == other.data && self.certs == other.certs
    }
}

impl Eq for LkPartition {}

/// First occurrence of `needle` in `haystack`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn recover_load_address(haystack: &[u8]) -> Option<u32> {
    let pos = find_bytes(haystack, &LOADADDR_PATTERN)?;
    let bytes = haystack.get(pos + 8..pos + 12)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
