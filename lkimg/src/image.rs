//! LK image container: parsing, rebuilding and mutation
//!
//! The image owns the raw byte buffer and an insertion-ordered collection
//! of uniquely named partitions, each with its attached certificates. Any
//! structural mutation regenerates the buffer through [`LkImage::rebuild`],
//! which also normalizes the image-list-end flags and recomputes the
//! partitions' end offsets.

use std::path::Path;

use crate::error::{LkImageError, Result};
use crate::image_header::LkHeader;
use crate::image_types::{CertType, ImageType, LkVersion};
use crate::partition::{LkPartition, find_bytes};
use crate::{CERT_PREFIX, HEADER_SIZE, LEGACY_ALIGNMENT, MAGIC};

/// Policy for byte stream tails that fail to parse after at least one
/// partition was decoded successfully. Legacy images commonly carry
/// unparsable trailing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingGarbage {
    /// Stop quietly once any partition has been parsed
    #[default]
    AfterAnyPartition,
    /// Stop quietly only when the last parsed partition is `lk`
    AfterLk,
    /// Always propagate the parse error
    Strict,
}

/// Options for image parsing
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub trailing_garbage: TrailingGarbage,
}

/// Specification for a partition to add to an image.
///
/// Unset fields fall back to sensible defaults; the header format is
/// auto-selected from the data size and load address unless overridden.
#[derive(Debug, Clone)]
pub struct NewPartition {
    name: String,
    data: Vec<u8>,
    load_address: u64,
    mode: u32,
    image_type: Option<ImageType>,
    extended: Option<bool>,
    alignment: u32,
    position: Option<usize>,
}

impl NewPartition {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            load_address: 0,
            mode: 0,
            image_type: None,
            extended: None,
            alignment: LEGACY_ALIGNMENT,
            position: None,
        }
    }

    /// Load address for the partition
    pub fn load_address(mut self, address: u64) -> Self {
        self.load_address = address;
        self
    }

    /// Addressing mode field
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Image type carried in the extended header
    pub fn image_type(mut self, image_type: ImageType) -> Self {
        self.image_type = Some(image_type);
        self
    }

    /// Force the extended or legacy header format
    pub fn extended(mut self, extended: bool) -> Self {
        self.extended = Some(extended);
        self
    }

    /// Payload alignment boundary (extended headers only; 0 disables
    /// padding)
    pub fn alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment;
        self
    }

    /// Insert position in the partition order (default: append)
    pub fn position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// An LK image held in memory
#[derive(Debug, Clone)]
pub struct LkImage {
    contents: Vec<u8>,
    partitions: Vec<LkPartition>,
    version: LkVersion,
}

impl LkImage {
    /// Parse an image from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Parse an image from a byte buffer with default options
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::parse_with(bytes, ParseOptions::default())
    }

    /// Parse an image from a byte buffer
    pub fn parse_with(bytes: impl Into<Vec<u8>>, options: ParseOptions) -> Result<Self> {
        let contents = bytes.into();
        let partitions = Self::parse_partitions(&contents, options)?;
        let version = LkVersion::classify(partitions.iter().map(|p| p.name()));
        Ok(Self {
            contents,
            partitions,
            version,
        })
    }

    fn parse_partitions(contents: &[u8], options: ParseOptions) -> Result<Vec<LkPartition>> {
        let mut partitions: Vec<LkPartition> = Vec::new();
        let mut offset = 0;

        while offset < contents.len() {
            let partition = match LkPartition::parse(&contents[offset..], offset) {
                Ok(partition) => partition,
                Err(err) => {
                    if Self::tolerate_trailing(&partitions, options) {
                        break;
                    }
                    return Err(err);
                }
            };

            let is_extended = partition.header().is_extended();
            let list_end = partition.header().image_list_end();
            let end_offset = partition.end_offset();
            let name = partition.name().to_string();

            if name.starts_with(CERT_PREFIX) {
                match partitions.last_mut() {
                    Some(owner) => owner.certs.push(partition),
                    None => {
                        return Err(LkImageError::invalid_partition(
                            "certificate partition placed before its owner",
                        ));
                    }
                }
            } else if partitions.iter().any(|p| p.name() == name) {
                return Err(LkImageError::duplicate_name(name));
            } else {
                partitions.push(partition);
            }

            if is_extended && list_end == 1 {
                break;
            }

            offset = end_offset;

            // Legacy headers have no list-end flag, and a flag outside 0/1
            // means the field is untrustworthy; fall back to probing the
            // next offset.
            if (!is_extended || list_end > 1) && Self::is_end_of_partitions(contents, offset) {
                break;
            }
        }

        Ok(partitions)
    }

    fn tolerate_trailing(partitions: &[LkPartition], options: ParseOptions) -> bool {
        match options.trailing_garbage {
            TrailingGarbage::Strict => false,
            TrailingGarbage::AfterAnyPartition => !partitions.is_empty(),
            TrailingGarbage::AfterLk => partitions
                .last()
                .is_some_and(|p| p.name().eq_ignore_ascii_case("lk")),
        }
    }

    fn is_end_of_partitions(contents: &[u8], offset: usize) -> bool {
        if offset >= contents.len() || contents.len() - offset < HEADER_SIZE {
            return true;
        }
        match contents.get(offset..offset + 4) {
            Some(bytes) => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) != MAGIC
            }
            None => true,
        }
    }

    /// The image version derived from the partitions present
    pub fn version(&self) -> LkVersion {
        self.version
    }

    /// Partitions in image order
    pub fn partitions(&self) -> &[LkPartition] {
        &self.partitions
    }

    /// Partition names in image order
    pub fn partition_names(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.name()).collect()
    }

    /// Look up a partition by name
    pub fn partition(&self, name: &str) -> Option<&LkPartition> {
        self.partitions.iter().find(|p| p.name() == name)
    }

    /// Number of partitions (certificates not counted)
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The current raw byte buffer. Only up to date once
    /// [`rebuild`](Self::rebuild) has run after the latest two-phase
    /// mutation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.contents
    }

    /// Consume the image, returning the raw byte buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.contents
    }

    /// Write the current byte buffer verbatim
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, &self.contents)?;
        Ok(())
    }

    /// Regenerate the byte buffer from the partition collection.
    ///
    /// Clears every image-list-end flag, sets it on the logically last unit
    /// (the final certificate of the last partition, else the last
    /// partition itself), serializes all units in order and records each
    /// partition's end offset as the running byte length after it and its
    /// certificates. Idempotent for an unchanged collection.
    pub fn rebuild(&mut self) {
        for partition in &mut self.partitions {
            partition.header.image_list_end = 0;
            for cert in &mut partition.certs {
                cert.header.image_list_end = 0;
            }
        }
        if let Some(last) = self.partitions.last_mut() {
            match last.certs.last_mut() {
                Some(cert) => cert.header.image_list_end = 1,
                None => last.header.image_list_end = 1,
            }
        }

        let mut contents = Vec::new();
        for partition in &mut self.partitions {
            contents.extend_from_slice(&partition.full_bytes());
            partition.end_offset = contents.len();
        }
        self.contents = contents;
    }

    /// Add a new partition and rebuild the image.
    ///
    /// Fails with `DuplicateName` or `NameTooLong` without touching the
    /// collection. The extended format is auto-selected when the payload or
    /// load address needs more than 32 bits.
    pub fn add_partition(&mut self, spec: NewPartition) -> Result<&LkPartition> {
        if self.partitions.iter().any(|p| p.name() == spec.name) {
            return Err(LkImageError::duplicate_name(spec.name));
        }

        let extended = spec.extended.unwrap_or(
            spec.data.len() as u64 > u64::from(u32::MAX)
                || spec.load_address > u64::from(u32::MAX),
        );

        let mut header = LkHeader::new(&spec.name, extended)?;
        header.set_load_address(spec.load_address);
        header.mode = spec.mode;
        header.image_type = spec.image_type.unwrap_or_default();
        header.set_alignment(spec.alignment);

        let index = spec.position.unwrap_or(self.partitions.len());
        let index = index.min(self.partitions.len());
        self.partitions
            .insert(index, LkPartition::new(header, spec.data));

        self.reclassify();
        self.rebuild();
        Ok(&self.partitions[index])
    }

    /// Remove a partition by name and rebuild the image
    pub fn remove_partition(&mut self, name: &str) -> Result<LkPartition> {
        let index = self
            .partitions
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| LkImageError::partition_not_found(name))?;

        let removed = self.partitions.remove(index);
        self.reclassify();
        self.rebuild();
        Ok(removed)
    }

    /// Attach a certificate to the named partition.
    ///
    /// Does not rebuild: callers must call [`rebuild`](Self::rebuild)
    /// before relying on the byte stream.
    pub fn add_certificate(
        &mut self,
        partition: &str,
        data: impl Into<Vec<u8>>,
        cert_type: CertType,
    ) -> Result<()> {
        let owner = self
            .partitions
            .iter_mut()
            .find(|p| p.name() == partition)
            .ok_or_else(|| LkImageError::partition_not_found(partition))?;
        owner.add_certificate(data, cert_type)
    }

    /// Replace the first occurrence of `needle` with `patch`.
    ///
    /// With a partition name the search is confined to that partition's
    /// payload and the partition header stays consistent; the image must be
    /// rebuilt afterwards when the lengths differ. Without one the raw
    /// image buffer is patched directly.
    pub fn apply_patch(
        &mut self,
        needle: &[u8],
        patch: &[u8],
        partition: Option<&str>,
    ) -> Result<()> {
        match partition {
            Some(name) => {
                let target = self
                    .partitions
                    .iter_mut()
                    .find(|p| p.name() == name)
                    .ok_or_else(|| LkImageError::partition_not_found(name))?;
                target.apply_patch(needle, patch)
            }
            None => {
                let pos = find_bytes(&self.contents, needle)
                    .ok_or_else(|| LkImageError::needle_not_found(needle))?;
                let mut patched =
                    Vec::with_capacity(self.contents.len() - needle.len() + patch.len());
                patched.extend_from_slice(&self.contents[..pos]);
                patched.extend_from_slice(patch);
                patched.extend_from_slice(&self.contents[pos + needle.len()..]);
                self.contents = patched;
                Ok(())
            }
        }
    }

    fn reclassify(&mut self) {
        self.version = LkVersion::classify(self.partitions.iter().map(|p| p.name()));
    }
}
