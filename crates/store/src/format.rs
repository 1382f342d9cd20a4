//! Byte layout of the catalog artifact.
//!
//! ```text
//! header (44 bytes, little-endian)
//!   magic          [u8; 8]   "APICATLG"
//!   version        u32
//!   compression    u8        + 3 reserved zero bytes
//!   frameworks     u32
//!   packages       u32
//!   assemblies     u32
//!   apis           u32
//!   body length    u64       uncompressed
//!   body checksum  u32       CRC-32 of the uncompressed body
//! body (compressed as a whole)
//!   string heap, markup heap, framework, package, assembly and api tables,
//!   reverse index
//! ```
//!
//! Every cross-reference inside the body is a `u32` index; `u32::MAX` marks
//! an absent parent.

use crate::error::{ErrorKind, Result};
use apicat_compress::Compression;
use apicat_model::Fingerprint;
use exn::ResultExt;

pub const MAGIC: [u8; 8] = *b"APICATLG";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 44;
pub const NO_PARENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub frameworks: u32,
    pub packages: u32,
    pub assemblies: u32,
    pub apis: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub compression: Compression,
    pub counts: Counts,
    pub body_len: u64,
    pub checksum: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = Encoder::default();
        out.bytes(&MAGIC);
        out.u32(self.version);
        out.u8(self.compression.as_byte());
        out.bytes(&[0; 3]);
        out.u32(self.counts.frameworks);
        out.u32(self.counts.packages);
        out.u32(self.counts.assemblies);
        out.u32(self.counts.apis);
        out.u64(self.body_len);
        out.u32(self.checksum);
        let mut header = [0; HEADER_LEN];
        header.copy_from_slice(&out.into_inner());
        header
    }

    /// Validates magic and version before anything else, so a foreign or
    /// newer file is reported as such rather than as truncated.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(&MAGIC) {
            exn::bail!(ErrorKind::BadMagic);
        }
        let mut input = Decoder::new(&bytes[MAGIC.len()..]);
        let version = input.u32()?;
        if version != FORMAT_VERSION {
            exn::bail!(ErrorKind::UnsupportedVersion(version));
        }
        let compression = Compression::from_byte(input.u8()?).or_raise(|| ErrorKind::Compression)?;
        input.take(3)?;
        let counts = Counts {
            frameworks: input.u32()?,
            packages: input.u32()?,
            assemblies: input.u32()?,
            apis: input.u32()?,
        };
        Ok(Self { version, compression, counts, body_len: input.u64()?, checksum: input.u32()? })
    }
}

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn fingerprint(&mut self, value: Fingerprint) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Writes a collection length or index.
    pub fn index(&mut self, value: usize, what: &'static str) -> Result<()> {
        self.u32(to_index(value, what)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

pub fn to_index(value: usize, what: &'static str) -> Result<u32> {
    // NO_PARENT is reserved.
    match u32::try_from(value) {
        Ok(index) if index != NO_PARENT => Ok(index),
        _ => exn::bail!(ErrorKind::TooLarge(what)),
    }
}

/// Bounds-checked little-endian reader.
#[derive(Debug)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(len).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            exn::bail!(ErrorKind::Truncated);
        };
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn fingerprint(&mut self) -> Result<Fingerprint> {
        Ok(Fingerprint::from_bytes(self.array()?))
    }

    /// Reads an index and checks it against the size of the table it points into.
    pub fn index(&mut self, bound: usize, what: &'static str) -> Result<u32> {
        let index = self.u32()?;
        if usize::try_from(index).map_or(true, |index| index >= bound) {
            exn::bail!(ErrorKind::InvalidData(what));
        }
        Ok(index)
    }

    /// Reads a collection length, rejecting lengths that cannot possibly fit
    /// in the remaining input.
    pub fn len(&mut self, min_item_size: usize) -> Result<usize> {
        let len = usize::try_from(self.u32()?).or_raise(|| ErrorKind::Truncated)?;
        let remaining = self.bytes.len() - self.position;
        if len.saturating_mul(min_item_size.max(1)) > remaining {
            exn::bail!(ErrorKind::Truncated);
        }
        Ok(len)
    }
}
