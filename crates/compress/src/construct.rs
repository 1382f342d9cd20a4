use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

const NONE_TAG: u8 = 0;
const DEFLATE_TAG: u8 = 1;
const ZSTD_TAG: u8 = 2;

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "deflate" => Ok(Compression::Deflate),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Compression::from_byte(value)
    }
}

impl Compression {
    /// The tag written into the artifact header.
    #[must_use]
    pub fn as_byte(&self) -> u8 {
        match self {
            Compression::None => NONE_TAG,
            Compression::Deflate => DEFLATE_TAG,
            #[cfg(feature = "zstd")]
            Compression::Zstd => ZSTD_TAG,
        }
    }

    /// Decode a header tag. A known tag whose codec was compiled out is
    /// reported as disabled rather than unsupported.
    pub fn from_byte(tag: u8) -> Result<Self, Error> {
        match tag {
            NONE_TAG => Ok(Compression::None),
            DEFLATE_TAG => Ok(Compression::Deflate),
            #[cfg(feature = "zstd")]
            ZSTD_TAG => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            ZSTD_TAG => exn::bail!(ErrorKind::DisabledFormat("zstd".to_string())),
            other => exn::bail!(ErrorKind::UnsupportedFormat(format!("tag {other}"))),
        }
    }
}
