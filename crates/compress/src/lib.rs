//! Compression of the binary catalog body.
//!
//! The artifact header records which [`Compression`] its body uses as a single
//! byte, so a loader never has to guess. Provides:
//!
//! - **Byte tags** for the artifact header ([`Compression::as_byte`],
//!   [`Compression::from_byte`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Names** for configuration, parsed with [`FromStr`](std::str::FromStr)
//!   and printed with [`Display`](std::fmt::Display)
//!
//! Deflate is always available. Zstd is behind the default `zstd` feature.
//! The optional `serde` feature (de)serialises the configuration name.

mod construct;
pub mod error;
mod ops;
#[cfg(feature = "serde")]
mod serialize;
mod util;

/// A supported body codec.
///
/// Defaults to [`None`](Self::None) (stored as-is).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Raw DEFLATE stream
    Deflate,
    /// Zstandard frame
    #[cfg(feature = "zstd")]
    Zstd,
}

#[cfg(test)]
mod tests {
    use crate::Compression;

    #[test]
    fn compression_default() {
        assert_eq!(Compression::default(), Compression::None);
    }
}
