//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::{Compression as DeflateLevel, read::DeflateDecoder, write::DeflateEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// A catalog is written once per build and read many times: spend the time.
const DEFLATE_LEVEL: DeflateLevel = DeflateLevel::best();
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 19;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use apicat_compress::Compression;
    ///
    /// let data = b"Hello, world!";
    /// let compressed = Compression::Deflate.compress(data).unwrap();
    /// assert_eq!(Compression::Deflate.decompress(&compressed).unwrap(), data);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress at most `limit` bytes, leaving the rest of the stream
    /// unread.
    ///
    /// Bounds the memory spent on input whose decompressed size is known up
    /// front: asking for one byte more than expected is enough to detect an
    /// oversized stream.
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress_limited(&self, input: &[u8], limit: u64) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => {
                let end = usize::try_from(limit).map_or(input.len(), |limit| limit.min(input.len()));
                output.extend_from_slice(&input[..end]);
            },
            Compression::Deflate => {
                let decoder = DeflateDecoder::new(input);
                decoder.take(limit).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
                decoder.take(limit).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
        }
        Ok(output)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut *output, DEFLATE_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut *output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn decompress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => {
                let mut decoder = DeflateDecoder::new(input);
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
                decoder.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use crate::error::ErrorKind;
    use rstest::rstest;

    const SAMPLE: &[u8] = b"public static class Enumerable { public static int Count<TSource>(this IEnumerable<TSource> source); }";

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Deflate)]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_round_trip(#[case] format: Compression) {
        let compressed = format.compress(SAMPLE).unwrap();
        assert_eq!(format.decompress(&compressed).unwrap(), SAMPLE);
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let input = SAMPLE.repeat(64);
        assert!(Compression::Deflate.compress(&input).unwrap().len() < input.len() / 4);
    }

    #[test]
    fn test_into_appends() {
        let mut output = b"header".to_vec();
        let written = Compression::None.compress_into(b"body", &mut output).unwrap();
        assert_eq!(written, 4);
        assert_eq!(output, b"headerbody");
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Deflate)]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_limited_output(#[case] format: Compression) {
        let input = SAMPLE.repeat(64);
        let compressed = format.compress(&input).unwrap();
        assert_eq!(format.decompress_limited(&compressed, 10).unwrap(), &input[..10]);
        assert_eq!(format.decompress_limited(&compressed, u64::MAX).unwrap(), input);
    }

    #[rstest]
    #[case(Compression::Deflate)]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_corrupt_input(#[case] format: Compression) {
        let err = format.decompress(&[0xFF; 16]).unwrap_err();
        assert!(matches!(*err, ErrorKind::InvalidData | ErrorKind::Encoder));
    }
}
