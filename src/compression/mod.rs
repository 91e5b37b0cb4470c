// src/compression/mod.rs
//! Streaming decompression of tarballs
//!
//! EESSI tarballs are normally gzip-compressed, but the ingestion path only
//! needs a byte stream, so xz and zstd tarballs are accepted as well. The
//! format is taken from the file extension and, failing that, from the
//! magic bytes at the start of the file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain tar
    None,
    Gzip,
    Xz,
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    ///
    /// # Examples
    /// ```
    /// use eessi_ingest::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("eessi-2023.06-init-1.tar.gz"), CompressionFormat::Gzip);
    /// assert_eq!(CompressionFormat::from_extension("data.tar.zst"), CompressionFormat::Zstd);
    /// assert_eq!(CompressionFormat::from_extension("data.tar"), CompressionFormat::None);
    /// ```
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") || path.ends_with(".tgz") {
            Self::Gzip
        } else if path.ends_with(".xz") || path.ends_with(".txz") {
            Self::Xz
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00`
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wrap `reader` in a decoder for `format`
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                format: "zstd",
                source: e,
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Detect the format of the file at `path`
///
/// The extension wins; files without a recognised extension are sniffed.
pub fn detect_format(path: &Path) -> Result<CompressionFormat, CompressionError> {
    let by_extension = CompressionFormat::from_extension(&path.to_string_lossy());
    if by_extension != CompressionFormat::None {
        return Ok(by_extension);
    }

    let mut file = open(path)?;
    let mut magic = [0u8; 6];
    let read = read_prefix(&mut file, &mut magic).map_err(|e| CompressionError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(CompressionFormat::from_magic_bytes(&magic[..read]))
}

/// Open `path` as a decompressed byte stream
///
/// This is the decompressor handed to the publication service's bulk ingest
/// and to the archive lister; nothing is buffered beyond the decoder's
/// internal window.
pub fn open_decompressed(path: &Path) -> Result<Box<dyn Read>, CompressionError> {
    let format = detect_format(path)?;
    debug!("Opening {} as {} stream", path.display(), format);

    let file = open(path)?;
    create_decoder(BufReader::new(file), format)
}

fn open(path: &Path) -> Result<File, CompressionError> {
    File::open(path).map_err(|e| CompressionError::Open {
        path: path.display().to_string(),
        source: e,
    })
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
