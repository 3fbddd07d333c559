// src/compression/mod.rs
//! Compressed file streams
//!
//! Opens metadata files for reading or writing with transparent gzip, bzip2,
//! xz or zstd (de)compression. Readers can detect the format on their own;
//! writers can keep track of the size and checksum of the uncompressed
//! content, which `repomd.xml` records as open-size and open-checksum.

use crate::checksum::{ChecksumType, Hasher};
use crate::error::{Error, Result};
use bzip2::{Compression as BzCompression, read::MultiBzDecoder, write::BzEncoder};
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use xz2::{read::XzDecoder, write::XzEncoder};
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

const XZ_LEVEL: u32 = 6;
const ZSTD_LEVEL: i32 = 0;

/// Supported compression formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Look at the file to decide (reading only)
    AutoDetect,
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    #[default]
    Gzip,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &str) -> Self {
        if path.ends_with(".gz") || path.ends_with(".gzip") {
            Self::Gzip
        } else if path.ends_with(".bz2") || path.ends_with(".bzip2") {
            Self::Bzip2
        } else if path.ends_with(".xz") {
            Self::Xz
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - Bzip2: `42 5a 68` ("BZh")
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(b"BZh") {
            Self::Bzip2
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// File name suffix, `None` for formats without one
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::Gzip => Some(".gz"),
            Self::Bzip2 => Some(".bz2"),
            Self::Xz => Some(".xz"),
            Self::Zstd => Some(".zst"),
            Self::AutoDetect | Self::None => None,
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::AutoDetect => "auto",
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CompressionFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Ok(Self::Gzip),
            "bz2" | "bzip2" => Ok(Self::Bzip2),
            "xz" => Ok(Self::Xz),
            "zst" | "zstd" => Ok(Self::Zstd),
            "none" => Ok(Self::None),
            _ => Err(Error::Compression(format!("Unknown compression type: {}", s))),
        }
    }
}

/// Detect the compression of a file, by content first and by name second
///
/// An empty file is uncompressed whatever its name.
pub fn detect_compression<P: AsRef<Path>>(path: P) -> Result<CompressionFormat> {
    let path = path.as_ref();
    let mut magic = [0u8; 6];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == 0 {
        return Ok(CompressionFormat::None);
    }

    let format = match CompressionFormat::from_magic_bytes(&magic[..filled]) {
        CompressionFormat::None => CompressionFormat::from_extension(&path.to_string_lossy()),
        detected => detected,
    };
    debug!("Detected {} compression for {}", format, path.display());
    Ok(format)
}

/// Decompressing reader over a file
pub struct CompressedReader {
    inner: Box<dyn Read>,
    format: CompressionFormat,
}

impl CompressedReader {
    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    /// Read the stream to its end and release the underlying file
    ///
    /// Decoders verify their trailer (checksum, uncompressed size) only once
    /// the compressed data is exhausted, so a corrupt trailer is reported
    /// here. Unread decompressed bytes are discarded.
    pub fn close(mut self) -> Result<()> {
        io::copy(&mut self.inner, &mut io::sink())
            .map_err(|e| Error::Close(format!("{} stream: {}", self.format, e)))?;
        Ok(())
    }
}

impl Read for CompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Open a file for reading, decompressing on the fly
pub fn open_read<P: AsRef<Path>>(path: P, format: CompressionFormat) -> Result<CompressedReader> {
    let path = path.as_ref();
    let format = match format {
        CompressionFormat::AutoDetect => detect_compression(path)?,
        other => other,
    };

    let file = BufReader::new(File::open(path)?);
    let inner: Box<dyn Read> = match format {
        CompressionFormat::AutoDetect | CompressionFormat::None => Box::new(file),
        CompressionFormat::Gzip => Box::new(MultiGzDecoder::new(file)),
        CompressionFormat::Bzip2 => Box::new(MultiBzDecoder::new(file)),
        CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
        CompressionFormat::Zstd => Box::new(
            ZstdDecoder::with_buffer(file)
                .map_err(|e| Error::Compression(format!("Failed to create zstd decoder: {}", e)))?,
        ),
    };

    debug!("Opened {} for reading ({})", path.display(), format);
    Ok(CompressedReader { inner, format })
}

enum Encoder {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Bzip2(BzEncoder<BufWriter<File>>),
    Xz(XzEncoder<BufWriter<File>>),
    Zstd(ZstdEncoder<'static, BufWriter<File>>),
}

impl Encoder {
    fn as_write(&mut self) -> &mut dyn Write {
        match self {
            Encoder::Plain(w) => w,
            Encoder::Gzip(w) => w,
            Encoder::Bzip2(w) => w,
            Encoder::Xz(w) => w,
            Encoder::Zstd(w) => w,
        }
    }

    fn finish(self) -> io::Result<BufWriter<File>> {
        match self {
            Encoder::Plain(w) => Ok(w),
            Encoder::Gzip(w) => w.finish(),
            Encoder::Bzip2(w) => w.finish(),
            Encoder::Xz(w) => w.finish(),
            Encoder::Zstd(w) => w.finish(),
        }
    }
}

/// Size and checksum of the data written before compression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStat {
    pub size: u64,
    pub checksum: String,
    pub checksum_type: ChecksumType,
}

/// Compressing writer over a file
pub struct CompressedWriter {
    encoder: Encoder,
    format: CompressionFormat,
    stat: Option<(Hasher, ChecksumType, u64)>,
}

impl CompressedWriter {
    pub fn format(&self) -> CompressionFormat {
        self.format
    }

    /// Also hash everything written with `checksum_type`
    pub fn with_content_stat(mut self, checksum_type: ChecksumType) -> Self {
        self.stat = Some((Hasher::new(checksum_type), checksum_type, 0));
        self
    }

    /// Finish the compressed stream and flush it to disk
    ///
    /// Returns the content statistics when they were requested.
    pub fn close(self) -> Result<Option<ContentStat>> {
        let close_err = |e: io::Error| Error::Close(e.to_string());

        let mut file = self.encoder.finish().map_err(close_err)?;
        file.flush().map_err(close_err)?;
        file.get_ref().sync_all().map_err(close_err)?;

        Ok(self.stat.map(|(hasher, checksum_type, size)| ContentStat {
            size,
            checksum: hasher.finalize(),
            checksum_type,
        }))
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.encoder.as_write().write(buf)?;
        if let Some((hasher, _, size)) = self.stat.as_mut() {
            hasher.update(&buf[..written]);
            *size += written as u64;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.as_write().flush()
    }
}

/// Create (or truncate) a file for writing, compressing on the fly
pub fn open_write<P: AsRef<Path>>(path: P, format: CompressionFormat) -> Result<CompressedWriter> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);

    let encoder = match format {
        CompressionFormat::AutoDetect => {
            return Err(Error::BadArg(
                "Compression auto-detection is only available for reading".to_string(),
            ));
        }
        CompressionFormat::None => Encoder::Plain(file),
        CompressionFormat::Gzip => Encoder::Gzip(GzEncoder::new(file, GzCompression::default())),
        CompressionFormat::Bzip2 => Encoder::Bzip2(BzEncoder::new(file, BzCompression::default())),
        CompressionFormat::Xz => Encoder::Xz(XzEncoder::new(file, XZ_LEVEL)),
        CompressionFormat::Zstd => Encoder::Zstd(
            ZstdEncoder::new(file, ZSTD_LEVEL)
                .map_err(|e| Error::Compression(format!("Failed to create zstd encoder: {}", e)))?,
        ),
    };

    debug!("Opened {} for writing ({})", path.display(), format);
    Ok(CompressedWriter {
        encoder,
        format,
        stat: None,
    })
}
