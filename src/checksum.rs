// src/checksum.rs

//! Checksums for package ids and repomd records

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    /// Name used in `checksum@type` attributes
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Sha224 => "sha224",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha384 => "sha384",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha224" => Ok(ChecksumType::Sha224),
            "sha256" => Ok(ChecksumType::Sha256),
            "sha384" => Ok(ChecksumType::Sha384),
            "sha512" => Ok(ChecksumType::Sha512),
            _ => Err(Error::Checksum(s.to_string())),
        }
    }
}

/// Streaming hasher over one of the supported algorithms
pub enum Hasher {
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    pub fn new(checksum_type: ChecksumType) -> Self {
        match checksum_type {
            ChecksumType::Sha224 => Hasher::Sha224(Sha224::new()),
            ChecksumType::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumType::Sha384 => Hasher::Sha384(Sha384::new()),
            ChecksumType::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    /// Lowercase hex digest
    pub fn finalize(self) -> String {
        match self {
            Hasher::Sha224(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha384(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Hex digest of everything `reader` yields
pub fn reader_checksum<R: Read>(reader: &mut R, checksum_type: ChecksumType) -> Result<String> {
    let mut hasher = Hasher::new(checksum_type);
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Hex digest of a file's contents
pub fn file_checksum<P: AsRef<Path>>(path: P, checksum_type: ChecksumType) -> Result<String> {
    let path = path.as_ref();
    debug!("Computing {} of {}", checksum_type, path.display());

    let mut file = File::open(path)
        .map_err(|e| Error::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e))))?;
    reader_checksum(&mut file, checksum_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_checksum_type_names() {
        assert_eq!("sha256".parse::<ChecksumType>().unwrap(), ChecksumType::Sha256);
        assert_eq!("SHA512".parse::<ChecksumType>().unwrap(), ChecksumType::Sha512);
        assert_eq!(ChecksumType::Sha384.to_string(), "sha384");
        assert_eq!(ChecksumType::default(), ChecksumType::Sha256);

        let err = "md5".parse::<ChecksumType>().unwrap_err();
        assert_eq!(err.code(), 12);
    }

    #[test]
    fn test_known_digests() {
        let mut empty: &[u8] = b"";
        assert_eq!(
            reader_checksum(&mut empty, ChecksumType::Sha256).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let mut abc: &[u8] = b"abc";
        assert_eq!(
            reader_checksum(&mut abc, ChecksumType::Sha224).unwrap(),
            "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"
        );
    }

    #[test]
    fn test_file_checksum_matches_streaming() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello repodata\n").unwrap();
        file.flush().unwrap();

        let mut hasher = Hasher::new(ChecksumType::Sha512);
        hasher.update(b"hello ");
        hasher.update(b"repodata\n");

        assert_eq!(
            file_checksum(file.path(), ChecksumType::Sha512).unwrap(),
            hasher.finalize()
        );
    }

    #[test]
    fn test_file_checksum_missing_file() {
        let err = file_checksum("/nonexistent/file.rpm", ChecksumType::Sha256).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
