// src/packages/header.rs

//! Main header of an RPM package file
//!
//! Lead, signature header and main header are decoded by the `rpm` crate.
//! This module locates the main header inside the file and adds the lenient
//! tag access metadata extraction needs: a missing or oddly typed tag reads
//! as absent instead of failing.

use crate::error::{Error, Result};
use rpm::{IndexTag, PackageMetadata};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Main header of a package
pub type Header = rpm::Header<IndexTag>;

/// Byte range of the main header inside the package file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// Typed tag lookups that never fail
pub trait TagValues {
    /// Single string; the first element for string arrays and i18n strings
    fn string(&self, tag: IndexTag) -> Option<&str>;

    /// String array or i18n string list
    fn strings(&self, tag: IndexTag) -> Option<&[String]>;

    /// First element of an integer entry, widened to u64
    fn number(&self, tag: IndexTag) -> Option<u64> {
        self.numbers(tag)?.first().copied()
    }

    /// All elements of a 16, 32 or 64 bit integer entry, widened to u64
    fn numbers(&self, tag: IndexTag) -> Option<Vec<u64>>;
}

impl TagValues for Header {
    fn string(&self, tag: IndexTag) -> Option<&str> {
        match self.get_entry_data_as_string(tag) {
            Ok(s) => Some(s),
            Err(_) => self.strings(tag)?.first().map(String::as_str),
        }
    }

    fn strings(&self, tag: IndexTag) -> Option<&[String]> {
        self.get_entry_data_as_string_array(tag).ok()
    }

    fn numbers(&self, tag: IndexTag) -> Option<Vec<u64>> {
        if let Ok(values) = self.get_entry_data_as_u32_array(tag) {
            return Some(values.into_iter().map(u64::from).collect());
        }
        if let Ok(values) = self.get_entry_data_as_u16_array(tag) {
            return Some(values.into_iter().map(u64::from).collect());
        }
        self.get_entry_data_as_u64_array(tag).ok()
    }
}

/// Read the main header of a package file and locate it
///
/// The payload is not read.
pub fn read_package_header<P: AsRef<Path>>(path: P) -> Result<(Header, HeaderRange)> {
    let path = path.as_ref();
    debug!("Reading RPM header: {}", path.display());

    let file = File::open(path)?;
    let metadata = PackageMetadata::parse(&mut BufReader::new(file))
        .map_err(|e| Error::Header(e.to_string()))?;

    let offsets = metadata.get_package_segment_offsets();
    let range = HeaderRange {
        start: offsets.header,
        end: offsets.payload,
    };
    debug!(
        "Header of {} spans bytes {}..{}",
        path.display(),
        range.start,
        range.end
    );

    Ok((metadata.header, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpm::{FileMode, FileOptions, PackageBuilder};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> rpm::Package {
        PackageBuilder::new("bash", "5.2.26", "GPL-3.0-or-later", "x86_64", "The GNU Bourne Again shell")
            .epoch(2)
            .with_file_contents("#!/bin/sh\n", FileOptions::new("/usr/bin/bash"))
            .unwrap()
            .with_file_contents("", FileOptions::new("/usr/share/bash").mode(FileMode::dir(0o755)))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_typed_access() {
        let pkg = sample();
        let header = &pkg.metadata.header;

        assert_eq!(header.string(IndexTag::RPMTAG_NAME), Some("bash"));
        // i18n string
        assert_eq!(
            header.string(IndexTag::RPMTAG_SUMMARY),
            Some("The GNU Bourne Again shell")
        );
        assert_eq!(header.number(IndexTag::RPMTAG_EPOCH), Some(2));
        assert_eq!(header.number(IndexTag::RPMTAG_SIZE), Some(10));
        assert_eq!(
            header.numbers(IndexTag::RPMTAG_FILEMODES),
            Some(vec![0o100664, 0o40755])
        );
        assert_eq!(
            header.strings(IndexTag::RPMTAG_BASENAMES).map(<[String]>::len),
            Some(2)
        );
        assert_eq!(header.strings(IndexTag::RPMTAG_NAME), None);
        assert_eq!(header.number(IndexTag::RPMTAG_NAME), None);
        assert_eq!(header.string(IndexTag::RPMTAG_URL), None);
        assert_eq!(header.number(IndexTag::RPMTAG_LONGSIZE), None);
    }

    #[test]
    fn test_read_package_header_range() {
        let pkg = sample();
        let mut file = NamedTempFile::new().unwrap();
        pkg.write(&mut file).unwrap();
        file.flush().unwrap();

        let (header, range) = read_package_header(file.path()).unwrap();
        assert_eq!(header, pkg.metadata.header);

        let offsets = pkg.metadata.get_package_segment_offsets();
        assert_eq!(range.start, offsets.header);
        assert_eq!(range.end, offsets.payload);
        // lead, then the signature header padded to 8 bytes
        assert!(range.start > 96);
        assert_eq!(range.start % 8, 0);
        assert!(range.end < file.as_file().metadata().unwrap().len());
    }

    #[test]
    fn test_read_package_header_rejects_non_rpm() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 128]).unwrap();
        file.flush().unwrap();
        assert!(matches!(read_package_header(file.path()), Err(Error::Header(_))));
    }

    #[test]
    fn test_read_package_header_rejects_truncated() {
        let pkg = sample();
        let mut bytes = Vec::new();
        pkg.write(&mut bytes).unwrap();
        let cut = pkg.metadata.get_package_segment_offsets().header as usize + 20;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes[..cut]).unwrap();
        file.flush().unwrap();
        assert!(matches!(read_package_header(file.path()), Err(Error::Header(_))));
    }
}
