// src/lib.rs

//! rpmrepo
//!
//! Generates rpm-md repository metadata from RPM package headers and reads
//! it back.
//!
//! # Architecture
//!
//! - Extraction: binary RPM header -> [`packages::Package`], including the
//!   requires clean-up and changelog normalization repositories expect
//! - Projection: `Package` -> primary, filelists and other XML fragments
//! - Streaming parsers: (compressed) metadata files -> `Package` values
//! - Assembly: a directory of packages -> `repodata/` with `repomd.xml`

pub mod checksum;
pub mod compression;
pub mod config;
mod error;
pub mod packages;
pub mod repository;
pub mod version;

pub use error::{Error, Result};
