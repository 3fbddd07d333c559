// src/packages/mod.rs

//! RPM package metadata
//!
//! This module holds the package data model, the header reader and
//! the extraction of repository metadata from a header.

pub mod compare;
pub mod header;
pub mod model;
pub mod rpm;

pub use compare::{DependencyOrdering, compare_dependency};
pub use header::{Header, HeaderRange, TagValues, read_package_header};
pub use model::{ChangelogEntry, Dependency, DependencyKind, FileType, Package, PackageFile};
pub use self::rpm::{PackageOrigin, XmlChunks, package_from_header, xml_from_header};
