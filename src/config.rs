// src/config.rs

//! Repository generation settings
//!
//! A [`RepoConfig`] is built once (from the command line) through
//! [`RepoConfigBuilder`] and then only read. Out-of-range numbers are reset
//! to their defaults with a warning; unknown names are errors.

use crate::checksum::ChecksumType;
use crate::compression::CompressionFormat;
use crate::error::{Error, Result};
use crate::repository::repomd::DistroTag;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CHANGELOG_LIMIT: usize = 10;
pub const MAX_CHANGELOG_LIMIT: usize = 100;
pub const DEFAULT_WORKERS: usize = 5;
pub const MAX_WORKERS: usize = 100;

/// Validated settings of a repository run
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Where `repodata/` goes; the input directory when unset
    pub outputdir: Option<PathBuf>,
    /// `xml:base` of every package location
    pub location_base: Option<String>,
    /// Package file names matching any of these are skipped
    pub excludes: Vec<Pattern>,
    /// When non-empty, only these packages (relative path or file name)
    pub include_pkgs: Vec<String>,
    /// Changelog entries kept per package
    pub changelog_limit: usize,
    /// Threads processing packages
    pub workers: usize,
    pub checksum_type: ChecksumType,
    pub compression: CompressionFormat,
    /// Prefix metadata file names with their checksum
    pub unique_md_filenames: bool,
    /// Reuse packages from existing metadata
    pub update: bool,
    /// Additional repositories to reuse metadata from
    pub update_md_paths: Vec<PathBuf>,
    /// Reuse without comparing mtime and size
    pub skip_stat: bool,
    pub skip_symlinks: bool,
    /// repomd revision; current time when unset
    pub revision: Option<String>,
    pub distro_tags: Vec<DistroTag>,
    pub content_tags: Vec<String>,
    pub repo_tags: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            outputdir: None,
            location_base: None,
            excludes: Vec::new(),
            include_pkgs: Vec::new(),
            changelog_limit: DEFAULT_CHANGELOG_LIMIT,
            workers: DEFAULT_WORKERS,
            checksum_type: ChecksumType::default(),
            compression: CompressionFormat::Gzip,
            unique_md_filenames: true,
            update: false,
            update_md_paths: Vec::new(),
            skip_stat: false,
            skip_symlinks: false,
            revision: None,
            distro_tags: Vec::new(),
            content_tags: Vec::new(),
            repo_tags: Vec::new(),
        }
    }
}

impl RepoConfig {
    pub fn builder() -> RepoConfigBuilder {
        RepoConfigBuilder::default()
    }

    /// Whether a package file name matches one of the exclude masks
    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.matches(file_name))
    }

    /// Whether a package passes the include list
    pub fn is_included(&self, relative_path: &str, file_name: &str) -> bool {
        self.include_pkgs.is_empty()
            || self
                .include_pkgs
                .iter()
                .any(|pkg| pkg == relative_path || pkg == file_name)
    }
}

/// Raw settings, checked by [`RepoConfigBuilder::build`]
#[derive(Debug, Default, Clone)]
pub struct RepoConfigBuilder {
    outputdir: Option<PathBuf>,
    location_base: Option<String>,
    excludes: Vec<String>,
    include_pkgs: Vec<String>,
    pkglist: Option<PathBuf>,
    changelog_limit: Option<i64>,
    workers: Option<i64>,
    checksum_type: Option<String>,
    compression: Option<String>,
    simple_md_filenames: bool,
    update: bool,
    update_md_paths: Vec<PathBuf>,
    skip_stat: bool,
    skip_symlinks: bool,
    revision: Option<String>,
    distro_tags: Vec<String>,
    content_tags: Vec<String>,
    repo_tags: Vec<String>,
}

impl RepoConfigBuilder {
    pub fn outputdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outputdir = Some(dir.into());
        self
    }

    pub fn location_base(mut self, base: impl Into<String>) -> Self {
        self.location_base = Some(base.into());
        self
    }

    pub fn excludes(mut self, masks: Vec<String>) -> Self {
        self.excludes = masks;
        self
    }

    pub fn include_pkgs(mut self, pkgs: Vec<String>) -> Self {
        self.include_pkgs = pkgs;
        self
    }

    /// File listing packages to include, one per line
    pub fn pkglist(mut self, path: impl Into<PathBuf>) -> Self {
        self.pkglist = Some(path.into());
        self
    }

    pub fn changelog_limit(mut self, limit: i64) -> Self {
        self.changelog_limit = Some(limit);
        self
    }

    pub fn workers(mut self, workers: i64) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn checksum_type(mut self, name: impl Into<String>) -> Self {
        self.checksum_type = Some(name.into());
        self
    }

    pub fn compression(mut self, name: impl Into<String>) -> Self {
        self.compression = Some(name.into());
        self
    }

    pub fn simple_md_filenames(mut self, simple: bool) -> Self {
        self.simple_md_filenames = simple;
        self
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn update_md_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.update_md_paths = paths;
        self
    }

    pub fn skip_stat(mut self, skip: bool) -> Self {
        self.skip_stat = skip;
        self
    }

    pub fn skip_symlinks(mut self, skip: bool) -> Self {
        self.skip_symlinks = skip;
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// `cpeid,name` or just `name`
    pub fn distro_tags(mut self, tags: Vec<String>) -> Self {
        self.distro_tags = tags;
        self
    }

    pub fn content_tags(mut self, tags: Vec<String>) -> Self {
        self.content_tags = tags;
        self
    }

    pub fn repo_tags(mut self, tags: Vec<String>) -> Self {
        self.repo_tags = tags;
        self
    }

    /// Validate everything and produce the final configuration
    pub fn build(self) -> Result<RepoConfig> {
        let changelog_limit = match self.changelog_limit {
            None => DEFAULT_CHANGELOG_LIMIT,
            Some(limit) if (0..=MAX_CHANGELOG_LIMIT as i64).contains(&limit) => limit as usize,
            Some(limit) => {
                warn!(
                    "Changelog limit {} is out of range 0..={}, using {}",
                    limit, MAX_CHANGELOG_LIMIT, DEFAULT_CHANGELOG_LIMIT
                );
                DEFAULT_CHANGELOG_LIMIT
            }
        };

        let workers = match self.workers {
            None => DEFAULT_WORKERS,
            Some(workers) if (1..=MAX_WORKERS as i64).contains(&workers) => workers as usize,
            Some(workers) => {
                warn!(
                    "Number of workers {} is out of range 1..={}, using {}",
                    workers, MAX_WORKERS, DEFAULT_WORKERS
                );
                DEFAULT_WORKERS
            }
        };

        let checksum_type = match &self.checksum_type {
            Some(name) => name.parse()?,
            None => ChecksumType::default(),
        };

        let compression = match self.compression.as_deref() {
            None => CompressionFormat::Gzip,
            Some(name) => match name.to_ascii_lowercase().as_str() {
                "gz" => CompressionFormat::Gzip,
                "bz2" => CompressionFormat::Bzip2,
                "xz" => CompressionFormat::Xz,
                "zst" => CompressionFormat::Zstd,
                _ => {
                    return Err(Error::BadArg(format!("Unknown compression type \"{}\"", name)));
                }
            },
        };

        if let Some(dir) = &self.outputdir {
            if !dir.is_dir() {
                return Err(Error::BadArg(format!(
                    "Output directory {} does not exist",
                    dir.display()
                )));
            }
        }

        let excludes = self
            .excludes
            .iter()
            .map(|mask| {
                Pattern::new(mask)
                    .map_err(|e| Error::BadArg(format!("Invalid exclude mask \"{}\": {}", mask, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut include_pkgs = self.include_pkgs;
        if let Some(pkglist) = &self.pkglist {
            include_pkgs.extend(read_pkglist(pkglist)?);
        }

        Ok(RepoConfig {
            outputdir: self.outputdir,
            location_base: self.location_base,
            excludes,
            include_pkgs,
            changelog_limit,
            workers,
            checksum_type,
            compression,
            unique_md_filenames: !self.simple_md_filenames,
            update: self.update,
            update_md_paths: self.update_md_paths,
            skip_stat: self.skip_stat,
            skip_symlinks: self.skip_symlinks,
            revision: self.revision,
            distro_tags: self.distro_tags.iter().map(|tag| parse_distro_tag(tag)).collect(),
            content_tags: self.content_tags,
            repo_tags: self.repo_tags,
        })
    }
}

fn read_pkglist(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::BadArg(format!("Cannot read package list {}: {}", path.display(), e))
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Split `cpeid,name` at the first comma
fn parse_distro_tag(tag: &str) -> DistroTag {
    match tag.split_once(',') {
        Some((cpeid, name)) => DistroTag {
            cpeid: Some(cpeid.to_string()),
            name: name.to_string(),
        },
        None => DistroTag {
            cpeid: None,
            name: tag.to_string(),
        },
    }
}
