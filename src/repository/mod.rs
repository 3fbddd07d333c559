// src/repository/mod.rs

//! Repository metadata generation
//!
//! This module provides functionality for:
//! - Scanning a directory tree for packages
//! - Extracting package metadata on a worker pool
//! - Writing compressed primary, filelists and other XML plus repomd.xml
//! - Reusing packages from existing metadata in update mode

pub mod dump;
pub mod parsers;
pub mod repomd;

use crate::compression;
use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::packages::Package;
use crate::packages::rpm::{self, FileStat};
use parsers::{parse_filelists, parse_other, parse_primary};
use rayon::prelude::*;
use repomd::{REPOMD_FILENAME, Repomd, RepomdRecord, locate_metadata};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the metadata directory inside a repository
pub const REPODATA_DIR: &str = "repodata";

/// Outcome of a repository run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSummary {
    /// Packages in the written metadata
    pub packages: usize,
    /// Packages taken over from old metadata
    pub reused: usize,
    /// Packages that could not be read
    pub failed: usize,
    /// The final repodata directory
    pub repodata: PathBuf,
}

/// A package found while scanning
#[derive(Debug, Clone)]
struct PackageTask {
    path: PathBuf,
    /// Path relative to the input directory, `/` separated
    location_href: String,
}

/// Rendered metadata of one package
#[derive(Debug)]
struct PackageResult {
    location_href: String,
    primary: String,
    filelists: String,
    other: String,
    reused: bool,
}

/// Builds the repodata of a directory of packages
pub struct RepoBuilder<'a> {
    config: &'a RepoConfig,
}

impl<'a> RepoBuilder<'a> {
    pub fn new(config: &'a RepoConfig) -> Self {
        Self { config }
    }

    /// Generate `repodata/` for the packages below `input_dir`
    pub fn run<P: AsRef<Path>>(&self, input_dir: P) -> Result<RepoSummary> {
        let input_dir = input_dir.as_ref();
        if !input_dir.is_dir() {
            return Err(Error::BadArg(format!(
                "Directory {} does not exist",
                input_dir.display()
            )));
        }
        let outputdir = self
            .config
            .outputdir
            .clone()
            .unwrap_or_else(|| input_dir.to_path_buf());

        let tasks = self.scan(input_dir)?;
        info!("Found {} packages in {}", tasks.len(), input_dir.display());

        let old = if self.config.update {
            self.load_old_metadata(&outputdir)
        } else {
            HashMap::new()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()
            .map_err(|e| Error::BadArg(format!("Failed to create worker pool: {}", e)))?;

        let results: Vec<Result<PackageResult>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| self.process(task, &old))
                .collect()
        });

        let mut packages = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (task, result) in tasks.iter().zip(results) {
            match result {
                Ok(package) => packages.push(package),
                Err(e) => {
                    warn!("Skipping {}: {}", task.path.display(), e);
                    failed += 1;
                }
            }
        }
        packages.sort_by(|a, b| a.location_href.cmp(&b.location_href));
        let reused = packages.iter().filter(|p| p.reused).count();

        let repodata = self.write_repodata(&outputdir, &packages)?;
        info!(
            "Wrote metadata of {} packages ({} reused) to {}",
            packages.len(),
            reused,
            repodata.display()
        );

        Ok(RepoSummary {
            packages: packages.len(),
            reused,
            failed,
            repodata,
        })
    }

    /// Collect the packages to process, in file name order
    fn scan(&self, input_dir: &Path) -> Result<Vec<PackageTask>> {
        let mut tasks = Vec::new();

        for entry in WalkDir::new(input_dir)
            .follow_links(!self.config.skip_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Cannot read directory entry: {}", err);
                    None
                }
            })
        {
            if entry.file_type().is_dir() {
                continue;
            }
            if self.config.skip_symlinks && entry.path_is_symlink() {
                debug!("Skipping symlink {}", entry.path().display());
                continue;
            }

            let Some(file_name) = entry.file_name().to_str() else {
                warn!("Skipping non UTF-8 file name {}", entry.path().display());
                continue;
            };
            if !file_name.ends_with(".rpm") || self.config.is_excluded(file_name) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(input_dir)
                .map_err(|e| Error::BadArg(format!("{}: {}", entry.path().display(), e)))?;
            let location_href = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !self.config.is_included(&location_href, file_name) {
                continue;
            }

            tasks.push(PackageTask {
                path: entry.path().to_path_buf(),
                location_href,
            });
        }

        Ok(tasks)
    }

    /// Read packages of earlier runs, keyed by location
    ///
    /// Repositories without usable metadata are skipped with a warning.
    /// For a location present in several repositories the first one wins,
    /// starting with the output directory.
    fn load_old_metadata(&self, outputdir: &Path) -> HashMap<String, Package> {
        let mut old = HashMap::new();
        let dirs = std::iter::once(outputdir)
            .chain(self.config.update_md_paths.iter().map(PathBuf::as_path));

        for dir in dirs {
            match load_repository(dir) {
                Ok(packages) => {
                    info!("Loaded {} packages from {}", packages.len(), dir.display());
                    for pkg in packages {
                        if let Some(href) = pkg.location_href.clone() {
                            old.entry(href).or_insert(pkg);
                        }
                    }
                }
                Err(e) => warn!("No usable metadata in {}: {}", dir.display(), e),
            }
        }

        old
    }

    /// Render one package, reusing old metadata when the file is unchanged
    fn process(&self, task: &PackageTask, old: &HashMap<String, Package>) -> Result<PackageResult> {
        if let Some(pkg) = old.get(&task.location_href) {
            if self.is_reusable(pkg, &task.path)? {
                debug!("Reusing metadata of {}", task.location_href);
                let mut pkg = pkg.clone();
                pkg.location_base = self.config.location_base.clone();
                return render(&task.location_href, &pkg, true);
            }
        }

        let pkg = rpm::read_package(
            &task.path,
            &task.location_href,
            self.config.location_base.as_deref(),
            self.config.checksum_type,
            self.config.changelog_limit,
        )?;
        render(&task.location_href, &pkg, false)
    }

    fn is_reusable(&self, pkg: &Package, path: &Path) -> Result<bool> {
        if pkg.checksum_type.as_deref() != Some(self.config.checksum_type.as_str()) {
            return Ok(false);
        }
        if self.config.skip_stat {
            return Ok(true);
        }
        let stat = FileStat::of(path)?;
        Ok(pkg.time_file == stat.mtime && pkg.size_package == stat.size)
    }

    /// Write everything into a scratch directory and swap it in
    fn write_repodata(&self, outputdir: &Path, packages: &[PackageResult]) -> Result<PathBuf> {
        let scratch = tempfile::Builder::new()
            .prefix(".repodata.")
            .tempdir_in(outputdir)?;

        let mut repomd = Repomd::new();
        if let Some(revision) = &self.config.revision {
            repomd.revision = revision.clone();
        }
        repomd.content_tags = self.config.content_tags.clone();
        repomd.repo_tags = self.config.repo_tags.clone();
        repomd.distro_tags = self.config.distro_tags.clone();

        let count = packages.len();
        repomd.records.push(self.write_metadata(
            scratch.path(),
            "primary",
            &dump::primary_header(count),
            packages.iter().map(|p| p.primary.as_str()),
            dump::PRIMARY_FOOTER,
        )?);
        repomd.records.push(self.write_metadata(
            scratch.path(),
            "filelists",
            &dump::filelists_header(count),
            packages.iter().map(|p| p.filelists.as_str()),
            dump::FILELISTS_FOOTER,
        )?);
        repomd.records.push(self.write_metadata(
            scratch.path(),
            "other",
            &dump::other_header(count),
            packages.iter().map(|p| p.other.as_str()),
            dump::OTHER_FOOTER,
        )?);

        fs::write(scratch.path().join(REPOMD_FILENAME), repomd.to_xml()?)?;

        let repodata = outputdir.join(REPODATA_DIR);
        if repodata.exists() {
            fs::remove_dir_all(&repodata)?;
        }
        // dropping the guard after the rename is a no-op
        fs::rename(scratch.path(), &repodata)?;
        Ok(repodata)
    }

    fn write_metadata<'p>(
        &self,
        dir: &Path,
        name: &str,
        header: &str,
        chunks: impl Iterator<Item = &'p str>,
        footer: &str,
    ) -> Result<RepomdRecord> {
        let format = self.config.compression;
        let file_name = format!("{}.xml{}", name, format.suffix().unwrap_or(""));
        let path = dir.join(&file_name);
        debug!("Writing {}", path.display());

        let mut writer = compression::open_write(&path, format)?
            .with_content_stat(self.config.checksum_type);
        writer.write_all(header.as_bytes())?;
        for chunk in chunks {
            writer.write_all(chunk.as_bytes())?;
        }
        writer.write_all(footer.as_bytes())?;
        let stat = writer.close()?;

        let mut record = RepomdRecord::new(name, format!("{}/{}", REPODATA_DIR, file_name));
        if let (Some(stat), Some(_)) = (stat, format.suffix()) {
            record.set_content_stat(&stat);
        }
        record.fill(&path, self.config.checksum_type)?;
        if self.config.unique_md_filenames {
            record.rename_file(&path)?;
        }
        Ok(record)
    }
}

fn render(location_href: &str, pkg: &Package, reused: bool) -> Result<PackageResult> {
    Ok(PackageResult {
        location_href: location_href.to_string(),
        primary: dump::dump_primary(pkg)?,
        filelists: dump::dump_filelists(pkg)?,
        other: dump::dump_other(pkg)?,
        reused,
    })
}

/// Read the packages of an existing repository, merging its primary,
/// filelists and other metadata by package id
pub fn load_repository<P: AsRef<Path>>(repo_dir: P) -> Result<Vec<Package>> {
    let location = locate_metadata(repo_dir)?;
    let (Some(primary), Some(filelists), Some(other)) =
        (&location.primary, &location.filelists, &location.other)
    else {
        return Err(Error::BadArg(format!(
            "{} does not list primary, filelists and other metadata",
            location.repomd.display()
        )));
    };

    let mut order = Vec::new();
    let mut by_id: HashMap<String, Package> = HashMap::new();
    parse_primary(
        primary,
        |pkg| {
            if let Some(pkg_id) = pkg.pkg_id.clone() {
                order.push(pkg_id.clone());
                by_id.insert(pkg_id, pkg);
            }
            Ok(())
        },
        None,
    )?;

    let mut merge = |pkg: Package| -> Result<()> {
        if let Some(target) = pkg.pkg_id.as_ref().and_then(|id| by_id.get_mut(id)) {
            target.merge_from(pkg);
        }
        Ok(())
    };
    parse_filelists(filelists, &mut merge, None)?;
    parse_other(other, &mut merge, None)?;

    Ok(order
        .into_iter()
        .filter_map(|pkg_id| by_id.remove(&pkg_id))
        .collect())
}
