// src/packages/rpm.rs

//! RPM header to package metadata extraction
//!
//! Turns the main header of a package into a [`Package`]: scalar tags, the
//! file list, the provides/conflicts/obsoletes/requires lists (with the
//! requires clean-up rpm repositories expect) and the changelog.

use crate::checksum::{self, ChecksumType};
use crate::error::{Error, Result};
use crate::packages::compare::{DependencyOrdering, compare_dependency};
use crate::packages::header::{Header, HeaderRange, TagValues, read_package_header};
use crate::packages::model::{
    ChangelogEntry, Dependency, DependencyKind, FileType, Package, PackageFile,
};
use crate::repository::dump;
use crate::version::Evr;
use rpm::{DependencyFlags, FileFlags, IndexTag};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::debug;

const S_IFMT: u64 = 0o170000;
const S_IFDIR: u64 = 0o040000;

/// Where a header came from: file facts and repository placement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOrigin {
    /// Modification time of the package file
    pub mtime: i64,
    /// Size of the package file in bytes
    pub size: i64,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
    pub location_href: Option<String>,
    pub location_base: Option<String>,
    pub header_range: HeaderRange,
}

/// The three XML fragments of one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlChunks {
    pub primary: String,
    pub filelists: String,
    pub other: String,
}

/// Modification time and size of a file, as recorded in metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime: i64,
    pub size: i64,
}

impl FileStat {
    pub fn of<P: AsRef<Path>>(path: P) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Self {
            mtime,
            size: metadata.len() as i64,
        })
    }
}

/// Map the comparison bits of dependency flags to their metadata name
///
/// Only the low four bits count; combinations other than the five
/// operators yield `None`.
pub fn flag_to_str(flags: u64) -> Option<&'static str> {
    match flags & 0xf {
        2 => Some("LT"),
        4 => Some("GT"),
        8 => Some("EQ"),
        10 => Some("LE"),
        12 => Some("GE"),
        _ => None,
    }
}

/// Whether a path belongs in primary.xml rather than only in filelists.xml
pub fn is_primary(path: &str) -> bool {
    path.starts_with("/etc/") || path == "/usr/lib/sendmail" || path.contains("bin/")
}

/// Header tags holding names, flags and versions of a dependency kind
fn dependency_tags(kind: DependencyKind) -> (IndexTag, IndexTag, IndexTag) {
    match kind {
        DependencyKind::Provides => (
            IndexTag::RPMTAG_PROVIDENAME,
            IndexTag::RPMTAG_PROVIDEFLAGS,
            IndexTag::RPMTAG_PROVIDEVERSION,
        ),
        DependencyKind::Conflicts => (
            IndexTag::RPMTAG_CONFLICTNAME,
            IndexTag::RPMTAG_CONFLICTFLAGS,
            IndexTag::RPMTAG_CONFLICTVERSION,
        ),
        DependencyKind::Obsoletes => (
            IndexTag::RPMTAG_OBSOLETENAME,
            IndexTag::RPMTAG_OBSOLETEFLAGS,
            IndexTag::RPMTAG_OBSOLETEVERSION,
        ),
        DependencyKind::Requires => (
            IndexTag::RPMTAG_REQUIRENAME,
            IndexTag::RPMTAG_REQUIREFLAGS,
            IndexTag::RPMTAG_REQUIREVERSION,
        ),
    }
}

/// Extract the metadata of one package from its main header
///
/// Missing tags leave the corresponding fields empty; malformed but present
/// data never fails the extraction.
pub fn package_from_header(
    header: &Header,
    origin: &PackageOrigin,
    changelog_limit: usize,
) -> Result<Package> {
    let string = |tag: IndexTag| header.string(tag).map(str::to_string);
    let number = |tag: IndexTag| header.number(tag).unwrap_or(0) as i64;

    let arch = if number(IndexTag::RPMTAG_SOURCEPACKAGE) != 0 {
        Some("src".to_string())
    } else {
        string(IndexTag::RPMTAG_ARCH)
    };

    let size_installed = header
        .number(IndexTag::RPMTAG_LONGSIZE)
        .or_else(|| header.number(IndexTag::RPMTAG_SIZE))
        .unwrap_or(0) as i64;

    let mut pkg = Package {
        pkg_id: origin.checksum.clone(),
        name: string(IndexTag::RPMTAG_NAME),
        arch,
        version: string(IndexTag::RPMTAG_VERSION),
        epoch: Some(header.number(IndexTag::RPMTAG_EPOCH).unwrap_or(0).to_string()),
        release: string(IndexTag::RPMTAG_RELEASE),
        vcs: string(IndexTag::RPMTAG_VCS),
        summary: string(IndexTag::RPMTAG_SUMMARY),
        description: string(IndexTag::RPMTAG_DESCRIPTION),
        url: string(IndexTag::RPMTAG_URL),
        time_file: origin.mtime,
        time_build: number(IndexTag::RPMTAG_BUILDTIME),
        rpm_license: string(IndexTag::RPMTAG_LICENSE),
        rpm_vendor: string(IndexTag::RPMTAG_VENDOR),
        rpm_group: string(IndexTag::RPMTAG_GROUP),
        rpm_buildhost: string(IndexTag::RPMTAG_BUILDHOST),
        rpm_sourcerpm: string(IndexTag::RPMTAG_SOURCERPM),
        rpm_header_start: origin.header_range.start as i64,
        rpm_header_end: origin.header_range.end as i64,
        rpm_packager: string(IndexTag::RPMTAG_PACKAGER),
        size_package: origin.size,
        size_installed,
        size_archive: number(IndexTag::RPMTAG_ARCHIVESIZE),
        location_href: origin.location_href.clone(),
        location_base: origin.location_base.clone(),
        checksum_type: origin.checksum_type.clone(),
        ..Package::default()
    };

    let filenames = extract_files(header, &mut pkg);
    extract_dependencies(header, &filenames, &mut pkg);
    extract_changelogs(header, changelog_limit, &mut pkg);

    debug!(
        "Extracted {}: {} files, {} provides, {} requires, {} changelogs",
        pkg.nevra(),
        pkg.files.len(),
        pkg.provides.len(),
        pkg.requires.len(),
        pkg.changelogs.len()
    );

    Ok(pkg)
}

/// Fill `pkg.files` and return the set of full file names
fn extract_files(header: &Header, pkg: &mut Package) -> HashSet<String> {
    let mut filenames = HashSet::new();

    // One shared string per directory
    let dirs: Vec<Arc<str>> = header
        .strings(IndexTag::RPMTAG_DIRNAMES)
        .unwrap_or_default()
        .iter()
        .map(|d| Arc::from(d.as_str()))
        .collect();
    let no_dir: Arc<str> = Arc::from("");

    let (Some(basenames), Some(indexes), Some(flags), Some(modes)) = (
        header.strings(IndexTag::RPMTAG_BASENAMES),
        header.numbers(IndexTag::RPMTAG_DIRINDEXES),
        header.numbers(IndexTag::RPMTAG_FILEFLAGS),
        header.numbers(IndexTag::RPMTAG_FILEMODES),
    ) else {
        return filenames;
    };

    for (((name, &index), &flag), &mode) in basenames.iter().zip(&indexes).zip(&flags).zip(&modes)
    {
        let path = dirs
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| no_dir.clone());

        let file_type = if mode & S_IFMT == S_IFDIR {
            FileType::Dir
        } else if FileFlags::from_bits_retain(flag as u32).contains(FileFlags::GHOST) {
            FileType::Ghost
        } else {
            FileType::Regular
        };

        filenames.insert(format!("{}{}", path, name));
        pkg.files.push(PackageFile {
            name: name.clone(),
            path,
            file_type,
        });
    }

    filenames
}

/// Fill provides, conflicts, obsoletes and requires
fn extract_dependencies(header: &Header, filenames: &HashSet<String>, pkg: &mut Package) {
    let pre_mask =
        DependencyFlags::PREREQ | DependencyFlags::SCRIPT_PRE | DependencyFlags::SCRIPT_POST;

    let mut provided: HashSet<&str> = HashSet::new();
    // Last queued require per name: (flags, raw version, pre)
    let mut queued: HashMap<&str, (Option<&str>, &str, bool)> = HashMap::new();

    for kind in DependencyKind::ALL {
        let (name_tag, flags_tag, version_tag) = dependency_tags(kind);
        let (Some(names), Some(flags), Some(versions)) = (
            header.strings(name_tag),
            header.numbers(flags_tag),
            header.strings(version_tag),
        ) else {
            continue;
        };

        let mut libc_highest: Option<Dependency> = None;

        for ((name, &raw_flags), full_version) in names.iter().zip(&flags).zip(versions) {
            let name = name.as_str();
            let flag = flag_to_str(raw_flags);
            let mut pre = false;

            if kind == DependencyKind::Requires {
                if name.starts_with("rpmlib(") {
                    continue;
                }
                if filenames.contains(name) && !is_primary(name) {
                    continue;
                }
                if provided.contains(name) {
                    continue;
                }

                pre = DependencyFlags::from_bits_retain(raw_flags as u32).intersects(pre_mask);

                if let Some(&(queued_flag, queued_version, queued_pre)) = queued.get(name) {
                    if queued_flag == flag
                        && queued_version == full_version.as_str()
                        && queued_pre == pre
                    {
                        continue;
                    }
                }
            }

            let dependency = Dependency {
                name: name.to_string(),
                flags: flag.map(str::to_string),
                evr: Evr::parse(full_version),
                pre,
            };

            match kind {
                DependencyKind::Provides => {
                    provided.insert(name);
                    pkg.provides.push(dependency);
                }
                DependencyKind::Requires if name.starts_with("libc.so.6") => {
                    let replace = match &libc_highest {
                        None => true,
                        Some(current) => {
                            compare_dependency(&current.name, name) == DependencyOrdering::SecondWins
                        }
                    };
                    if replace {
                        libc_highest = Some(dependency);
                    }
                }
                DependencyKind::Requires => {
                    pkg.requires.push(dependency);
                    queued.insert(name, (flag, full_version.as_str(), pre));
                }
                _ => pkg.dependencies_mut(kind).push(dependency),
            }
        }

        if let Some(libc) = libc_highest {
            pkg.requires.push(libc);
        }
    }
}

/// Fill `pkg.changelogs`, newest header entry first
fn extract_changelogs(header: &Header, limit: usize, pkg: &mut Package) {
    let (Some(times), Some(authors), Some(texts)) = (
        header.numbers(IndexTag::RPMTAG_CHANGELOGTIME),
        header.strings(IndexTag::RPMTAG_CHANGELOGNAME),
        header.strings(IndexTag::RPMTAG_CHANGELOGTEXT),
    ) else {
        return;
    };

    let mut entries: Vec<ChangelogEntry> = Vec::with_capacity(limit.min(times.len()));
    let mut last_time = 0i64;

    for ((&time, author), text) in times.iter().zip(authors).zip(texts).take(limit) {
        let time = time as i64;
        entries.push(ChangelogEntry {
            author: trim_author(author),
            date: time,
            changelog: text.clone(),
        });

        // Equal timestamps: bump the chain of earlier entries sharing them
        if time == last_time {
            let mut bumped = time;
            for previous in entries.iter_mut().rev().skip(1) {
                if previous.date != bumped {
                    break;
                }
                previous.date += 1;
                bumped += 1;
            }
        } else {
            last_time = time;
        }
    }

    entries.reverse();
    pkg.changelogs = entries;
}

/// Strip trailing spaces, never touching the first character
fn trim_author(author: &str) -> String {
    let first = author.chars().next().map_or(0, char::len_utf8);
    let (head, rest) = author.split_at(first);
    format!("{}{}", head, rest.trim_end_matches(' '))
}

/// Extract a package and render its primary, filelists and other fragments
pub fn xml_from_header(
    header: &Header,
    origin: &PackageOrigin,
    changelog_limit: usize,
) -> Result<XmlChunks> {
    let pkg = package_from_header(header, origin, changelog_limit)?;
    Ok(XmlChunks {
        primary: dump::dump_primary(&pkg)?,
        filelists: dump::dump_filelists(&pkg)?,
        other: dump::dump_other(&pkg)?,
    })
}

/// Read a package file from disk and extract its metadata
///
/// Stats the file, locates and decodes its main header and computes the
/// package checksum used as package id.
pub fn read_package<P: AsRef<Path>>(
    path: P,
    location_href: &str,
    location_base: Option<&str>,
    checksum_type: ChecksumType,
    changelog_limit: usize,
) -> Result<Package> {
    let path = path.as_ref();
    debug!("Reading package: {}", path.display());

    let stat = FileStat::of(path)?;
    let (header, header_range) = read_package_header(path)
        .map_err(|e| e.prefixed(&format!("{}: ", path.display())))?;
    let checksum = checksum::file_checksum(path, checksum_type)?;

    let origin = PackageOrigin {
        mtime: stat.mtime,
        size: stat.size,
        checksum: Some(checksum),
        checksum_type: Some(checksum_type.to_string()),
        location_href: Some(location_href.to_string()),
        location_base: location_base.map(str::to_string),
        header_range,
    };

    package_from_header(&header, &origin, changelog_limit).map_err(|e| match e {
        Error::Header(msg) => Error::Header(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::rpm::{FileMode, FileOptions, PackageBuilder};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn builder() -> PackageBuilder {
        PackageBuilder::new("foo", "1.0", "MIT", "x86_64", "Foo tool").source_date(1_700_000_000u32)
    }

    fn header_of(builder: PackageBuilder) -> Header {
        builder.build().unwrap().metadata.header
    }

    fn dep(name: &str, flags: DependencyFlags, version: &str) -> ::rpm::Dependency {
        ::rpm::Dependency {
            name: name.to_string(),
            flags,
            version: version.to_string(),
        }
    }

    fn with_requires(requires: Vec<::rpm::Dependency>) -> Header {
        let mut builder = builder()
            .with_file_contents(
                "#!/bin/sh\n",
                FileOptions::new("/usr/bin/foo").mode(FileMode::regular(0o755)),
            )
            .unwrap()
            .with_file_contents("data", FileOptions::new("/usr/share/foo/data"))
            .unwrap();
        for require in requires {
            builder = builder.requires(require);
        }
        header_of(builder)
    }

    fn extract(header: &Header) -> Package {
        package_from_header(header, &PackageOrigin::default(), 10).unwrap()
    }

    fn require_names(pkg: &Package) -> Vec<&str> {
        pkg.requires.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_flag_to_str() {
        assert_eq!(flag_to_str(0), None);
        assert_eq!(flag_to_str(2), Some("LT"));
        assert_eq!(flag_to_str(4), Some("GT"));
        assert_eq!(flag_to_str(8), Some("EQ"));
        assert_eq!(flag_to_str(10), Some("LE"));
        assert_eq!(flag_to_str(12), Some("GE"));
        assert_eq!(flag_to_str(6), None);
        // only the comparison bits count
        let prereq_ge = (DependencyFlags::PREREQ | DependencyFlags::GE).bits();
        assert_eq!(flag_to_str(u64::from(prereq_ge)), Some("GE"));
    }

    #[test]
    fn test_is_primary() {
        assert!(is_primary("/etc/foo.conf"));
        assert!(is_primary("/usr/bin/foo"));
        assert!(is_primary("/usr/sbin/foo"));
        assert!(is_primary("/usr/lib/sendmail"));
        assert!(!is_primary("/usr/share/foo/data"));
        assert!(!is_primary("/etc"));
    }

    #[test]
    fn test_scalars_and_origin() {
        let origin = PackageOrigin {
            mtime: 1234,
            size: 5678,
            checksum: Some("abc".to_string()),
            checksum_type: Some("sha256".to_string()),
            location_href: Some("Packages/foo-1.0-1.x86_64.rpm".to_string()),
            location_base: None,
            header_range: HeaderRange { start: 280, end: 1697 },
        };
        let header = header_of(
            builder()
                .with_file_contents(vec![0u8; 4096], FileOptions::new("/usr/share/foo/blob"))
                .unwrap(),
        );
        let pkg = package_from_header(&header, &origin, 10).unwrap();

        assert_eq!(pkg.pkg_id.as_deref(), Some("abc"));
        assert_eq!(pkg.name.as_deref(), Some("foo"));
        assert_eq!(pkg.arch.as_deref(), Some("x86_64"));
        assert_eq!(pkg.version.as_deref(), Some("1.0"));
        assert_eq!(pkg.release.as_deref(), Some("1"));
        assert_eq!(pkg.epoch.as_deref(), Some("0"));
        assert_eq!(pkg.summary.as_deref(), Some("Foo tool"));
        assert_eq!(pkg.rpm_license.as_deref(), Some("MIT"));
        assert_eq!(pkg.url, None);
        assert_eq!(pkg.time_file, 1234);
        assert_eq!(pkg.time_build, 1_700_000_000);
        assert_eq!(pkg.size_package, 5678);
        assert_eq!(pkg.size_installed, 4096);
        assert_eq!(pkg.size_archive, 0);
        assert_eq!(pkg.rpm_header_start, 280);
        assert_eq!(pkg.rpm_header_end, 1697);
        assert_eq!(pkg.checksum_type.as_deref(), Some("sha256"));
    }

    #[test]
    fn test_epoch_and_url() {
        let header = header_of(builder().epoch(3).url("https://foo.example.com/"));
        let pkg = extract(&header);
        assert_eq!(pkg.epoch.as_deref(), Some("3"));
        assert_eq!(pkg.url.as_deref(), Some("https://foo.example.com/"));
        assert_eq!(pkg.arch.as_deref(), Some("x86_64"));
    }

    #[test]
    fn test_files_and_types() {
        let header = header_of(
            builder()
                .with_file_contents("a=1\n", FileOptions::new("/etc/foo.conf"))
                .unwrap()
                .with_file_contents("", FileOptions::new("/etc/foo.d").mode(FileMode::dir(0o755)))
                .unwrap()
                .with_file_contents("", FileOptions::new("/etc/foo.d/a.conf"))
                .unwrap()
                .with_file_contents("", FileOptions::new("/var/log/foo.log").is_ghost())
                .unwrap(),
        );
        let pkg = extract(&header);

        let listed: Vec<(String, FileType)> =
            pkg.files.iter().map(|f| (f.full_path(), f.file_type)).collect();
        assert_eq!(
            listed,
            vec![
                ("/etc/foo.conf".to_string(), FileType::Regular),
                ("/etc/foo.d".to_string(), FileType::Dir),
                ("/etc/foo.d/a.conf".to_string(), FileType::Regular),
                ("/var/log/foo.log".to_string(), FileType::Ghost),
            ]
        );

        // one shared string per directory
        assert!(Arc::ptr_eq(&pkg.files[0].path, &pkg.files[1].path));
        assert!(!Arc::ptr_eq(&pkg.files[1].path, &pkg.files[2].path));
    }

    #[test]
    fn test_no_files() {
        let pkg = extract(&header_of(builder()));
        assert!(pkg.files.is_empty());
        assert_eq!(pkg.size_installed, 0);
    }

    #[test]
    fn test_requires_filtering() {
        let header = with_requires(vec![
            ::rpm::Dependency::rpmlib("CompressedFileNames", "3.0.4-1"),
            dep("foo", DependencyFlags::EQUAL, "1.0"),
            dep("/usr/bin/foo", DependencyFlags::ANY, ""),
            dep("/usr/share/foo/data", DependencyFlags::ANY, ""),
            dep("bar", DependencyFlags::GE, "2.0"),
            dep("bar", DependencyFlags::GE, "2.0"),
            dep("bar", DependencyFlags::GE | DependencyFlags::PREREQ, "2.0"),
            dep("/bin/sh", DependencyFlags::PREREQ, ""),
        ]);
        let pkg = extract(&header);

        assert_eq!(
            require_names(&pkg),
            vec!["/usr/bin/foo", "bar", "bar", "/bin/sh"]
        );
        assert!(!pkg.requires[1].pre);
        assert!(pkg.requires[2].pre);
        assert!(pkg.requires[3].pre);
        assert_eq!(pkg.requires[1].flags.as_deref(), Some("GE"));
        assert_eq!(pkg.requires[1].evr.version.as_deref(), Some("2.0"));

        for req in &pkg.requires {
            assert!(!req.name.starts_with("rpmlib("));
            assert!(pkg.provides.iter().all(|p| p.name != req.name));
        }
    }

    #[test]
    fn test_duplicate_require_checks_last_entry_only() {
        let header = with_requires(vec![
            dep("A", DependencyFlags::GE, "1"),
            dep("A", DependencyFlags::GE, "2"),
            dep("A", DependencyFlags::GE, "1"),
        ]);
        let pkg = extract(&header);

        assert_eq!(require_names(&pkg), vec!["A", "A", "A"]);
        let versions: Vec<Option<&str>> = pkg
            .requires
            .iter()
            .map(|d| d.evr.version.as_deref())
            .collect();
        assert_eq!(versions, vec![Some("1"), Some("2"), Some("1")]);
    }

    #[test]
    fn test_requires_scriptlet_flags_set_pre() {
        let header = with_requires(vec![::rpm::Dependency::script_post("coreutils")]);
        let pkg = extract(&header);
        assert_eq!(require_names(&pkg), vec!["coreutils"]);
        assert!(pkg.requires[0].pre);
        assert_eq!(pkg.requires[0].flags, None);
        assert_eq!(pkg.requires[0].evr, Evr::default());
    }

    #[test]
    fn test_provides_from_header() {
        let pkg = extract(&header_of(builder()));
        let provides: Vec<(&str, Option<&str>)> = pkg
            .provides
            .iter()
            .map(|d| (d.name.as_str(), d.flags.as_deref()))
            .collect();
        assert_eq!(provides, vec![("foo", Some("EQ")), ("foo(x86_64)", Some("EQ"))]);
        assert_eq!(pkg.provides[0].evr.version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_single_libc_require_survives() {
        let header = with_requires(vec![
            dep("libc.so.6()(64bit)", DependencyFlags::ANY, ""),
            dep("libm.so.6()(64bit)", DependencyFlags::ANY, ""),
            dep("libc.so.6(GLIBC_2.34)(64bit)", DependencyFlags::ANY, ""),
            dep("libc.so.6(GLIBC_2.4)(64bit)", DependencyFlags::ANY, ""),
            dep("libc.so.6(GLIBC_2.3.4)(64bit)", DependencyFlags::ANY, ""),
        ]);
        let pkg = extract(&header);

        assert_eq!(
            require_names(&pkg),
            vec!["libm.so.6()(64bit)", "libc.so.6(GLIBC_2.34)(64bit)"]
        );
    }

    #[test]
    fn test_libc_tie_keeps_first() {
        let header = with_requires(vec![
            dep("libc.so.6(GLIBC_2.4", DependencyFlags::ANY, ""),
            dep("libc.so.6(GLIBC_2.5", DependencyFlags::ANY, ""),
        ]);
        let pkg = extract(&header);
        assert_eq!(require_names(&pkg), vec!["libc.so.6(GLIBC_2.4"]);
    }

    #[test]
    fn test_changelog_order_and_bump() {
        let header = header_of(
            builder()
                .add_changelog_entry("Jane Doe <jane@example.com> - 1.0-1  ", "- new", 1000u32)
                .add_changelog_entry(" ", "- newer", 1000u32)
                .add_changelog_entry("Old Timer", "- old", 900u32),
        );
        let pkg = extract(&header);

        let dates: Vec<i64> = pkg.changelogs.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![900, 1000, 1001]);
        assert_eq!(pkg.changelogs[2].author, "Jane Doe <jane@example.com> - 1.0-1");
        assert_eq!(pkg.changelogs[1].author, " ");
        assert_eq!(pkg.changelogs[0].changelog, "- old");
    }

    #[test]
    fn test_changelog_two_equal_times() {
        let header = header_of(
            builder()
                .add_changelog_entry("a", "x", 1000u32)
                .add_changelog_entry("b", "y", 1000u32),
        );
        let dates: Vec<i64> = extract(&header).changelogs.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![1000, 1001]);
    }

    #[test]
    fn test_changelog_chain_unique_and_limited() {
        let mut builder = builder();
        for (author, time) in [("a", 1000u32), ("b", 1000), ("c", 1000), ("d", 1000), ("e", 500)] {
            builder = builder.add_changelog_entry(author, "- entry", time);
        }
        let header = header_of(builder);

        let pkg = package_from_header(&header, &PackageOrigin::default(), 3).unwrap();
        let mut dates: Vec<i64> = pkg.changelogs.iter().map(|c| c.date).collect();
        assert_eq!(dates.len(), 3);
        dates.sort_unstable();
        dates.dedup();
        assert_eq!(dates.len(), 3);

        let none = package_from_header(&header, &PackageOrigin::default(), 0).unwrap();
        assert!(none.changelogs.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let header = with_requires(vec![
            dep("bar", DependencyFlags::ANY, ""),
            dep("libc.so.6", DependencyFlags::ANY, ""),
        ]);
        assert_eq!(extract(&header), extract(&header));
    }

    #[test]
    fn test_xml_from_header() {
        let header = with_requires(vec![dep("bar", DependencyFlags::ANY, "")]);
        let chunks = xml_from_header(&header, &PackageOrigin::default(), 10).unwrap();
        assert!(chunks.primary.contains("<name>foo</name>"));
        assert!(chunks.filelists.contains("<file>/usr/share/foo/data</file>"));
        assert!(chunks.other.starts_with("<package"));
    }

    #[test]
    fn test_read_package_from_file() {
        let pkg = builder()
            .with_file_contents("#!/bin/sh\n", FileOptions::new("/usr/bin/foo"))
            .unwrap()
            .requires(dep("bar", DependencyFlags::ANY, ""))
            .build()
            .unwrap();
        let mut file = NamedTempFile::new().unwrap();
        pkg.write(&mut file).unwrap();
        file.flush().unwrap();

        let read = read_package(
            file.path(),
            "foo-1.0-1.x86_64.rpm",
            Some("http://mirror.example.com/"),
            ChecksumType::Sha256,
            10,
        )
        .unwrap();

        let offsets = pkg.metadata.get_package_segment_offsets();
        let expected = checksum::file_checksum(file.path(), ChecksumType::Sha256).unwrap();
        assert_eq!(read.pkg_id.as_deref(), Some(expected.as_str()));
        assert_eq!(read.rpm_header_start, offsets.header as i64);
        assert_eq!(read.rpm_header_end, offsets.payload as i64);
        assert_eq!(read.size_package, file.as_file().metadata().unwrap().len() as i64);
        assert_eq!(require_names(&read), vec!["bar"]);
        assert_eq!(read.location_href.as_deref(), Some("foo-1.0-1.x86_64.rpm"));
        assert_eq!(read.location_base.as_deref(), Some("http://mirror.example.com/"));
    }

    #[test]
    fn test_read_package_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not an rpm").unwrap();
        file.flush().unwrap();

        let err = read_package(file.path(), "x.rpm", None, ChecksumType::Sha256, 10).unwrap_err();
        assert!(matches!(&err, Error::Header(_)));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
