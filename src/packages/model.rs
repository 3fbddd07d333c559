// src/packages/model.rs

//! Package metadata shared by the header extractor, the XML writers and the
//! XML parsers

use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of a file entry in the package payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain file; carries no type marker in the metadata
    #[default]
    Regular,
    /// Directory
    Dir,
    /// Listed in the header but not shipped in the payload
    Ghost,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Regular => "",
            FileType::Dir => "dir",
            FileType::Ghost => "ghost",
        }
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "file" => Ok(FileType::Regular),
            "dir" => Ok(FileType::Dir),
            "ghost" => Ok(FileType::Ghost),
            _ => Err(format!("Unknown file type: {}", s)),
        }
    }
}

/// A file within a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    /// Basename
    pub name: String,
    /// Directory including the trailing slash; shared by all files of the
    /// same directory
    pub path: Arc<str>,
    pub file_type: FileType,
}

impl PackageFile {
    /// Directory and basename joined
    pub fn full_path(&self) -> String {
        format!("{}{}", self.path, self.name)
    }

    /// Split a full path at its last `/`
    pub fn from_full_path(full_path: &str, file_type: FileType) -> Self {
        let (dir, name) = match full_path.rfind('/') {
            Some(slash) => full_path.split_at(slash + 1),
            None => ("", full_path),
        };
        Self {
            name: name.to_string(),
            path: Arc::from(dir),
            file_type,
        }
    }
}

/// Relation category of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Provides,
    Conflicts,
    Obsoletes,
    Requires,
}

impl DependencyKind {
    /// Processing order; requires must come after provides
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::Provides,
        DependencyKind::Conflicts,
        DependencyKind::Obsoletes,
        DependencyKind::Requires,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Provides => "provides",
            DependencyKind::Conflicts => "conflicts",
            DependencyKind::Obsoletes => "obsoletes",
            DependencyKind::Requires => "requires",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provides/conflicts/obsoletes/requires entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Comparison operator: "EQ", "LT", "GT", "LE" or "GE"
    pub flags: Option<String>,
    #[serde(flatten)]
    pub evr: Evr,
    /// Needed by the %pre/%post scriptlets, not only at install time
    pub pre: bool,
}

impl Dependency {
    /// Create a dependency without version constraint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a versioned dependency from the raw `E:V-R` string
    pub fn versioned(name: impl Into<String>, flags: &str, evr: &str) -> Self {
        Self {
            name: name.into(),
            flags: Some(flags.to_string()),
            evr: Evr::parse(evr),
            pre: false,
        }
    }
}

/// One changelog entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub author: String,
    /// Seconds since the epoch
    pub date: i64,
    pub changelog: String,
}

/// All metadata of one RPM as published in repodata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Checksum of the package file, doubling as its id
    pub pkg_id: Option<String>,
    pub name: Option<String>,
    pub arch: Option<String>,
    pub version: Option<String>,
    pub epoch: Option<String>,
    pub release: Option<String>,
    pub vcs: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub time_file: i64,
    pub time_build: i64,
    pub rpm_license: Option<String>,
    pub rpm_vendor: Option<String>,
    pub rpm_group: Option<String>,
    pub rpm_buildhost: Option<String>,
    pub rpm_sourcerpm: Option<String>,
    pub rpm_header_start: i64,
    pub rpm_header_end: i64,
    pub rpm_packager: Option<String>,
    pub size_package: i64,
    pub size_installed: i64,
    pub size_archive: i64,
    pub location_href: Option<String>,
    pub location_base: Option<String>,
    pub checksum_type: Option<String>,

    pub files: Vec<PackageFile>,
    pub provides: Vec<Dependency>,
    pub conflicts: Vec<Dependency>,
    pub obsoletes: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub changelogs: Vec<ChangelogEntry>,
}

impl Package {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dependencies(&self, kind: DependencyKind) -> &[Dependency] {
        match kind {
            DependencyKind::Provides => &self.provides,
            DependencyKind::Conflicts => &self.conflicts,
            DependencyKind::Obsoletes => &self.obsoletes,
            DependencyKind::Requires => &self.requires,
        }
    }

    pub fn dependencies_mut(&mut self, kind: DependencyKind) -> &mut Vec<Dependency> {
        match kind {
            DependencyKind::Provides => &mut self.provides,
            DependencyKind::Conflicts => &mut self.conflicts,
            DependencyKind::Obsoletes => &mut self.obsoletes,
            DependencyKind::Requires => &mut self.requires,
        }
    }

    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> String {
        let evr = Evr {
            epoch: self.epoch.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
        };
        format!(
            "{}-{}.{}",
            self.name.as_deref().unwrap_or(""),
            evr,
            self.arch.as_deref().unwrap_or("")
        )
    }

    /// Move the parts carried by filelists.xml and other.xml of `other` into
    /// this package
    pub fn merge_from(&mut self, other: Package) {
        if !other.files.is_empty() {
            self.files = other.files;
        }
        if !other.changelogs.is_empty() {
            self.changelogs = other.changelogs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_strings() {
        assert_eq!(FileType::Regular.as_str(), "");
        assert_eq!(FileType::Dir.as_str(), "dir");
        assert_eq!(FileType::Ghost.as_str(), "ghost");
        assert_eq!("dir".parse::<FileType>().unwrap(), FileType::Dir);
        assert_eq!("".parse::<FileType>().unwrap(), FileType::Regular);
        assert!("socket".parse::<FileType>().is_err());
    }

    #[test]
    fn test_package_file_paths() {
        let file = PackageFile::from_full_path("/usr/bin/bash", FileType::Regular);
        assert_eq!(&*file.path, "/usr/bin/");
        assert_eq!(file.name, "bash");
        assert_eq!(file.full_path(), "/usr/bin/bash");

        let bare = PackageFile::from_full_path("README", FileType::Regular);
        assert_eq!(&*bare.path, "");
        assert_eq!(bare.full_path(), "README");
    }

    #[test]
    fn test_dependency_versioned() {
        let dep = Dependency::versioned("glibc", "GE", "2.34-1");
        assert_eq!(dep.flags.as_deref(), Some("GE"));
        assert_eq!(dep.evr.epoch.as_deref(), Some("0"));
        assert_eq!(dep.evr.version.as_deref(), Some("2.34"));
        assert_eq!(dep.evr.release.as_deref(), Some("1"));
        assert!(!dep.pre);
    }

    #[test]
    fn test_dependencies_by_kind() {
        let mut pkg = Package::new();
        pkg.dependencies_mut(DependencyKind::Obsoletes)
            .push(Dependency::new("old-name"));
        assert_eq!(pkg.obsoletes.len(), 1);
        assert!(pkg.dependencies(DependencyKind::Requires).is_empty());
    }

    #[test]
    fn test_nevra() {
        let pkg = Package {
            name: Some("bash".to_string()),
            epoch: Some("0".to_string()),
            version: Some("5.2.15".to_string()),
            release: Some("1.fc38".to_string()),
            arch: Some("x86_64".to_string()),
            ..Package::default()
        };
        assert_eq!(pkg.nevra(), "bash-5.2.15-1.fc38.x86_64");
    }
}
