// src/repository/parsers/primary.rs

//! primary.xml parser

use super::{
    Attributes, MetadataHandler, ParserData, ParserState, StateSwitch, WarningCallback,
    WarningKind, file_type_attr, interrupted, number_attr, parse_file, version_attrs,
};
use crate::error::Result;
use crate::packages::{Dependency, DependencyKind, FileType, Package, PackageFile};
use crate::version::Evr;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Metadata,
    Package,
    Name,
    Arch,
    Version,
    Checksum,
    Summary,
    Description,
    Packager,
    Url,
    Time,
    Size,
    Location,
    Format,
    License,
    Vendor,
    Group,
    Buildhost,
    Sourcerpm,
    HeaderRange,
    Provides,
    ProvidesEntry,
    Conflicts,
    ConflictsEntry,
    Obsoletes,
    ObsoletesEntry,
    Requires,
    RequiresEntry,
    /// Weak dependency lists, not part of the package model
    WeakDeps,
    File,
}

const NUMSTATES: usize = State::File as usize + 1;

impl ParserState for State {
    fn index(self) -> usize {
        self as usize
    }
}

const fn sw(from: State, element: &'static str, to: State, docontent: bool) -> StateSwitch<State> {
    StateSwitch {
        from,
        element,
        to,
        docontent,
    }
}

const SWITCHES: &[StateSwitch<State>] = &[
    sw(State::Start, "metadata", State::Metadata, false),
    sw(State::Metadata, "package", State::Package, false),
    sw(State::Package, "name", State::Name, true),
    sw(State::Package, "arch", State::Arch, true),
    sw(State::Package, "version", State::Version, false),
    sw(State::Package, "checksum", State::Checksum, true),
    sw(State::Package, "summary", State::Summary, true),
    sw(State::Package, "description", State::Description, true),
    sw(State::Package, "packager", State::Packager, true),
    sw(State::Package, "url", State::Url, true),
    sw(State::Package, "time", State::Time, false),
    sw(State::Package, "size", State::Size, false),
    sw(State::Package, "location", State::Location, false),
    sw(State::Package, "format", State::Format, false),
    sw(State::Format, "rpm:license", State::License, true),
    sw(State::Format, "rpm:vendor", State::Vendor, true),
    sw(State::Format, "rpm:group", State::Group, true),
    sw(State::Format, "rpm:buildhost", State::Buildhost, true),
    sw(State::Format, "rpm:sourcerpm", State::Sourcerpm, true),
    sw(State::Format, "rpm:header-range", State::HeaderRange, false),
    sw(State::Format, "rpm:provides", State::Provides, false),
    sw(State::Format, "rpm:conflicts", State::Conflicts, false),
    sw(State::Format, "rpm:obsoletes", State::Obsoletes, false),
    sw(State::Format, "rpm:requires", State::Requires, false),
    sw(State::Format, "rpm:suggests", State::WeakDeps, false),
    sw(State::Format, "rpm:enhances", State::WeakDeps, false),
    sw(State::Format, "rpm:recommends", State::WeakDeps, false),
    sw(State::Format, "rpm:supplements", State::WeakDeps, false),
    sw(State::Format, "file", State::File, true),
    sw(State::Provides, "rpm:entry", State::ProvidesEntry, false),
    sw(State::Conflicts, "rpm:entry", State::ConflictsEntry, false),
    sw(State::Obsoletes, "rpm:entry", State::ObsoletesEntry, false),
    sw(State::Requires, "rpm:entry", State::RequiresEntry, false),
];

struct PrimaryHandler<F> {
    pkgcb: F,
    pkg: Option<Package>,
    file_type: FileType,
}

impl<F: FnMut(Package) -> Result<()>> PrimaryHandler<F> {
    fn dependency<S: ParserState>(
        &mut self,
        pd: &mut ParserData<'_, S>,
        kind: DependencyKind,
        attrs: &Attributes,
    ) {
        let Some(name) = attrs.get("name") else {
            pd.warning(
                WarningKind::MissingAttr,
                &format!("Missing attribute \"name\" of a {} entry", kind),
            );
            return;
        };
        let dependency = Dependency {
            name: name.to_string(),
            flags: attrs.get("flags").map(str::to_string),
            evr: Evr {
                epoch: attrs.get("epoch").map(str::to_string),
                version: attrs.get("ver").map(str::to_string),
                release: attrs.get("rel").map(str::to_string),
            },
            pre: matches!(attrs.get("pre"), Some("1") | Some("true")),
        };
        if let Some(pkg) = self.pkg.as_mut() {
            pkg.dependencies_mut(kind).push(dependency);
        }
    }
}

impl<F: FnMut(Package) -> Result<()>> MetadataHandler for PrimaryHandler<F> {
    type State = State;

    fn start(
        &mut self,
        pd: &mut ParserData<'_, State>,
        state: State,
        attrs: &Attributes,
    ) -> Result<()> {
        match state {
            State::Metadata => {
                if let Some(count) = attrs.get("packages") {
                    debug!("primary.xml announces {} packages", count);
                }
            }
            State::Package => {
                if let Some(kind) = attrs.get("type").filter(|t| *t != "rpm") {
                    pd.warning(
                        WarningKind::UnknownValue,
                        &format!("Unknown package type \"{}\"", kind),
                    );
                }
                self.pkg = Some(Package::new());
            }
            _ => {}
        }

        if pd.has_error() {
            return Ok(());
        }

        match state {
            State::Version => {
                if let Some(pkg) = self.pkg.as_mut() {
                    version_attrs(attrs, pkg);
                }
            }
            State::Checksum => {
                if let Some(pkg) = self.pkg.as_mut() {
                    pkg.checksum_type = attrs.get("type").map(str::to_string);
                }
            }
            State::Time => {
                let file = number_attr(pd, attrs, "file");
                let build = number_attr(pd, attrs, "build");
                if let Some(pkg) = self.pkg.as_mut() {
                    pkg.time_file = file;
                    pkg.time_build = build;
                }
            }
            State::Size => {
                let package = number_attr(pd, attrs, "package");
                let installed = number_attr(pd, attrs, "installed");
                let archive = number_attr(pd, attrs, "archive");
                if let Some(pkg) = self.pkg.as_mut() {
                    pkg.size_package = package;
                    pkg.size_installed = installed;
                    pkg.size_archive = archive;
                }
            }
            State::Location => {
                if let Some(pkg) = self.pkg.as_mut() {
                    pkg.location_href = attrs.get("href").map(str::to_string);
                    pkg.location_base = attrs.get("xml:base").map(str::to_string);
                }
            }
            State::HeaderRange => {
                let start = number_attr(pd, attrs, "start");
                let end = number_attr(pd, attrs, "end");
                if let Some(pkg) = self.pkg.as_mut() {
                    pkg.rpm_header_start = start;
                    pkg.rpm_header_end = end;
                }
            }
            State::ProvidesEntry => self.dependency(pd, DependencyKind::Provides, attrs),
            State::ConflictsEntry => self.dependency(pd, DependencyKind::Conflicts, attrs),
            State::ObsoletesEntry => self.dependency(pd, DependencyKind::Obsoletes, attrs),
            State::RequiresEntry => self.dependency(pd, DependencyKind::Requires, attrs),
            State::File => self.file_type = file_type_attr(pd, attrs),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, pd: &mut ParserData<'_, State>, state: State) -> Result<()> {
        if state == State::Package {
            if let Some(pkg) = self.pkg.take() {
                (self.pkgcb)(pkg).map_err(interrupted)?;
            }
            return Ok(());
        }

        let Some(pkg) = self.pkg.as_mut() else {
            return Ok(());
        };
        let content = || Some(pd.content.clone());

        match state {
            State::Name => pkg.name = content(),
            State::Arch => pkg.arch = content(),
            State::Checksum => pkg.pkg_id = content(),
            State::Summary => pkg.summary = content(),
            State::Description => pkg.description = content(),
            State::Packager => pkg.rpm_packager = content(),
            State::Url => pkg.url = content(),
            State::License => pkg.rpm_license = content(),
            State::Vendor => pkg.rpm_vendor = content(),
            State::Group => pkg.rpm_group = content(),
            State::Buildhost => pkg.rpm_buildhost = content(),
            State::Sourcerpm => pkg.rpm_sourcerpm = content(),
            State::File => pkg
                .files
                .push(PackageFile::from_full_path(&pd.content, self.file_type)),
            _ => {}
        }
        Ok(())
    }
}

/// Stream-parse a primary.xml file
///
/// `pkgcb` receives each package once its element is complete; an error
/// from it interrupts the parse. Files carry only the primary subset.
pub fn parse_primary<P, F>(
    path: P,
    pkgcb: F,
    warningcb: Option<WarningCallback<'_>>,
) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(Package) -> Result<()>,
{
    let mut pd = ParserData::new(NUMSTATES, State::Start, SWITCHES).with_warning_callback(warningcb);
    let mut handler = PrimaryHandler {
        pkgcb,
        pkg: None,
        file_type: FileType::Regular,
    };
    parse_file(path.as_ref(), &mut pd, &mut handler)
}
