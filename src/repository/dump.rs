// src/repository/dump.rs

//! Rendering of packages as primary, filelists and other XML
//!
//! Each `dump_*` function renders one `<package>` element. Whole documents
//! are the matching header, the package chunks in order and the footer.

use crate::error::{Error, Result};
use crate::packages::model::{Dependency, Package, PackageFile};
use crate::packages::rpm::is_primary;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

pub const XML_NS_COMMON: &str = "http://linux.duke.edu/metadata/common";
pub const XML_NS_RPM: &str = "http://linux.duke.edu/metadata/rpm";
pub const XML_NS_FILELISTS: &str = "http://linux.duke.edu/metadata/filelists";
pub const XML_NS_OTHER: &str = "http://linux.duke.edu/metadata/other";

pub(crate) const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

pub fn primary_header(packages: usize) -> String {
    format!(
        "{XML_DECL}<metadata xmlns=\"{XML_NS_COMMON}\" xmlns:rpm=\"{XML_NS_RPM}\" packages=\"{packages}\">\n"
    )
}

pub fn filelists_header(packages: usize) -> String {
    format!("{XML_DECL}<filelists xmlns=\"{XML_NS_FILELISTS}\" packages=\"{packages}\">\n")
}

pub fn other_header(packages: usize) -> String {
    format!("{XML_DECL}<otherdata xmlns=\"{XML_NS_OTHER}\" packages=\"{packages}\">\n")
}

pub const PRIMARY_FOOTER: &str = "</metadata>\n";
pub const FILELISTS_FOOTER: &str = "</filelists>\n";
pub const OTHER_FOOTER: &str = "</otherdata>\n";

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn new_writer() -> Writer<Vec<u8>> {
    Writer::new_with_indent(Vec::new(), b' ', 2)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| Error::BadArg(format!("rendered XML is not UTF-8: {}", e)))?;
    out.push('\n');
    Ok(out)
}

/// `<version epoch=".." ver=".." rel=".."/>`
fn write_version(writer: &mut Writer<Vec<u8>>, pkg: &Package) -> Result<()> {
    writer
        .create_element("version")
        .with_attribute(("epoch", text(&pkg.epoch)))
        .with_attribute(("ver", text(&pkg.version)))
        .with_attribute(("rel", text(&pkg.release)))
        .write_empty()?;
    Ok(())
}

fn write_file(writer: &mut Writer<Vec<u8>>, file: &PackageFile, full_path: &str) -> Result<()> {
    let element = writer.create_element("file");
    let element = match file.file_type.as_str() {
        "" => element,
        file_type => element.with_attribute(("type", file_type)),
    };
    element.write_text_content(BytesText::new(full_path))?;
    Ok(())
}

/// `<rpm:provides>` and friends; nothing at all for an empty list
fn write_dependencies(
    writer: &mut Writer<Vec<u8>>,
    section: &str,
    dependencies: &[Dependency],
) -> Result<()> {
    if dependencies.is_empty() {
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(section)))?;
    for dep in dependencies {
        let mut entry = BytesStart::new("rpm:entry");
        entry.push_attribute(("name", dep.name.as_str()));
        if let Some(flags) = &dep.flags {
            entry.push_attribute(("flags", flags.as_str()));
        }
        if let Some(epoch) = &dep.evr.epoch {
            entry.push_attribute(("epoch", epoch.as_str()));
        }
        if let Some(version) = &dep.evr.version {
            entry.push_attribute(("ver", version.as_str()));
        }
        if let Some(release) = &dep.evr.release {
            entry.push_attribute(("rel", release.as_str()));
        }
        if dep.pre {
            entry.push_attribute(("pre", "1"));
        }
        writer.write_event(Event::Empty(entry))?;
    }
    writer.write_event(Event::End(BytesEnd::new(section)))?;
    Ok(())
}

/// Render the primary.xml element of a package
pub fn dump_primary(pkg: &Package) -> Result<String> {
    let mut writer = new_writer();

    let mut package = BytesStart::new("package");
    package.push_attribute(("type", "rpm"));
    writer.write_event(Event::Start(package))?;

    writer
        .create_element("name")
        .write_text_content(BytesText::new(text(&pkg.name)))?;
    writer
        .create_element("arch")
        .write_text_content(BytesText::new(text(&pkg.arch)))?;
    write_version(&mut writer, pkg)?;
    writer
        .create_element("checksum")
        .with_attribute(("type", text(&pkg.checksum_type)))
        .with_attribute(("pkgid", "YES"))
        .write_text_content(BytesText::new(text(&pkg.pkg_id)))?;
    writer
        .create_element("summary")
        .write_text_content(BytesText::new(text(&pkg.summary)))?;
    writer
        .create_element("description")
        .write_text_content(BytesText::new(text(&pkg.description)))?;
    writer
        .create_element("packager")
        .write_text_content(BytesText::new(text(&pkg.rpm_packager)))?;
    writer
        .create_element("url")
        .write_text_content(BytesText::new(text(&pkg.url)))?;
    writer
        .create_element("time")
        .with_attribute(("file", pkg.time_file.to_string().as_str()))
        .with_attribute(("build", pkg.time_build.to_string().as_str()))
        .write_empty()?;
    writer
        .create_element("size")
        .with_attribute(("package", pkg.size_package.to_string().as_str()))
        .with_attribute(("installed", pkg.size_installed.to_string().as_str()))
        .with_attribute(("archive", pkg.size_archive.to_string().as_str()))
        .write_empty()?;

    let mut location = BytesStart::new("location");
    location.push_attribute(("href", text(&pkg.location_href)));
    if let Some(base) = &pkg.location_base {
        location.push_attribute(("xml:base", base.as_str()));
    }
    writer.write_event(Event::Empty(location))?;

    writer.write_event(Event::Start(BytesStart::new("format")))?;
    writer
        .create_element("rpm:license")
        .write_text_content(BytesText::new(text(&pkg.rpm_license)))?;
    writer
        .create_element("rpm:vendor")
        .write_text_content(BytesText::new(text(&pkg.rpm_vendor)))?;
    writer
        .create_element("rpm:group")
        .write_text_content(BytesText::new(text(&pkg.rpm_group)))?;
    writer
        .create_element("rpm:buildhost")
        .write_text_content(BytesText::new(text(&pkg.rpm_buildhost)))?;
    writer
        .create_element("rpm:sourcerpm")
        .write_text_content(BytesText::new(text(&pkg.rpm_sourcerpm)))?;
    writer
        .create_element("rpm:header-range")
        .with_attribute(("start", pkg.rpm_header_start.to_string().as_str()))
        .with_attribute(("end", pkg.rpm_header_end.to_string().as_str()))
        .write_empty()?;

    write_dependencies(&mut writer, "rpm:provides", &pkg.provides)?;
    write_dependencies(&mut writer, "rpm:requires", &pkg.requires)?;
    write_dependencies(&mut writer, "rpm:conflicts", &pkg.conflicts)?;
    write_dependencies(&mut writer, "rpm:obsoletes", &pkg.obsoletes)?;

    for file in &pkg.files {
        let full_path = file.full_path();
        if is_primary(&full_path) {
            write_file(&mut writer, file, &full_path)?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("format")))?;
    writer.write_event(Event::End(BytesEnd::new("package")))?;
    finish(writer)
}

/// `<package pkgid=".." name=".." arch="..">`
fn start_short_package(writer: &mut Writer<Vec<u8>>, pkg: &Package) -> Result<()> {
    let mut package = BytesStart::new("package");
    package.push_attribute(("pkgid", text(&pkg.pkg_id)));
    package.push_attribute(("name", text(&pkg.name)));
    package.push_attribute(("arch", text(&pkg.arch)));
    writer.write_event(Event::Start(package))?;
    write_version(writer, pkg)
}

/// Render the filelists.xml element of a package
pub fn dump_filelists(pkg: &Package) -> Result<String> {
    let mut writer = new_writer();
    start_short_package(&mut writer, pkg)?;

    for file in &pkg.files {
        write_file(&mut writer, file, &file.full_path())?;
    }

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    finish(writer)
}

/// Render the other.xml element of a package
pub fn dump_other(pkg: &Package) -> Result<String> {
    let mut writer = new_writer();
    start_short_package(&mut writer, pkg)?;

    for entry in &pkg.changelogs {
        writer
            .create_element("changelog")
            .with_attribute(("author", entry.author.as_str()))
            .with_attribute(("date", entry.date.to_string().as_str()))
            .write_text_content(BytesText::new(&entry.changelog))?;
    }

    writer.write_event(Event::End(BytesEnd::new("package")))?;
    finish(writer)
}
