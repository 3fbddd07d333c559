// src/repository/repomd.rs

//! repomd.xml, the index of a repodata directory
//!
//! Every metadata file of a repository gets one `<data>` record carrying its
//! location, its checksum and size (compressed and uncompressed) and its
//! timestamp. Clients fetch repomd.xml first and use the records to find
//! and verify everything else.

use crate::checksum::{self, ChecksumType, Hasher};
use crate::compression::{self, CompressionFormat, ContentStat};
use crate::error::{Error, Result};
use crate::packages::rpm::FileStat;
use crate::repository::dump::{XML_DECL, XML_NS_RPM};
use crate::repository::parsers::{
    Attributes, MetadataHandler, ParserData, ParserState, StateSwitch, WarningCallback,
    WarningKind, parse_file,
};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const XML_NS_REPO: &str = "http://linux.duke.edu/metadata/repo";

/// Name of the index inside a repodata directory
pub const REPOMD_FILENAME: &str = "repomd.xml";

/// One `<data>` element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepomdRecord {
    /// `primary`, `filelists`, `other`, ...
    pub record_type: String,
    /// Path relative to the repository root
    pub location_href: String,
    pub location_base: Option<String>,
    pub checksum: Option<String>,
    pub checksum_type: Option<String>,
    pub checksum_open: Option<String>,
    pub checksum_open_type: Option<String>,
    /// Modification time of the file
    pub timestamp: i64,
    pub size: Option<u64>,
    pub size_open: Option<u64>,
}

impl RepomdRecord {
    pub fn new(record_type: impl Into<String>, location_href: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            location_href: location_href.into(),
            ..Self::default()
        }
    }

    /// Take the open-size and open-checksum from statistics gathered while
    /// writing the file
    pub fn set_content_stat(&mut self, stat: &ContentStat) {
        self.checksum_open = Some(stat.checksum.clone());
        self.checksum_open_type = Some(stat.checksum_type.to_string());
        self.size_open = Some(stat.size);
    }

    /// Compute checksum, size and timestamp of the file at `path`
    ///
    /// Open-size and open-checksum are computed by decompressing the file
    /// unless already known. Uncompressed files have neither.
    pub fn fill(&mut self, path: &Path, checksum_type: ChecksumType) -> Result<()> {
        let stat = FileStat::of(path)?;
        self.timestamp = stat.mtime;
        self.size = Some(stat.size as u64);
        self.checksum = Some(checksum::file_checksum(path, checksum_type)?);
        self.checksum_type = Some(checksum_type.to_string());

        if self.checksum_open.is_none() {
            let format = compression::detect_compression(path)?;
            if format != CompressionFormat::None {
                let mut reader = compression::open_read(path, format)?;
                let mut hasher = Hasher::new(checksum_type);
                let size = io::copy(&mut reader, &mut hasher)
                    .map_err(|e| Error::Read(format!("{}: {}", path.display(), e)))?;
                reader.close()?;
                self.checksum_open = Some(hasher.finalize());
                self.checksum_open_type = Some(checksum_type.to_string());
                self.size_open = Some(size);
            }
        }

        debug!("Filled repomd record {} from {}", self.record_type, path.display());
        Ok(())
    }

    /// Prefix the file name with the checksum, on disk and in the record
    ///
    /// Returns the new path. A file already carrying the prefix is left as
    /// it is.
    pub fn rename_file(&mut self, path: &Path) -> Result<PathBuf> {
        let checksum = self.checksum.as_deref().ok_or_else(|| {
            Error::BadArg(format!("Record {} has no checksum to rename by", self.record_type))
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::BadArg(format!("Invalid file name: {}", path.display())))?;

        if file_name.starts_with(&format!("{checksum}-")) {
            return Ok(path.to_path_buf());
        }

        let new_name = format!("{checksum}-{file_name}");
        let new_path = path.with_file_name(&new_name);
        fs::rename(path, &new_path)?;

        self.location_href = match self.location_href.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{new_name}"),
            None => new_name,
        };
        Ok(new_path)
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let mut data = BytesStart::new("data");
        data.push_attribute(("type", self.record_type.as_str()));
        writer.write_event(Event::Start(data))?;

        if let Some(checksum) = &self.checksum {
            writer
                .create_element("checksum")
                .with_attribute(("type", self.checksum_type.as_deref().unwrap_or("")))
                .write_text_content(BytesText::new(checksum))?;
        }
        if let Some(checksum) = &self.checksum_open {
            writer
                .create_element("open-checksum")
                .with_attribute(("type", self.checksum_open_type.as_deref().unwrap_or("")))
                .write_text_content(BytesText::new(checksum))?;
        }

        let mut location = BytesStart::new("location");
        location.push_attribute(("href", self.location_href.as_str()));
        if let Some(base) = &self.location_base {
            location.push_attribute(("xml:base", base.as_str()));
        }
        writer.write_event(Event::Empty(location))?;

        writer
            .create_element("timestamp")
            .write_text_content(BytesText::new(&self.timestamp.to_string()))?;
        if let Some(size) = self.size {
            writer
                .create_element("size")
                .write_text_content(BytesText::new(&size.to_string()))?;
        }
        if let Some(size) = self.size_open {
            writer
                .create_element("open-size")
                .write_text_content(BytesText::new(&size.to_string()))?;
        }

        writer.write_event(Event::End(BytesEnd::new("data")))?;
        Ok(())
    }
}

/// A `<distro>` tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistroTag {
    pub cpeid: Option<String>,
    pub name: String,
}

/// Contents of repomd.xml
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repomd {
    pub revision: String,
    pub repoid: Option<String>,
    pub repoid_type: Option<String>,
    pub content_tags: Vec<String>,
    pub repo_tags: Vec<String>,
    pub distro_tags: Vec<DistroTag>,
    pub records: Vec<RepomdRecord>,
}

impl Repomd {
    /// Empty index whose revision is the current time
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            revision: now.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&self, record_type: &str) -> Option<&RepomdRecord> {
        self.records.iter().find(|r| r.record_type == record_type)
    }

    /// Render the whole document
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let mut root = BytesStart::new("repomd");
        root.push_attribute(("xmlns", XML_NS_REPO));
        root.push_attribute(("xmlns:rpm", XML_NS_RPM));
        writer.write_event(Event::Start(root))?;

        writer
            .create_element("revision")
            .write_text_content(BytesText::new(&self.revision))?;
        if let Some(repoid) = &self.repoid {
            writer
                .create_element("repoid")
                .with_attribute(("type", self.repoid_type.as_deref().unwrap_or("")))
                .write_text_content(BytesText::new(repoid))?;
        }

        if !(self.content_tags.is_empty()
            && self.repo_tags.is_empty()
            && self.distro_tags.is_empty())
        {
            writer.write_event(Event::Start(BytesStart::new("tags")))?;
            for tag in &self.content_tags {
                writer
                    .create_element("content")
                    .write_text_content(BytesText::new(tag))?;
            }
            for tag in &self.repo_tags {
                writer
                    .create_element("repo")
                    .write_text_content(BytesText::new(tag))?;
            }
            for tag in &self.distro_tags {
                let element = writer.create_element("distro");
                let element = match &tag.cpeid {
                    Some(cpeid) => element.with_attribute(("cpeid", cpeid.as_str())),
                    None => element,
                };
                element.write_text_content(BytesText::new(&tag.name))?;
            }
            writer.write_event(Event::End(BytesEnd::new("tags")))?;
        }

        for record in &self.records {
            record.write(&mut writer)?;
        }

        writer.write_event(Event::End(BytesEnd::new("repomd")))?;

        let body = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::BadArg(format!("rendered XML is not UTF-8: {}", e)))?;
        Ok(format!("{XML_DECL}{body}\n"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Repomd,
    Revision,
    Repoid,
    Tags,
    Content,
    Repo,
    Distro,
    Data,
    Checksum,
    OpenChecksum,
    Location,
    Timestamp,
    Size,
    OpenSize,
    /// Known `<data>` children this crate does not use
    Ignored,
}

const NUMSTATES: usize = State::Ignored as usize + 1;

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
    sw(State::Start, "repomd", State::Repomd, false),
    sw(State::Repomd, "revision", State::Revision, true),
    sw(State::Repomd, "repoid", State::Repoid, true),
    sw(State::Repomd, "tags", State::Tags, false),
    sw(State::Tags, "content", State::Content, true),
    sw(State::Tags, "repo", State::Repo, true),
    sw(State::Tags, "distro", State::Distro, true),
    sw(State::Repomd, "data", State::Data, false),
    sw(State::Data, "checksum", State::Checksum, true),
    sw(State::Data, "open-checksum", State::OpenChecksum, true),
    sw(State::Data, "location", State::Location, false),
    sw(State::Data, "timestamp", State::Timestamp, true),
    sw(State::Data, "size", State::Size, true),
    sw(State::Data, "open-size", State::OpenSize, true),
    sw(State::Data, "header-checksum", State::Ignored, false),
    sw(State::Data, "header-size", State::Ignored, false),
    sw(State::Data, "database_version", State::Ignored, false),
];

#[derive(Default)]
struct RepomdHandler {
    repomd: Repomd,
    record: Option<RepomdRecord>,
    cpeid: Option<String>,
}

fn number<T: std::str::FromStr + Default>(pd: &mut ParserData<'_, State>, element: &str) -> T {
    let content = pd.content.trim().to_string();
    content.parse().unwrap_or_else(|_| {
        pd.warning(
            WarningKind::UnknownValue,
            &format!("Invalid number in <{}>: \"{}\"", element, content),
        );
        T::default()
    })
}

impl MetadataHandler for RepomdHandler {
    type State = State;

    fn start(
        &mut self,
        pd: &mut ParserData<'_, State>,
        state: State,
        attrs: &Attributes,
    ) -> Result<()> {
        match state {
            State::Repoid => self.repomd.repoid_type = attrs.get("type").map(str::to_string),
            State::Distro => self.cpeid = attrs.get("cpeid").map(str::to_string),
            State::Data => {
                let record_type = attrs.get("type").unwrap_or_default();
                if record_type.is_empty() {
                    pd.warning(
                        WarningKind::MissingAttr,
                        "Missing attribute \"type\" of a data element",
                    );
                }
                self.record = Some(RepomdRecord::new(record_type, ""));
            }
            _ => {}
        }

        let Some(record) = self.record.as_mut() else {
            return Ok(());
        };
        match state {
            State::Checksum => record.checksum_type = attrs.get("type").map(str::to_string),
            State::OpenChecksum => {
                record.checksum_open_type = attrs.get("type").map(str::to_string)
            }
            State::Location => {
                record.location_href = attrs.get("href").unwrap_or_default().to_string();
                record.location_base = attrs.get("xml:base").map(str::to_string);
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, pd: &mut ParserData<'_, State>, state: State) -> Result<()> {
        match state {
            State::Revision => self.repomd.revision = pd.content.clone(),
            State::Repoid => self.repomd.repoid = Some(pd.content.clone()),
            State::Content => self.repomd.content_tags.push(pd.content.clone()),
            State::Repo => self.repomd.repo_tags.push(pd.content.clone()),
            State::Distro => self.repomd.distro_tags.push(DistroTag {
                cpeid: self.cpeid.take(),
                name: pd.content.clone(),
            }),
            State::Data => {
                if let Some(record) = self.record.take() {
                    self.repomd.records.push(record);
                }
            }
            State::Timestamp => {
                let value = number(pd, "timestamp");
                if let Some(record) = self.record.as_mut() {
                    record.timestamp = value;
                }
            }
            State::Size | State::OpenSize => {
                let value = number(pd, if state == State::Size { "size" } else { "open-size" });
                if let Some(record) = self.record.as_mut() {
                    if state == State::Size {
                        record.size = Some(value);
                    } else {
                        record.size_open = Some(value);
                    }
                }
            }
            State::Checksum | State::OpenChecksum => {
                if let Some(record) = self.record.as_mut() {
                    let value = Some(pd.content.trim().to_string());
                    if state == State::Checksum {
                        record.checksum = value;
                    } else {
                        record.checksum_open = value;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Read a repomd.xml file
pub fn parse_repomd<P: AsRef<Path>>(
    path: P,
    warningcb: Option<WarningCallback<'_>>,
) -> Result<Repomd> {
    let mut pd = ParserData::new(NUMSTATES, State::Start, SWITCHES).with_warning_callback(warningcb);
    let mut handler = RepomdHandler::default();
    parse_file(path.as_ref(), &mut pd, &mut handler)?;
    Ok(handler.repomd)
}

/// Paths of the package metadata files of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataLocation {
    pub repomd: PathBuf,
    pub primary: Option<PathBuf>,
    pub filelists: Option<PathBuf>,
    pub other: Option<PathBuf>,
}

impl MetadataLocation {
    /// All three package metadata files are present
    pub fn is_complete(&self) -> bool {
        self.primary.is_some() && self.filelists.is_some() && self.other.is_some()
    }
}

/// Find the metadata files of the repository rooted at `repo_dir` through
/// its `repodata/repomd.xml`
///
/// Records pointing at files that do not exist are left out.
pub fn locate_metadata<P: AsRef<Path>>(repo_dir: P) -> Result<MetadataLocation> {
    let repo_dir = repo_dir.as_ref();
    let repomd_path = repo_dir.join("repodata").join(REPOMD_FILENAME);
    let repomd = parse_repomd(&repomd_path, None)?;

    let resolve = |record_type: &str| {
        repomd
            .record(record_type)
            .map(|record| repo_dir.join(&record.location_href))
            .filter(|path| path.is_file())
    };

    let location = MetadataLocation {
        primary: resolve("primary"),
        filelists: resolve("filelists"),
        other: resolve("other"),
        repomd: repomd_path,
    };
    debug!("Located metadata: {:?}", location);
    Ok(location)
}
