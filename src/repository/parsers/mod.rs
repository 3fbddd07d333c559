// src/repository/parsers/mod.rs

//! Streaming parsers for repository metadata
//!
//! Metadata files can be large (primary.xml of a distribution easily
//! exceeds a gigabyte uncompressed), so they are never loaded whole. The
//! driver pulls fixed-size chunks from the (decompressed) file, turns them
//! into XML events and walks a small state machine per document type:
//! - primary.xml: packages with their dependencies and primary files
//! - filelists.xml: complete file lists
//! - other.xml: changelogs
//!
//! Each document type provides its states, the table of allowed element
//! transitions and a [`MetadataHandler`] doing the actual work.

pub mod filelists;
pub mod other;
pub mod primary;

pub use filelists::parse_filelists;
pub use other::parse_other;
pub use primary::parse_primary;

use crate::compression::{self, CompressionFormat};
use crate::error::{Error, Result};
use crate::packages::{FileType, Package};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;
use std::io::{self, BufRead, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Bytes pulled from the stream per read
pub const XML_BUFFER_SIZE: usize = 8192;
/// Growth step of the element content buffer
pub const CONTENT_REALLOC_STEP: usize = 256;

/// Problems in a document that do not stop the parse by themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Element not allowed at its position; skipped with its subtree
    UnknownTag,
    /// Required attribute absent
    MissingAttr,
    /// Attribute or content with a value outside the known set
    UnknownValue,
    /// Attribute whose value cannot be parsed
    BadAttrValue,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::UnknownTag => "unknown tag",
            WarningKind::MissingAttr => "missing attribute",
            WarningKind::UnknownValue => "unknown value",
            WarningKind::BadAttrValue => "bad attribute value",
        };
        f.write_str(name)
    }
}

/// Receives warnings; returning an error interrupts the parse
pub type WarningCallback<'a> = Box<dyn FnMut(WarningKind, &str) -> Result<()> + 'a>;

/// State of a document state machine
pub trait ParserState: Copy + PartialEq + fmt::Debug {
    /// Position in the state tables
    fn index(self) -> usize;
}

/// Inside `from`, the element `element` leads to `to`
#[derive(Debug, Clone, Copy)]
pub struct StateSwitch<S> {
    pub from: S,
    pub element: &'static str,
    pub to: S,
    /// Collect the character data of the element
    pub docontent: bool,
}

/// Scratch state shared by the driver and a document handler
pub struct ParserData<'a, S: ParserState> {
    /// Character data of the current element
    pub content: String,
    /// Whether character data is being collected
    pub docontent: bool,
    /// Current state
    pub state: S,
    depth: usize,
    statedepth: usize,
    swtab: Vec<Vec<StateSwitch<S>>>,
    sbtab: Vec<S>,
    err: Option<Error>,
    warningcb: Option<WarningCallback<'a>>,
}

impl<'a, S: ParserState> ParserData<'a, S> {
    /// Build the tables for `numstates` states from the allowed transitions
    pub fn new(numstates: usize, start: S, switches: &[StateSwitch<S>]) -> Self {
        let mut swtab: Vec<Vec<StateSwitch<S>>> = vec![Vec::new(); numstates];
        let mut sbtab = vec![start; numstates];
        for sw in switches {
            swtab[sw.from.index()].push(*sw);
            sbtab[sw.to.index()] = sw.from;
        }

        Self {
            content: String::with_capacity(CONTENT_REALLOC_STEP),
            docontent: false,
            state: start,
            depth: 0,
            statedepth: 0,
            swtab,
            sbtab,
            err: None,
            warningcb: None,
        }
    }

    pub fn with_warning_callback(mut self, warningcb: Option<WarningCallback<'a>>) -> Self {
        self.warningcb = warningcb;
        self
    }

    /// Append character data of the current element
    pub fn feed_chars(&mut self, chars: &str) {
        if self.err.is_some() || !self.docontent {
            return;
        }

        let needed = self.content.len() + chars.len() + 1;
        if needed > self.content.capacity() {
            self.content
                .reserve_exact(needed + CONTENT_REALLOC_STEP - self.content.len());
        }
        self.content.push_str(chars);
    }

    /// Report a warning
    ///
    /// Without a warning callback the warning is only logged. An error from
    /// the callback is latched and ends the parse.
    pub fn warning(&mut self, kind: WarningKind, msg: &str) {
        let Some(warningcb) = self.warningcb.as_mut() else {
            debug!("XML parser warning ({}): {}", kind, msg);
            return;
        };
        if let Err(e) = warningcb(kind, msg) {
            self.set_error(interrupted(e));
        }
    }

    /// Latch an error; the first one wins
    pub fn set_error(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub fn has_error(&self) -> bool {
        self.err.is_some()
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.err.take()
    }

    /// Enter an element; returns the state entered, or `None` when the
    /// element is skipped
    pub fn start_element(&mut self, name: &str) -> Option<S> {
        if self.err.is_some() {
            return None;
        }
        if self.depth != self.statedepth {
            self.depth += 1;
            return None;
        }
        self.depth += 1;

        let children = &self.swtab[self.state.index()];
        if children.is_empty() {
            // leaf state, children are ignored silently
            return None;
        }

        let Some(sw) = children.iter().find(|sw| sw.element == name).copied() else {
            self.warning(WarningKind::UnknownTag, &format!("Unknown element \"{}\"", name));
            return None;
        };

        self.state = sw.to;
        self.docontent = sw.docontent;
        self.statedepth = self.depth;
        self.content.clear();
        Some(sw.to)
    }

    /// Leave an element; returns the state left, or `None` when the element
    /// was skipped
    ///
    /// The content of the element stays available until the next element
    /// is entered.
    pub fn end_element(&mut self) -> Option<S> {
        if self.err.is_some() {
            return None;
        }
        if self.depth != self.statedepth {
            self.depth -= 1;
            return None;
        }
        self.depth -= 1;
        self.statedepth = self.statedepth.saturating_sub(1);

        let closed = self.state;
        self.state = self.sbtab[closed.index()];
        self.docontent = false;
        Some(closed)
    }
}

/// Wrap an error raised by a callback
pub(crate) fn interrupted(err: Error) -> Error {
    match err {
        Error::CallbackInterrupted(_) => err,
        other => Error::CallbackInterrupted(other.to_string()),
    }
}

/// Integer attribute; absent means 0, unparsable warns and means 0
pub(crate) fn number_attr<S: ParserState>(
    pd: &mut ParserData<'_, S>,
    attrs: &Attributes,
    name: &str,
) -> i64 {
    let Some(value) = attrs.get(name) else {
        return 0;
    };
    value.trim().parse().unwrap_or_else(|_| {
        pd.warning(
            WarningKind::BadAttrValue,
            &format!("Invalid value of attribute \"{}\": \"{}\"", name, value),
        );
        0
    })
}

/// `epoch`, `ver` and `rel` of a `<version>` element
pub(crate) fn version_attrs(attrs: &Attributes, pkg: &mut Package) {
    pkg.epoch = attrs.get("epoch").map(str::to_string);
    pkg.version = attrs.get("ver").map(str::to_string);
    pkg.release = attrs.get("rel").map(str::to_string);
}

/// Start of a `<package>` element in filelists.xml or other.xml
pub(crate) fn short_package<S: ParserState>(
    pd: &mut ParserData<'_, S>,
    attrs: &Attributes,
) -> Package {
    let pkg_id = attrs.get("pkgid").map(str::to_string);
    if pkg_id.is_none() {
        pd.warning(
            WarningKind::MissingAttr,
            "Missing attribute \"pkgid\" of a package element",
        );
    }
    Package {
        pkg_id,
        name: attrs.get("name").map(str::to_string),
        arch: attrs.get("arch").map(str::to_string),
        ..Package::default()
    }
}

/// File type from a `type` attribute; unknown values warn and mean a
/// regular file
pub(crate) fn file_type_attr<S: ParserState>(
    pd: &mut ParserData<'_, S>,
    attrs: &Attributes,
) -> FileType {
    let value = attrs.get("type").unwrap_or("");
    value.parse().unwrap_or_else(|_| {
        pd.warning(
            WarningKind::UnknownValue,
            &format!("Unknown file type \"{}\"", value),
        );
        FileType::Regular
    })
}

/// Attributes of an element, unescaped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn from_start(e: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| err.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| err.to_string())?;
            attrs.push((key, value.into_owned()));
        }
        Ok(Self(attrs))
    }
}

/// Document specific half of a parser
pub trait MetadataHandler {
    type State: ParserState;

    /// Called after the state machine entered `state`
    fn start(
        &mut self,
        pd: &mut ParserData<'_, Self::State>,
        state: Self::State,
        attrs: &Attributes,
    ) -> Result<()>;

    /// Called after the state machine left `state`; `pd.content` holds the
    /// element's character data
    fn end(&mut self, pd: &mut ParserData<'_, Self::State>, state: Self::State) -> Result<()>;
}

/// Buffered reader that pulls fixed-size chunks and counts the lines
/// consumed by the XML reader
pub struct ChunkReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    newlines: usize,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; XML_BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
            newlines: 0,
        }
    }

    /// 1-based line number of the next unconsumed byte
    pub fn line(&self) -> usize {
        self.newlines + 1
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for ChunkReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.filled = self.inner.read(&mut self.buf)?;
            self.pos = 0;
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        let end = (self.pos + amt).min(self.filled);
        self.newlines += self.buf[self.pos..end].iter().filter(|&&b| b == b'\n').count();
        self.pos = end;
    }
}

fn syntax_error<R: Read>(reader: &Reader<ChunkReader<R>>, message: impl fmt::Display) -> Error {
    let line = reader.get_ref().line();
    warn!("XML parse error at line {}: {}", line, message);
    Error::XmlParse {
        line,
        message: message.to_string(),
    }
}

/// Parse one (possibly compressed) metadata file
///
/// Errors raised by the handler or by callbacks are latched in `pd` and end
/// the parse after the event that raised them. Reading stops at the end tag
/// of the root element. When parsing succeeded the stream is then closed,
/// which reads it to its end, and a close error (such as a corrupt
/// compression trailer) is reported; after a failed parse it is dropped
/// unread.
pub fn parse_file<H: MetadataHandler>(
    path: &Path,
    pd: &mut ParserData<'_, H::State>,
    handler: &mut H,
) -> Result<()> {
    debug!("Parsing {}", path.display());

    let stream = compression::open_read(path, CompressionFormat::AutoDetect)
        .map_err(|e| e.prefixed(&format!("Cannot open {}: ", path.display())))?;

    let mut reader = Reader::from_reader(ChunkReader::new(stream));
    let result = drive(&mut reader, pd, handler);
    let stream = reader.into_inner().into_inner();

    result?;
    stream
        .close()
        .map_err(|e| e.prefixed(&format!("Cannot close {}: ", path.display())))
}

fn drive<R: Read, H: MetadataHandler>(
    reader: &mut Reader<ChunkReader<R>>,
    pd: &mut ParserData<'_, H::State>,
    handler: &mut H,
) -> Result<()> {
    let mut buf = Vec::with_capacity(XML_BUFFER_SIZE);
    let mut open_elements = 0usize;
    let mut root_closed = false;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(quick_xml::Error::Io(e)) => return Err(Error::Read(e.to_string())),
            Err(e) => return Err(syntax_error(reader, e)),
        };

        match event {
            Event::Start(e) => {
                open_elements += 1;
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|err| syntax_error(reader, err))?
                    .to_string();
                start(pd, handler, &name, &e).map_err(|msg| syntax_error(reader, msg))?;
            }
            Event::Empty(e) => {
                let name = std::str::from_utf8(e.name().as_ref())
                    .map_err(|err| syntax_error(reader, err))?
                    .to_string();
                start(pd, handler, &name, &e).map_err(|msg| syntax_error(reader, msg))?;
                end(pd, handler);
            }
            Event::End(_) => {
                open_elements = open_elements.saturating_sub(1);
                end(pd, handler);
                root_closed = open_elements == 0;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| syntax_error(reader, err))?;
                pd.feed_chars(&text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                pd.feed_chars(&text);
            }
            Event::Eof => {
                if open_elements > 0 {
                    return Err(syntax_error(reader, "unclosed element at end of input"));
                }
                break;
            }
            _ => {}
        }

        if let Some(err) = pd.take_error() {
            return Err(err);
        }
        if root_closed {
            break;
        }
        buf.clear();
    }

    Ok(())
}

/// Returns `Err` only for malformed attributes
fn start<H: MetadataHandler>(
    pd: &mut ParserData<'_, H::State>,
    handler: &mut H,
    name: &str,
    e: &BytesStart<'_>,
) -> std::result::Result<(), String> {
    let Some(state) = pd.start_element(name) else {
        return Ok(());
    };
    let attrs = Attributes::from_start(e)?;
    if let Err(err) = handler.start(pd, state, &attrs) {
        pd.set_error(err);
    }
    Ok(())
}

fn end<H: MetadataHandler>(pd: &mut ParserData<'_, H::State>, handler: &mut H) {
    let Some(state) = pd.end_element() else {
        return;
    };
    if let Err(err) = handler.end(pd, state) {
        pd.set_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum TestState {
        Start,
        Root,
        Item,
    }

    impl ParserState for TestState {
        fn index(self) -> usize {
            self as usize
        }
    }

    const SWITCHES: &[StateSwitch<TestState>] = &[
        StateSwitch {
            from: TestState::Start,
            element: "root",
            to: TestState::Root,
            docontent: false,
        },
        StateSwitch {
            from: TestState::Root,
            element: "item",
            to: TestState::Item,
            docontent: true,
        },
    ];

    /// Collects item texts, failing on the item named in `fail_at`
    #[derive(Default)]
    struct Collector {
        items: Vec<String>,
        fail_at: Option<usize>,
    }

    impl MetadataHandler for Collector {
        type State = TestState;

        fn start(
            &mut self,
            _pd: &mut ParserData<'_, TestState>,
            _state: TestState,
            _attrs: &Attributes,
        ) -> Result<()> {
            Ok(())
        }

        fn end(&mut self, pd: &mut ParserData<'_, TestState>, state: TestState) -> Result<()> {
            if state == TestState::Item {
                if self.fail_at == Some(self.items.len()) {
                    return Err(interrupted(Error::BadArg("stop".to_string())));
                }
                self.items.push(pd.content.clone());
            }
            Ok(())
        }
    }

    fn new_pd<'a>() -> ParserData<'a, TestState> {
        ParserData::new(3, TestState::Start, SWITCHES)
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_feed_chars_only_when_collecting() {
        let mut pd = new_pd();
        assert!(pd.content.capacity() >= CONTENT_REALLOC_STEP);

        pd.feed_chars("ignored");
        assert!(pd.content.is_empty());

        pd.docontent = true;
        let long = "x".repeat(1000);
        pd.feed_chars("ab");
        pd.feed_chars(&long);
        assert_eq!(pd.content.len(), 1002);
        assert!(pd.content.capacity() >= 1003);

        pd.set_error(Error::BadArg("first".to_string()));
        pd.feed_chars("more");
        assert_eq!(pd.content.len(), 1002);
    }

    #[test]
    fn test_first_error_wins() {
        let mut pd = new_pd();
        pd.set_error(Error::BadArg("first".to_string()));
        pd.set_error(Error::BadArg("second".to_string()));
        assert_eq!(pd.take_error().unwrap().to_string(), "Bad argument: first");
        assert!(!pd.has_error());
    }

    #[test]
    fn test_warning_callback_error_interrupts() {
        let mut seen = Vec::new();
        {
            let mut pd = new_pd().with_warning_callback(Some(Box::new(
                |kind: WarningKind, msg: &str| {
                    seen.push((kind, msg.to_string()));
                    Err(Error::BadArg("enough".to_string()))
                },
            )));
            assert_eq!(pd.start_element("root"), Some(TestState::Root));
            assert_eq!(pd.start_element("bogus"), None);

            let err = pd.take_error().unwrap();
            assert_eq!(err.code(), 8);
            assert!(err.to_string().starts_with("Parsing interrupted: "));
        }
        assert_eq!(seen, vec![(WarningKind::UnknownTag, "Unknown element \"bogus\"".to_string())]);
    }

    #[test]
    fn test_unknown_subtree_skipped() {
        let mut pd = new_pd();
        assert_eq!(pd.start_element("root"), Some(TestState::Root));
        assert_eq!(pd.start_element("unknown"), None);
        assert_eq!(pd.start_element("item"), None);
        assert_eq!(pd.end_element(), None);
        assert_eq!(pd.end_element(), None);
        assert_eq!(pd.start_element("item"), Some(TestState::Item));
        assert_eq!(pd.end_element(), Some(TestState::Item));
        assert_eq!(pd.state, TestState::Root);
        assert_eq!(pd.end_element(), Some(TestState::Root));
        assert_eq!(pd.state, TestState::Start);
    }

    #[test]
    fn test_chunk_reader_counts_lines() {
        let data = b"a\nb\nc".to_vec();
        let mut reader = ChunkReader::new(&data[..]);
        assert_eq!(reader.line(), 1);
        let mut out = String::new();
        reader.read_line(&mut out).unwrap();
        assert_eq!(reader.line(), 2);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(reader.line(), 3);
    }

    #[test]
    fn test_parse_file_collects_items() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "doc.xml",
            "<?xml version=\"1.0\"?>\n<root>\n  <item>a &amp; b</item>\n  <item><![CDATA[<c>]]></item>\n  <other><item>x</item></other>\n  <item/>\n</root>\n",
        );

        let mut pd = new_pd();
        let mut collector = Collector::default();
        parse_file(&path, &mut pd, &mut collector).unwrap();
        assert_eq!(collector.items, vec!["a & b", "<c>", ""]);
    }

    #[test]
    fn test_parse_file_zero_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.xml", "");

        let mut collector = Collector::default();
        parse_file(&path, &mut new_pd(), &mut collector).unwrap();
        assert!(collector.items.is_empty());
    }

    #[test]
    fn test_parse_file_truncated() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "cut.xml", "<root>\n<item>a</item>\n<item>b");

        let err = parse_file(&path, &mut new_pd(), &mut Collector::default()).unwrap_err();
        match err {
            Error::XmlParse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_file_mismatched_end() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.xml", "<root>\n<item>a</wrong>\n</root>\n");

        let err = parse_file(&path, &mut new_pd(), &mut Collector::default()).unwrap_err();
        assert_eq!(err.code(), 7);
        assert!(err.to_string().starts_with("Parse error at line: 2"));
    }

    #[test]
    fn test_parse_file_callback_error_stops() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "doc.xml", "<root><item>1</item><item>2</item><item>3</item></root>");

        let mut collector = Collector {
            fail_at: Some(1),
            ..Collector::default()
        };
        let err = parse_file(&path, &mut new_pd(), &mut collector).unwrap_err();
        assert_eq!(err.code(), 8);
        assert_eq!(collector.items, vec!["1"]);
    }

    #[test]
    fn test_parse_file_corrupt_trailer_fails_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.xml.gz");
        let mut writer = compression::open_write(&path, CompressionFormat::Gzip).unwrap();
        writer
            .write_all(b"<root>\n<item>1</item>\n<item>2</item>\n</root>\n")
            .unwrap();
        writer.close().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let crc = bytes.len() - 8;
        bytes[crc] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut collector = Collector::default();
        let err = parse_file(&path, &mut new_pd(), &mut collector).unwrap_err();
        assert_eq!(err.code(), 6);
        assert!(err.to_string().contains("Cannot close "));
        // the document itself was parsed completely
        assert_eq!(collector.items, vec!["1", "2"]);
    }

    #[test]
    fn test_parse_file_callback_error_skips_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.xml.gz");
        let mut writer = compression::open_write(&path, CompressionFormat::Gzip).unwrap();
        writer.write_all(b"<root><item>1</item><item>2</item></root>").unwrap();
        writer.close().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let crc = bytes.len() - 8;
        bytes[crc] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let mut collector = Collector {
            fail_at: Some(0),
            ..Collector::default()
        };
        let err = parse_file(&path, &mut new_pd(), &mut collector).unwrap_err();
        assert_eq!(err.code(), 8);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(
            Path::new("/nonexistent/primary.xml"),
            &mut new_pd(),
            &mut Collector::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cannot open /nonexistent/primary.xml: "));
    }
}
