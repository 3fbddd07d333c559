// src/repository/parsers/filelists.rs

//! filelists.xml parser

use super::{
    Attributes, MetadataHandler, ParserData, ParserState, StateSwitch, WarningCallback,
    file_type_attr, interrupted, parse_file, short_package, version_attrs,
};
use crate::error::Result;
use crate::packages::{FileType, Package, PackageFile};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Filelists,
    Package,
    Version,
    File,
}

const NUMSTATES: usize = State::File as usize + 1;

impl ParserState for State {
    fn index(self) -> usize {
        self as usize
    }
}

const SWITCHES: &[StateSwitch<State>] = &[
    StateSwitch {
        from: State::Start,
        element: "filelists",
        to: State::Filelists,
        docontent: false,
    },
    StateSwitch {
        from: State::Filelists,
        element: "package",
        to: State::Package,
        docontent: false,
    },
    StateSwitch {
        from: State::Package,
        element: "version",
        to: State::Version,
        docontent: false,
    },
    StateSwitch {
        from: State::Package,
        element: "file",
        to: State::File,
        docontent: true,
    },
];

struct FilelistsHandler<F> {
    pkgcb: F,
    pkg: Option<Package>,
    file_type: FileType,
    /// Directories of the current package, shared by its files
    dirs: HashMap<String, Arc<str>>,
}

impl<F: FnMut(Package) -> Result<()>> MetadataHandler for FilelistsHandler<F> {
    type State = State;

    fn start(
        &mut self,
        pd: &mut ParserData<'_, State>,
        state: State,
        attrs: &Attributes,
    ) -> Result<()> {
        match state {
            State::Package => {
                self.pkg = Some(short_package(pd, attrs));
                self.dirs.clear();
            }
            State::Version => {
                if let Some(pkg) = self.pkg.as_mut() {
                    version_attrs(attrs, pkg);
                }
            }
            State::File => self.file_type = file_type_attr(pd, attrs),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, pd: &mut ParserData<'_, State>, state: State) -> Result<()> {
        match state {
            State::File => {
                let Some(pkg) = self.pkg.as_mut() else {
                    return Ok(());
                };
                let mut file = PackageFile::from_full_path(&pd.content, self.file_type);
                let dir = self
                    .dirs
                    .entry(file.path.to_string())
                    .or_insert_with(|| file.path.clone());
                file.path = dir.clone();
                pkg.files.push(file);
            }
            State::Package => {
                if let Some(pkg) = self.pkg.take() {
                    (self.pkgcb)(pkg).map_err(interrupted)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Stream-parse a filelists.xml file
///
/// `pkgcb` receives each package with its id, name, arch, version and the
/// complete file list.
pub fn parse_filelists<P, F>(
    path: P,
    pkgcb: F,
    warningcb: Option<WarningCallback<'_>>,
) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(Package) -> Result<()>,
{
    let mut pd = ParserData::new(NUMSTATES, State::Start, SWITCHES).with_warning_callback(warningcb);
    let mut handler = FilelistsHandler {
        pkgcb,
        pkg: None,
        file_type: FileType::Regular,
        dirs: HashMap::new(),
    };
    parse_file(path.as_ref(), &mut pd, &mut handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::parsers::WarningKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FILELISTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<filelists xmlns="http://linux.duke.edu/metadata/filelists" packages="2">
<package pkgid="aaa" name="foo" arch="x86_64">
  <version epoch="0" ver="1.0" rel="1"/>
  <file>/usr/bin/foo</file>
  <file type="dir">/usr/share/foo</file>
  <file>/usr/share/foo/a</file>
  <file>/usr/share/foo/b</file>
  <file type="ghost">/var/log/foo.log</file>
</package>
<package name="nopkgid" arch="noarch">
  <version epoch="0" ver="2" rel="1"/>
  <file type="socket">/run/foo.sock</file>
</package>
</filelists>
"#;

    #[test]
    fn test_parse_filelists() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FILELISTS.as_bytes()).unwrap();
        file.flush().unwrap();

        let mut packages = Vec::new();
        let mut warnings = Vec::new();
        parse_filelists(
            file.path(),
            |pkg| {
                packages.push(pkg);
                Ok(())
            },
            Some(Box::new(|kind: WarningKind, _msg: &str| {
                warnings.push(kind);
                Ok(())
            })),
        )
        .unwrap();

        assert_eq!(packages.len(), 2);
        let foo = &packages[0];
        assert_eq!(foo.pkg_id.as_deref(), Some("aaa"));
        assert_eq!(foo.name.as_deref(), Some("foo"));
        assert_eq!(foo.version.as_deref(), Some("1.0"));
        assert_eq!(foo.files.len(), 5);
        assert_eq!(foo.files[1].file_type, FileType::Dir);
        assert_eq!(foo.files[4].file_type, FileType::Ghost);
        assert!(Arc::ptr_eq(&foo.files[2].path, &foo.files[3].path));

        assert_eq!(packages[1].pkg_id, None);
        assert_eq!(packages[1].files[0].file_type, FileType::Regular);
        assert_eq!(warnings, vec![WarningKind::MissingAttr, WarningKind::UnknownValue]);
    }
}
