// src/repository/parsers/other.rs

//! other.xml parser

use super::{
    Attributes, MetadataHandler, ParserData, ParserState, StateSwitch, WarningCallback,
    interrupted, number_attr, parse_file, short_package, version_attrs,
};
use crate::error::Result;
use crate::packages::{ChangelogEntry, Package};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Otherdata,
    Package,
    Version,
    Changelog,
}

const NUMSTATES: usize = State::Changelog as usize + 1;

impl ParserState for State {
    fn index(self) -> usize {
        self as usize
    }
}

const SWITCHES: &[StateSwitch<State>] = &[
    StateSwitch {
        from: State::Start,
        element: "otherdata",
        to: State::Otherdata,
        docontent: false,
    },
    StateSwitch {
        from: State::Otherdata,
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
        element: "changelog",
        to: State::Changelog,
        docontent: true,
    },
];

struct OtherHandler<F> {
    pkgcb: F,
    pkg: Option<Package>,
    changelog: Option<ChangelogEntry>,
}

impl<F: FnMut(Package) -> Result<()>> MetadataHandler for OtherHandler<F> {
    type State = State;

    fn start(
        &mut self,
        pd: &mut ParserData<'_, State>,
        state: State,
        attrs: &Attributes,
    ) -> Result<()> {
        match state {
            State::Package => self.pkg = Some(short_package(pd, attrs)),
            State::Version => {
                if let Some(pkg) = self.pkg.as_mut() {
                    version_attrs(attrs, pkg);
                }
            }
            State::Changelog => {
                let date = number_attr(pd, attrs, "date");
                self.changelog = Some(ChangelogEntry {
                    author: attrs.get("author").unwrap_or_default().to_string(),
                    date,
                    changelog: String::new(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, pd: &mut ParserData<'_, State>, state: State) -> Result<()> {
        match state {
            State::Changelog => {
                if let (Some(pkg), Some(mut entry)) = (self.pkg.as_mut(), self.changelog.take()) {
                    entry.changelog = pd.content.clone();
                    pkg.changelogs.push(entry);
                }
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

/// Stream-parse an other.xml file
///
/// `pkgcb` receives each package with its id, name, arch, version and
/// changelog entries in document order.
pub fn parse_other<P, F>(path: P, pkgcb: F, warningcb: Option<WarningCallback<'_>>) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(Package) -> Result<()>,
{
    let mut pd = ParserData::new(NUMSTATES, State::Start, SWITCHES).with_warning_callback(warningcb);
    let mut handler = OtherHandler {
        pkgcb,
        pkg: None,
        changelog: None,
    };
    parse_file(path.as_ref(), &mut pd, &mut handler)
}
