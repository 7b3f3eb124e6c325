//! Documents
//!
//! Ties a [`SectionStore`] to a file on disk: recognising which kind of file
//! was opened, tracking unsaved changes, and writing the generated header
//! in front of the serialized sections.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::ini::{KeyCase, SectionStore};
use crate::sesman::SesmanIni;
use crate::xrdp::XrdpIni;

/// Name written into generated headers and window titles
pub const TOOL_NAME: &str = "xrdp-configurator";

/// The two configuration files the editor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// xrdp.ini: globals, logging, channels and sessions
    Xrdp,
    /// sesman.ini: session manager policy
    Sesman,
}

impl DocumentKind {
    /// Every kind, in auto-detection order
    pub fn all() -> &'static [DocumentKind] {
        &[DocumentKind::Xrdp, DocumentKind::Sesman]
    }

    /// File name used in messages and headers
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Xrdp => "xrdp.ini",
            DocumentKind::Sesman => "sesman.ini",
        }
    }

    /// Key comparison policy.
    ///
    /// xrdp matches keys case-insensitively while sesman's keys are
    /// conventionally capitalised and matched exactly.
    pub fn key_case(&self) -> KeyCase {
        match self {
            DocumentKind::Xrdp => KeyCase::Insensitive,
            DocumentKind::Sesman => KeyCase::Sensitive,
        }
    }

    /// Sections that must be present for a file to be accepted
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            DocumentKind::Xrdp => &["globals", "xrdp1"],
            DocumentKind::Sesman => &["Globals", "Security", "Sessions"],
        }
    }

    /// Check that every required section is present
    pub fn verify(&self, store: &SectionStore) -> Result<()> {
        let missing: Vec<String> = self
            .required_sections()
            .iter()
            .filter(|name| !store.has_section(name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::NotRecognised {
                kind: *self,
                missing,
            })
        }
    }

    /// Read, parse and verify a file of this kind
    pub fn read(&self, path: &Path) -> Result<SectionStore> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store = SectionStore::parse(&text, self.key_case())?;
        self.verify(&store)?;
        debug!("Read {} sections from {}", store.len(), path.display());
        Ok(store)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Generated comment block written at the top of every saved file
pub fn header(kind: DocumentKind, created: NaiveDateTime) -> String {
    format!(
        "# {} configuration file.\n\
         # Generated by {} v{}\n\
         #\n\
         # File creation date : {}\n\
         #\n",
        kind.label(),
        TOOL_NAME,
        env!("CARGO_PKG_VERSION"),
        created.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Something the user should be told about after a file was loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNotice {
    /// A missing optional section was added with default contents
    InjectedSection(String),
    /// `autorun` named a session that does not exist and was dropped
    DroppedAutorun(String),
}

impl fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadNotice::InjectedSection(name) => write!(
                f,
                "No [{}] section was found, a default one has been added",
                name
            ),
            LoadNotice::DroppedAutorun(name) => write!(
                f,
                "autorun referred to unknown session '{}' and was removed",
                name
            ),
        }
    }
}

/// Per-document bookkeeping: where it lives and whether it has unsaved edits
#[derive(Debug, Clone, Default)]
pub struct DocumentState {
    path: Option<PathBuf>,
    is_dirty: bool,
    last_saved: Option<SystemTime>,
}

impl DocumentState {
    /// State for a document read from `path`
    pub fn opened(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// File the document is saved to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Time of the last successful save in this session
    pub fn last_saved(&self) -> Option<SystemTime> {
        self.last_saved
    }

    /// Record an edit
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Record a successful save to `path`
    pub fn mark_saved(&mut self, path: &Path) {
        self.path = Some(path.to_path_buf());
        self.is_dirty = false;
        self.last_saved = Some(SystemTime::now());
    }
}

/// Window title, prefixed with `*` while there are unsaved changes
pub fn title(kind: DocumentKind, dirty: bool) -> String {
    format!(
        "{}{} : editing an {} file.",
        if dirty { "*" } else { "" },
        TOOL_NAME,
        kind.label()
    )
}

/// Common behaviour of an open configuration document
pub trait IniDocument {
    /// Which file this is
    const KIND: DocumentKind;

    /// Current contents
    fn store(&self) -> &SectionStore;

    /// Bookkeeping
    fn state(&self) -> &DocumentState;

    /// Mutable bookkeeping
    fn state_mut(&mut self) -> &mut DocumentState;

    /// Whether there are unsaved changes
    fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    /// Window title
    fn title(&self) -> String {
        title(Self::KIND, self.is_dirty())
    }

    /// Full file text as it would be saved at `created`
    fn render_at(&self, created: NaiveDateTime) -> String {
        let mut text = header(Self::KIND, created);
        text.push_str(&self.store().to_string());
        text
    }

    /// Full file text as it would be saved now
    fn render(&self) -> String {
        self.render_at(Local::now().naive_local())
    }

    /// Save to the path the document was opened from or last saved to
    fn save(&mut self) -> Result<()> {
        let path = self
            .state()
            .path()
            .map(Path::to_path_buf)
            .ok_or(ConfigError::NoPath)?;
        self.save_as(&path)
    }

    /// Save to `path`, which becomes the document's path on success.
    ///
    /// On failure nothing changes and the document stays dirty.
    fn save_as(&mut self, path: &Path) -> Result<()> {
        fs::write(path, self.render()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        self.state_mut().mark_saved(path);
        info!("Saved {} to {}", Self::KIND, path.display());
        Ok(())
    }
}

/// A document of either kind
#[derive(Debug)]
pub enum AnyDocument {
    /// An xrdp.ini file
    Xrdp(XrdpIni),
    /// A sesman.ini file
    Sesman(SesmanIni),
}

impl AnyDocument {
    /// Open a file, trying each kind in turn.
    ///
    /// Returns the document and any load notices. When no kind accepts the
    /// file, the error for the last kind tried is returned, except that a
    /// syntax error always wins over a missing-section rejection.
    pub fn open(path: &Path) -> Result<(Self, Vec<LoadNotice>)> {
        match XrdpIni::open(path) {
            Ok((doc, notices)) => Ok((AnyDocument::Xrdp(doc), notices)),
            Err(ConfigError::NotRecognised { .. }) => {
                let doc = SesmanIni::open(path)?;
                Ok((AnyDocument::Sesman(doc), Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    /// Kind of the open document
    pub fn kind(&self) -> DocumentKind {
        match self {
            AnyDocument::Xrdp(_) => DocumentKind::Xrdp,
            AnyDocument::Sesman(_) => DocumentKind::Sesman,
        }
    }

    /// Rendered file text
    pub fn render(&self) -> String {
        match self {
            AnyDocument::Xrdp(doc) => doc.render(),
            AnyDocument::Sesman(doc) => doc.render(),
        }
    }

    /// Window title
    pub fn title(&self) -> String {
        match self {
            AnyDocument::Xrdp(doc) => doc.title(),
            AnyDocument::Sesman(doc) => doc.title(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = header(DocumentKind::Xrdp, timestamp());
        let lines: Vec<_> = header.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "# xrdp.ini configuration file.");
        assert!(lines[1].starts_with("# Generated by xrdp-configurator v"));
        assert_eq!(lines[2], "#");
        assert_eq!(lines[3], "# File creation date : 2024-03-09 07:05:30");
        assert_eq!(lines[4], "#");
    }

    #[test]
    fn test_verify_reports_missing_sections() {
        let mut store = SectionStore::new(KeyCase::Sensitive);
        store.ensure_section("Globals");

        match DocumentKind::Sesman.verify(&store) {
            Err(ConfigError::NotRecognised { kind, missing }) => {
                assert_eq!(kind, DocumentKind::Sesman);
                assert_eq!(missing, vec!["Security", "Sessions"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_verify_section_names_are_case_sensitive() {
        let mut store = SectionStore::new(KeyCase::Insensitive);
        store.ensure_section("Globals");
        store.ensure_section("xrdp1");
        assert!(DocumentKind::Xrdp.verify(&store).is_err());

        store.ensure_section("globals");
        assert!(DocumentKind::Xrdp.verify(&store).is_ok());
    }

    #[test]
    fn test_title_marks_dirty() {
        assert_eq!(
            title(DocumentKind::Sesman, false),
            "xrdp-configurator : editing an sesman.ini file."
        );
        assert!(title(DocumentKind::Xrdp, true).starts_with("*xrdp-configurator"));
    }

    #[test]
    fn test_state_transitions() {
        let mut state = DocumentState::default();
        assert!(!state.is_dirty());
        assert!(state.path().is_none());

        state.mark_dirty();
        assert!(state.is_dirty());

        state.mark_saved(Path::new("/tmp/xrdp.ini"));
        assert!(!state.is_dirty());
        assert_eq!(state.path(), Some(Path::new("/tmp/xrdp.ini")));
        assert!(state.last_saved().is_some());
    }
}
