//! xrdp.ini editing
//!
//! [`XrdpIni`] owns the section store for one open xrdp.ini together with
//! the session sequence derived from it. All edits go through its methods so
//! the session invariants hold and the document is marked dirty.
//!
//! # Example
//!
//! ```no_run
//! use xrdp_configurator::document::IniDocument;
//! use xrdp_configurator::xrdp::{ConnectionType, XrdpIni};
//!
//! let (mut ini, notices) = XrdpIni::open("/etc/xrdp/xrdp.ini".as_ref())?;
//! for notice in &notices {
//!     println!("{}", notice);
//! }
//! ini.add_session("Local console", ConnectionType::Console);
//! ini.swap_sessions(0, 1);
//! ini.save()?;
//! # Ok::<(), xrdp_configurator::ConfigError>(())
//! ```

pub mod debug;
mod globals;
pub mod login_window;
pub mod overrides;
pub mod sessions;
pub mod templates;

use std::path::Path;

use tracing::{info, warn};

use crate::document::{DocumentKind, DocumentState, IniDocument, LoadNotice};
use crate::error::{ConfigError, Result};
use crate::ini::SectionStore;

pub use globals::{CryptLevel, GLOBALS_SECTION, LOGGING_SECTION, MAX_BPP_VALUES};
pub use login_window::{ColorRole, LoginLayout, Rect, Rgb};
pub use overrides::{Channel, ChannelDefaults, ChannelOverrides, CHANNELS_SECTION};
pub use sessions::{SessionEntry, SessionSequencer, SessionSummary};
pub use templates::{ConnectionType, Library};

/// Layout schema selected by `ini_version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IniVersion {
    /// No `ini_version`, classic login window keys
    #[default]
    Legacy,
    /// `ini_version=1`, `ls_*` login window keys
    V1,
}

impl IniVersion {
    /// Schema in use by a store
    pub fn detect(store: &SectionStore) -> Self {
        match store.get(GLOBALS_SECTION, "ini_version") {
            Some(v) if v.trim() == "1" => IniVersion::V1,
            _ => IniVersion::Legacy,
        }
    }
}

/// Valid `xserverbpp` values
pub const SERVER_BPP_VALUES: [u8; 4] = [15, 16, 24, 32];

/// An open xrdp.ini
#[derive(Debug, Clone)]
pub struct XrdpIni {
    store: SectionStore,
    sessions: SessionSequencer,
    version: IniVersion,
    state: DocumentState,
}

impl IniDocument for XrdpIni {
    const KIND: DocumentKind = DocumentKind::Xrdp;

    fn store(&self) -> &SectionStore {
        &self.store
    }

    fn state(&self) -> &DocumentState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DocumentState {
        &mut self.state
    }
}

impl XrdpIni {
    /// Open and load a file
    pub fn open(path: &Path) -> Result<(Self, Vec<LoadNotice>)> {
        let store = DocumentKind::Xrdp.read(path)?;
        let loaded = Self::from_store(store, DocumentState::opened(path))?;
        info!(
            "Opened {} with {} sessions",
            path.display(),
            loaded.0.sessions.len()
        );
        Ok(loaded)
    }

    /// Load from text that has no file behind it yet
    pub fn from_text(text: &str) -> Result<(Self, Vec<LoadNotice>)> {
        let store = SectionStore::parse(text, DocumentKind::Xrdp.key_case())?;
        Self::from_store(store, DocumentState::default())
    }

    fn from_store(
        mut store: SectionStore,
        state: DocumentState,
    ) -> Result<(Self, Vec<LoadNotice>)> {
        DocumentKind::Xrdp.verify(&store)?;
        let mut notices = Vec::new();

        if !store.has_section(LOGGING_SECTION) {
            warn!("No [{}] section, adding defaults", LOGGING_SECTION);
            globals::insert_default_logging(&mut store);
            notices.push(LoadNotice::InjectedSection(LOGGING_SECTION.to_string()));
        }
        if !store.has_section(CHANNELS_SECTION) {
            warn!("No [{}] section, adding defaults", CHANNELS_SECTION);
            ChannelDefaults::insert_default_section(&mut store);
            notices.push(LoadNotice::InjectedSection(CHANNELS_SECTION.to_string()));
        }

        let version = IniVersion::detect(&store);
        let sessions = SessionSequencer::load(&mut store);

        let autorun = store
            .get(GLOBALS_SECTION, "autorun")
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        if let Some(autorun) = autorun {
            if sessions.find_by_name(&store, &autorun).is_none() {
                warn!("autorun '{}' matches no session, removing it", autorun);
                store.remove(GLOBALS_SECTION, "autorun");
                notices.push(LoadNotice::DroppedAutorun(autorun));
            }
        }

        Ok((
            Self {
                store,
                sessions,
                version,
                state,
            },
            notices,
        ))
    }

    /// Layout schema
    pub fn version(&self) -> IniVersion {
        self.version
    }

    /// Session bookkeeping
    pub fn sessions(&self) -> &SessionSequencer {
        &self.sessions
    }

    /// Listing of every session
    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        self.sessions.summaries(&self.store)
    }

    /// Session names in order
    pub fn session_names(&self) -> Vec<String> {
        self.sessions.session_names(&self.store)
    }

    fn touched(&mut self, changed: bool) -> bool {
        if changed {
            self.state.mark_dirty();
        }
        changed
    }

    // =========================================================================
    // Session sequence
    // =========================================================================

    /// Append a session, returning its position
    pub fn add_session(&mut self, name: &str, kind: ConnectionType) -> Option<usize> {
        let index = self.sessions.insert_session(&mut self.store, name, kind);
        self.touched(index.is_some());
        index
    }

    /// Append a session using a selector index for the connection type
    pub fn add_session_from_index(&mut self, name: &str, template_index: usize) -> Option<usize> {
        let index = self
            .sessions
            .insert_session_from_index(&mut self.store, name, template_index);
        self.touched(index.is_some());
        index
    }

    /// Delete a session and renumber the rest
    pub fn delete_session(&mut self, index: usize) -> bool {
        let changed = self.sessions.delete_session(&mut self.store, index);
        self.touched(changed)
    }

    /// Exchange two sessions
    pub fn swap_sessions(&mut self, a: usize, b: usize) -> bool {
        let changed = self.sessions.swap_sessions(&mut self.store, a, b);
        self.touched(changed)
    }

    /// Renumber session sections to match the session order
    pub fn resequence(&mut self) -> Vec<String> {
        self.sessions.resequence(&mut self.store)
    }

    // =========================================================================
    // Overrides and debug
    // =========================================================================

    /// Turn on channel overrides for a session
    pub fn enable_overrides(&mut self, index: usize) -> bool {
        let changed = self.sessions.enable_overrides(&mut self.store, index);
        self.touched(changed)
    }

    /// Turn off channel overrides for a session
    pub fn disable_overrides(&mut self, index: usize) -> bool {
        let changed = self.sessions.disable_overrides(&mut self.store, index);
        self.touched(changed)
    }

    /// Set one channel override
    pub fn set_override(&mut self, index: usize, channel: Channel, on: bool) -> bool {
        let changed = self.sessions.set_override(&mut self.store, index, channel, on);
        self.touched(changed)
    }

    /// Attach or release the debug binding
    pub fn set_debug(&mut self, enabled: bool) -> bool {
        let changed = self.sessions.set_debug(&mut self.store, enabled);
        self.touched(changed)
    }

    // =========================================================================
    // Session fields
    // =========================================================================

    /// A session's value for `key`
    pub fn session_value(&self, index: usize, key: &str) -> Option<&str> {
        self.sessions
            .section(&self.store, index)
            .and_then(|s| s.get(key))
    }

    fn set_session_value(&mut self, index: usize, key: &str, value: &str) -> bool {
        let changed = match self.sessions.section_mut(&mut self.store, index) {
            Some(section) => {
                section.set(key, value);
                true
            }
            None => {
                warn!("Ignoring {} change for missing session {}", key, index + 1);
                false
            }
        };
        self.touched(changed)
    }

    /// Rename a session; `autorun` follows when it named this session
    pub fn rename_session(&mut self, index: usize, name: &str) -> bool {
        if name.trim().is_empty() {
            warn!("Ignoring blank name for session {}", index + 1);
            return false;
        }
        let old = self.session_value(index, "name").map(str::to_string);
        if !self.set_session_value(index, "name", name) {
            return false;
        }
        if let Some(old) = old {
            if self.store.get(GLOBALS_SECTION, "autorun") == Some(old.as_str()) {
                self.store.set(GLOBALS_SECTION, "autorun", name);
            }
        }
        true
    }

    /// Change a session's back-end library
    pub fn set_session_library(&mut self, index: usize, library: Library) -> bool {
        let changed = match self.sessions.section_mut(&mut self.store, index) {
            Some(section) => {
                library.apply(section);
                true
            }
            None => false,
        };
        self.touched(changed)
    }

    /// Change a session's `ip`
    pub fn set_session_ip(&mut self, index: usize, ip: &str) -> bool {
        self.set_session_value(index, "ip", ip)
    }

    /// Change a session's `port`
    pub fn set_session_port(&mut self, index: usize, port: &str) -> bool {
        let changed = self.sessions.set_port(&mut self.store, index, port);
        self.touched(changed)
    }

    /// Change a session's `username`
    pub fn set_session_username(&mut self, index: usize, username: &str) -> bool {
        self.set_session_value(index, "username", username)
    }

    /// Change a session's `password`
    pub fn set_session_password(&mut self, index: usize, password: &str) -> bool {
        self.set_session_value(index, "password", password)
    }

    /// Set or clear a session's `xserverbpp`
    pub fn set_session_server_bpp(&mut self, index: usize, bpp: Option<u8>) -> Result<bool> {
        match bpp {
            Some(bpp) if !SERVER_BPP_VALUES.contains(&bpp) => Err(ConfigError::invalid_value(
                "xserverbpp",
                format!("{} is not one of 15, 16, 24, 32", bpp),
            )),
            Some(bpp) => Ok(self.set_session_value(index, "xserverbpp", &bpp.to_string())),
            None => {
                let changed = self
                    .sessions
                    .section_mut(&mut self.store, index)
                    .map(|s| s.remove("xserverbpp").is_some())
                    .unwrap_or(false);
                Ok(self.touched(changed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
[globals]
autorun=Xvnc

[xrdp1]
name=Xvnc
lib=libvnc.so
ip=127.0.0.1
port=-1
";

    fn load(text: &str) -> XrdpIni {
        XrdpIni::from_text(text).unwrap().0
    }

    #[test]
    fn test_missing_sections_injected() {
        let (ini, notices) = XrdpIni::from_text(MINIMAL).unwrap();

        assert_eq!(
            notices,
            vec![
                LoadNotice::InjectedSection("Logging".to_string()),
                LoadNotice::InjectedSection("channels".to_string()),
            ]
        );
        assert_eq!(ini.store().get("Logging", "LogFile"), Some("xrdp.log"));
        assert_eq!(ini.store().get("channels", "xrdpvr"), Some("true"));
        assert!(!ini.is_dirty());

        // sessions stay at the end of the file
        let order: Vec<_> = ini.store().section_names().collect();
        assert_eq!(order, vec!["globals", "Logging", "channels", "xrdp1"]);
    }

    #[test]
    fn test_unrecognised_file_rejected() {
        let err = XrdpIni::from_text("[globals]\nport=3389\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotRecognised { .. }));
    }

    #[test]
    fn test_unknown_autorun_dropped() {
        let text = MINIMAL.replace("autorun=Xvnc", "autorun=Gone");
        let (ini, notices) = XrdpIni::from_text(&text).unwrap();
        assert!(ini.store().get("globals", "autorun").is_none());
        assert!(notices.contains(&LoadNotice::DroppedAutorun("Gone".to_string())));
    }

    #[test]
    fn test_rename_follows_autorun() {
        let mut ini = load(MINIMAL);
        assert!(ini.rename_session(0, "Desktop"));
        assert_eq!(ini.store().get("globals", "autorun"), Some("Desktop"));
        assert!(ini.is_dirty());

        assert!(!ini.rename_session(0, ""));
        assert!(!ini.rename_session(4, "x"));
    }

    #[test]
    fn test_noop_leaves_document_clean() {
        let mut ini = load(MINIMAL);
        assert!(!ini.delete_session(3));
        assert!(!ini.swap_sessions(0, 0));
        assert!(ini.add_session_from_index("x", 99).is_none());
        assert!(!ini.is_dirty());
    }

    #[test]
    fn test_server_bpp() {
        let mut ini = load(MINIMAL);
        assert!(ini.set_session_server_bpp(0, Some(24)).unwrap());
        assert_eq!(ini.session_value(0, "xserverbpp"), Some("24"));

        assert!(ini.set_session_server_bpp(0, Some(12)).is_err());

        assert!(ini.set_session_server_bpp(0, None).unwrap());
        assert!(ini.session_value(0, "xserverbpp").is_none());
        assert!(!ini.set_session_server_bpp(0, None).unwrap());
    }

    #[test]
    fn test_library_change() {
        let mut ini = load(MINIMAL);
        assert!(ini.set_session_library(0, Library::Xup));
        assert_eq!(ini.session_value(0, "code"), Some("10"));
        assert_eq!(ini.session_value(0, "username"), Some("ask"));
    }

    #[test]
    fn test_version_detection() {
        assert_eq!(load(MINIMAL).version(), IniVersion::Legacy);
        let v1 = MINIMAL.replace("[globals]\n", "[globals]\nini_version=1\n");
        assert_eq!(load(&v1).version(), IniVersion::V1);
    }
}
