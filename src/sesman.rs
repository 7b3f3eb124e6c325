//! sesman.ini editing
//!
//! Keys in sesman.ini are case-sensitive and kept exactly as written. The
//! session manager reads `Globals`, `Security`, `Sessions` and `Logging`,
//! plus one parameter section per X server back end.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::document::{DocumentKind, DocumentState, IniDocument};
use crate::error::{ConfigError, Result};
use crate::flags::{self, FlagSpelling};
use crate::ini::SectionStore;
use crate::log_level::LogLevel;

/// Listener settings
pub const GLOBALS_SECTION: &str = "Globals";
/// Login policy
pub const SECURITY_SECTION: &str = "Security";
/// Session limits
pub const SESSIONS_SECTION: &str = "Sessions";
/// sesman's own logging
pub const LOGGING_SECTION: &str = "Logging";

/// Window manager script set when the per-user window manager is enabled
pub const DEFAULT_USER_WINDOW_MANAGER: &str = "startwm.sh";

/// X server back end with its own `paramN` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum XServer {
    /// `[X11rdp]`
    X11rdp,
    /// `[Xvnc]`
    Xvnc,
}

impl XServer {
    /// Every back end
    pub const ALL: [XServer; 2] = [XServer::X11rdp, XServer::Xvnc];

    /// Section holding the parameters
    pub fn section_name(&self) -> &'static str {
        match self {
            XServer::X11rdp => "X11rdp",
            XServer::Xvnc => "Xvnc",
        }
    }
}

impl fmt::Display for XServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section_name())
    }
}

impl FromStr for XServer {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|x| x.section_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfigError::invalid_value("x server", format!("'{}' is not X11rdp or Xvnc", s))
            })
    }
}

/// Numeric settings, each a `(section, key)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Limit {
    /// `[Security] MaxLoginRetry`
    MaxLoginRetry,
    /// `[Sessions] X11DisplayOffset`
    X11DisplayOffset,
    /// `[Sessions] MaxSessions`
    MaxSessions,
    /// `[Sessions] IdleTimeLimit`, seconds
    IdleTimeLimit,
    /// `[Sessions] DisconnectedTimeLimit`, seconds
    DisconnectedTimeLimit,
}

impl Limit {
    /// Every numeric setting
    pub const ALL: [Limit; 5] = [
        Limit::MaxLoginRetry,
        Limit::X11DisplayOffset,
        Limit::MaxSessions,
        Limit::IdleTimeLimit,
        Limit::DisconnectedTimeLimit,
    ];

    /// Where the value lives
    pub fn location(&self) -> (&'static str, &'static str) {
        match self {
            Limit::MaxLoginRetry => (SECURITY_SECTION, "MaxLoginRetry"),
            Limit::X11DisplayOffset => (SESSIONS_SECTION, "X11DisplayOffset"),
            Limit::MaxSessions => (SESSIONS_SECTION, "MaxSessions"),
            Limit::IdleTimeLimit => (SESSIONS_SECTION, "IdleTimeLimit"),
            Limit::DisconnectedTimeLimit => (SESSIONS_SECTION, "DisconnectedTimeLimit"),
        }
    }
}

/// An open sesman.ini
#[derive(Debug, Clone)]
pub struct SesmanIni {
    store: SectionStore,
    state: DocumentState,
}

impl IniDocument for SesmanIni {
    const KIND: DocumentKind = DocumentKind::Sesman;

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

impl SesmanIni {
    /// Open and load a file
    pub fn open(path: &Path) -> Result<Self> {
        let store = DocumentKind::Sesman.read(path)?;
        info!("Opened {} ({} sections)", path.display(), store.len());
        Ok(Self {
            store,
            state: DocumentState::opened(path),
        })
    }

    /// Load from text that has no file behind it yet
    pub fn from_text(text: &str) -> Result<Self> {
        let store = SectionStore::parse(text, DocumentKind::Sesman.key_case())?;
        DocumentKind::Sesman.verify(&store)?;
        Ok(Self {
            store,
            state: DocumentState::default(),
        })
    }

    /// Raw value
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.store.get(section, key)
    }

    fn set_value(&mut self, section: &str, key: &str, value: &str) {
        self.store.set(section, key, value);
        self.state.mark_dirty();
        debug!("[{}] {}={}", section, key, value);
    }

    // =========================================================================
    // Globals
    // =========================================================================

    /// Address sesman listens on
    pub fn listen_address(&self) -> Option<&str> {
        self.value(GLOBALS_SECTION, "ListenAddress")
    }

    /// Change the listen address
    pub fn set_listen_address(&mut self, address: &str) -> Result<()> {
        address.trim().parse::<IpAddr>().map_err(|_| {
            ConfigError::invalid_value(
                "ListenAddress",
                format!("'{}' is not an IP address", address),
            )
        })?;
        self.set_value(GLOBALS_SECTION, "ListenAddress", address.trim());
        Ok(())
    }

    /// Port sesman listens on
    pub fn listen_port(&self) -> Option<u16> {
        self.value(GLOBALS_SECTION, "ListenPort")
            .and_then(|p| p.trim().parse().ok())
    }

    /// Change the listen port
    pub fn set_listen_port(&mut self, port: u16) -> Result<()> {
        if port == 0 {
            return Err(ConfigError::invalid_value(
                "ListenPort",
                "port must be between 1 and 65535",
            ));
        }
        self.set_value(GLOBALS_SECTION, "ListenPort", &port.to_string());
        Ok(())
    }

    /// Whether users may supply their own window manager script
    pub fn user_window_manager_enabled(&self) -> bool {
        self.flag(flags::sesman::ENABLE_USER_WINDOW_MANAGER)
    }

    /// Toggle the per-user window manager.
    ///
    /// Enabling writes `UserWindowManager=startwm.sh`; disabling removes it.
    pub fn set_user_window_manager_enabled(&mut self, on: bool) -> bool {
        let mut changed = self.set_flag(flags::sesman::ENABLE_USER_WINDOW_MANAGER, on);
        let script = if on {
            self.store
                .set(GLOBALS_SECTION, "UserWindowManager", DEFAULT_USER_WINDOW_MANAGER)
                .as_deref()
                != Some(DEFAULT_USER_WINDOW_MANAGER)
        } else {
            self.store.remove(GLOBALS_SECTION, "UserWindowManager").is_some()
        };
        if script {
            self.state.mark_dirty();
            changed = true;
        }
        changed
    }

    /// Per-user window manager script
    pub fn user_window_manager(&self) -> Option<&str> {
        self.value(GLOBALS_SECTION, "UserWindowManager")
    }

    /// Change the per-user script; ignored while the feature is off
    pub fn set_user_window_manager(&mut self, script: &str) -> bool {
        if !self.user_window_manager_enabled() {
            warn!("Ignoring UserWindowManager change, EnableUserWindowManager is off");
            return false;
        }
        self.set_value(GLOBALS_SECTION, "UserWindowManager", script);
        true
    }

    /// System-wide window manager script
    pub fn default_window_manager(&self) -> Option<&str> {
        self.value(GLOBALS_SECTION, "DefaultWindowManager")
    }

    /// Change the system-wide script
    pub fn set_default_window_manager(&mut self, script: &str) {
        self.set_value(GLOBALS_SECTION, "DefaultWindowManager", script);
    }

    // =========================================================================
    // Security and sessions
    // =========================================================================

    /// Users allowed to log in through xrdp
    pub fn terminal_server_users(&self) -> Option<&str> {
        self.value(SECURITY_SECTION, "TerminalServerUsers")
    }

    /// Change the users group
    pub fn set_terminal_server_users(&mut self, group: &str) {
        self.set_value(SECURITY_SECTION, "TerminalServerUsers", group);
    }

    /// Administrators group
    pub fn terminal_server_admins(&self) -> Option<&str> {
        self.value(SECURITY_SECTION, "TerminalServerAdmins")
    }

    /// Change the administrators group
    pub fn set_terminal_server_admins(&mut self, group: &str) {
        self.set_value(SECURITY_SECTION, "TerminalServerAdmins", group);
    }

    /// A numeric setting; `None` when absent or not a number
    pub fn limit(&self, limit: Limit) -> Option<u32> {
        let (section, key) = limit.location();
        self.value(section, key).and_then(|v| v.trim().parse().ok())
    }

    /// Change a numeric setting
    pub fn set_limit(&mut self, limit: Limit, value: u32) {
        let (section, key) = limit.location();
        self.set_value(section, key, &value.to_string());
    }

    /// Effective value of a boolean key
    pub fn flag(&self, spelling: FlagSpelling) -> bool {
        spelling.read(&self.store)
    }

    /// Write a boolean key using its canonical spelling, `false` if unchanged
    pub fn set_flag(&mut self, spelling: FlagSpelling, on: bool) -> bool {
        if !spelling.write(&mut self.store, on) {
            return false;
        }
        self.state.mark_dirty();
        debug!("[{}] {} -> {}", spelling.section, spelling.key, on);
        true
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Log file path
    pub fn log_file(&self) -> Option<&str> {
        self.value(LOGGING_SECTION, "LogFile")
    }

    /// Change the log file path
    pub fn set_log_file(&mut self, path: &str) {
        self.set_value(LOGGING_SECTION, "LogFile", path);
    }

    /// Log level
    pub fn log_level(&self) -> Option<LogLevel> {
        self.value(LOGGING_SECTION, "LogLevel")
            .and_then(|v| v.parse().ok())
    }

    /// Change the log level, lowering the syslog level to match if needed
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.set_value(LOGGING_SECTION, "LogLevel", level.as_str());
        if let Some(syslog) = self.syslog_level() {
            let clamped = level.clamp_syslog(syslog);
            if clamped != syslog {
                self.store.set(LOGGING_SECTION, "SyslogLevel", clamped.as_str());
            }
        }
    }

    /// Whether sesman also logs to syslog
    pub fn syslog_enabled(&self) -> bool {
        self.flag(flags::sesman::ENABLE_SYSLOG)
    }

    /// Turn syslog on or off; off removes `SyslogLevel`
    pub fn set_syslog_enabled(&mut self, on: bool) -> bool {
        let mut changed = self.set_flag(flags::sesman::ENABLE_SYSLOG, on);
        let level = if on {
            let log = self.log_level().unwrap_or(LogLevel::Debug);
            let syslog = log.clamp_syslog(self.syslog_level().unwrap_or(log));
            self.store
                .set(LOGGING_SECTION, "SyslogLevel", syslog.as_str())
                .as_deref()
                != Some(syslog.as_str())
        } else {
            self.store.remove(LOGGING_SECTION, "SyslogLevel").is_some()
        };
        if level {
            self.state.mark_dirty();
            changed = true;
        }
        changed
    }

    /// Syslog level
    pub fn syslog_level(&self) -> Option<LogLevel> {
        self.value(LOGGING_SECTION, "SyslogLevel")
            .and_then(|v| v.parse().ok())
    }

    /// Change the syslog level, clamped to the log level.
    ///
    /// Ignored while syslog is disabled. Returns the level written.
    pub fn set_syslog_level(&mut self, level: LogLevel) -> Option<LogLevel> {
        if !self.syslog_enabled() {
            warn!("Ignoring SyslogLevel change, syslog is disabled");
            return None;
        }
        let clamped = self
            .log_level()
            .map(|log| log.clamp_syslog(level))
            .unwrap_or(level);
        self.set_value(LOGGING_SECTION, "SyslogLevel", clamped.as_str());
        Some(clamped)
    }

    // =========================================================================
    // X server parameters
    // =========================================================================

    /// Command line of an X server, the `paramN` values joined by spaces
    pub fn params(&self, server: XServer) -> String {
        self.store
            .section(server.section_name())
            .map(|section| {
                section
                    .iter()
                    .filter(|(key, _)| key.starts_with("param"))
                    .map(|(_, value)| value)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Replace an X server's parameters with the words of `line`.
    ///
    /// Every existing key of the section is removed first, so an empty line
    /// leaves the section empty. Returns `false` when the section already
    /// held exactly those parameters.
    pub fn set_params(&mut self, server: XServer, line: &str) -> bool {
        let existed = self.store.has_section(server.section_name());
        let section = self.store.ensure_section(server.section_name());
        let before: Vec<(String, String)> = section
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        section.clear();
        for (i, word) in line.split_whitespace().enumerate() {
            section.set(&format!("param{}", i + 1), word);
        }
        let unchanged = existed
            && section.len() == before.len()
            && section
                .iter()
                .zip(&before)
                .all(|((k, v), (bk, bv))| k == bk && v == bv);
        if unchanged {
            return false;
        }
        self.state.mark_dirty();
        debug!("[{}] {} parameters", server, line.split_whitespace().count());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESMAN: &str = "\
[Globals]
ListenAddress=127.0.0.1
ListenPort=3350
EnableUserWindowManager=1
UserWindowManager=startwm.sh
DefaultWindowManager=startwm.sh

[Security]
AllowRootLogin=1
MaxLoginRetry=4
TerminalServerUsers=tsusers
TerminalServerAdmins=tsadmins
AlwaysGroupCheck=false

[Sessions]
X11DisplayOffset=10
MaxSessions=50
KillDisconnected=0
IdleTimeLimit=0
DisconnectedTimeLimit=0

[Logging]
LogFile=xrdp-sesman.log
LogLevel=DEBUG
EnableSyslog=1
SyslogLevel=DEBUG

[X11rdp]
param1=-bs
param2=-ac
param3=-nolisten
param4=tcp

[Xvnc]
param1=-bs
param2=-ac
";

    fn load() -> SesmanIni {
        SesmanIni::from_text(SESMAN).unwrap()
    }

    #[test]
    fn test_typed_reads() {
        let ini = load();
        assert_eq!(ini.listen_address(), Some("127.0.0.1"));
        assert_eq!(ini.listen_port(), Some(3350));
        assert!(ini.user_window_manager_enabled());
        assert!(ini.flag(flags::sesman::ALLOW_ROOT_LOGIN));
        assert!(!ini.flag(flags::sesman::ALWAYS_GROUP_CHECK));
        assert!(!ini.flag(flags::sesman::KILL_DISCONNECTED));
        assert_eq!(ini.limit(Limit::MaxSessions), Some(50));
        assert_eq!(ini.limit(Limit::MaxLoginRetry), Some(4));
        assert_eq!(ini.terminal_server_users(), Some("tsusers"));
        assert_eq!(ini.log_level(), Some(LogLevel::Debug));
        assert!(ini.syslog_enabled());
        assert!(!ini.is_dirty());
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let ini = load();
        assert!(ini.value("Globals", "listenport").is_none());
    }

    #[test]
    fn test_user_window_manager_toggle() {
        let mut ini = load();
        ini.set_user_window_manager_enabled(false);
        assert_eq!(ini.value("Globals", "EnableUserWindowManager"), Some("0"));
        assert!(ini.user_window_manager().is_none());
        assert!(!ini.set_user_window_manager("mywm.sh"));

        ini.set_user_window_manager_enabled(true);
        assert_eq!(ini.user_window_manager(), Some("startwm.sh"));
        assert!(ini.set_user_window_manager("mywm.sh"));
        assert_eq!(ini.user_window_manager(), Some("mywm.sh"));
        assert!(ini.is_dirty());
    }

    #[test]
    fn test_syslog_spelling_and_clamp() {
        let mut ini = load();
        ini.set_log_level(LogLevel::Warning);
        assert_eq!(ini.syslog_level(), Some(LogLevel::Warning));

        ini.set_syslog_enabled(false);
        assert_eq!(ini.value("Logging", "EnableSyslog"), Some("0"));
        assert!(ini.value("Logging", "SyslogLevel").is_none());

        ini.set_syslog_enabled(true);
        assert_eq!(ini.value("Logging", "EnableSyslog"), Some("yes"));
        assert_eq!(ini.set_syslog_level(LogLevel::Debug), Some(LogLevel::Warning));
    }

    #[test]
    fn test_params_round_trip() {
        let mut ini = load();
        assert_eq!(ini.params(XServer::X11rdp), "-bs -ac -nolisten tcp");

        ini.set_params(XServer::Xvnc, "  -bs   -ac -nolisten tcp -localhost ");
        let section = ini.store().section("Xvnc").unwrap();
        let keys: Vec<_> = section.keys().collect();
        assert_eq!(keys, vec!["param1", "param2", "param3", "param4", "param5"]);
        assert_eq!(section.get("param5"), Some("-localhost"));

        ini.set_params(XServer::X11rdp, "");
        assert!(ini.store().section("X11rdp").unwrap().is_empty());
        assert_eq!(ini.params(XServer::X11rdp), "");
    }

    #[test]
    fn test_unchanged_writes_keep_document_clean() {
        let mut ini = load();
        assert!(!ini.set_flag(flags::sesman::ALLOW_ROOT_LOGIN, true));
        assert!(!ini.set_user_window_manager_enabled(true));
        assert!(!ini.set_params(XServer::X11rdp, "-bs  -ac -nolisten tcp"));
        assert!(!ini.is_dirty());

        // `1` is rewritten as `yes` once
        assert!(ini.set_syslog_enabled(true));
        assert!(ini.is_dirty());
        assert!(!ini.set_syslog_enabled(true));
        assert!(ini.set_flag(flags::sesman::KILL_DISCONNECTED, true));
    }

    #[test]
    fn test_set_params_on_missing_section_is_a_change() {
        let mut ini = SesmanIni::from_text("[Globals]\n[Security]\n[Sessions]\n").unwrap();
        assert!(ini.set_params(XServer::Xvnc, ""));
        assert!(ini.store().has_section("Xvnc"));
        assert!(ini.is_dirty());
    }

    #[test]
    fn test_setters_validate() {
        let mut ini = load();
        assert!(ini.set_listen_port(0).is_err());
        assert!(ini.set_listen_address("localhost:3350").is_err());
        assert!(!ini.is_dirty());

        ini.set_limit(Limit::IdleTimeLimit, 600);
        assert_eq!(ini.value("Sessions", "IdleTimeLimit"), Some("600"));
    }

    #[test]
    fn test_unrecognised_file_rejected() {
        let err = SesmanIni::from_text("[Globals]\nListenPort=3350\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotRecognised { .. }));
    }
}
