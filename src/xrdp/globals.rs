//! `[globals]`, `[Logging]` and `[channels]` settings of xrdp.ini

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use tracing::{debug, warn};

use super::overrides::{Channel, ChannelDefaults};
use super::XrdpIni;
use crate::error::{ConfigError, Result};
use crate::flags::{self, FlagSpelling};
use crate::ini::SectionStore;
use crate::log_level::LogLevel;

/// Section holding server-wide settings
pub const GLOBALS_SECTION: &str = "globals";

/// Section holding xrdp's own logging settings
pub const LOGGING_SECTION: &str = "Logging";

/// Listen address used when none is configured
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Listen port used when none is configured
pub const DEFAULT_PORT: &str = "3389";

/// Valid `max_bpp` values
pub const MAX_BPP_VALUES: [u8; 5] = [8, 15, 16, 24, 32];

pub(super) fn insert_default_logging(store: &mut SectionStore) {
    let section = store.ensure_section(LOGGING_SECTION);
    section.set("logfile", "xrdp.log");
    section.set("loglevel", "DEBUG");
    section.set("enablesyslog", "1");
    section.set("sysloglevel", "DEBUG");
}

/// RDP encryption level
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptLevel {
    /// Client to server only
    Low,
    /// Both directions, 56-bit
    Medium,
    /// Both directions, 128-bit
    High,
    /// FIPS 140-1 compliant
    Fips,
}

impl CryptLevel {
    /// Every level
    pub const ALL: [CryptLevel; 4] = [
        CryptLevel::Low,
        CryptLevel::Medium,
        CryptLevel::High,
        CryptLevel::Fips,
    ];

    /// Value written to `crypt_level`
    pub fn as_str(&self) -> &'static str {
        match self {
            CryptLevel::Low => "low",
            CryptLevel::Medium => "medium",
            CryptLevel::High => "high",
            CryptLevel::Fips => "fips",
        }
    }
}

impl fmt::Display for CryptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ConfigError::invalid_value("crypt_level", format!("unknown level '{}'", s))
            })
    }
}

impl XrdpIni {
    /// Raw `[globals]` value
    pub fn global(&self, key: &str) -> Option<&str> {
        self.store.get(GLOBALS_SECTION, key)
    }

    fn set_global(&mut self, key: &str, value: &str) {
        self.store.set(GLOBALS_SECTION, key, value);
        self.state.mark_dirty();
        debug!("[{}] {}={}", GLOBALS_SECTION, key, value);
    }

    fn remove_global(&mut self, key: &str) -> bool {
        let removed = self.store.remove(GLOBALS_SECTION, key).is_some();
        self.touched(removed)
    }

    /// Listen address
    pub fn address(&self) -> &str {
        self.global("address").unwrap_or(DEFAULT_ADDRESS)
    }

    /// Change the listen address
    pub fn set_address(&mut self, address: &str) -> Result<()> {
        address
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::invalid_value(
                    "address",
                    format!("'{}' is not an IP address", address),
                )
            })?;
        self.set_global("address", address.trim());
        Ok(())
    }

    /// Listen port
    pub fn port(&self) -> &str {
        self.global("port").unwrap_or(DEFAULT_PORT)
    }

    /// Change the listen port
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        if port == 0 {
            return Err(ConfigError::invalid_value("port", "port must be between 1 and 65535"));
        }
        self.set_global("port", &port.to_string());
        Ok(())
    }

    /// Maximum colour depth offered to clients
    pub fn max_bpp(&self) -> Option<u8> {
        self.global("max_bpp").and_then(|v| v.trim().parse().ok())
    }

    /// Change the maximum colour depth
    pub fn set_max_bpp(&mut self, bpp: u8) -> Result<()> {
        if !MAX_BPP_VALUES.contains(&bpp) {
            return Err(ConfigError::invalid_value(
                "max_bpp",
                format!("{} is not one of 8, 15, 16, 24, 32", bpp),
            ));
        }
        self.set_global("max_bpp", &bpp.to_string());
        Ok(())
    }

    /// Encryption level
    pub fn crypt_level(&self) -> Option<CryptLevel> {
        self.global("crypt_level").and_then(|v| v.parse().ok())
    }

    /// Change the encryption level
    pub fn set_crypt_level(&mut self, level: CryptLevel) {
        self.set_global("crypt_level", level.as_str());
    }

    /// Session started automatically without showing the login window
    pub fn autorun(&self) -> Option<&str> {
        self.global("autorun").filter(|a| !a.is_empty())
    }

    /// Change or clear the autorun session; it must name an existing session
    pub fn set_autorun(&mut self, name: Option<&str>) -> Result<()> {
        match name {
            Some(name) => {
                if self.sessions.find_by_name(&self.store, name).is_none() {
                    return Err(ConfigError::invalid_value(
                        "autorun",
                        format!("no session is named '{}'", name),
                    ));
                }
                self.set_global("autorun", name);
            }
            None => {
                self.remove_global("autorun");
            }
        }
        Ok(())
    }

    /// Custom text shown when PAM authentication fails
    pub fn pam_error_text(&self) -> Option<&str> {
        self.global("pamerrortxt")
    }

    /// Change or remove the PAM error text
    pub fn set_pam_error_text(&mut self, text: Option<&str>) {
        match text {
            Some(text) => self.set_global("pamerrortxt", text),
            None => {
                self.remove_global("pamerrortxt");
            }
        }
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

    /// Global default for a channel
    pub fn channel_default(&self, channel: Channel) -> bool {
        ChannelDefaults::read(&self.store).get(channel)
    }

    /// Change a channel's global default
    pub fn set_channel_default(&mut self, channel: Channel, on: bool) {
        ChannelDefaults::write(&mut self.store, channel, on);
        self.state.mark_dirty();
    }

    // =========================================================================
    // Logging
    // =========================================================================

    /// Log file path
    pub fn log_file(&self) -> Option<&str> {
        self.store.get(LOGGING_SECTION, "logfile")
    }

    /// Change the log file path
    pub fn set_log_file(&mut self, path: &str) {
        self.store.set(LOGGING_SECTION, "logfile", path);
        self.state.mark_dirty();
    }

    /// Log level
    pub fn log_level(&self) -> Option<LogLevel> {
        self.store
            .get(LOGGING_SECTION, "loglevel")
            .and_then(|v| v.parse().ok())
    }

    /// Change the log level, lowering the syslog level to match if needed
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.store.set(LOGGING_SECTION, "loglevel", level.as_str());
        if let Some(syslog) = self.syslog_level() {
            let clamped = level.clamp_syslog(syslog);
            if clamped != syslog {
                self.store.set(LOGGING_SECTION, "sysloglevel", clamped.as_str());
            }
        }
        self.state.mark_dirty();
    }

    /// Whether xrdp also logs to syslog
    pub fn syslog_enabled(&self) -> bool {
        self.flag(flags::xrdp::ENABLE_SYSLOG)
    }

    /// Turn syslog on or off.
    ///
    /// Turning it off removes `sysloglevel`; turning it on writes a level no
    /// more verbose than the log level.
    pub fn set_syslog_enabled(&mut self, on: bool) -> bool {
        let mut changed = self.set_flag(flags::xrdp::ENABLE_SYSLOG, on);
        let level = if on {
            let log = self.log_level().unwrap_or(LogLevel::Debug);
            let syslog = log.clamp_syslog(self.syslog_level().unwrap_or(log));
            self.store
                .set(LOGGING_SECTION, "sysloglevel", syslog.as_str())
                .as_deref()
                != Some(syslog.as_str())
        } else {
            self.store.remove(LOGGING_SECTION, "sysloglevel").is_some()
        };
        if level {
            self.state.mark_dirty();
            changed = true;
        }
        changed
    }

    /// Syslog level
    pub fn syslog_level(&self) -> Option<LogLevel> {
        self.store
            .get(LOGGING_SECTION, "sysloglevel")
            .and_then(|v| v.parse().ok())
    }

    /// Change the syslog level, clamped to the log level.
    ///
    /// Ignored while syslog is disabled. Returns the level written.
    pub fn set_syslog_level(&mut self, level: LogLevel) -> Option<LogLevel> {
        if !self.syslog_enabled() {
            warn!("Ignoring syslog level change, syslog is disabled");
            return None;
        }
        let clamped = self
            .log_level()
            .map(|log| log.clamp_syslog(level))
            .unwrap_or(level);
        self.store.set(LOGGING_SECTION, "sysloglevel", clamped.as_str());
        self.state.mark_dirty();
        Some(clamped)
    }
}
