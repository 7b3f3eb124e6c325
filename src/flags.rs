//! Boolean flag spellings
//!
//! xrdp and sesman accept several spellings for booleans, but every key has
//! exactly one spelling the editor writes for "on" and one for "off" (or
//! removes the key when off). The table below is shared by readers and
//! writers so output matches what the configuration files conventionally use.

use tracing::warn;

use crate::ini::SectionStore;

/// Three-way state of an optional boolean key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    /// Key absent, the inherited default applies
    #[default]
    Inherit,
    /// Explicitly enabled
    On,
    /// Explicitly disabled
    Off,
}

impl TriState {
    /// Map a boolean to an explicit state
    pub fn from_bool(on: bool) -> Self {
        if on {
            TriState::On
        } else {
            TriState::Off
        }
    }

    /// Explicit value, or `None` for [`TriState::Inherit`]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            TriState::Inherit => None,
            TriState::On => Some(true),
            TriState::Off => Some(false),
        }
    }
}

/// Interpret a boolean value using the spellings xrdp accepts.
///
/// Returns `None` when the value is not a recognised spelling.
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if ["1", "yes", "true"].iter().any(|s| value.eq_ignore_ascii_case(s)) {
        Some(true)
    } else if ["0", "no", "false"].iter().any(|s| value.eq_ignore_ascii_case(s)) {
        Some(false)
    } else {
        None
    }
}

/// Canonical spellings for one boolean key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpelling {
    /// Section holding the key
    pub section: &'static str,
    /// Key name as written
    pub key: &'static str,
    /// Value written when enabled
    pub on: &'static str,
    /// Value written when disabled, `None` removes the key instead
    pub off: Option<&'static str>,
    /// State assumed when the key is absent or unreadable
    pub default: bool,
}

impl FlagSpelling {
    const fn new(
        section: &'static str,
        key: &'static str,
        on: &'static str,
        off: Option<&'static str>,
        default: bool,
    ) -> Self {
        Self {
            section,
            key,
            on,
            off,
            default,
        }
    }

    /// Tri-state as currently stored
    pub fn state(&self, store: &SectionStore) -> TriState {
        match store.get(self.section, self.key) {
            None => TriState::Inherit,
            Some(raw) => match parse_bool(raw) {
                Some(on) => TriState::from_bool(on),
                None => {
                    warn!(
                        "Unrecognised boolean '{}' for [{}] {}, assuming {}",
                        raw, self.section, self.key, self.default
                    );
                    TriState::from_bool(self.default)
                }
            },
        }
    }

    /// Effective value, falling back to the default
    pub fn read(&self, store: &SectionStore) -> bool {
        self.state(store).as_bool().unwrap_or(self.default)
    }

    /// Write the canonical spelling for `on`.
    ///
    /// Returns `false` when the stored text was already that spelling.
    pub fn write(&self, store: &mut SectionStore, on: bool) -> bool {
        match self.spelling(on) {
            Some(value) => store.set(self.section, self.key, value).as_deref() != Some(value),
            None => store.remove(self.section, self.key).is_some(),
        }
    }

    /// Canonical string for `on`, `None` when the key would be removed
    pub fn spelling(&self, on: bool) -> Option<&'static str> {
        if on {
            Some(self.on)
        } else {
            self.off
        }
    }
}

/// xrdp.ini `[globals]` boolean keys
pub mod xrdp {
    use super::FlagSpelling;

    /// `bitmap_cache`
    pub const BITMAP_CACHE: FlagSpelling =
        FlagSpelling::new("globals", "bitmap_cache", "yes", Some("no"), false);
    /// `bitmap_compression`
    pub const BITMAP_COMPRESSION: FlagSpelling =
        FlagSpelling::new("globals", "bitmap_compression", "yes", Some("no"), false);
    /// `bulk_compression`
    pub const BULK_COMPRESSION: FlagSpelling =
        FlagSpelling::new("globals", "bulk_compression", "yes", Some("no"), false);
    /// `channel_code`
    pub const CHANNEL_CODE: FlagSpelling =
        FlagSpelling::new("globals", "channel_code", "1", Some("0"), true);
    /// `fork`
    pub const FORK: FlagSpelling = FlagSpelling::new("globals", "fork", "yes", Some("no"), false);
    /// `hidelogwindow`
    pub const HIDE_LOG_WINDOW: FlagSpelling =
        FlagSpelling::new("globals", "hidelogwindow", "yes", Some("no"), false);
    /// `tcp_nodelay`
    pub const TCP_NODELAY: FlagSpelling =
        FlagSpelling::new("globals", "tcp_nodelay", "yes", Some("no"), false);
    /// `tcp_keepalive`
    pub const TCP_KEEPALIVE: FlagSpelling =
        FlagSpelling::new("globals", "tcp_keepalive", "yes", Some("no"), false);
    /// `require_credentials`, removed when off
    pub const REQUIRE_CREDENTIALS: FlagSpelling =
        FlagSpelling::new("globals", "require_credentials", "yes", None, false);
    /// `allow_multimon`, removed when off
    pub const ALLOW_MULTIMON: FlagSpelling =
        FlagSpelling::new("globals", "allow_multimon", "true", None, false);
    /// `new_cursors`
    pub const NEW_CURSORS: FlagSpelling =
        FlagSpelling::new("globals", "new_cursors", "yes", Some("no"), true);
    /// `[Logging] enablesyslog`
    pub const ENABLE_SYSLOG: FlagSpelling =
        FlagSpelling::new("Logging", "enablesyslog", "yes", Some("no"), false);

    /// Every `[globals]` flag exposed by name
    pub const GLOBALS: &[FlagSpelling] = &[
        BITMAP_CACHE,
        BITMAP_COMPRESSION,
        BULK_COMPRESSION,
        CHANNEL_CODE,
        FORK,
        HIDE_LOG_WINDOW,
        TCP_NODELAY,
        TCP_KEEPALIVE,
        REQUIRE_CREDENTIALS,
        ALLOW_MULTIMON,
        NEW_CURSORS,
    ];

    /// Spelling of `[channels]` defaults and `channel.<name>` overrides
    pub const CHANNEL_ON: &str = "true";
    /// Spelling of a disabled channel
    pub const CHANNEL_OFF: &str = "0";

    /// Look up a `[globals]` flag by key
    pub fn by_key(key: &str) -> Option<FlagSpelling> {
        GLOBALS.iter().copied().find(|f| f.key.eq_ignore_ascii_case(key))
    }
}

/// sesman.ini boolean keys
pub mod sesman {
    use super::FlagSpelling;

    /// `[Globals] EnableUserWindowManager`
    pub const ENABLE_USER_WINDOW_MANAGER: FlagSpelling =
        FlagSpelling::new("Globals", "EnableUserWindowManager", "1", Some("0"), false);
    /// `[Security] AllowRootLogin`
    pub const ALLOW_ROOT_LOGIN: FlagSpelling =
        FlagSpelling::new("Security", "AllowRootLogin", "1", Some("0"), false);
    /// `[Security] AlwaysGroupCheck`
    pub const ALWAYS_GROUP_CHECK: FlagSpelling =
        FlagSpelling::new("Security", "AlwaysGroupCheck", "1", Some("0"), false);
    /// `[Sessions] KillDisconnected`
    pub const KILL_DISCONNECTED: FlagSpelling =
        FlagSpelling::new("Sessions", "KillDisconnected", "1", Some("0"), false);
    /// `[Logging] EnableSyslog`
    pub const ENABLE_SYSLOG: FlagSpelling =
        FlagSpelling::new("Logging", "EnableSyslog", "yes", Some("0"), false);

    /// Every sesman flag exposed by name
    pub const ALL: &[FlagSpelling] = &[
        ENABLE_USER_WINDOW_MANAGER,
        ALLOW_ROOT_LOGIN,
        ALWAYS_GROUP_CHECK,
        KILL_DISCONNECTED,
        ENABLE_SYSLOG,
    ];

    /// Look up a flag by key
    pub fn by_key(key: &str) -> Option<FlagSpelling> {
        ALL.iter().copied().find(|f| f.key.eq_ignore_ascii_case(key))
    }
}
