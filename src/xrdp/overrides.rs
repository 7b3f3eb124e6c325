//! Per-session channel overrides
//!
//! xrdp enables six optional virtual channels globally in `[channels]`.
//! A session may override each one with a `channel.<name>` key. The keys
//! exist only while overrides are enabled for that session.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::flags::{parse_bool, xrdp::CHANNEL_OFF, xrdp::CHANNEL_ON, TriState};
use crate::ini::{Section, SectionStore};

/// Section holding the global channel defaults
pub const CHANNELS_SECTION: &str = "channels";

/// Optional virtual channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Device redirection
    Rdpdr,
    /// Sound
    Rdpsnd,
    /// Dynamic virtual channels
    Drdynvc,
    /// Clipboard
    Cliprdr,
    /// Remote application integration
    Rail,
    /// Video redirection
    Xrdpvr,
}

impl Channel {
    /// Every channel, in file order
    pub const ALL: [Channel; 6] = [
        Channel::Rdpdr,
        Channel::Rdpsnd,
        Channel::Drdynvc,
        Channel::Cliprdr,
        Channel::Rail,
        Channel::Xrdpvr,
    ];

    /// Key used in `[channels]`
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Rdpdr => "rdpdr",
            Channel::Rdpsnd => "rdpsnd",
            Channel::Drdynvc => "drdynvc",
            Channel::Cliprdr => "cliprdr",
            Channel::Rail => "rail",
            Channel::Xrdpvr => "xrdpvr",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Channel::Rdpdr => "device redirection",
            Channel::Rdpsnd => "sound",
            Channel::Drdynvc => "dynamic virtual channels",
            Channel::Cliprdr => "clipboard",
            Channel::Rail => "remote applications",
            Channel::Xrdpvr => "video redirection",
        }
    }

    /// Key used for a session override
    pub fn override_key(&self) -> String {
        format!("channel.{}", self.name())
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("channel.").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ConfigError::invalid_value("channel", format!("unknown channel '{}'", s))
            })
    }
}

/// Global channel defaults read from `[channels]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDefaults([bool; 6]);

impl ChannelDefaults {
    /// Read the defaults; a missing key counts as enabled
    pub fn read(store: &SectionStore) -> Self {
        let mut values = [true; 6];
        for channel in Channel::ALL {
            if let Some(raw) = store.get(CHANNELS_SECTION, channel.name()) {
                values[channel.slot()] = parse_bool(raw).unwrap_or(false);
            }
        }
        Self(values)
    }

    /// Default for one channel
    pub fn get(&self, channel: Channel) -> bool {
        self.0[channel.slot()]
    }

    /// Write a global default
    pub fn write(store: &mut SectionStore, channel: Channel, on: bool) {
        store.set(
            CHANNELS_SECTION,
            channel.name(),
            if on { CHANNEL_ON } else { CHANNEL_OFF },
        );
    }

    /// Append a `[channels]` section enabling every channel
    pub fn insert_default_section(store: &mut SectionStore) {
        let section = store.ensure_section(CHANNELS_SECTION);
        for channel in Channel::ALL {
            section.set(channel.name(), CHANNEL_ON);
        }
    }
}

/// Override state of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ChannelOverrides {
    enabled: bool,
    flags: [TriState; 6],
}

impl ChannelOverrides {
    /// Derive the state from a session section.
    ///
    /// Overrides count as enabled when any `channel.*` key is present.
    pub fn from_section(section: &Section) -> Self {
        let mut overrides = Self::default();
        for channel in Channel::ALL {
            if let Some(raw) = section.get(&channel.override_key()) {
                overrides.enabled = true;
                overrides.flags[channel.slot()] =
                    TriState::from_bool(parse_bool(raw).unwrap_or(false));
            }
        }
        overrides
    }

    /// Whether the session overrides the global defaults
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// All six tracked states, in [`Channel::ALL`] order
    pub fn flags(&self) -> &[TriState; 6] {
        &self.flags
    }

    /// Tracked state of one channel
    pub fn flag(&self, channel: Channel) -> TriState {
        self.flags[channel.slot()]
    }

    /// Turn overrides on, seeding missing keys from the global defaults
    pub(crate) fn enable(&mut self, section: &mut Section, defaults: &ChannelDefaults) {
        for channel in Channel::ALL {
            let key = channel.override_key();
            let slot = channel.slot();

            let on = match (section.get(&key), self.flags[slot].as_bool()) {
                (None, _) => defaults.get(channel),
                (Some(_), Some(tracked)) => tracked,
                (Some(raw), None) => parse_bool(raw).unwrap_or(false),
            };

            section.set(&key, if on { CHANNEL_ON } else { CHANNEL_OFF });
            self.flags[slot] = TriState::from_bool(on);
        }
        self.enabled = true;
        debug!("Enabled channel overrides for [{}]", section.name());
    }

    /// Turn overrides off, removing every override key
    pub(crate) fn disable(&mut self, section: &mut Section) {
        for channel in Channel::ALL {
            section.remove(&channel.override_key());
        }
        self.flags = [TriState::Off; 6];
        self.enabled = false;
        debug!("Disabled channel overrides for [{}]", section.name());
    }

    /// Set one override; ignored while overrides are disabled
    pub(crate) fn set(&mut self, section: &mut Section, channel: Channel, on: bool) -> bool {
        if !self.enabled {
            warn!(
                "Ignoring {} override for [{}], overrides are disabled",
                channel,
                section.name()
            );
            return false;
        }
        section.set(
            &channel.override_key(),
            if on { CHANNEL_ON } else { CHANNEL_OFF },
        );
        self.flags[channel.slot()] = TriState::from_bool(on);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::KeyCase;

    fn store_with_channels(values: &[(&str, &str)]) -> SectionStore {
        let mut store = SectionStore::new(KeyCase::Insensitive);
        for (k, v) in values {
            store.set(CHANNELS_SECTION, k, *v);
        }
        store
    }

    #[test]
    fn test_enable_seeds_from_globals() {
        let store = store_with_channels(&[("rdpdr", "true"), ("rdpsnd", "0"), ("rail", "no")]);
        let defaults = ChannelDefaults::read(&store);
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        let mut overrides = ChannelOverrides::default();

        overrides.enable(&mut section, &defaults);

        assert!(overrides.is_enabled());
        assert_eq!(section.get("channel.rdpdr"), Some("true"));
        assert_eq!(overrides.flag(Channel::Rdpdr), TriState::On);
        assert_eq!(section.get("channel.rdpsnd"), Some("0"));
        assert_eq!(section.get("channel.rail"), Some("0"));
        assert_eq!(overrides.flag(Channel::Rail), TriState::Off);
        // absent globals default to enabled
        assert_eq!(section.get("channel.xrdpvr"), Some("true"));
    }

    #[test]
    fn test_enable_keeps_existing_overrides() {
        let store = store_with_channels(&[("cliprdr", "true")]);
        let defaults = ChannelDefaults::read(&store);
        let mut section = Section::new("xrdp2", KeyCase::Insensitive);
        section.set("channel.cliprdr", "false");
        let mut overrides = ChannelOverrides::from_section(&section);

        overrides.enable(&mut section, &defaults);

        assert_eq!(section.get("channel.cliprdr"), Some("0"));
        assert_eq!(overrides.flag(Channel::Cliprdr), TriState::Off);
    }

    #[test]
    fn test_disable_removes_keys() {
        let defaults = ChannelDefaults::read(&store_with_channels(&[]));
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        section.set("name", "x");
        let mut overrides = ChannelOverrides::default();
        overrides.enable(&mut section, &defaults);
        assert_eq!(section.len(), 7);

        overrides.disable(&mut section);

        assert!(!overrides.is_enabled());
        assert_eq!(section.len(), 1);
        assert!(overrides.flags().iter().all(|f| *f == TriState::Off));
    }

    #[test]
    fn test_set_requires_enabled() {
        let defaults = ChannelDefaults::read(&store_with_channels(&[]));
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        let mut overrides = ChannelOverrides::default();

        assert!(!overrides.set(&mut section, Channel::Rail, true));
        assert!(section.is_empty());

        overrides.enable(&mut section, &defaults);
        assert!(overrides.set(&mut section, Channel::Rail, false));
        assert_eq!(section.get("channel.rail"), Some("0"));
        assert_eq!(overrides.flag(Channel::Rail), TriState::Off);
    }

    #[test]
    fn test_from_section_detects_any_key() {
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        assert!(!ChannelOverrides::from_section(&section).is_enabled());

        section.set("channel.drdynvc", "0");
        let overrides = ChannelOverrides::from_section(&section);
        assert!(overrides.is_enabled());
        assert_eq!(overrides.flag(Channel::Drdynvc), TriState::Off);
        assert_eq!(overrides.flag(Channel::Rdpdr), TriState::Inherit);
    }

    #[test]
    fn test_enable_writes_canonical_spelling() {
        let store = store_with_channels(&[("rdpdr", "yes"), ("rdpsnd", "FALSE"), ("cliprdr", "1")]);
        let defaults = ChannelDefaults::read(&store);
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        section.set("channel.rail", "no");
        let mut overrides = ChannelOverrides::from_section(&section);
        assert!(overrides.is_enabled());

        overrides.enable(&mut section, &defaults);

        assert_eq!(section.get("channel.rdpdr"), Some("true"));
        assert_eq!(section.get("channel.rdpsnd"), Some("0"));
        assert_eq!(section.get("channel.cliprdr"), Some("true"));
        assert_eq!(section.get("channel.rail"), Some("0"));
        assert_eq!(overrides.flag(Channel::Rail), TriState::Off);
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("cliprdr".parse::<Channel>().unwrap(), Channel::Cliprdr);
        assert_eq!("channel.rail".parse::<Channel>().unwrap(), Channel::Rail);
        assert!("usb".parse::<Channel>().is_err());
    }
}
