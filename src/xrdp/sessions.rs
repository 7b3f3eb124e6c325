//! Session Sequencer
//!
//! Sessions are the `[xrdpN]` sections of xrdp.ini. Their order is the order
//! of [`SessionEntry`] records held here; a session's section name is always
//! derived from its position, so after every operation the store holds
//! exactly `xrdp1..xrdpN` with no gaps.
//!
//! Renumbering never renames in place: a section is taken out of the store
//! and appended again under its new name, so session sections end up
//! together at the end of the file.
//!
//! Invalid indices are not errors. They are logged and ignored, and the
//! operation reports that nothing happened.

use tracing::{debug, info, warn};

use super::debug::{DebugBinding, DEBUG_POSITION};
use super::overrides::{Channel, ChannelDefaults, ChannelOverrides};
use super::templates::ConnectionType;
use crate::ini::{Section, SectionStore};

/// Prefix shared by session section names
pub const SESSION_PREFIX: &str = "xrdp";

/// Section name of the session at a 0-based position
pub fn session_section_name(index: usize) -> String {
    format!("{}{}", SESSION_PREFIX, index + 1)
}

/// Whether a section name is `xrdp` followed by a positive number
pub fn is_session_section(name: &str) -> bool {
    name.strip_prefix(SESSION_PREFIX)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|n| n.parse::<u64>().ok())
        .is_some_and(|n| n > 0)
}

/// One session's bookkeeping. Keys live in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionEntry {
    overrides: ChannelOverrides,
}

impl SessionEntry {
    /// Channel override state
    pub fn overrides(&self) -> &ChannelOverrides {
        &self.overrides
    }
}

/// Read-only view of a session, for listings
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionSummary {
    /// 1-based position
    pub position: usize,
    /// Section name
    pub section: String,
    /// `name` value
    pub name: String,
    /// `lib` value
    pub lib: Option<String>,
    /// `ip` value
    pub ip: Option<String>,
    /// `port` value
    pub port: Option<String>,
    /// Override state
    pub overrides: ChannelOverrides,
    /// Whether this session holds the debug binding
    pub debug: bool,
}

/// Ordered sessions plus the debug binding
#[derive(Debug, Clone, Default)]
pub struct SessionSequencer {
    entries: Vec<SessionEntry>,
    debug: DebugBinding,
}

impl SessionSequencer {
    /// Build the sequence from a freshly parsed store.
    ///
    /// Session sections are taken in file order and renumbered to
    /// `xrdp1..xrdpN`. A first session pointing at the debug socket is
    /// recognised as holding the debug binding.
    pub fn load(store: &mut SectionStore) -> Self {
        let names: Vec<String> = store
            .section_names()
            .filter(|n| is_session_section(n))
            .map(str::to_string)
            .collect();

        let sections: Vec<Section> = names
            .iter()
            .filter_map(|n| store.remove_section(n))
            .collect();

        let mut sequencer = Self::default();
        for (index, mut section) in sections.into_iter().enumerate() {
            section.set_name(session_section_name(index));
            if index == DEBUG_POSITION && sequencer.debug.detect(&mut section) {
                debug!("Debug binding detected on [{}]", section.name());
            }
            sequencer.entries.push(SessionEntry {
                overrides: ChannelOverrides::from_section(&section),
            });
            store.push_section(section);
        }

        debug!("Loaded {} sessions", sequencer.entries.len());
        sequencer
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no sessions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    /// Entry at a position
    pub fn entry(&self, index: usize) -> Option<&SessionEntry> {
        self.entries.get(index)
    }

    /// Debug binding
    pub fn debug(&self) -> &DebugBinding {
        &self.debug
    }

    fn check_index(&self, index: usize, operation: &str) -> bool {
        if index < self.entries.len() {
            true
        } else {
            warn!(
                "Ignoring {} for session index {}, there are {} sessions",
                operation,
                index,
                self.entries.len()
            );
            false
        }
    }

    fn locate<'a>(
        &'a mut self,
        store: &'a mut SectionStore,
        index: usize,
    ) -> Option<(&'a mut SessionEntry, &'a mut Section)> {
        let entry = self.entries.get_mut(index)?;
        let section = store.section_mut(&session_section_name(index))?;
        Some((entry, section))
    }

    /// Session section at a position
    pub fn section<'a>(&self, store: &'a SectionStore, index: usize) -> Option<&'a Section> {
        if index < self.entries.len() {
            store.section(&session_section_name(index))
        } else {
            None
        }
    }

    /// Mutable session section at a position
    pub fn section_mut<'a>(
        &self,
        store: &'a mut SectionStore,
        index: usize,
    ) -> Option<&'a mut Section> {
        if index < self.entries.len() {
            store.section_mut(&session_section_name(index))
        } else {
            None
        }
    }

    /// `name` values in order, as offered by the autorun selector
    pub fn session_names(&self, store: &SectionStore) -> Vec<String> {
        (0..self.entries.len())
            .map(|i| {
                store
                    .get(&session_section_name(i), "name")
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    /// Position of the first session with the given `name`
    pub fn find_by_name(&self, store: &SectionStore, name: &str) -> Option<usize> {
        self.session_names(store).iter().position(|n| n == name)
    }

    /// Listing of every session
    pub fn summaries(&self, store: &SectionStore) -> Vec<SessionSummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let section = session_section_name(index);
                let get = |key: &str| store.get(&section, key).map(str::to_string);
                SessionSummary {
                    position: index + 1,
                    name: get("name").unwrap_or_default(),
                    lib: get("lib"),
                    ip: get("ip"),
                    port: get("port"),
                    overrides: entry.overrides,
                    debug: index == DEBUG_POSITION && self.debug.is_active(),
                    section,
                }
            })
            .collect()
    }

    /// Append a session populated from a connection-type template.
    ///
    /// Returns the new position, or `None` when `name` is blank.
    pub fn insert_session(
        &mut self,
        store: &mut SectionStore,
        name: &str,
        kind: ConnectionType,
    ) -> Option<usize> {
        if name.trim().is_empty() {
            warn!("Ignoring new session without a name");
            return None;
        }

        let index = self.entries.len();
        let mut section = Section::new(session_section_name(index), store.key_case());
        kind.template().populate(&mut section, name);
        store.push_section(section);
        self.entries.push(SessionEntry::default());

        info!(
            "Added session '{}' as [{}] ({})",
            name,
            session_section_name(index),
            kind
        );
        Some(index)
    }

    /// Append a session using a selector index for the template.
    ///
    /// An index with no template creates nothing.
    pub fn insert_session_from_index(
        &mut self,
        store: &mut SectionStore,
        name: &str,
        template_index: usize,
    ) -> Option<usize> {
        match ConnectionType::from_index(template_index) {
            Some(kind) => self.insert_session(store, name, kind),
            None => {
                warn!(
                    "Ignoring new session '{}', no connection type at index {}",
                    name, template_index
                );
                None
            }
        }
    }

    /// Delete the session at `index` and renumber every later one.
    ///
    /// Deleting the first session drops any debug binding it held; the
    /// session moving into first place can then take the binding.
    pub fn delete_session(&mut self, store: &mut SectionStore, index: usize) -> bool {
        if self.entries.is_empty() {
            warn!("Ignoring delete, there are no sessions");
            return false;
        }
        if !self.check_index(index, "delete") {
            return false;
        }

        let len = self.entries.len();
        store.remove_section(&session_section_name(index));
        for later in index + 1..len {
            if let Some(mut section) = store.remove_section(&session_section_name(later)) {
                section.set_name(session_section_name(later - 1));
                store.push_section(section);
            }
        }
        self.entries.remove(index);

        if index == DEBUG_POSITION {
            self.debug.discard();
        }

        info!(
            "Deleted session at position {}, {} remaining",
            index + 1,
            self.entries.len()
        );
        true
    }

    /// Exchange two sessions' keys and override records, then resequence.
    ///
    /// When the debug binding is active and either index is one of the
    /// first two positions, the binding is released from its holder and
    /// attached to whichever session is first afterwards.
    pub fn swap_sessions(&mut self, store: &mut SectionStore, a: usize, b: usize) -> bool {
        if !self.check_index(a, "swap") || !self.check_index(b, "swap") {
            return false;
        }
        if a == b {
            warn!("Ignoring swap of session {} with itself", a + 1);
            return false;
        }

        let name_a = session_section_name(a);
        let name_b = session_section_name(b);
        if !store.has_section(&name_a) || !store.has_section(&name_b) {
            warn!("Ignoring swap, [{}] or [{}] is missing", name_a, name_b);
            return false;
        }

        let migrate = self.debug.is_active() && (a <= 1 || b <= 1);
        let holder = session_section_name(DEBUG_POSITION);
        if migrate {
            if let Some(section) = store.section_mut(&holder) {
                self.debug.release(section);
            }
        }

        if let (Some(section_a), Some(section_b)) =
            (store.section(&name_a).cloned(), store.section(&name_b).cloned())
        {
            if let Some(target) = store.section_mut(&name_a) {
                target.copy_entries_from(&section_b);
            }
            if let Some(target) = store.section_mut(&name_b) {
                target.copy_entries_from(&section_a);
            }
        }
        self.entries.swap(a, b);

        if migrate {
            if let Some(section) = store.section_mut(&holder) {
                self.debug.attach(section);
            }
        }

        debug!("Swapped sessions {} and {}", a + 1, b + 1);
        self.resequence(store);
        true
    }

    /// Take every session section out in order and add it back as
    /// `xrdp1..xrdpN`. Returns the session names in order.
    pub fn resequence(&mut self, store: &mut SectionStore) -> Vec<String> {
        let sections: Vec<Section> = (0..self.entries.len())
            .filter_map(|i| store.remove_section(&session_section_name(i)))
            .collect();
        if sections.len() != self.entries.len() {
            warn!(
                "Resequencing {} sections for {} sessions",
                sections.len(),
                self.entries.len()
            );
        }

        for (index, mut section) in sections.into_iter().enumerate() {
            section.set_name(session_section_name(index));
            store.push_section(section);
        }
        self.session_names(store)
    }

    /// Turn on channel overrides for a session
    pub fn enable_overrides(&mut self, store: &mut SectionStore, index: usize) -> bool {
        if !self.check_index(index, "enable overrides") {
            return false;
        }
        let defaults = ChannelDefaults::read(store);
        match self.locate(store, index) {
            Some((entry, section)) => {
                entry.overrides.enable(section, &defaults);
                true
            }
            None => false,
        }
    }

    /// Turn off channel overrides for a session
    pub fn disable_overrides(&mut self, store: &mut SectionStore, index: usize) -> bool {
        if !self.check_index(index, "disable overrides") {
            return false;
        }
        match self.locate(store, index) {
            Some((entry, section)) => {
                entry.overrides.disable(section);
                true
            }
            None => false,
        }
    }

    /// Set one channel override for a session
    pub fn set_override(
        &mut self,
        store: &mut SectionStore,
        index: usize,
        channel: Channel,
        on: bool,
    ) -> bool {
        if !self.check_index(index, "set override") {
            return false;
        }
        match self.locate(store, index) {
            Some((entry, section)) => entry.overrides.set(section, channel, on),
            None => false,
        }
    }

    /// Attach or release the debug binding on the first session
    pub fn set_debug(&mut self, store: &mut SectionStore, enabled: bool) -> bool {
        if !self.check_index(DEBUG_POSITION, "debug toggle") {
            return false;
        }
        let Some(section) = store.section_mut(&session_section_name(DEBUG_POSITION)) else {
            return false;
        };
        if enabled {
            self.debug.attach(section);
        } else {
            self.debug.release(section);
        }
        true
    }

    /// Set a session's `port`.
    ///
    /// While the session holds the debug binding the value is kept as the
    /// port to restore on release.
    pub fn set_port(&mut self, store: &mut SectionStore, index: usize, port: &str) -> bool {
        if !self.check_index(index, "port change") {
            return false;
        }
        if index == DEBUG_POSITION && self.debug.is_active() {
            self.debug.set_original_port(port);
            return true;
        }
        match self.section_mut(store, index) {
            Some(section) => {
                section.set("port", port);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::TriState;
    use crate::ini::KeyCase;
    use crate::xrdp::debug::{DEBUG_CHANSRV_PORT, DEBUG_PORT};

    const TWO_SESSIONS: &str = "\
[globals]
port=3389

[channels]
rdpdr=true
rdpsnd=0

[xrdp1]
name=Console
lib=libvnc.so
ip=127.0.0.1
port=5900

[xrdp2]
name=Xvnc
lib=libvnc.so
ip=127.0.0.1
port=-1
username=ask
";

    fn load(text: &str) -> (SectionStore, SessionSequencer) {
        let mut store = SectionStore::parse(text, KeyCase::Insensitive).unwrap();
        let sequencer = SessionSequencer::load(&mut store);
        (store, sequencer)
    }

    fn session_sections(store: &SectionStore) -> Vec<String> {
        store
            .section_names()
            .filter(|n| is_session_section(n))
            .map(str::to_string)
            .collect()
    }

    // =========================================================================
    // Naming
    // =========================================================================

    #[test]
    fn test_session_section_names() {
        assert_eq!(session_section_name(0), "xrdp1");
        assert!(is_session_section("xrdp12"));
        assert!(!is_session_section("xrdp0"));
        assert!(!is_session_section("xrdp"));
        assert!(!is_session_section("xrdp1a"));
        assert!(!is_session_section("Xrdp1"));
        assert!(!is_session_section("globals"));
    }

    #[test]
    fn test_load_renumbers_gaps() {
        let (store, sequencer) = load("[globals]\n[xrdp3]\nname=a\n[xrdp7]\nname=b\n");
        assert_eq!(sequencer.len(), 2);
        assert_eq!(session_sections(&store), vec!["xrdp1", "xrdp2"]);
        assert_eq!(sequencer.session_names(&store), vec!["a", "b"]);
    }

    // =========================================================================
    // Insert / delete
    // =========================================================================

    #[test]
    fn test_insert_appends() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        let index = sequencer
            .insert_session_from_index(&mut store, "Local console", 2)
            .unwrap();

        assert_eq!(index, 2);
        assert_eq!(store.get("xrdp3", "name"), Some("Local console"));
        assert_eq!(store.get("xrdp3", "lib"), Some("libvnc.so"));
        assert_eq!(store.get("xrdp3", "port"), Some("5900"));
        assert_eq!(store.get("xrdp3", "username"), Some("na"));
        assert_eq!(sequencer.entry(2).unwrap().overrides().flags().len(), 6);
    }

    #[test]
    fn test_insert_unknown_template_is_noop() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        let before = store.clone();

        assert!(sequencer.insert_session_from_index(&mut store, "x", 8).is_none());
        assert!(sequencer.insert_session(&mut store, "  ", ConnectionType::Console).is_none());
        assert_eq!(store, before);
        assert_eq!(sequencer.len(), 2);
    }

    #[test]
    fn test_delete_first_moves_second_down() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        let second: Vec<(String, String)> = store
            .section("xrdp2")
            .unwrap()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(sequencer.delete_session(&mut store, 0));

        assert_eq!(session_sections(&store), vec!["xrdp1"]);
        let first: Vec<(String, String)> = store
            .section("xrdp1")
            .unwrap()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_delete_invalid_is_noop() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        assert!(!sequencer.delete_session(&mut store, 5));
        assert_eq!(sequencer.len(), 2);

        let (mut empty_store, mut empty) = load("[globals]\n");
        assert!(!empty.delete_session(&mut empty_store, 0));
    }

    #[test]
    fn test_delete_removes_override_record() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        sequencer.enable_overrides(&mut store, 0);
        sequencer.delete_session(&mut store, 0);

        assert_eq!(sequencer.len(), 1);
        assert!(!sequencer.entry(0).unwrap().overrides().is_enabled());
        assert!(!store.section("xrdp1").unwrap().contains_key("channel.rdpdr"));
    }

    // =========================================================================
    // Swap / resequence
    // =========================================================================

    #[test]
    fn test_swap_exchanges_keys_and_overrides() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        sequencer.enable_overrides(&mut store, 1);

        assert!(sequencer.swap_sessions(&mut store, 0, 1));

        assert_eq!(store.get("xrdp1", "name"), Some("Xvnc"));
        assert_eq!(store.get("xrdp2", "name"), Some("Console"));
        assert!(sequencer.entry(0).unwrap().overrides().is_enabled());
        assert!(!sequencer.entry(1).unwrap().overrides().is_enabled());
        assert_eq!(store.get("xrdp1", "channel.rdpsnd"), Some("0"));
    }

    #[test]
    fn test_swap_is_self_inverse() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        sequencer.enable_overrides(&mut store, 0);
        sequencer.set_override(&mut store, 0, Channel::Rail, false);
        let before_store = store.clone();
        let before_entries = sequencer.entries().to_vec();

        sequencer.swap_sessions(&mut store, 0, 1);
        sequencer.swap_sessions(&mut store, 0, 1);

        assert_eq!(store, before_store);
        assert_eq!(sequencer.entries(), &before_entries[..]);
    }

    #[test]
    fn test_swap_out_of_range_is_noop() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        assert!(!sequencer.swap_sessions(&mut store, 0, 2));
        assert!(!sequencer.swap_sessions(&mut store, 1, 1));
        assert_eq!(store.get("xrdp1", "name"), Some("Console"));
    }

    #[test]
    fn test_resequence_moves_sessions_to_end() {
        let (mut store, mut sequencer) = load("[xrdp1]\nname=a\n[globals]\nport=1\n");
        let names = sequencer.resequence(&mut store);

        assert_eq!(names, vec!["a"]);
        let order: Vec<_> = store.section_names().collect();
        assert_eq!(order, vec!["globals", "xrdp1"]);
    }

    // =========================================================================
    // Debug binding
    // =========================================================================

    #[test]
    fn test_debug_migrates_on_swap() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        assert!(sequencer.set_debug(&mut store, true));
        assert_eq!(store.get("xrdp1", "port"), Some(DEBUG_PORT));

        sequencer.swap_sessions(&mut store, 0, 1);

        // Xvnc is now first and holds the binding; Console got its port back
        assert_eq!(store.get("xrdp1", "name"), Some("Xvnc"));
        assert_eq!(store.get("xrdp1", "port"), Some(DEBUG_PORT));
        assert_eq!(store.get("xrdp1", "chansrvport"), Some(DEBUG_CHANSRV_PORT));
        assert_eq!(store.get("xrdp2", "port"), Some("5900"));
        assert!(store.get("xrdp2", "chansrvport").is_none());

        sequencer.set_debug(&mut store, false);
        assert_eq!(store.get("xrdp1", "port"), Some("-1"));
    }

    #[test]
    fn test_debug_dropped_when_first_deleted() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        sequencer.set_debug(&mut store, true);
        sequencer.delete_session(&mut store, 0);

        assert!(!sequencer.debug().is_active());
        assert_eq!(store.get("xrdp1", "port"), Some("-1"));
        assert!(store.get("xrdp1", "chansrvport").is_none());
    }

    #[test]
    fn test_debug_port_edit_deferred() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        sequencer.set_debug(&mut store, true);
        sequencer.set_port(&mut store, 0, "5901");
        assert_eq!(store.get("xrdp1", "port"), Some(DEBUG_PORT));

        sequencer.set_debug(&mut store, false);
        assert_eq!(store.get("xrdp1", "port"), Some("5901"));
    }

    #[test]
    fn test_debug_detected_on_load() {
        let text = format!("[globals]\n[xrdp1]\nname=dbg\nport={}\n", DEBUG_PORT);
        let (store, sequencer) = load(&text);
        assert!(sequencer.debug().is_active());
        assert_eq!(store.get("xrdp1", "chansrvport"), Some(DEBUG_CHANSRV_PORT));
        assert!(sequencer.summaries(&store)[0].debug);
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    #[test]
    fn test_enable_overrides_seeds_rdpdr() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        assert!(sequencer.enable_overrides(&mut store, 1));

        assert_eq!(store.get("xrdp2", "channel.rdpdr"), Some("true"));
        assert_eq!(
            sequencer.entry(1).unwrap().overrides().flag(Channel::Rdpdr),
            TriState::On
        );
    }

    #[test]
    fn test_override_ops_out_of_range() {
        let (mut store, mut sequencer) = load(TWO_SESSIONS);
        assert!(!sequencer.enable_overrides(&mut store, 2));
        assert!(!sequencer.disable_overrides(&mut store, 9));
        assert!(!sequencer.set_override(&mut store, 3, Channel::Rail, true));
    }
}
