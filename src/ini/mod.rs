//! Section Store
//!
//! In-memory, order-preserving representation of an INI file. Sections keep
//! the order in which they were read or added, and keys keep their order
//! within a section. Updating an existing key keeps its slot.
//!
//! Section names are always compared case-sensitively. Key comparison
//! follows the store's [`KeyCase`] policy, which differs between the two
//! file kinds the editor handles.

mod parser;

use std::borrow::Cow;
use std::fmt;

/// Key comparison policy for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    /// Keys are folded to lowercase when stored and looked up (xrdp.ini)
    Insensitive,
    /// Keys are stored and compared verbatim (sesman.ini)
    Sensitive,
}

impl KeyCase {
    /// Normalize a key for storage or lookup
    pub fn normalize<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self {
            KeyCase::Sensitive => Cow::Borrowed(key),
            KeyCase::Insensitive if key.chars().any(|c| c.is_uppercase()) => {
                Cow::Owned(key.to_lowercase())
            }
            KeyCase::Insensitive => Cow::Borrowed(key),
        }
    }
}

/// One `[name]` block with its ordered key/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    case: KeyCase,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Create an empty section
    pub fn new(name: impl Into<String>, case: KeyCase) -> Self {
        Self {
            name: name.into(),
            case,
            entries: Vec::new(),
        }
    }

    /// Section name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the section, keeping every entry
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    fn position(&self, key: &str) -> Option<usize> {
        let key = self.case.normalize(key);
        self.entries.iter().position(|(k, _)| *k == *key)
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    /// Whether the key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or update a value, returning the previous one.
    ///
    /// New keys are appended; existing keys keep their position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        match self.position(key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                let key = self.case.normalize(key).into_owned();
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Replace every entry with a copy of another section's entries
    pub fn copy_entries_from(&mut self, other: &Section) {
        self.entries.clear();
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    /// Remove every key
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Key/value pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section has no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered collection of sections making up one INI document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionStore {
    case: KeyCase,
    sections: Vec<Section>,
}

impl SectionStore {
    /// Create an empty store
    pub fn new(case: KeyCase) -> Self {
        Self {
            case,
            sections: Vec::new(),
        }
    }

    /// Parse INI text into a store using the given key policy
    pub fn parse(text: &str, case: KeyCase) -> crate::Result<Self> {
        parser::parse(text, case)
    }

    /// Key comparison policy
    pub fn key_case(&self) -> KeyCase {
        self.case
    }

    /// Look up a section by exact name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Mutable lookup by exact name
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Whether a section exists
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Return the named section, appending an empty one if absent
    pub fn ensure_section(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name, self.case));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    /// Append a section at the end of the document.
    ///
    /// A section with the same name is removed first, so the name stays unique.
    pub fn push_section(&mut self, mut section: Section) {
        self.remove_section(&section.name);
        if section.case != self.case {
            let entries = std::mem::take(&mut section.entries);
            section.case = self.case;
            for (k, v) in entries {
                section.set(&k, v);
            }
        }
        self.sections.push(section);
    }

    /// Remove a section, returning it
    pub fn remove_section(&mut self, name: &str) -> Option<Section> {
        let idx = self.sections.iter().position(|s| s.name == name)?;
        Some(self.sections.remove(idx))
    }

    /// Look up a value
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    /// Set a value, creating the section if needed
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> Option<String> {
        self.ensure_section(section).set(key, value)
    }

    /// Remove a value
    pub fn remove(&mut self, section: &str, key: &str) -> Option<String> {
        self.section_mut(section).and_then(|s| s.remove(key))
    }

    /// Sections in document order
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Section names in document order
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Number of sections
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the store has no sections
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Serializes as `[name]`, then `key=value` lines, then a blank line per section.
impl fmt::Display for SectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        parser::write(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insensitive_keys_fold_to_lowercase() {
        let mut store = SectionStore::new(KeyCase::Insensitive);
        store.set("Logging", "LogFile", "xrdp.log");

        assert_eq!(store.get("Logging", "logfile"), Some("xrdp.log"));
        assert_eq!(store.get("Logging", "LOGFILE"), Some("xrdp.log"));
        let keys: Vec<_> = store.section("Logging").unwrap().keys().collect();
        assert_eq!(keys, vec!["logfile"]);
        // section names stay case-sensitive
        assert!(store.get("logging", "logfile").is_none());
    }

    #[test]
    fn test_sensitive_keys_preserved() {
        let mut store = SectionStore::new(KeyCase::Sensitive);
        store.set("Globals", "ListenPort", "3350");

        assert_eq!(store.get("Globals", "ListenPort"), Some("3350"));
        assert!(store.get("Globals", "listenport").is_none());
    }

    #[test]
    fn test_update_keeps_slot() {
        let mut section = Section::new("globals", KeyCase::Insensitive);
        section.set("a", "1");
        section.set("b", "2");
        section.set("c", "3");
        assert_eq!(section.set("b", "20"), Some("2".to_string()));

        let pairs: Vec<_> = section.iter().collect();
        assert_eq!(pairs, vec![("a", "1"), ("b", "20"), ("c", "3")]);
    }

    #[test]
    fn test_push_section_replaces_and_appends() {
        let mut store = SectionStore::new(KeyCase::Insensitive);
        store.ensure_section("globals");
        store.ensure_section("xrdp1").set("name", "one");
        store.ensure_section("channels");

        let mut replacement = Section::new("xrdp1", KeyCase::Insensitive);
        replacement.set("name", "two");
        store.push_section(replacement);

        let names: Vec<_> = store.section_names().collect();
        assert_eq!(names, vec!["globals", "channels", "xrdp1"]);
        assert_eq!(store.get("xrdp1", "name"), Some("two"));
    }

    #[test]
    fn test_push_section_adopts_store_policy() {
        let mut store = SectionStore::new(KeyCase::Insensitive);
        let mut section = Section::new("xrdp1", KeyCase::Sensitive);
        section.set("Name", "Console");
        store.push_section(section);

        assert_eq!(store.get("xrdp1", "name"), Some("Console"));
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut store = SectionStore::new(KeyCase::Sensitive);
        assert!(store.remove("Globals", "ListenPort").is_none());
        assert!(store.remove_section("Globals").is_none());
    }
}
