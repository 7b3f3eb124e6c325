//! INI text reader and writer
//!
//! Line-oriented: `[section]` headers, `key=value` or `key: value` pairs,
//! `#` and `;` full-line comments, and indented continuation lines that
//! extend the previous value. Inline comments are part of the value.

use std::fmt;

use super::{KeyCase, Section, SectionStore};
use crate::error::{ConfigError, Result};

pub(super) fn parse(text: &str, case: KeyCase) -> Result<SectionStore> {
    let mut store = SectionStore::new(case);
    let mut current: Option<Section> = None;
    let mut last_key: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        // Continuation of the previous value
        if raw.starts_with([' ', '\t']) {
            if let (Some(section), Some(key)) = (current.as_mut(), last_key.as_deref()) {
                let mut value = section.get(key).unwrap_or_default().to_string();
                value.push('\n');
                value.push_str(trimmed);
                section.set(key, value);
                continue;
            }
        }

        if trimmed.starts_with('[') {
            let name = match trimmed.rfind(']') {
                Some(end) if end > 1 => &trimmed[1..end],
                _ => {
                    return Err(ConfigError::Parse {
                        line: line_no,
                        message: format!("malformed section header '{}'", trimmed),
                    })
                }
            };

            if let Some(done) = current.take() {
                store.push_section(done);
            }
            if store.has_section(name) {
                return Err(ConfigError::DuplicateSection {
                    name: name.to_string(),
                    line: line_no,
                });
            }
            current = Some(Section::new(name, case));
            last_key = None;
            continue;
        }

        let Some(section) = current.as_mut() else {
            return Err(ConfigError::Parse {
                line: line_no,
                message: "key/value pair before any section header".to_string(),
            });
        };

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(ConfigError::Parse {
                line: line_no,
                message: format!("expected 'key=value', found '{}'", trimmed),
            });
        };

        let key = trimmed[..split].trim_end();
        let value = trimmed[split + 1..].trim_start();
        if key.is_empty() {
            return Err(ConfigError::Parse {
                line: line_no,
                message: "empty key".to_string(),
            });
        }
        if section.contains_key(key) {
            return Err(ConfigError::DuplicateKey {
                section: section.name().to_string(),
                key: case.normalize(key).into_owned(),
                line: line_no,
            });
        }

        section.set(key, value);
        last_key = Some(key.to_string());
    }

    if let Some(done) = current.take() {
        store.push_section(done);
    }

    Ok(store)
}

pub(super) fn write(store: &SectionStore, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for section in store.sections() {
        writeln!(f, "[{}]", section.name())?;
        for (key, value) in section.iter() {
            if value.contains('\n') {
                writeln!(f, "{}={}", key, value.replace('\n', "\n\t"))?;
            } else {
                writeln!(f, "{}={}", key, value)?;
            }
        }
        writeln!(f)?;
    }
    Ok(())
}
