//! Log levels understood by xrdp and sesman

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Log verbosity, ordered from least to most verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Core messages only
    Core,
    /// Errors
    Error,
    /// Warnings
    Warning,
    /// Informational
    Info,
    /// Everything
    Debug,
}

impl LogLevel {
    /// Every level, least verbose first
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Core,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    /// Spelling written to the file
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Core => "CORE",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Syslog level limited so it is never more verbose than the log level
    pub fn clamp_syslog(self, syslog: LogLevel) -> LogLevel {
        syslog.min(self)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts names in any case, `WARN`, and the numeric levels `0`..`4`
impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::ALL
                .get(n)
                .copied()
                .ok_or_else(|| ConfigError::invalid_value("log level", format!("no level {}", n)));
        }
        if s.eq_ignore_ascii_case("warn") {
            return Ok(LogLevel::Warning);
        }
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ConfigError::invalid_value("log level", format!("unknown level '{}'", s))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("0".parse::<LogLevel>().unwrap(), LogLevel::Core);
        assert_eq!("3".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("5".parse::<LogLevel>().is_err());
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_syslog_clamp() {
        assert_eq!(LogLevel::Info.clamp_syslog(LogLevel::Debug), LogLevel::Info);
        assert_eq!(LogLevel::Info.clamp_syslog(LogLevel::Error), LogLevel::Error);
    }
}
