//! Configuration Validation Module
//!
//! Checks an open document for values xrdp or sesman would reject or
//! misinterpret. Errors are problems the daemon will trip over; warnings are
//! legal but probably unintended.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::Serialize;

use crate::document::IniDocument;
use crate::log_level::LogLevel;
use crate::sesman::{self, Limit, SesmanIni};
use crate::xrdp::debug::DEBUG_CHANSRV_PORT;
use crate::xrdp::{
    CryptLevel, IniVersion, Library, XrdpIni, GLOBALS_SECTION, MAX_BPP_VALUES, SERVER_BPP_VALUES,
};

/// A problem that makes the file unusable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// `section.key` the problem was found at
    pub field: String,
    /// Human-readable description
    pub message: String,
}

/// A suspicious but legal value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    /// `section.key` the problem was found at
    pub field: String,
    /// Human-readable description
    pub message: String,
}

/// Outcome of validating a document
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Whether no errors were found
    pub is_valid: bool,
    /// Errors found
    pub errors: Vec<ValidationError>,
    /// Warnings found
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    fn from_parts(errors: Vec<ValidationError>, warnings: Vec<ValidationWarning>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

fn error(errors: &mut Vec<ValidationError>, field: impl Into<String>, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.into(),
        message: message.into(),
    });
}

fn warning(
    warnings: &mut Vec<ValidationWarning>,
    field: impl Into<String>,
    message: impl Into<String>,
) {
    warnings.push(ValidationWarning {
        field: field.into(),
        message: message.into(),
    });
}

/// Validate an xrdp.ini
pub fn validate_xrdp(ini: &XrdpIni) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_xrdp_globals(ini, &mut errors, &mut warnings);
    validate_xrdp_logging(ini, &mut errors, &mut warnings);
    validate_sessions(ini, &mut errors, &mut warnings);

    ValidationResult::from_parts(errors, warnings)
}

fn validate_xrdp_globals(
    ini: &XrdpIni,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if ini.address().parse::<IpAddr>().is_err() {
        error(errors, "globals.address", format!("Invalid listen address: '{}'", ini.address()));
    }

    match ini.port().trim().parse::<u16>() {
        Ok(0) | Err(_) => error(
            errors,
            "globals.port",
            format!("Invalid listen port: '{}'", ini.port()),
        ),
        Ok(port) if port < 1024 && port != 3389 => warning(
            warnings,
            "globals.port",
            format!("Port {} is not the RDP default and needs root privileges", port),
        ),
        Ok(_) => {}
    }

    if let Some(raw) = ini.global("max_bpp") {
        let valid = raw
            .trim()
            .parse::<u8>()
            .map(|bpp| MAX_BPP_VALUES.contains(&bpp))
            .unwrap_or(false);
        if !valid {
            error(
                errors,
                "globals.max_bpp",
                format!("max_bpp must be 8, 15, 16, 24 or 32, not '{}'", raw),
            );
        }
    }

    if let Some(raw) = ini.global("crypt_level") {
        match raw.parse::<CryptLevel>() {
            Err(_) => error(
                errors,
                "globals.crypt_level",
                format!("Unknown encryption level '{}'", raw),
            ),
            Ok(CryptLevel::Low) => warning(
                warnings,
                "globals.crypt_level",
                "Low encryption only protects client to server traffic",
            ),
            Ok(_) => {}
        }
    }

    if let Some(autorun) = ini.autorun() {
        if ini.sessions().find_by_name(ini.store(), autorun).is_none() {
            error(
                errors,
                "globals.autorun",
                format!("autorun names unknown session '{}'", autorun),
            );
        }
    }

    if ini.version() == IniVersion::Legacy {
        let ignored: Vec<&str> = ini
            .store()
            .section(GLOBALS_SECTION)
            .map(|s| s.keys().filter(|k| k.starts_with("ls_")).collect())
            .unwrap_or_default();
        if !ignored.is_empty() {
            warning(
                warnings,
                "globals.ini_version",
                format!("{} is ignored unless ini_version=1", ignored.join(", ")),
            );
        }
    }
}

fn validate_xrdp_logging(
    ini: &XrdpIni,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    check_log_levels(
        "Logging",
        ini.store().get("Logging", "loglevel"),
        ini.store().get("Logging", "sysloglevel"),
        errors,
        warnings,
    );
}

fn validate_sessions(
    ini: &XrdpIni,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if ini.sessions().is_empty() {
        error(errors, "xrdp1", "No sessions are defined");
        return;
    }

    let mut names: HashMap<String, usize> = HashMap::new();
    let mut debug_holders = Vec::new();

    for summary in ini.session_summaries() {
        let index = summary.position - 1;
        let field = |key: &str| format!("{}.{}", summary.section, key);

        if summary.name.trim().is_empty() {
            error(errors, field("name"), "Session has no name");
        } else if let Some(first) = names.insert(summary.name.clone(), summary.position) {
            warning(
                warnings,
                field("name"),
                format!("Name '{}' is also used by session {}", summary.name, first),
            );
        }

        match summary.lib.as_deref() {
            None => error(errors, field("lib"), "Session has no lib"),
            Some(lib) if Library::from_file_name(lib).is_none() => warning(
                warnings,
                field("lib"),
                format!("Unknown back-end library '{}'", lib),
            ),
            Some(_) => {}
        }

        if let Some(port) = summary.port.as_deref() {
            let valid = port == "-1"
                || port.starts_with('/')
                || port.starts_with("ask")
                || port.trim().parse::<u16>().map(|p| p > 0).unwrap_or(false);
            if !valid {
                error(errors, field("port"), format!("Invalid port '{}'", port));
            }
        }

        if let Some(bpp) = ini.session_value(index, "xserverbpp") {
            let valid = bpp
                .trim()
                .parse::<u8>()
                .map(|b| SERVER_BPP_VALUES.contains(&b))
                .unwrap_or(false);
            if !valid {
                error(
                    errors,
                    field("xserverbpp"),
                    format!("xserverbpp must be 15, 16, 24 or 32, not '{}'", bpp),
                );
            }
        }

        if let Some(chansrv) = ini.session_value(index, "chansrvport") {
            debug_holders.push(summary.section.clone());
            if chansrv != DEBUG_CHANSRV_PORT {
                warning(
                    warnings,
                    field("chansrvport"),
                    format!("Unexpected chansrvport '{}'", chansrv),
                );
            }
        }
    }

    if debug_holders.len() > 1 {
        error(
            errors,
            "chansrvport",
            format!("Debug binding appears in more than one session: {}", debug_holders.join(", ")),
        );
    }
}

/// Validate a sesman.ini
pub fn validate_sesman(ini: &SesmanIni) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    validate_sesman_globals(ini, &mut errors, &mut warnings);

    for limit in Limit::ALL {
        let (section, key) = limit.location();
        if let Some(raw) = ini.value(section, key) {
            if raw.trim().parse::<u32>().is_err() {
                error(
                    &mut errors,
                    format!("{}.{}", section, key),
                    format!("'{}' is not a number", raw),
                );
            }
        }
    }
    if ini.limit(Limit::MaxSessions) == Some(0) {
        warning(&mut warnings, "Sessions.MaxSessions", "MaxSessions=0 allows no sessions at all");
    }

    check_log_levels(
        sesman::LOGGING_SECTION,
        ini.value(sesman::LOGGING_SECTION, "LogLevel"),
        ini.value(sesman::LOGGING_SECTION, "SyslogLevel"),
        &mut errors,
        &mut warnings,
    );

    ValidationResult::from_parts(errors, warnings)
}

fn validate_sesman_globals(
    ini: &SesmanIni,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    if let Some(address) = ini.listen_address() {
        if address.trim().parse::<IpAddr>().is_err() {
            error(
                errors,
                "Globals.ListenAddress",
                format!("Invalid listen address: '{}'", address),
            );
        }
    }

    match ini.value(sesman::GLOBALS_SECTION, "ListenPort") {
        None => warning(warnings, "Globals.ListenPort", "No ListenPort, sesman uses 3350"),
        Some(raw) => {
            if !matches!(raw.trim().parse::<u16>(), Ok(p) if p > 0) {
                error(errors, "Globals.ListenPort", format!("Invalid listen port: '{}'", raw));
            }
        }
    }

    if ini.user_window_manager_enabled() && ini.user_window_manager().is_none() {
        warning(
            warnings,
            "Globals.UserWindowManager",
            "EnableUserWindowManager is on but no UserWindowManager is set",
        );
    }
    if ini.default_window_manager().is_none() {
        warning(warnings, "Globals.DefaultWindowManager", "No DefaultWindowManager is set");
    }
}

fn check_log_levels(
    section: &str,
    log: Option<&str>,
    syslog: Option<&str>,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let parse = |raw: Option<&str>, key: &str, errors: &mut Vec<ValidationError>| {
        let raw = raw?;
        match raw.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(_) => {
                error(
                    errors,
                    format!("{}.{}", section, key),
                    format!("Unknown log level '{}'", raw),
                );
                None
            }
        }
    };

    let log = parse(log, "LogLevel", errors);
    let syslog = parse(syslog, "SyslogLevel", errors);
    if let (Some(log), Some(syslog)) = (log, syslog) {
        if syslog > log {
            warning(
                warnings,
                format!("{}.SyslogLevel", section),
                format!("Syslog level {} is more verbose than log level {}", syslog, log),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRDP: &str = "\
[globals]
port=3389
max_bpp=32
crypt_level=high

[Logging]
loglevel=INFO
sysloglevel=ERROR

[xrdp1]
name=sesman-Xvnc
lib=libvnc.so
ip=127.0.0.1
port=-1

[xrdp2]
name=console
lib=libvnc.so
ip=127.0.0.1
port=5900
";

    fn xrdp(text: &str) -> XrdpIni {
        XrdpIni::from_text(text).unwrap().0
    }

    #[test]
    fn test_clean_xrdp_is_valid() {
        let result = validate_xrdp(&xrdp(XRDP));
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_bad_globals() {
        let text = XRDP
            .replace("port=3389", "port=abc")
            .replace("max_bpp=32", "max_bpp=12");
        let result = validate_xrdp(&xrdp(&text));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.field == "globals.port"));
        assert!(result.errors.iter().any(|e| e.field == "globals.max_bpp"));
    }

    #[test]
    fn test_dangling_autorun_after_delete() {
        let text = XRDP.replace("port=3389", "port=3389\nautorun=console");
        let mut ini = xrdp(&text);
        assert!(validate_xrdp(&ini).is_valid);

        ini.delete_session(1);
        let result = validate_xrdp(&ini);
        assert!(result.errors.iter().any(|e| e.field == "globals.autorun"));
    }

    #[test]
    fn test_session_checks() {
        let text = XRDP
            .replace("name=console", "name=sesman-Xvnc")
            .replace("port=5900", "port=nope");
        let result = validate_xrdp(&xrdp(&text));
        assert!(result.warnings.iter().any(|w| w.field == "xrdp2.name"));
        assert!(result.errors.iter().any(|e| e.field == "xrdp2.port"));
    }

    #[test]
    fn test_duplicate_debug_binding() {
        let text = XRDP
            .replace("port=-1", "port=-1\nchansrvport=/tmp/a")
            .replace("port=5900", "port=5900\nchansrvport=/tmp/b");
        let result = validate_xrdp(&xrdp(&text));
        assert!(result.errors.iter().any(|e| e.field == "chansrvport"));
    }

    #[test]
    fn test_syslog_more_verbose_warns() {
        let text = XRDP.replace("sysloglevel=ERROR", "sysloglevel=DEBUG");
        let result = validate_xrdp(&xrdp(&text));
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.field == "Logging.SyslogLevel"));
    }

    const SESMAN: &str = "\
[Globals]
ListenAddress=127.0.0.1
ListenPort=3350
DefaultWindowManager=startwm.sh

[Security]
MaxLoginRetry=4

[Sessions]
MaxSessions=10

[Logging]
LogLevel=DEBUG
";

    #[test]
    fn test_clean_sesman_is_valid() {
        let ini = SesmanIni::from_text(SESMAN).unwrap();
        let result = validate_sesman(&ini);
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_bad_sesman_values() {
        let text = SESMAN
            .replace("MaxLoginRetry=4", "MaxLoginRetry=four")
            .replace("LogLevel=DEBUG", "LogLevel=LOUD")
            .replace("ListenPort=3350", "ListenPort=0");
        let result = validate_sesman(&SesmanIni::from_text(&text).unwrap());
        assert!(result.errors.iter().any(|e| e.field == "Security.MaxLoginRetry"));
        assert!(result.errors.iter().any(|e| e.field == "Logging.LogLevel"));
        assert!(result.errors.iter().any(|e| e.field == "Globals.ListenPort"));
    }
}
