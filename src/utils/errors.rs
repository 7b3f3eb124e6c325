//! User-Friendly Error Formatting
//!
//! Turns errors reaching the command line into messages with hints on how
//! to fix the file or the invocation.

use std::fmt::Write;
use std::io::ErrorKind;

use crate::error::ConfigError;

/// Format error for user consumption
///
/// Looks through the error chain for a [`ConfigError`] to pick the hints,
/// then appends the full chain as technical details.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    let config_error = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ConfigError>());

    match config_error {
        Some(ConfigError::NotRecognised { kind, missing }) => {
            format_not_recognised_error(&mut output, &kind.to_string(), missing)
        }
        Some(
            ConfigError::Parse { line, .. }
            | ConfigError::DuplicateSection { line, .. }
            | ConfigError::DuplicateKey { line, .. },
        ) => format_syntax_error(&mut output, *line),
        Some(ConfigError::Read { source, .. } | ConfigError::Write { source, .. }) => {
            format_io_error(&mut output, source.kind())
        }
        Some(ConfigError::InvalidValue { field, .. }) => format_value_error(&mut output, field),
        Some(ConfigError::NoPath) | None => format_generic_error(&mut output, &error.to_string()),
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: xrdp-configurator -vvv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Check the file with: xrdp-configurator validate <FILE>"
    )
    .ok();
    writeln!(&mut output, "  - xrdp documentation: man xrdp.ini, man sesman.ini").ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_not_recognised_error(output: &mut String, kind: &str, missing: &[String]) {
    writeln!(output, "Unrecognised Configuration File").ok();
    writeln!(output).ok();
    writeln!(output, "The file is not a valid {}.", kind).ok();
    writeln!(output).ok();
    writeln!(output, "Missing sections:").ok();
    for name in missing {
        writeln!(output, "  [{}]", name).ok();
    }
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Wrong file opened").ok();
    writeln!(output, "     → xrdp.ini needs [globals] and [xrdp1]").ok();
    writeln!(
        output,
        "     → sesman.ini needs [Globals], [Security] and [Sessions]"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Section names are case-sensitive").ok();
    writeln!(output, "     → [Globals] is not the same as [globals]").ok();
}

fn format_syntax_error(output: &mut String, line: usize) {
    writeln!(output, "Configuration Syntax Error").ok();
    writeln!(output).ok();
    writeln!(output, "The file could not be parsed at line {}.", line).ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Line is neither a [section] nor key=value").ok();
    writeln!(output, "     → Comment it out with # or ;").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Section or key defined twice").ok();
    writeln!(output, "     → Merge the duplicates by hand, then retry").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Key before the first section header").ok();
}

fn format_io_error(output: &mut String, kind: ErrorKind) {
    match kind {
        ErrorKind::PermissionDenied => {
            writeln!(output, "Permission Denied").ok();
            writeln!(output).ok();
            writeln!(output, "The configuration file is not accessible.").ok();
            writeln!(output).ok();
            writeln!(output, "Solutions:").ok();
            writeln!(output, "  → Files in /etc/xrdp are usually owned by root").ok();
            writeln!(output, "  → Run with sudo, or write a copy with --output").ok();
        }
        ErrorKind::NotFound => {
            writeln!(output, "File Not Found").ok();
            writeln!(output).ok();
            writeln!(output, "Solutions:").ok();
            writeln!(output, "  → Check the path; xrdp installs to /etc/xrdp/").ok();
            writeln!(output, "  → For --output, the directory must already exist").ok();
        }
        _ => {
            writeln!(output, "File Access Error").ok();
            writeln!(output).ok();
            writeln!(output, "The file could not be read or written.").ok();
        }
    }
}

fn format_value_error(output: &mut String, field: &str) {
    writeln!(output, "Invalid Value").ok();
    writeln!(output).ok();
    writeln!(output, "The value given for {} was rejected.", field).ok();
    writeln!(output).ok();
    writeln!(output, "Solutions:").ok();
    writeln!(output, "  → Ports must be between 1 and 65535").ok();
    writeln!(output, "  → Addresses must be IPv4 or IPv6 literals").ok();
    writeln!(output, "  → Colours are six hex digits, e.g. 009eb5").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Operation Failed").ok();
    writeln!(output).ok();
    writeln!(output, "{}", error).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_not_recognised_lists_sections() {
        let error = anyhow::Error::new(ConfigError::NotRecognised {
            kind: DocumentKind::Xrdp,
            missing: vec!["xrdp1".to_string()],
        });
        let formatted = format_user_error(&error);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("Unrecognised"));
        assert!(formatted.contains("[xrdp1]"));
    }

    #[test]
    fn test_permission_hint_through_context() {
        let result: Result<(), ConfigError> = Err(ConfigError::Write {
            path: PathBuf::from("/etc/xrdp/xrdp.ini"),
            source: std::io::Error::from(ErrorKind::PermissionDenied),
        });
        let error = result.context("Saving xrdp.ini").unwrap_err();
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Permission Denied"));
        assert!(formatted.contains("Saving xrdp.ini"));
    }

    #[test]
    fn test_syntax_error_names_line() {
        let error = anyhow::Error::new(ConfigError::Parse {
            line: 7,
            message: "missing '='".to_string(),
        });
        assert!(format_user_error(&error).contains("line 7"));
    }

    #[test]
    fn test_generic_error() {
        let error = anyhow::anyhow!("something else");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Operation Failed"));
        assert!(formatted.contains("Need Help?"));
    }
}
