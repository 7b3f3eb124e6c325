//! Debug binding
//!
//! Running xrdp against a hand-started X server on display 10 needs the
//! first session to point at fixed local sockets. Only the session at
//! [`DEBUG_POSITION`] can hold the binding, and at most one session does.

use tracing::debug;

use crate::ini::Section;

/// `port` value while debugging
pub const DEBUG_PORT: &str = "/tmp/.xrdp/xrdp_display_10";

/// `chansrvport` value while debugging
pub const DEBUG_CHANSRV_PORT: &str = "/tmp/.xrdp/xrdp_chansrv_socket_7210";

/// Position (0-based) of the only session that may hold the binding
pub const DEBUG_POSITION: usize = 0;

/// Port restored when the pre-debug value is unknown
const FALLBACK_PORT: &str = "-1";

/// State of the debug binding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugBinding {
    active: bool,
    original_port: Option<String>,
}

impl DebugBinding {
    /// Whether the session at [`DEBUG_POSITION`] holds the binding
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Port to restore when the binding is released
    pub fn original_port(&self) -> Option<&str> {
        self.original_port.as_deref()
    }

    /// Recognise a binding in a freshly loaded section.
    ///
    /// The original port is unknown in that case. A missing `chansrvport`
    /// is added.
    pub(crate) fn detect(&mut self, section: &mut Section) -> bool {
        self.active = section.get("port") == Some(DEBUG_PORT);
        self.original_port = None;
        if self.active && !section.contains_key("chansrvport") {
            section.set("chansrvport", DEBUG_CHANSRV_PORT);
        }
        self.active
    }

    /// Point `section` at the debug sockets, remembering its port
    pub(crate) fn attach(&mut self, section: &mut Section) {
        if self.active {
            return;
        }
        let current = section.get("port").map(str::to_string);
        self.original_port = current.filter(|p| p != DEBUG_PORT);
        section.set("port", DEBUG_PORT);
        section.set("chansrvport", DEBUG_CHANSRV_PORT);
        self.active = true;
        debug!("Debug binding attached to [{}]", section.name());
    }

    /// Remove the debug sockets from `section`, restoring its port
    pub(crate) fn release(&mut self, section: &mut Section) {
        if !self.active {
            return;
        }
        section.remove("chansrvport");
        let port = self
            .original_port
            .take()
            .unwrap_or_else(|| FALLBACK_PORT.to_string());
        section.set("port", port);
        self.active = false;
        debug!("Debug binding released from [{}]", section.name());
    }

    /// Forget the binding without touching any section
    pub(crate) fn discard(&mut self) {
        self.active = false;
        self.original_port = None;
    }

    /// Record a port edit made while the binding is active
    pub(crate) fn set_original_port(&mut self, port: &str) {
        self.original_port = Some(port.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::KeyCase;

    fn session(port: &str) -> Section {
        let mut section = Section::new("xrdp1", KeyCase::Insensitive);
        section.set("name", "Xvnc");
        section.set("port", port);
        section
    }

    #[test]
    fn test_attach_then_release_restores_port() {
        let mut binding = DebugBinding::default();
        let mut section = session("5910");

        binding.attach(&mut section);
        assert!(binding.is_active());
        assert_eq!(section.get("port"), Some(DEBUG_PORT));
        assert_eq!(section.get("chansrvport"), Some(DEBUG_CHANSRV_PORT));
        assert_eq!(binding.original_port(), Some("5910"));

        binding.release(&mut section);
        assert!(!binding.is_active());
        assert_eq!(section.get("port"), Some("5910"));
        assert!(!section.contains_key("chansrvport"));
    }

    #[test]
    fn test_detect_adds_chansrvport() {
        let mut binding = DebugBinding::default();
        let mut section = session(DEBUG_PORT);

        assert!(binding.detect(&mut section));
        assert_eq!(section.get("chansrvport"), Some(DEBUG_CHANSRV_PORT));

        binding.release(&mut section);
        assert_eq!(section.get("port"), Some("-1"));
    }

    #[test]
    fn test_detect_ignores_regular_port() {
        let mut binding = DebugBinding::default();
        let mut section = session("-1");
        assert!(!binding.detect(&mut section));
        assert!(!section.contains_key("chansrvport"));
    }

    #[test]
    fn test_port_edit_while_active() {
        let mut binding = DebugBinding::default();
        let mut section = session("-1");
        binding.attach(&mut section);
        binding.set_original_port("5901");
        binding.release(&mut section);
        assert_eq!(section.get("port"), Some("5901"));
    }
}
