//! Back-end libraries and new-session templates

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::ini::Section;

/// Value used by xrdp to prompt the user at login
pub const ASK: &str = "ask";

/// `code` value required by the Xup back end
const XUP_CODE: &str = "10";

/// Back-end module loaded by xrdp for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Library {
    /// X11rdp / Xorg back end
    Xup,
    /// VNC back end
    Vnc,
    /// Legacy RDP proxy
    Rdp,
    /// FreeRDP proxy
    FreeRdp,
    /// NeutrinoRDP proxy
    NeutrinoRdp,
}

impl Library {
    /// Every library, in selector order
    pub const ALL: [Library; 5] = [
        Library::Xup,
        Library::Vnc,
        Library::Rdp,
        Library::FreeRdp,
        Library::NeutrinoRdp,
    ];

    /// Shared object name written to `lib`
    pub fn file_name(&self) -> &'static str {
        match self {
            Library::Xup => "libxup.so",
            Library::Vnc => "libvnc.so",
            Library::Rdp => "librdp.so",
            Library::FreeRdp => "libxrdpfreerdp1.so",
            Library::NeutrinoRdp => "libxrdpneutrinordp.so",
        }
    }

    /// Identify a library from its `lib` value
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.file_name() == name)
    }

    /// Whether sessions using this library carry `username`/`password`
    pub fn uses_credentials(&self) -> bool {
        !matches!(self, Library::Rdp)
    }

    /// Point a session at this library and fix up dependent keys.
    ///
    /// `code=10` is present iff the library is Xup. Libraries that take
    /// credentials get `ask` prompts when none are set; librdp drops them.
    pub fn apply(&self, section: &mut Section) {
        section.set("lib", self.file_name());

        if *self == Library::Xup {
            section.set("code", XUP_CODE);
        } else {
            section.remove("code");
        }

        if self.uses_credentials() {
            for key in ["username", "password"] {
                if !section.contains_key(key) {
                    section.set(key, ASK);
                }
            }
        } else {
            section.remove("username");
            section.remove("password");
        }
    }
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for Library {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_file_name(s)
            .or_else(|| Self::from_file_name(&format!("lib{}.so", s.to_lowercase())))
            .ok_or_else(|| ConfigError::invalid_value("lib", format!("unknown library '{}'", s)))
    }
}

/// Default keys for a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTemplate {
    /// Back end
    pub library: Library,
    /// Default `ip`
    pub ip: &'static str,
    /// Default `port`
    pub port: &'static str,
    /// Default `username`, `None` when the library takes no credentials
    pub username: Option<&'static str>,
    /// Default `password`
    pub password: Option<&'static str>,
}

impl SessionTemplate {
    const fn new(
        library: Library,
        ip: &'static str,
        port: &'static str,
        username: Option<&'static str>,
        password: Option<&'static str>,
    ) -> Self {
        Self {
            library,
            ip,
            port,
            username,
            password,
        }
    }

    /// Fill an empty section with `name` and the template's defaults
    pub fn populate(&self, section: &mut Section, name: &str) {
        section.set("name", name);
        section.set("lib", self.library.file_name());
        section.set("ip", self.ip);
        section.set("port", self.port);
        if let Some(username) = self.username {
            section.set("username", username);
        }
        if let Some(password) = self.password {
            section.set("password", password);
        }
        if self.library == Library::Xup {
            section.set("code", XUP_CODE);
        }
    }
}

/// Connection types offered when adding a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConnectionType {
    /// Local X11rdp server through sesman
    X11rdp,
    /// Local Xvnc server through sesman
    SesmanXvnc,
    /// The machine's own console over VNC
    Console,
    /// Any VNC server, host and port prompted
    VncAny,
    /// A sesman-started Xvnc on any host
    SesmanAny,
    /// Any RDP server through librdp
    RdpAny,
    /// Any RDP server through FreeRDP
    FreeRdp,
    /// Any RDP server through NeutrinoRDP
    NeutrinoRdp,
}

const TEMPLATES: [SessionTemplate; 8] = [
    SessionTemplate::new(Library::Xup, "127.0.0.1", "-1", Some(ASK), Some(ASK)),
    SessionTemplate::new(Library::Vnc, "127.0.0.1", "-1", Some(ASK), Some(ASK)),
    SessionTemplate::new(Library::Vnc, "127.0.0.1", "5900", Some("na"), Some(ASK)),
    SessionTemplate::new(Library::Vnc, ASK, "ask5900", Some("na"), Some(ASK)),
    SessionTemplate::new(Library::Vnc, ASK, "-1", Some(ASK), Some(ASK)),
    SessionTemplate::new(Library::Rdp, ASK, "ask3389", None, None),
    SessionTemplate::new(Library::FreeRdp, ASK, "ask3389", Some(ASK), Some(ASK)),
    SessionTemplate::new(Library::NeutrinoRdp, ASK, "ask3389", Some(ASK), Some(ASK)),
];

impl ConnectionType {
    /// Every type, in selector order
    pub const ALL: [ConnectionType; 8] = [
        ConnectionType::X11rdp,
        ConnectionType::SesmanXvnc,
        ConnectionType::Console,
        ConnectionType::VncAny,
        ConnectionType::SesmanAny,
        ConnectionType::RdpAny,
        ConnectionType::FreeRdp,
        ConnectionType::NeutrinoRdp,
    ];

    /// Type at a selector index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Selector index
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Name shown in the selector
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionType::X11rdp => "X11rdp",
            ConnectionType::SesmanXvnc => "sesman-Xvnc",
            ConnectionType::Console => "console",
            ConnectionType::VncAny => "vnc-any",
            ConnectionType::SesmanAny => "sesman-any",
            ConnectionType::RdpAny => "rdp-any",
            ConnectionType::FreeRdp => "freerdp",
            ConnectionType::NeutrinoRdp => "neutrinordp",
        }
    }

    /// Defaults for this type
    pub fn template(&self) -> &'static SessionTemplate {
        &TEMPLATES[self.index()]
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts a selector label (any case) or a selector index
impl FromStr for ConnectionType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| {
                ConfigError::invalid_value("connection type", format!("no type at index {}", index))
            });
        }
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                ConfigError::invalid_value("connection type", format!("unknown type '{}'", s))
            })
    }
}
