//! Login window layout and colours
//!
//! xrdp draws its own login dialog. Colours are plain hex values in
//! `[globals]`; with `ini_version=1` the geometry is configurable through
//! `ls_*` keys. This module models those keys. It does not draw anything.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use super::globals::GLOBALS_SECTION;
use super::{IniVersion, XrdpIni};
use crate::error::ConfigError;
use crate::ini::SectionStore;

/// Vertical distance between the module, username and password rows
pub const ROW_SPACING: u32 = 26;

/// A positioned rectangle in login window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Rect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Rect {
    /// Create a rectangle
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Logo placement
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Logo {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Image file, as written in the file
    pub filename: Option<String>,
}

/// Geometry of the login dialog
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LoginLayout {
    /// Dialog width
    pub width: u32,
    /// Dialog height
    pub height: u32,
    /// Left edge of the labels
    pub label_x: u32,
    /// Top of the module label
    pub label_y: u32,
    /// Left edge of the input boxes
    pub input_x: u32,
    /// Top of the module input box
    pub input_y: u32,
    /// Width of the input boxes
    pub input_width: u32,
    /// OK button
    pub ok: Rect,
    /// Cancel button
    pub cancel: Rect,
    /// Help button, only drawn by the legacy dialog
    pub help: Option<Rect>,
    /// Logo, only configurable with the V1 schema
    pub logo: Option<Logo>,
}

const DIALOG_WIDTH: u32 = 400;
const DIALOG_HEIGHT: u32 = 200;
const LABEL_X: u32 = 150;
const LABEL_Y: u32 = 30;
const INPUT_WIDTH: u32 = 140;
const OK_BUTTON: Rect = Rect::new(180, 163, 60, 23);
const CANCEL_BUTTON: Rect = Rect::new(250, 163, 60, 23);
const HELP_BUTTON: Rect = Rect::new(320, 163, 60, 23);

impl LoginLayout {
    /// Layout drawn by xrdp when nothing is configured
    pub fn default_for(version: IniVersion) -> Self {
        let (dx, dy) = Self::input_offset(version);
        Self {
            width: DIALOG_WIDTH,
            height: DIALOG_HEIGHT,
            label_x: LABEL_X,
            label_y: LABEL_Y,
            input_x: LABEL_X + dx,
            input_y: LABEL_Y + dy,
            input_width: INPUT_WIDTH,
            ok: OK_BUTTON,
            cancel: CANCEL_BUTTON,
            help: match version {
                IniVersion::Legacy => Some(HELP_BUTTON),
                IniVersion::V1 => None,
            },
            logo: None,
        }
    }

    /// Offset of an input box from its label
    fn input_offset(version: IniVersion) -> (u32, u32) {
        match version {
            IniVersion::Legacy => (80, 7),
            IniVersion::V1 => (85, 4),
        }
    }

    /// Read the layout from `[globals]`.
    ///
    /// The legacy schema has a fixed layout. Unreadable numbers fall back to
    /// the default with a warning.
    pub fn read(store: &SectionStore, version: IniVersion) -> Self {
        let mut layout = Self::default_for(version);
        if version == IniVersion::Legacy {
            return layout;
        }

        let num = |key: &str, fallback: u32| -> u32 {
            match store.get(GLOBALS_SECTION, key) {
                None => fallback,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!("Ignoring non-numeric {}='{}'", key, raw);
                    fallback
                }),
            }
        };

        layout.width = num("ls_width", layout.width);
        layout.height = num("ls_height", layout.height);
        layout.input_width = num("ls_input_width", layout.input_width);
        layout.label_x = num("ls_label_x_pos", layout.label_x);
        layout.input_y = num("ls_input_y_pos", layout.input_y);
        layout.label_y = layout.input_y.saturating_sub(4);
        layout.input_x = num("ls_input_x_pos", layout.label_x.saturating_add(85));

        layout.ok = Rect::new(
            num("ls_btn_ok_x_pos", OK_BUTTON.x),
            num("ls_btn_ok_y_pos", OK_BUTTON.y),
            num("ls_btn_ok_width", OK_BUTTON.width),
            num("ls_btn_ok_height", OK_BUTTON.height),
        );
        layout.cancel = Rect::new(
            num("ls_btn_cancel_x_pos", CANCEL_BUTTON.x),
            num("ls_btn_cancel_y_pos", CANCEL_BUTTON.y),
            num("ls_btn_cancel_width", CANCEL_BUTTON.width),
            num("ls_btn_cancel_height", CANCEL_BUTTON.height),
        );

        if store.get(GLOBALS_SECTION, "ls_logo_x_pos").is_some() {
            layout.logo = Some(Logo {
                x: num("ls_logo_x_pos", 0),
                y: num("ls_logo_y_pos", 0),
                filename: store
                    .get(GLOBALS_SECTION, "ls_logo_filename")
                    .map(str::to_string),
            });
        }

        layout
    }

    /// Label and input box positions of the module, username and password rows
    pub fn rows(&self) -> [((u32, u32), (u32, u32)); 3] {
        let row = |i: u32| {
            (
                (self.label_x, self.label_y.saturating_add(i * ROW_SPACING)),
                (self.input_x, self.input_y.saturating_add(i * ROW_SPACING)),
            )
        };
        [row(0), row(1), row(2)]
    }
}

/// A 24-bit colour written as six hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Accepts `rrggbb`, optionally prefixed with `#` or `0x`
impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex
            .strip_prefix('#')
            .or_else(|| hex.strip_prefix("0x"))
            .unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConfigError::invalid_value(
                "colour",
                format!("'{}' is not a six digit hex colour", s),
            ));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Rgb(r, g, b)),
            _ => Err(ConfigError::invalid_value("colour", format!("'{}' is not valid hex", s))),
        }
    }
}

impl serde::Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What a configurable colour paints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRole {
    /// Screen behind the dialog
    Background,
    /// Dialog body
    Window,
    /// Label and input text
    Text,
    /// Highlight edges and banner text
    Highlight,
    /// Shadow edges
    Shadow,
    /// Title banner
    Banner,
    /// Title banner gradient end
    BannerDark,
}

impl ColorRole {
    /// Every role
    pub const ALL: [ColorRole; 7] = [
        ColorRole::Background,
        ColorRole::Window,
        ColorRole::Text,
        ColorRole::Highlight,
        ColorRole::Shadow,
        ColorRole::Banner,
        ColorRole::BannerDark,
    ];

    /// Keys written for this role, most specific first
    pub fn keys(&self, version: IniVersion) -> &'static [&'static str] {
        match (self, version) {
            (ColorRole::Background, IniVersion::Legacy) => &["background"],
            (ColorRole::Background, IniVersion::V1) => &["ls_top_window_bg_color"],
            (ColorRole::Window, IniVersion::Legacy) => &["grey"],
            (ColorRole::Window, IniVersion::V1) => &["ls_bg_color", "grey"],
            (ColorRole::Text, _) => &["black"],
            (ColorRole::Highlight, _) => &["white"],
            (ColorRole::Shadow, _) => &["dark_grey"],
            (ColorRole::Banner, _) => &["blue"],
            (ColorRole::BannerDark, _) => &["dark_blue"],
        }
    }

    /// Keys consulted when reading, most specific first
    fn read_keys(&self, version: IniVersion) -> &'static [&'static str] {
        match (self, version) {
            (ColorRole::Background, IniVersion::V1) => &["ls_top_window_bg_color", "background"],
            _ => self.keys(version),
        }
    }

    /// Colour xrdp uses when none is configured
    pub fn default_color(&self, version: IniVersion) -> Rgb {
        match (self, version) {
            (ColorRole::Background, IniVersion::Legacy) => Rgb(0x00, 0x00, 0x00),
            (ColorRole::Background, IniVersion::V1) => Rgb(0x00, 0x9e, 0xb5),
            (ColorRole::Window, IniVersion::Legacy) => Rgb(0xc3, 0xc3, 0xc3),
            (ColorRole::Window, IniVersion::V1) => Rgb(0xde, 0xdf, 0xde),
            (ColorRole::Text, _) => Rgb(0x00, 0x00, 0x00),
            (ColorRole::Highlight, _) => Rgb(0xff, 0xff, 0xff),
            (ColorRole::Shadow, _) => Rgb(0x80, 0x80, 0x80),
            (ColorRole::Banner, IniVersion::Legacy) => Rgb(0x00, 0x00, 0xff),
            (ColorRole::Banner, IniVersion::V1) => Rgb(0x00, 0x9e, 0xb5),
            (ColorRole::BannerDark, _) => Rgb(0x00, 0x00, 0x7f),
        }
    }
}

impl FromStr for ColorRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "background" => Ok(ColorRole::Background),
            "window" | "grey" => Ok(ColorRole::Window),
            "text" | "black" => Ok(ColorRole::Text),
            "highlight" | "white" => Ok(ColorRole::Highlight),
            "shadow" | "dark_grey" => Ok(ColorRole::Shadow),
            "banner" | "blue" => Ok(ColorRole::Banner),
            "banner_dark" | "dark_blue" => Ok(ColorRole::BannerDark),
            _ => Err(ConfigError::invalid_value("colour role", format!("unknown role '{}'", s))),
        }
    }
}

impl XrdpIni {
    /// Current login dialog geometry
    pub fn login_layout(&self) -> LoginLayout {
        LoginLayout::read(&self.store, self.version)
    }

    fn layout_editable(&self, what: &str) -> bool {
        if self.version == IniVersion::V1 {
            true
        } else {
            warn!("Ignoring {} change, the legacy login window has a fixed layout", what);
            false
        }
    }

    fn set_layout_keys(&mut self, pairs: &[(&str, u32)]) {
        for (key, value) in pairs {
            self.store.set(GLOBALS_SECTION, key, value.to_string());
        }
        self.state.mark_dirty();
    }

    /// Resize the dialog
    pub fn set_dialog_size(&mut self, width: u32, height: u32) -> bool {
        if !self.layout_editable("dialog size") {
            return false;
        }
        self.set_layout_keys(&[("ls_width", width), ("ls_height", height)]);
        debug!("Login dialog resized to {}x{}", width, height);
        true
    }

    /// Move the labels and input boxes
    pub fn set_input_block(
        &mut self,
        label_x: u32,
        input_x: u32,
        input_y: u32,
        input_width: u32,
    ) -> bool {
        if !self.layout_editable("input position") {
            return false;
        }
        self.set_layout_keys(&[
            ("ls_label_x_pos", label_x),
            ("ls_input_y_pos", input_y),
            ("ls_input_x_pos", input_x),
            ("ls_input_width", input_width),
        ]);
        true
    }

    /// Place the OK and Cancel buttons
    pub fn set_buttons(&mut self, ok: Rect, cancel: Rect) -> bool {
        if !self.layout_editable("button") {
            return false;
        }
        self.set_layout_keys(&[
            ("ls_btn_ok_x_pos", ok.x),
            ("ls_btn_ok_y_pos", ok.y),
            ("ls_btn_ok_width", ok.width),
            ("ls_btn_ok_height", ok.height),
            ("ls_btn_cancel_x_pos", cancel.x),
            ("ls_btn_cancel_y_pos", cancel.y),
            ("ls_btn_cancel_width", cancel.width),
            ("ls_btn_cancel_height", cancel.height),
        ]);
        true
    }

    /// Move the logo
    pub fn move_logo(&mut self, x: u32, y: u32) -> bool {
        if !self.layout_editable("logo position") {
            return false;
        }
        self.set_layout_keys(&[("ls_logo_x_pos", x), ("ls_logo_y_pos", y)]);
        true
    }

    /// Change the logo image file
    pub fn set_logo_file(&mut self, filename: &str) -> bool {
        if !self.layout_editable("logo file") {
            return false;
        }
        self.store.set(GLOBALS_SECTION, "ls_logo_filename", filename);
        self.state.mark_dirty();
        true
    }

    /// Effective colour for a role
    pub fn color(&self, role: ColorRole) -> Rgb {
        role.read_keys(self.version)
            .iter()
            .find_map(|key| {
                self.store
                    .get(GLOBALS_SECTION, key)
                    .and_then(|raw| raw.parse().ok())
            })
            .unwrap_or_else(|| role.default_color(self.version))
    }

    /// Set a colour
    pub fn set_color(&mut self, role: ColorRole, color: Rgb) {
        for key in role.keys(self.version) {
            self.store.set(GLOBALS_SECTION, key, color.to_string());
        }
        self.state.mark_dirty();
    }

    /// Return a colour to xrdp's default by removing its keys
    pub fn reset_color(&mut self, role: ColorRole) -> bool {
        let mut removed = false;
        for key in role.read_keys(self.version) {
            removed |= self.store.remove(GLOBALS_SECTION, key).is_some();
        }
        self.touched(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::IniDocument;

    const LEGACY: &str = "[globals]\nblack=101010\n[xrdp1]\nname=a\n";
    const V1: &str = "\
[globals]
ini_version=1
ls_width=350
ls_height=430
ls_label_x_pos=30
ls_input_x_pos=110
ls_input_y_pos=220
ls_input_width=210
ls_btn_ok_x_pos=142
ls_btn_ok_y_pos=370
ls_btn_ok_width=85
ls_btn_ok_height=30
ls_btn_cancel_x_pos=237
ls_btn_cancel_y_pos=370
ls_btn_cancel_width=85
ls_btn_cancel_height=30
ls_logo_x_pos=85
ls_logo_y_pos=50
ls_logo_filename=
ls_top_window_bg_color=009cb5
[xrdp1]
name=a
";

    fn load(text: &str) -> XrdpIni {
        XrdpIni::from_text(text).unwrap().0
    }

    #[test]
    fn test_legacy_layout_is_fixed() {
        let mut ini = load(LEGACY);
        let layout = ini.login_layout();
        assert_eq!(layout, LoginLayout::default_for(IniVersion::Legacy));
        assert_eq!(layout.rows()[2], ((150, 82), (230, 89)));
        assert!(layout.help.is_some());

        assert!(!ini.set_dialog_size(500, 300));
        assert!(!ini.move_logo(1, 1));
        assert!(!ini.is_dirty());
    }

    #[test]
    fn test_v1_layout_read() {
        let layout = load(V1).login_layout();
        assert_eq!((layout.width, layout.height), (350, 430));
        assert_eq!((layout.input_x, layout.input_y), (110, 220));
        assert_eq!(layout.label_y, 216);
        assert_eq!(layout.ok, Rect::new(142, 370, 85, 30));
        assert_eq!(layout.cancel.x, 237);
        assert!(layout.help.is_none());
        let logo = layout.logo.unwrap();
        assert_eq!((logo.x, logo.y), (85, 50));
        assert_eq!(logo.filename.as_deref(), Some(""));
    }

    #[test]
    fn test_extreme_positions_saturate() {
        let ini = load(
            "[globals]\nini_version=1\nls_label_x_pos=4294967295\nls_input_y_pos=4294967290\n\
             [xrdp1]\nname=a\nlib=libvnc.so\n",
        );
        let layout = ini.login_layout();
        assert_eq!(layout.input_x, u32::MAX);

        let rows = layout.rows();
        assert_eq!(rows[0].1, (u32::MAX, 4294967290));
        assert_eq!(rows[2].0, (u32::MAX, u32::MAX));
        assert_eq!(rows[2].1, (u32::MAX, u32::MAX));
    }

    #[test]
    fn test_v1_edits_write_keys() {
        let mut ini = load(V1);
        assert!(ini.set_buttons(Rect::new(1, 2, 3, 4), Rect::new(5, 6, 7, 8)));
        assert!(ini.set_input_block(40, 125, 230, 180));
        assert!(ini.set_logo_file("/usr/share/xrdp/logo.bmp"));

        assert_eq!(ini.global("ls_btn_cancel_height"), Some("8"));
        assert_eq!(ini.global("ls_input_width"), Some("180"));
        assert_eq!(ini.global("ls_logo_filename"), Some("/usr/share/xrdp/logo.bmp"));
        let layout = ini.login_layout();
        assert_eq!(layout.rows()[1], ((40, 252), (125, 256)));
        assert!(ini.is_dirty());
    }

    #[test]
    fn test_colors_by_version() {
        let legacy = load(LEGACY);
        assert_eq!(legacy.color(ColorRole::Text), Rgb(0x10, 0x10, 0x10));
        assert_eq!(legacy.color(ColorRole::Window), Rgb(0xc3, 0xc3, 0xc3));

        let mut v1 = load(V1);
        assert_eq!(v1.color(ColorRole::Background).to_string(), "009cb5");
        v1.set_color(ColorRole::Window, "#DEDEDE".parse().unwrap());
        assert_eq!(v1.global("ls_bg_color"), Some("dedede"));
        assert_eq!(v1.global("grey"), Some("dedede"));

        assert!(v1.reset_color(ColorRole::Window));
        assert!(v1.global("grey").is_none());
        assert_eq!(v1.color(ColorRole::Window), Rgb(0xde, 0xdf, 0xde));
    }

    #[test]
    fn test_rgb_parse() {
        assert_eq!("00ff7f".parse::<Rgb>().unwrap(), Rgb(0, 255, 127));
        assert_eq!("0x0000FF".parse::<Rgb>().unwrap(), Rgb(0, 0, 255));
        assert!("fff".parse::<Rgb>().is_err());
        assert!("zzzzzz".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_color_role_names() {
        assert_eq!("dark_grey".parse::<ColorRole>().unwrap(), ColorRole::Shadow);
        assert_eq!("banner-dark".parse::<ColorRole>().unwrap(), ColorRole::BannerDark);
        assert!("purple".parse::<ColorRole>().is_err());
    }
}
