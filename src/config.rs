//! Persisted configuration shape.
//!
//! The config file is a JSON object with `data_rotation`, `data_popup`,
//! `hotkey`, `use_popup` and `theme_mode`. Two older shapes are still
//! recognised: a single tree under `data`, and a flat list under `texts`.
//! Both are read as the rotation profile with rotation mode forced on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hotkey::HotkeySpec;
use crate::snippet::{ProfileKind, SnippetNode};

/// Active dispatch strategy. Stored on disk as the `use_popup` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Rotation,
    Popup,
}

impl Mode {
    pub fn from_use_popup(use_popup: bool) -> Self {
        if use_popup { Mode::Popup } else { Mode::Rotation }
    }

    pub fn use_popup(self) -> bool {
        matches!(self, Mode::Popup)
    }

    /// The profile this mode dispatches from.
    pub fn profile(self) -> ProfileKind {
        match self {
            Mode::Rotation => ProfileKind::Rotation,
            Mode::Popup => ProfileKind::Popup,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ProfileKind>() {
            Ok(ProfileKind::Rotation) => Ok(Mode::Rotation),
            Ok(ProfileKind::Popup) => Ok(Mode::Popup),
            Err(_) => Err(format!("invalid mode: {} (expected rotation or popup)", s)),
        }
    }
}

/// Persisted theme preference. Only stored; rendering lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    Auto,
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::Auto => "auto",
        };
        f.write_str(s)
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            "auto" => Ok(ThemeMode::Auto),
            _ => Err(format!("invalid theme mode: {} (expected light, dark or auto)", s)),
        }
    }
}

/// Everything the store persists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub rotation: Vec<SnippetNode>,
    pub popup: Vec<SnippetNode>,
    pub mode: Mode,
    pub hotkey: HotkeySpec,
    pub theme: ThemeMode,
}

impl AppState {
    pub fn profile(&self, kind: ProfileKind) -> &[SnippetNode] {
        match kind {
            ProfileKind::Rotation => &self.rotation,
            ProfileKind::Popup => &self.popup,
        }
    }

    pub fn profile_mut(&mut self, kind: ProfileKind) -> &mut Vec<SnippetNode> {
        match kind {
            ProfileKind::Rotation => &mut self.rotation,
            ProfileKind::Popup => &mut self.popup,
        }
    }
}

/// Which on-disk layout a config file used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigShape {
    /// Both profiles plus the `use_popup` flag
    Current,
    /// Legacy single tree under `data`
    LegacyData,
    /// Legacy flat list under `texts`
    LegacyTexts,
    /// No snippet data at all
    Empty,
}

impl ConfigShape {
    pub fn is_legacy(self) -> bool {
        matches!(self, ConfigShape::LegacyData | ConfigShape::LegacyTexts)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    data_rotation: Option<Vec<SnippetNode>>,
    data_popup: Option<Vec<SnippetNode>>,
    use_popup: Option<bool>,
    hotkey: Option<String>,
    theme_mode: Option<String>,
    data: Option<Vec<SnippetNode>>,
    texts: Option<Vec<SnippetNode>>,
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    data_rotation: &'a [SnippetNode],
    data_popup: &'a [SnippetNode],
    hotkey: String,
    use_popup: bool,
    theme_mode: ThemeMode,
}

/// Result of interpreting a config file.
#[derive(Debug)]
pub struct ParsedConfig {
    pub state: AppState,
    pub shape: ConfigShape,
    /// Fields that were present but unusable and replaced by defaults
    pub warnings: Vec<String>,
}

/// Interpret the content of a config file.
///
/// Structural errors (not JSON, not an object, malformed snippet trees) are
/// returned; a bad `hotkey` or `theme_mode` value only produces a warning.
pub fn parse_config(content: &str) -> Result<ParsedConfig, serde_json::Error> {
    let raw: RawConfig = if content.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_json::from_str(content)?
    };

    let mut warnings = Vec::new();

    let hotkey = match raw.hotkey.as_deref() {
        None => HotkeySpec::default(),
        Some(s) => HotkeySpec::parse(s).unwrap_or_else(|e| {
            warnings.push(format!("{}; using default hotkey", e));
            HotkeySpec::default()
        }),
    };

    let theme = match raw.theme_mode.as_deref() {
        None => ThemeMode::default(),
        Some(s) => s.parse::<ThemeMode>().unwrap_or_else(|e| {
            warnings.push(format!("{}; using auto", e));
            ThemeMode::default()
        }),
    };

    let (shape, rotation, popup, mode) = if raw.data_rotation.is_some() || raw.data_popup.is_some() {
        (
            ConfigShape::Current,
            raw.data_rotation.unwrap_or_default(),
            raw.data_popup.unwrap_or_default(),
            Mode::from_use_popup(raw.use_popup.unwrap_or(false)),
        )
    } else if let Some(data) = raw.data {
        (ConfigShape::LegacyData, data, Vec::new(), Mode::Rotation)
    } else if let Some(texts) = raw.texts {
        (ConfigShape::LegacyTexts, texts, Vec::new(), Mode::Rotation)
    } else {
        (ConfigShape::Empty, Vec::new(), Vec::new(), Mode::Rotation)
    };

    Ok(ParsedConfig {
        state: AppState {
            rotation,
            popup,
            mode,
            hotkey,
            theme,
        },
        shape,
        warnings,
    })
}

/// Serialise state in the current shape, pretty-printed.
pub fn render_config(state: &AppState) -> Result<String, serde_json::Error> {
    let file = ConfigFile {
        data_rotation: &state.rotation,
        data_popup: &state.popup,
        hotkey: state.hotkey.to_string(),
        use_popup: state.mode.use_popup(),
        theme_mode: state.theme,
    };
    serde_json::to_string_pretty(&file)
}
