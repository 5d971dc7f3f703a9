//! Hotkey combinations.
//!
//! A hotkey is stored as lower-cased key names joined with `+`, e.g.
//! `ctrl+2` or `ctrl+shift+page up`.

use std::fmt;
use std::str::FromStr;

use crate::error::SnipError;

pub const DEFAULT_HOTKEY: &str = "ctrl+2";

/// Canonical modifier names, in the order they are written.
const MODIFIERS: [&str; 5] = ["ctrl", "shift", "alt", "alt gr", "windows"];

fn canonical_modifier(key: &str) -> Option<&'static str> {
    match key {
        "ctrl" | "control" => Some("ctrl"),
        "shift" => Some("shift"),
        "alt" | "option" => Some("alt"),
        "alt gr" | "altgr" => Some("alt gr"),
        "windows" | "win" | "super" | "cmd" | "command" | "meta" => Some("windows"),
        _ => None,
    }
}

/// A validated, normalised key combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HotkeySpec {
    modifiers: Vec<&'static str>,
    keys: Vec<String>,
}

impl HotkeySpec {
    pub fn parse(raw: &str) -> Result<Self, SnipError> {
        if raw.trim().is_empty() {
            return Err(SnipError::invalid("hotkey cannot be empty"));
        }

        let mut modifiers = Vec::new();
        let mut keys: Vec<String> = Vec::new();

        for token in raw.split('+') {
            let key = token.trim().to_lowercase();
            if key.is_empty() {
                return Err(SnipError::invalid(format!(
                    "hotkey '{}' contains an empty key",
                    raw
                )));
            }
            if let Some(modifier) = canonical_modifier(&key) {
                if !modifiers.contains(&modifier) {
                    modifiers.push(modifier);
                }
            } else if !keys.contains(&key) {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Err(SnipError::invalid(format!(
                "hotkey '{}' has only modifiers; add a key such as a digit or letter",
                raw
            )));
        }

        modifiers.sort_by_key(|m| MODIFIERS.iter().position(|c| c == m));
        Ok(Self { modifiers, keys })
    }

    pub fn modifiers(&self) -> &[&'static str] {
        &self.modifiers
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Default for HotkeySpec {
    fn default() -> Self {
        Self {
            modifiers: vec!["ctrl"],
            keys: vec!["2".to_string()],
        }
    }
}

impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .modifiers
            .iter()
            .copied()
            .chain(self.keys.iter().map(String::as_str))
            .collect();
        f.write_str(&parts.join("+"))
    }
}

impl FromStr for HotkeySpec {
    type Err = SnipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
