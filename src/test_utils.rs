//! Test utilities shared across test modules
//!
//! Temp-dir paths plus in-memory stand-ins for the paste sink and the popup
//! presenter, so dispatch can be exercised without a terminal.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::error::{SnipError, SnipResult};
use crate::paths::Paths;
use crate::popup::{PopupChoice, View};
use crate::presenter::Presenter;
use crate::sink::{PasteRequest, PasteSink};

/// Create a Paths struct for testing using a temporary directory
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths {
        base_dir: temp_dir.path().join(".snipcycle"),
        config_file: temp_dir.path().join(".snipcycle/config.json"),
        backups_dir: temp_dir.path().join(".snipcycle/backups"),
        socket_path: temp_dir.path().join("trigger.sock"),
    }
}

/// Push the file's mtime into the future so a reload sees it as changed,
/// whatever the filesystem's timestamp resolution
pub fn touch_later(path: &Path) {
    let later = SystemTime::now() + Duration::from_secs(5);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(later)
        .unwrap();
}

/// Paste sink that remembers every request
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub pasted: Vec<PasteRequest>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<&str> {
        self.pasted.iter().map(|r| r.text.as_str()).collect()
    }
}

impl PasteSink for RecordingSink {
    fn paste(&mut self, request: &PasteRequest) -> SnipResult<()> {
        if self.fail {
            return Err(SnipError::PasteFailed("clipboard unavailable".into()));
        }
        self.pasted.push(request.clone());
        Ok(())
    }
}

/// Presenter that replays a fixed list of user choices and records every view shown
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    pub choices: VecDeque<PopupChoice>,
    pub shown: Vec<View>,
}

impl ScriptedPresenter {
    pub fn new(choices: impl IntoIterator<Item = PopupChoice>) -> Self {
        Self {
            choices: choices.into_iter().collect(),
            shown: Vec::new(),
        }
    }
}

impl Presenter for ScriptedPresenter {
    fn present(&mut self, view: &View) -> SnipResult<PopupChoice> {
        self.shown.push(view.clone());
        // Running out of script behaves like the popup losing focus
        Ok(self.choices.pop_front().unwrap_or(PopupChoice::Cancel))
    }
}
