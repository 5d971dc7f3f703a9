//! Snippet store.
//!
//! Owns both profiles plus the mode, hotkey and theme settings, and persists
//! them after every mutation. A mutation whose save fails is rolled back, so
//! callers only ever observe "applied and saved" or "did not happen".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::config::{AppState, ConfigShape, Mode, ParsedConfig, ThemeMode, parse_config, render_config};
use crate::error::{SnipError, SnipResult};
use crate::flatten::has_text;
use crate::fs_utils::{FileLock, backup_file, modified_time, replace_file};
use crate::hotkey::HotkeySpec;
use crate::paths::Paths;
use crate::snippet::{
    Direction, Folder, MoveOutcome, ProfileKind, SnippetNode, move_at, push_folder, push_text,
    remove_at, replace_text_at,
};

/// Prefix for backups of config files that could not be parsed
const BACKUP_PREFIX: &str = "config";

#[derive(Debug)]
pub struct SnippetStore {
    path: PathBuf,
    backups_dir: PathBuf,
    state: AppState,
    /// Modification time observed at the last load or save
    last_seen: Option<SystemTime>,
}

/// Outcome of [`SnippetStore::load`]. Loading never fails; problems become warnings.
#[derive(Debug)]
pub struct LoadReport {
    pub store: SnippetStore,
    pub shape: ConfigShape,
    /// Whether a legacy shape was converted (and re-saved) in the current format
    pub migrated: bool,
    pub warnings: Vec<SnipError>,
}

impl SnippetStore {
    /// Load the store from the configured locations.
    pub fn open(paths: &Paths) -> LoadReport {
        Self::load(&paths.config_file, &paths.backups_dir)
    }

    /// Read persisted state from `path`, falling back to defaults on any error.
    ///
    /// A malformed file is copied into `backups_dir` before it can be
    /// overwritten by the next save.
    pub fn load(path: &Path, backups_dir: &Path) -> LoadReport {
        let mut store = Self {
            path: path.to_path_buf(),
            backups_dir: backups_dir.to_path_buf(),
            state: AppState::default(),
            last_seen: None,
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, starting empty");
            return LoadReport {
                store,
                shape: ConfigShape::Empty,
                migrated: false,
                warnings: Vec::new(),
            };
        }

        let mut warnings = Vec::new();
        let parsed = match read_config(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Config unreadable, using defaults");
                warnings.push(store.preserve_unreadable(err));
                return LoadReport {
                    store,
                    shape: ConfigShape::Empty,
                    migrated: false,
                    warnings,
                };
            }
        };

        let ParsedConfig {
            state,
            shape,
            warnings: field_warnings,
        } = parsed;
        warnings.extend(field_warnings.into_iter().map(SnipError::InvalidInput));

        store.state = state;
        store.last_seen = modified_time(path);
        info!(
            path = %path.display(),
            shape = ?shape,
            mode = %store.state.mode,
            rotation_items = store.state.rotation.len(),
            popup_items = store.state.popup.len(),
            "Loaded config"
        );

        let migrated = shape.is_legacy();
        if migrated {
            info!(shape = ?shape, "Migrating legacy config to current format");
            if let Err(err) = store.save() {
                warn!(error = %err, "Failed to re-save migrated config");
                warnings.push(err);
            }
        }

        LoadReport {
            store,
            shape,
            migrated,
            warnings,
        }
    }

    fn preserve_unreadable(&self, err: SnipError) -> SnipError {
        let reason = match err {
            SnipError::PersistenceFailure { reason, .. } => reason,
            other => other.to_string(),
        };
        match backup_file(&self.path, &self.backups_dir, BACKUP_PREFIX) {
            Ok(backup) => SnipError::persistence(
                &self.path,
                format!("{}; defaults in use, original kept at {}", reason, backup.display()),
            ),
            Err(backup_err) => SnipError::persistence(
                &self.path,
                format!("{}; defaults in use, backup failed: {:#}", reason, backup_err),
            ),
        }
    }

    fn lock(&self) -> SnipResult<FileLock> {
        FileLock::acquire(&self.path)
            .map_err(|e| SnipError::persistence(&self.path, format!("{:#}", e)))
    }

    /// Persist the full state atomically.
    pub fn save(&mut self) -> SnipResult<()> {
        let _lock = self.lock()?;
        self.write_state()
    }

    /// Write the state out; the caller holds the file lock.
    fn write_state(&mut self) -> SnipResult<()> {
        let content =
            render_config(&self.state).map_err(|e| SnipError::persistence(&self.path, e))?;
        replace_file(&self.path, &content)
            .map_err(|e| SnipError::persistence(&self.path, format!("{:#}", e)))?;
        self.last_seen = modified_time(&self.path);
        debug!(path = %self.path.display(), "Saved config");
        Ok(())
    }

    /// Re-read the file if someone else changed it since our last load or save.
    ///
    /// Returns whether the in-memory state was replaced. A malformed file is
    /// reported and the current state kept.
    pub fn reload_if_changed(&mut self) -> SnipResult<bool> {
        if !self.changed_on_disk() {
            return Ok(false);
        }
        let _lock = self.lock()?;
        self.reload_locked()
    }

    fn changed_on_disk(&self) -> bool {
        let current = modified_time(&self.path);
        current.is_some() && current != self.last_seen
    }

    fn reload_locked(&mut self) -> SnipResult<bool> {
        if !self.changed_on_disk() {
            return Ok(false);
        }

        let current = modified_time(&self.path);
        let parsed = read_config(&self.path)?;
        for warning in &parsed.warnings {
            warn!(warning = %warning, "Reloaded config with defaults for some fields");
        }
        self.state = parsed.state;
        self.last_seen = current;
        info!(path = %self.path.display(), mode = %self.state.mode, "Reloaded changed config");

        if parsed.shape.is_legacy() {
            if let Err(err) = self.write_state() {
                warn!(error = %err, "Failed to re-save migrated config");
            }
        }
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn profile(&self, kind: ProfileKind) -> &[SnippetNode] {
        self.state.profile(kind)
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn hotkey(&self) -> &HotkeySpec {
        &self.state.hotkey
    }

    pub fn theme(&self) -> ThemeMode {
        self.state.theme
    }

    /// Whether the profile has at least one reachable text.
    pub fn is_dispatchable(&self, kind: ProfileKind) -> bool {
        has_text(self.profile(kind))
    }

    pub fn folder(&self, kind: ProfileKind, index: usize) -> SnipResult<&Folder> {
        let items = self.profile(kind);
        let node = items.get(index).ok_or(SnipError::MutationOutOfRange {
            index,
            len: items.len(),
        })?;
        node.as_folder()
            .ok_or_else(|| SnipError::invalid(format!("item {} is a text, not a folder", index)))
    }

    // -------------------------------------------------------------------------
    // Write-through mutation
    // -------------------------------------------------------------------------

    /// Apply `op`, then save when `changed` says the result altered state.
    ///
    /// The file lock is held from the reload through the save, so edits made
    /// by another process in the meantime are applied on, never overwritten.
    /// Any failure restores the state observed before `op` ran.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut AppState) -> SnipResult<T>,
        changed: impl FnOnce(&T) -> bool,
    ) -> SnipResult<T> {
        let _lock = self.lock()?;
        if let Err(err) = self.reload_locked() {
            warn!(error = %err, "Config on disk unreadable, editing the loaded state");
        }

        let snapshot = self.state.clone();
        let outcome = match op(&mut self.state) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state = snapshot;
                return Err(err);
            }
        };

        if changed(&outcome) {
            if let Err(err) = self.write_state() {
                warn!(error = %err, "Save failed, rolling back mutation");
                self.state = snapshot;
                return Err(err);
            }
        }
        Ok(outcome)
    }

    fn write_through<T>(&mut self, op: impl FnOnce(&mut AppState) -> SnipResult<T>) -> SnipResult<T> {
        self.apply(op, |_| true)
    }

    pub fn add_text(&mut self, kind: ProfileKind, text: &str) -> SnipResult<()> {
        self.write_through(|state| push_text(state.profile_mut(kind), text))?;
        info!(profile = %kind, "Added text");
        Ok(())
    }

    pub fn add_folder(&mut self, kind: ProfileKind, name: &str) -> SnipResult<()> {
        self.write_through(|state| push_folder(state.profile_mut(kind), name))?;
        info!(profile = %kind, "Added folder");
        Ok(())
    }

    /// Remove the root item at `index`. Confirmation is the caller's business.
    pub fn delete_item(&mut self, kind: ProfileKind, index: usize) -> SnipResult<SnippetNode> {
        let removed = self.write_through(|state| remove_at(state.profile_mut(kind), index))?;
        info!(profile = %kind, index, folder = removed.is_folder(), "Deleted item");
        Ok(removed)
    }

    pub fn move_item(
        &mut self,
        kind: ProfileKind,
        index: usize,
        direction: Direction,
    ) -> SnipResult<MoveOutcome> {
        let outcome = self.apply(
            |state| move_at(state.profile_mut(kind), index, direction),
            |outcome| matches!(outcome, MoveOutcome::Moved { .. }),
        )?;
        debug!(profile = %kind, index, ?direction, ?outcome, "Move requested");
        Ok(outcome)
    }

    pub fn edit_text(&mut self, kind: ProfileKind, index: usize, text: &str) -> SnipResult<()> {
        self.write_through(|state| replace_text_at(state.profile_mut(kind), index, text))?;
        info!(profile = %kind, index, "Edited text");
        Ok(())
    }

    /// Edit the folder at root `index` in place and persist the result.
    ///
    /// The closure receives the folder itself, not a path to it, mirroring an
    /// editing dialog that holds the folder open.
    pub fn edit_folder<T>(
        &mut self,
        kind: ProfileKind,
        index: usize,
        f: impl FnOnce(&mut Folder) -> SnipResult<T>,
    ) -> SnipResult<T> {
        self.write_through(|state| with_folder(state.profile_mut(kind), index, f))
    }

    pub fn add_text_to_folder(
        &mut self,
        kind: ProfileKind,
        folder: usize,
        text: &str,
    ) -> SnipResult<()> {
        self.edit_folder(kind, folder, |f| f.add_text(text))
    }

    pub fn delete_from_folder(
        &mut self,
        kind: ProfileKind,
        folder: usize,
        index: usize,
    ) -> SnipResult<SnippetNode> {
        self.edit_folder(kind, folder, |f| f.delete(index))
    }

    pub fn move_in_folder(
        &mut self,
        kind: ProfileKind,
        folder: usize,
        index: usize,
        direction: Direction,
    ) -> SnipResult<MoveOutcome> {
        self.apply(
            |state| with_folder(state.profile_mut(kind), folder, |f| f.move_item(index, direction)),
            |outcome| matches!(outcome, MoveOutcome::Moved { .. }),
        )
    }

    pub fn edit_text_in_folder(
        &mut self,
        kind: ProfileKind,
        folder: usize,
        index: usize,
        text: &str,
    ) -> SnipResult<()> {
        self.edit_folder(kind, folder, |f| f.edit_text(index, text))
    }

    pub fn rename_folder(&mut self, kind: ProfileKind, folder: usize, name: &str) -> SnipResult<()> {
        self.edit_folder(kind, folder, |f| f.rename(name))
    }

    pub fn set_mode(&mut self, mode: Mode) -> SnipResult<()> {
        self.apply(
            |state| Ok(std::mem::replace(&mut state.mode, mode)),
            |previous| *previous != mode,
        )?;
        info!(mode = %mode, "Mode set");
        Ok(())
    }

    pub fn set_hotkey(&mut self, hotkey: HotkeySpec) -> SnipResult<()> {
        self.apply(
            |state| Ok(std::mem::replace(&mut state.hotkey, hotkey) != state.hotkey),
            |changed| *changed,
        )?;
        Ok(())
    }

    pub fn set_theme(&mut self, theme: ThemeMode) -> SnipResult<()> {
        self.apply(
            |state| Ok(std::mem::replace(&mut state.theme, theme)),
            |previous| *previous != theme,
        )?;
        Ok(())
    }
}

fn read_config(path: &Path) -> SnipResult<ParsedConfig> {
    let content = fs::read_to_string(path).map_err(|e| SnipError::persistence(path, e))?;
    parse_config(&content).map_err(|e| SnipError::persistence(path, e))
}

fn with_folder<T>(
    items: &mut [SnippetNode],
    index: usize,
    f: impl FnOnce(&mut Folder) -> SnipResult<T>,
) -> SnipResult<T> {
    let len = items.len();
    let node = items
        .get_mut(index)
        .ok_or(SnipError::MutationOutOfRange { index, len })?;
    let folder = node
        .as_folder_mut()
        .ok_or_else(|| SnipError::invalid(format!("item {} is a text, not a folder", index)))?;
    f(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_test_paths, touch_later};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn open(temp_dir: &TempDir) -> SnippetStore {
        let paths = setup_test_paths(temp_dir);
        SnippetStore::open(&paths).store
    }

    fn on_disk(store: &SnippetStore) -> Value {
        serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let report = SnippetStore::open(&setup_test_paths(&temp_dir));
        assert!(report.warnings.is_empty());
        assert!(!report.migrated);
        assert_eq!(report.store.state(), &AppState::default());
        assert_eq!(report.store.hotkey().to_string(), "ctrl+2");
    }

    #[test]
    fn test_legacy_data_is_migrated_and_resaved() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        fs::create_dir_all(&paths.base_dir).unwrap();
        fs::write(&paths.config_file, r#"{"data": ["x", "y"]}"#).unwrap();

        let report = SnippetStore::open(&paths);
        assert!(report.migrated);
        assert_eq!(report.shape, ConfigShape::LegacyData);
        let store = report.store;
        assert_eq!(
            store.profile(ProfileKind::Rotation),
            &[SnippetNode::text("x"), SnippetNode::text("y")]
        );
        assert!(store.profile(ProfileKind::Popup).is_empty());
        assert_eq!(store.mode(), Mode::Rotation);

        let value = on_disk(&store);
        assert_eq!(value["data_rotation"], json!(["x", "y"]));
        assert_eq!(value["data_popup"], json!([]));
        assert_eq!(value["use_popup"], json!(false));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_and_is_backed_up() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        fs::create_dir_all(&paths.base_dir).unwrap();
        fs::write(&paths.config_file, "{\"data_rotation\": [").unwrap();

        let report = SnippetStore::open(&paths);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            report.warnings[0],
            SnipError::PersistenceFailure { .. }
        ));
        assert_eq!(report.store.state(), &AppState::default());

        let backups: Vec<_> = fs::read_dir(&paths.backups_dir).unwrap().collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_mutations_are_written_through() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);

        store.add_text(ProfileKind::Popup, "  hello ").unwrap();
        store.add_folder(ProfileKind::Popup, "work").unwrap();
        store.add_text_to_folder(ProfileKind::Popup, 1, "inside").unwrap();

        assert_eq!(
            on_disk(&store)["data_popup"],
            json!(["hello", {"type": "folder", "name": "work", "items": ["inside"]}])
        );
        assert!(store.profile(ProfileKind::Rotation).is_empty());

        let reopened = open(&temp_dir);
        assert_eq!(reopened.state(), store.state());
    }

    #[test]
    fn test_delete_folder_removes_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_folder(ProfileKind::Rotation, "f").unwrap();
        store.add_text_to_folder(ProfileKind::Rotation, 0, "x").unwrap();
        store.add_text(ProfileKind::Rotation, "y").unwrap();

        let removed = store.delete_item(ProfileKind::Rotation, 0).unwrap();
        assert_eq!(removed, SnippetNode::folder("f", vec![SnippetNode::text("x")]));
        assert_eq!(store.profile(ProfileKind::Rotation), &[SnippetNode::text("y")]);
    }

    #[test]
    fn test_invalid_mutations_change_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_text(ProfileKind::Rotation, "a").unwrap();
        let before = store.state().clone();

        assert!(matches!(
            store.add_text(ProfileKind::Rotation, "   "),
            Err(SnipError::InvalidInput(_))
        ));
        assert!(matches!(
            store.delete_item(ProfileKind::Rotation, 5),
            Err(SnipError::MutationOutOfRange { index: 5, len: 1 })
        ));
        assert!(store.edit_text(ProfileKind::Rotation, 0, "").is_err());
        assert!(store.add_text_to_folder(ProfileKind::Rotation, 0, "x").is_err());
        assert_eq!(
            store.move_item(ProfileKind::Rotation, 0, Direction::Up).unwrap(),
            MoveOutcome::AtBoundary
        );
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_folder_edits_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_folder(ProfileKind::Popup, "f").unwrap();

        store
            .edit_folder(ProfileKind::Popup, 0, |folder| {
                folder.add_text("one")?;
                folder.add_text("two")?;
                folder.rename("renamed")
            })
            .unwrap();
        assert_eq!(
            store.move_in_folder(ProfileKind::Popup, 0, 1, Direction::Up).unwrap(),
            MoveOutcome::Moved { to: 0 }
        );
        store.edit_text_in_folder(ProfileKind::Popup, 0, 0, "2").unwrap();
        store.delete_from_folder(ProfileKind::Popup, 0, 1).unwrap();

        let folder = store.folder(ProfileKind::Popup, 0).unwrap();
        assert_eq!(folder, &Folder::new("renamed", vec![SnippetNode::text("2")]));
    }

    #[test]
    fn test_failed_folder_closure_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_folder(ProfileKind::Popup, "f").unwrap();

        let result = store.edit_folder(ProfileKind::Popup, 0, |folder| {
            folder.add_text("kept?")?;
            folder.rename("")
        });
        assert!(result.is_err());
        assert!(store.folder(ProfileKind::Popup, 0).unwrap().items.is_empty());
    }

    #[test]
    fn test_save_failure_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let report = SnippetStore::load(&blocker.join("config.json"), &temp_dir.path().join("b"));
        let mut store = report.store;

        let err = store.add_text(ProfileKind::Rotation, "lost").unwrap_err();
        assert!(matches!(err, SnipError::PersistenceFailure { .. }));
        assert!(store.profile(ProfileKind::Rotation).is_empty());
    }

    #[test]
    fn test_settings_persist() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.set_mode(Mode::Popup).unwrap();
        store.set_hotkey(HotkeySpec::parse("alt+x").unwrap()).unwrap();
        store.set_theme(ThemeMode::Dark).unwrap();

        let value = on_disk(&store);
        assert_eq!(value["use_popup"], json!(true));
        assert_eq!(value["hotkey"], json!("alt+x"));
        assert_eq!(value["theme_mode"], json!("dark"));
    }

    #[test]
    fn test_reload_picks_up_external_edit() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_text(ProfileKind::Rotation, "a").unwrap();
        assert!(!store.reload_if_changed().unwrap());

        let mut other = open(&temp_dir);
        other.add_text(ProfileKind::Rotation, "b").unwrap();
        touch_later(other.path());

        assert!(store.reload_if_changed().unwrap());
        assert_eq!(
            store.profile(ProfileKind::Rotation),
            &[SnippetNode::text("a"), SnippetNode::text("b")]
        );
    }

    #[test]
    fn test_reload_of_malformed_file_keeps_state() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_text(ProfileKind::Rotation, "a").unwrap();
        let before = store.state().clone();

        fs::write(store.path(), "{broken").unwrap();
        touch_later(store.path());

        assert!(matches!(
            store.reload_if_changed(),
            Err(SnipError::PersistenceFailure { .. })
        ));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn test_reload_keeps_legacy_data_when_resave_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open(&temp_dir);
        store.add_text(ProfileKind::Rotation, "a").unwrap();

        fs::write(store.path(), r#"{"data": ["x"]}"#).unwrap();
        touch_later(store.path());
        // A directory in the temp file's place makes every write fail
        fs::create_dir(store.path().with_file_name("config.json.tmp")).unwrap();

        assert!(store.reload_if_changed().unwrap());
        assert_eq!(store.profile(ProfileKind::Rotation), &[SnippetNode::text("x")]);
        assert!(!store.reload_if_changed().unwrap());
    }

    #[test]
    fn test_stale_store_applies_edits_on_top_of_disk() {
        let temp_dir = TempDir::new().unwrap();
        open(&temp_dir).save().unwrap();

        // Two invocations load the same file before either writes
        let mut first = open(&temp_dir);
        let mut second = open(&temp_dir);
        first.add_text(ProfileKind::Rotation, "one").unwrap();
        touch_later(first.path());
        second.add_text(ProfileKind::Rotation, "two").unwrap();

        let expected = [SnippetNode::text("one"), SnippetNode::text("two")];
        assert_eq!(second.profile(ProfileKind::Rotation), &expected);
        assert_eq!(open(&temp_dir).profile(ProfileKind::Rotation), &expected);
    }
}
