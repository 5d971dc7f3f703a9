//! Handlers for each CLI subcommand.
//!
//! Editing commands open the store, apply one mutation (which the store
//! persists immediately) and ping a running daemon so it reloads. Positions
//! typed by the user are 1-based; the store takes 0-based indices.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, info};

use crate::config::{Mode, ThemeMode};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::SnipError;
use crate::flatten::flatten;
use crate::hotkey::HotkeySpec;
use crate::paths::Paths;
use crate::presenter::{Presenter, TerminalPresenter};
use crate::sink::{PasteSink, SinkKind, build_sink};
use crate::snippet::{Direction, MoveOutcome, ProfileKind, SnippetNode, preview};
use crate::store::SnippetStore;
use crate::trigger::{
    CoreEvent, TriggerRequest, TriggerResponse, TriggerServer, TriggerSource, send_request,
};
use crate::ui::{PREVIEW_CHARS, Ui};

// -----------------------------------------------------------------------------
// Shared helpers
// -----------------------------------------------------------------------------

/// Load the store, surfacing load warnings and migrations to the user.
pub fn open_store(paths: &Paths, ui: &Ui) -> SnippetStore {
    let report = SnippetStore::open(paths);
    for warning in &report.warnings {
        ui.report(warning);
    }
    if report.migrated {
        ui.info(format!(
            "Converted {} from the legacy format",
            paths.config_file.display()
        ));
    }
    report.store
}

/// Explicit `--profile`, or the one the current mode dispatches from.
fn resolve_profile(store: &SnippetStore, profile: Option<ProfileKind>) -> ProfileKind {
    profile.unwrap_or_else(|| store.mode().profile())
}

/// Convert a 1-based position typed by the user into an index.
fn to_index(position: usize) -> Result<usize> {
    match position.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Positions start at 1"),
    }
}

/// Tell a running daemon to re-read the config. Silent when none is running.
fn notify_daemon(paths: &Paths) {
    if !paths.socket_path.exists() {
        return;
    }
    match send_request(&paths.socket_path, TriggerRequest::Reload) {
        Ok(response) => debug!(?response, "Daemon notified"),
        Err(e) => debug!(error = %format!("{:#}", e), "No daemon to notify"),
    }
}

fn describe(node: &SnippetNode) -> String {
    match node {
        SnippetNode::Text(text) => format!("'{}'", preview(text, PREVIEW_CHARS)),
        SnippetNode::Folder(folder) => format!(
            "folder '{}' and its {} items",
            folder.name,
            folder.items.len()
        ),
    }
}

fn confirm_removal(what: &str, force: bool, ui: &Ui) -> Result<bool> {
    if force {
        return Ok(true);
    }
    if !ui.interactive {
        bail!("Refusing to remove {} without confirmation; pass --force", what);
    }

    let confirm = inquire::Confirm::new(&format!("Remove {}?", what))
        .with_default(false)
        .with_help_message("This cannot be undone")
        .prompt()
        .context("Confirmation cancelled")?;

    if !confirm {
        ui.warn("Removal cancelled.");
    }
    Ok(confirm)
}

fn report_move(outcome: MoveOutcome, direction: Direction, ui: &Ui) {
    match outcome {
        MoveOutcome::Moved { to } => ui.ok(format!("Moved to position {}", to + 1)),
        MoveOutcome::AtBoundary => {
            let edge = match direction {
                Direction::Up => "top",
                Direction::Down => "bottom",
            };
            ui.warn(format!("Already at the {}; nothing moved", edge));
        }
    }
}

fn print_items(items: &[SnippetNode], ui: &Ui) {
    let mut table = ui.simple_table();
    table.set_header(vec![ui.header_cell("#"), ui.header_cell("Item")]);
    for (index, node) in items.iter().enumerate() {
        table.add_row(vec![ui.cell((index + 1).to_string()), ui.node_cell(node)]);
    }
    ui.println(table.to_string());
}

// -----------------------------------------------------------------------------
// Root-level items
// -----------------------------------------------------------------------------

/// List a profile's root items, or its flattened rotation order with `flat`.
pub fn list(paths: &Paths, profile: Option<ProfileKind>, flat: bool, ui: &Ui) -> Result<()> {
    let store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let items = store.profile(kind);

    let active = if store.mode().profile() == kind { " (active)" } else { "" };
    ui.section(format!("{} profile{}", kind, active));

    if items.is_empty() {
        ui.println(ui.dim("  (empty)"));
        ui.newline();
        ui.println(format!("Add one with: {} add <TEXT>", ui.bold("snipcycle")));
        return Ok(());
    }

    if flat {
        let texts = flatten(items);
        let mut table = ui.simple_table();
        table.set_header(vec![ui.header_cell("#"), ui.header_cell("Text")]);
        for (index, text) in texts.iter().enumerate() {
            table.add_row(vec![
                ui.cell((index + 1).to_string()),
                ui.cell(preview(text, PREVIEW_CHARS)),
            ]);
        }
        ui.println(table.to_string());
    } else {
        print_items(items, ui);
    }

    if !store.is_dispatchable(kind) {
        ui.warn("Only empty folders here; nothing to dispatch yet.");
    }
    Ok(())
}

pub fn add(paths: &Paths, profile: Option<ProfileKind>, text: &str, ui: &Ui) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    store.add_text(kind, text)?;
    notify_daemon(paths);

    ui.ok(format!(
        "Added text at position {} of the {} profile",
        store.profile(kind).len(),
        kind
    ));
    Ok(())
}

pub fn add_folder(paths: &Paths, profile: Option<ProfileKind>, name: &str, ui: &Ui) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    store.add_folder(kind, name)?;
    notify_daemon(paths);

    ui.ok(format!(
        "Added folder '{}' at position {} of the {} profile",
        name.trim(),
        store.profile(kind).len(),
        kind
    ));
    Ok(())
}

pub fn remove(
    paths: &Paths,
    profile: Option<ProfileKind>,
    position: usize,
    force: bool,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let index = to_index(position)?;

    let items = store.profile(kind);
    let node = items.get(index).ok_or(SnipError::MutationOutOfRange {
        index,
        len: items.len(),
    })?;
    let what = describe(node);
    if !confirm_removal(&what, force, ui)? {
        return Ok(());
    }

    store.delete_item(kind, index)?;
    notify_daemon(paths);
    ui.ok(format!("Removed {}", what));
    Ok(())
}

pub fn move_item(
    paths: &Paths,
    profile: Option<ProfileKind>,
    position: usize,
    direction: Direction,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let outcome = store.move_item(kind, to_index(position)?, direction)?;
    if matches!(outcome, MoveOutcome::Moved { .. }) {
        notify_daemon(paths);
    }
    report_move(outcome, direction, ui);
    Ok(())
}

pub fn edit(
    paths: &Paths,
    profile: Option<ProfileKind>,
    position: usize,
    text: &str,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    store.edit_text(kind, to_index(position)?, text)?;
    notify_daemon(paths);
    ui.ok(format!("Updated text at position {}", position));
    Ok(())
}

// -----------------------------------------------------------------------------
// Folder contents
// -----------------------------------------------------------------------------

pub fn folder_list(paths: &Paths, profile: Option<ProfileKind>, folder: usize, ui: &Ui) -> Result<()> {
    let store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let folder = store.folder(kind, to_index(folder)?)?;

    ui.section(format!("{} {}", ui.icon_folder(), folder.name));
    if folder.items.is_empty() {
        ui.println(ui.dim("  (empty)"));
    } else {
        print_items(&folder.items, ui);
    }
    Ok(())
}

pub fn folder_add(
    paths: &Paths,
    profile: Option<ProfileKind>,
    folder: usize,
    text: &str,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let folder_index = to_index(folder)?;
    store.add_text_to_folder(kind, folder_index, text)?;
    notify_daemon(paths);

    let folder = store.folder(kind, folder_index)?;
    ui.ok(format!(
        "Added text at position {} of folder '{}'",
        folder.items.len(),
        folder.name
    ));
    Ok(())
}

pub fn folder_remove(
    paths: &Paths,
    profile: Option<ProfileKind>,
    folder: usize,
    position: usize,
    force: bool,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let folder_index = to_index(folder)?;
    let index = to_index(position)?;

    let items = &store.folder(kind, folder_index)?.items;
    let node = items.get(index).ok_or(SnipError::MutationOutOfRange {
        index,
        len: items.len(),
    })?;
    let what = describe(node);
    if !confirm_removal(&what, force, ui)? {
        return Ok(());
    }

    store.delete_from_folder(kind, folder_index, index)?;
    notify_daemon(paths);
    ui.ok(format!("Removed {}", what));
    Ok(())
}

pub fn folder_move(
    paths: &Paths,
    profile: Option<ProfileKind>,
    folder: usize,
    position: usize,
    direction: Direction,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    let outcome = store.move_in_folder(kind, to_index(folder)?, to_index(position)?, direction)?;
    if matches!(outcome, MoveOutcome::Moved { .. }) {
        notify_daemon(paths);
    }
    report_move(outcome, direction, ui);
    Ok(())
}

pub fn folder_edit(
    paths: &Paths,
    profile: Option<ProfileKind>,
    folder: usize,
    position: usize,
    text: &str,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    store.edit_text_in_folder(kind, to_index(folder)?, to_index(position)?, text)?;
    notify_daemon(paths);
    ui.ok(format!("Updated text at position {}", position));
    Ok(())
}

pub fn folder_rename(
    paths: &Paths,
    profile: Option<ProfileKind>,
    folder: usize,
    name: &str,
    ui: &Ui,
) -> Result<()> {
    let mut store = open_store(paths, ui);
    let kind = resolve_profile(&store, profile);
    store.rename_folder(kind, to_index(folder)?, name)?;
    notify_daemon(paths);
    ui.ok(format!("Renamed folder to '{}'", name.trim()));
    Ok(())
}

// -----------------------------------------------------------------------------
// Settings
// -----------------------------------------------------------------------------

/// Show the mode, or switch to `mode`.
pub fn mode(paths: &Paths, mode: Option<Mode>, ui: &Ui) -> Result<()> {
    let mut store = open_store(paths, ui);
    let Some(mode) = mode else {
        ui.println(store.mode().to_string());
        return Ok(());
    };

    if store.mode() == mode {
        ui.ok(format!("Already in {} mode", mode));
        return Ok(());
    }
    store.set_mode(mode)?;
    notify_daemon(paths);

    ui.ok(format!("Switched to {} mode", mode));
    if !store.is_dispatchable(mode.profile()) {
        ui.report(&SnipError::EmptyProfile(mode.profile()));
    }
    Ok(())
}

/// Show the hotkey, or set it from a `+`-joined combination.
pub fn hotkey(paths: &Paths, combo: Option<&str>, ui: &Ui) -> Result<()> {
    let mut store = open_store(paths, ui);
    let Some(combo) = combo else {
        ui.println(store.hotkey().to_string());
        return Ok(());
    };

    let spec: HotkeySpec = combo.parse()?;
    store.set_hotkey(spec)?;
    notify_daemon(paths);
    ui.ok(format!("Hotkey set to {}", store.hotkey()));
    Ok(())
}

pub fn theme(paths: &Paths, theme: Option<ThemeMode>, ui: &Ui) -> Result<()> {
    let mut store = open_store(paths, ui);
    match theme {
        None => ui.println(store.theme().to_string()),
        Some(theme) => {
            store.set_theme(theme)?;
            notify_daemon(paths);
            ui.ok(format!("Theme set to {}", theme));
        }
    }
    Ok(())
}

/// Summarise settings, profile sizes and whether a daemon answers.
pub fn status(paths: &Paths, ui: &Ui) -> Result<()> {
    let store = open_store(paths, ui);
    let mut table = ui.simple_table();

    table.add_row(vec![
        ui.cell("Config:"),
        ui.cell(store.path().display().to_string()),
    ]);
    table.add_row(vec![ui.cell("Mode:"), ui.header_cell(store.mode().to_string())]);
    table.add_row(vec![ui.cell("Hotkey:"), ui.cell(store.hotkey().to_string())]);
    table.add_row(vec![ui.cell("Theme:"), ui.cell(store.theme().to_string())]);

    for kind in ProfileKind::all() {
        let texts = flatten(store.profile(kind)).len();
        let cell = if texts == 0 {
            ui.colored_cell("no texts", AnsiColor::Yellow)
        } else {
            ui.cell(format!("{} texts", texts))
        };
        table.add_row(vec![ui.cell(format!("{} profile:", kind)), cell]);
    }

    let daemon = match send_request(&paths.socket_path, TriggerRequest::Ping) {
        Ok(TriggerResponse::Pong) => ui.status_cell(ui.icon_ok(), "running"),
        _ => ui.status_cell(ui.icon_off(), "not running"),
    };
    table.add_row(vec![ui.cell("Daemon:"), daemon]);

    ui.section("snipcycle");
    ui.println(table.to_string());
    Ok(())
}

// -----------------------------------------------------------------------------
// Daemon and its clients
// -----------------------------------------------------------------------------

/// Own the store and serve triggers until told to stop.
pub fn run(paths: &Paths, sink: SinkKind, ui: &Ui) -> Result<()> {
    paths.ensure_dirs()?;
    let store = open_store(paths, ui);
    let sink = build_sink(sink)?;

    let mut server = TriggerServer::bind_to(paths.socket_path.clone())?;
    let (events, queue) = mpsc::channel();
    let _listener = server.spawn_listener(events)?;

    let mut dispatcher = Dispatcher::new(store, sink, TerminalPresenter::default());
    server.register(dispatcher.store().hotkey())?;
    match dispatcher.activate() {
        Ok(()) => ui.ok(format!("Ready in {} mode", dispatcher.mode())),
        Err(e) => ui.report(&e),
    }
    ui.info(format!(
        "Bind {} to `snipcycle trigger` (socket {})",
        dispatcher.store().hotkey(),
        server.path().display()
    ));

    serve_events(&mut dispatcher, &mut server, &queue, ui);
    shutdown(&mut dispatcher, &mut server, ui);
    ui.ok("Stopped");
    Ok(())
}

/// Process queued events one at a time until `Shutdown` or disconnect.
fn serve_events<S, P, T>(
    dispatcher: &mut Dispatcher<S, P>,
    source: &mut T,
    queue: &Receiver<CoreEvent>,
    ui: &Ui,
) where
    S: PasteSink,
    P: Presenter,
    T: TriggerSource,
{
    for event in queue.iter() {
        match event {
            CoreEvent::Trigger => {
                refresh(dispatcher, source, ui);
                match dispatcher.on_trigger() {
                    Ok(DispatchOutcome::Pasted { mode, text }) => {
                        info!(mode = %mode, chars = text.chars().count(), "Pasted");
                    }
                    Ok(DispatchOutcome::Cancelled) => debug!("Trigger ended without a selection"),
                    Err(e) => ui.report(&e),
                }
            }
            CoreEvent::Reload => refresh(dispatcher, source, ui),
            CoreEvent::Shutdown => {
                info!("Shutdown requested");
                return;
            }
        }
    }
}

/// Reload a changed config and re-register the hotkey if it moved.
fn refresh<S, P, T>(dispatcher: &mut Dispatcher<S, P>, source: &mut T, ui: &Ui)
where
    S: PasteSink,
    P: Presenter,
    T: TriggerSource,
{
    let previous = dispatcher.store().hotkey().clone();
    match dispatcher.refresh() {
        Ok(true) if dispatcher.store().hotkey() != &previous => {
            source.unregister();
            if let Err(e) = source.register(dispatcher.store().hotkey()) {
                ui.warn(format!("Failed to register hotkey: {:#}", e));
            }
        }
        Ok(_) => {}
        Err(e) => ui.report(&e),
    }
}

/// Stop serving, then save what is on disk plus anything only held in memory.
///
/// An unreadable config is left untouched for the user to repair.
fn shutdown<S, P, T>(dispatcher: &mut Dispatcher<S, P>, source: &mut T, ui: &Ui)
where
    S: PasteSink,
    P: Presenter,
    T: TriggerSource,
{
    dispatcher.deactivate();
    source.unregister();
    if let Err(e) = dispatcher.refresh() {
        ui.report(&e);
        return;
    }
    if let Err(e) = dispatcher.store_mut().save() {
        ui.report(&e);
    }
}

fn daemon_request(paths: &Paths, req: TriggerRequest) -> Result<TriggerResponse> {
    send_request(&paths.socket_path, req)
        .context("snipcycle is not running.\nHint: start it with 'snipcycle run'.")
}

/// Fire one trigger at the daemon; returns as soon as it is queued.
pub fn trigger(paths: &Paths) -> Result<()> {
    match daemon_request(paths, TriggerRequest::Trigger)? {
        TriggerResponse::Error(e) => bail!("Trigger rejected: {}", e),
        response => {
            debug!(?response, "Trigger sent");
            Ok(())
        }
    }
}

pub fn stop(paths: &Paths, ui: &Ui) -> Result<()> {
    match daemon_request(paths, TriggerRequest::Shutdown)? {
        TriggerResponse::Error(e) => bail!("Stop rejected: {}", e),
        _ => {
            ui.ok("Stop requested");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::popup::PopupChoice;
    use crate::test_utils::{RecordingSink, ScriptedPresenter, setup_test_paths, touch_later};
    use crate::ui::ColorMode;
    use std::fs;
    use tempfile::TempDir;

    fn test_ui() -> Ui {
        Ui::new(ColorMode::Never, false)
    }

    fn reopen(paths: &Paths) -> SnippetStore {
        SnippetStore::open(paths).store
    }

    /// Trigger source that records registrations
    #[derive(Default)]
    struct RecordingSource {
        registered: Option<HotkeySpec>,
        history: Vec<String>,
    }

    impl TriggerSource for RecordingSource {
        fn register(&mut self, hotkey: &HotkeySpec) -> Result<()> {
            self.history.push(format!("+{}", hotkey));
            self.registered = Some(hotkey.clone());
            Ok(())
        }

        fn unregister(&mut self) {
            if let Some(hotkey) = self.registered.take() {
                self.history.push(format!("-{}", hotkey));
            }
        }

        fn registered(&self) -> Option<&HotkeySpec> {
            self.registered.as_ref()
        }
    }

    #[test]
    fn test_list_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        assert!(list(&paths, None, false, &test_ui()).is_ok());
        assert!(list(&paths, Some(ProfileKind::Popup), true, &test_ui()).is_ok());
    }

    #[test]
    fn test_add_defaults_to_active_mode_profile() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();

        add(&paths, None, "  first  ", &ui).unwrap();
        mode(&paths, Some(Mode::Popup), &ui).unwrap();
        add_folder(&paths, None, "work", &ui).unwrap();
        add(&paths, Some(ProfileKind::Rotation), "second", &ui).unwrap();

        let store = reopen(&paths);
        assert_eq!(
            store.profile(ProfileKind::Rotation),
            &[SnippetNode::text("first"), SnippetNode::text("second")]
        );
        assert_eq!(
            store.profile(ProfileKind::Popup),
            &[SnippetNode::folder("work", vec![])]
        );
        assert!(list(&paths, None, false, &ui).is_ok());
    }

    #[test]
    fn test_add_empty_text_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let err = add(&paths, None, "   ", &test_ui()).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
        assert!(!paths.config_file.exists());
    }

    #[test]
    fn test_positions_are_one_based() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "a", &ui).unwrap();
        add(&paths, None, "b", &ui).unwrap();

        assert!(edit(&paths, None, 0, "x", &ui).is_err());
        edit(&paths, None, 2, "B", &ui).unwrap();
        move_item(&paths, None, 2, Direction::Up, &ui).unwrap();

        assert_eq!(
            reopen(&paths).profile(ProfileKind::Rotation),
            &[SnippetNode::text("B"), SnippetNode::text("a")]
        );
    }

    #[test]
    fn test_move_first_up_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "a", &ui).unwrap();
        add(&paths, None, "b", &ui).unwrap();

        move_item(&paths, None, 1, Direction::Up, &ui).unwrap();
        assert_eq!(
            reopen(&paths).profile(ProfileKind::Rotation),
            &[SnippetNode::text("a"), SnippetNode::text("b")]
        );
    }

    #[test]
    fn test_remove_folder_with_force() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add_folder(&paths, None, "f", &ui).unwrap();
        folder_add(&paths, None, 1, "x", &ui).unwrap();
        add(&paths, None, "y", &ui).unwrap();

        remove(&paths, None, 1, true, &ui).unwrap();
        assert_eq!(
            reopen(&paths).profile(ProfileKind::Rotation),
            &[SnippetNode::text("y")]
        );
    }

    #[test]
    fn test_remove_out_of_range() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let err = remove(&paths, None, 3, true, &test_ui()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_folder_commands() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        let popup = Some(ProfileKind::Popup);

        add_folder(&paths, popup, "greetings", &ui).unwrap();
        folder_add(&paths, popup, 1, "hi", &ui).unwrap();
        folder_add(&paths, popup, 1, "hello", &ui).unwrap();
        folder_move(&paths, popup, 1, 2, Direction::Up, &ui).unwrap();
        folder_edit(&paths, popup, 1, 2, "hi there", &ui).unwrap();
        folder_rename(&paths, popup, 1, " salutations ", &ui).unwrap();
        folder_remove(&paths, popup, 1, 1, true, &ui).unwrap();
        assert!(folder_list(&paths, popup, 1, &ui).is_ok());

        assert_eq!(
            reopen(&paths).profile(ProfileKind::Popup),
            &[SnippetNode::folder(
                "salutations",
                vec![SnippetNode::text("hi there")]
            )]
        );
    }

    #[test]
    fn test_folder_command_on_text_fails() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "plain", &ui).unwrap();
        assert!(folder_add(&paths, None, 1, "x", &ui).is_err());
        assert!(folder_list(&paths, None, 2, &ui).is_err());
    }

    #[test]
    fn test_settings_commands() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();

        hotkey(&paths, Some("Shift + CTRL + v"), &ui).unwrap();
        theme(&paths, Some(ThemeMode::Dark), &ui).unwrap();
        mode(&paths, Some(Mode::Popup), &ui).unwrap();
        assert!(hotkey(&paths, Some("ctrl+"), &ui).is_err());

        let store = reopen(&paths);
        assert_eq!(store.hotkey().to_string(), "ctrl+shift+v");
        assert_eq!(store.theme(), ThemeMode::Dark);
        assert_eq!(store.mode(), Mode::Popup);

        assert!(mode(&paths, None, &ui).is_ok());
        assert!(status(&paths, &ui).is_ok());
    }

    #[test]
    fn test_trigger_without_daemon_fails_with_hint() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let err = trigger(&paths).unwrap_err();
        assert!(format!("{:#}", err).contains("not running"));
    }

    #[test]
    fn test_event_loop_dispatches_until_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "a", &ui).unwrap();
        add(&paths, None, "b", &ui).unwrap();

        let mut dispatcher = Dispatcher::new(
            reopen(&paths),
            RecordingSink::default(),
            ScriptedPresenter::default(),
        );
        let mut source = RecordingSource::default();
        source.register(dispatcher.store().hotkey()).unwrap();
        dispatcher.activate().unwrap();

        let (tx, rx) = mpsc::channel();
        for event in [
            CoreEvent::Trigger,
            CoreEvent::Trigger,
            CoreEvent::Trigger,
            CoreEvent::Shutdown,
            CoreEvent::Trigger,
        ] {
            tx.send(event).unwrap();
        }
        serve_events(&mut dispatcher, &mut source, &rx, &ui);
        shutdown(&mut dispatcher, &mut source, &ui);

        // The trigger queued after shutdown is never served
        assert_eq!(dispatcher.sink().texts(), vec!["a", "b", "a"]);
        assert!(!dispatcher.engine().is_running());
        assert!(source.registered().is_none());
    }

    #[test]
    fn test_event_loop_follows_external_edits() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add_folder(&paths, Some(ProfileKind::Popup), "f", &ui).unwrap();
        folder_add(&paths, Some(ProfileKind::Popup), 1, "picked", &ui).unwrap();

        let mut dispatcher = Dispatcher::new(
            reopen(&paths),
            RecordingSink::default(),
            ScriptedPresenter::new([PopupChoice::Folder(0), PopupChoice::Text("picked".into())]),
        );
        let mut source = RecordingSource::default();
        source.register(dispatcher.store().hotkey()).unwrap();
        dispatcher.activate().unwrap_err();

        // Another process switches mode and hotkey while the loop runs
        mode(&paths, Some(Mode::Popup), &ui).unwrap();
        hotkey(&paths, Some("alt+p"), &ui).unwrap();
        touch_later(&paths.config_file);

        let (tx, rx) = mpsc::channel();
        tx.send(CoreEvent::Reload).unwrap();
        tx.send(CoreEvent::Trigger).unwrap();
        drop(tx);
        serve_events(&mut dispatcher, &mut source, &rx, &ui);

        assert_eq!(dispatcher.mode(), Mode::Popup);
        assert_eq!(source.history, vec!["+ctrl+2", "-ctrl+2", "+alt+p"]);
        assert_eq!(dispatcher.sink().texts(), vec!["picked"]);
        assert_eq!(dispatcher.sink().pasted[0].select_back, None);
    }

    type TestDispatcher = Dispatcher<RecordingSink, ScriptedPresenter>;

    fn running_dispatcher(paths: &Paths) -> (TestDispatcher, RecordingSource) {
        let mut dispatcher = Dispatcher::new(
            reopen(paths),
            RecordingSink::default(),
            ScriptedPresenter::default(),
        );
        let mut source = RecordingSource::default();
        source.register(dispatcher.store().hotkey()).unwrap();
        dispatcher.activate().unwrap();
        (dispatcher, source)
    }

    #[test]
    fn test_shutdown_keeps_settings_changed_while_running() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "a", &ui).unwrap();
        let (mut dispatcher, mut source) = running_dispatcher(&paths);

        theme(&paths, Some(ThemeMode::Dark), &ui).unwrap();
        add(&paths, None, "b", &ui).unwrap();
        touch_later(&paths.config_file);

        let (tx, rx) = mpsc::channel();
        tx.send(CoreEvent::Shutdown).unwrap();
        serve_events(&mut dispatcher, &mut source, &rx, &ui);
        shutdown(&mut dispatcher, &mut source, &ui);

        let store = reopen(&paths);
        assert_eq!(store.theme(), ThemeMode::Dark);
        assert_eq!(
            store.profile(ProfileKind::Rotation),
            &[SnippetNode::text("a"), SnippetNode::text("b")]
        );
    }

    #[test]
    fn test_shutdown_leaves_unreadable_config_alone() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let ui = test_ui();
        add(&paths, None, "a", &ui).unwrap();
        let (mut dispatcher, mut source) = running_dispatcher(&paths);

        fs::write(&paths.config_file, "{broken").unwrap();
        touch_later(&paths.config_file);
        shutdown(&mut dispatcher, &mut source, &ui);

        assert_eq!(fs::read_to_string(&paths.config_file).unwrap(), "{broken");
        assert!(source.registered().is_none());
    }
}
