//! Trigger dispatch.
//!
//! The [`Dispatcher`] is the single owner of the store, the rotation engine
//! and the external collaborators. Each trigger is routed by the current mode:
//! rotation pastes the next text of the flattened rotation profile, popup runs
//! a navigation session through the presenter and pastes the chosen text.

use tracing::{debug, info, warn};

use crate::config::Mode;
use crate::error::{SnipError, SnipResult};
use crate::flatten::has_text;
use crate::popup::{NavStep, PopupNavigator};
use crate::presenter::Presenter;
use crate::rotation::RotationEngine;
use crate::sink::{PasteRequest, PasteSink};
use crate::snippet::ProfileKind;
use crate::store::SnippetStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Pasted { mode: Mode, text: String },
    Cancelled,
}

pub struct Dispatcher<S, P> {
    store: SnippetStore,
    engine: RotationEngine,
    sink: S,
    presenter: P,
    /// Set between `activate` and `deactivate`: the owner wants triggers served
    armed: bool,
}

impl<S: PasteSink, P: Presenter> Dispatcher<S, P> {
    pub fn new(store: SnippetStore, sink: S, presenter: P) -> Self {
        Self {
            store,
            engine: RotationEngine::new(),
            sink,
            presenter,
            armed: false,
        }
    }

    pub fn store(&self) -> &SnippetStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SnippetStore {
        &mut self.store
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn mode(&self) -> Mode {
        self.store.mode()
    }

    /// Prepare the current mode for triggers.
    ///
    /// Rotation mode starts the engine; popup mode only checks that something
    /// is selectable. Either way the dispatcher stays armed, so a later reload
    /// that fills the profile can finish the job.
    pub fn activate(&mut self) -> SnipResult<()> {
        self.armed = true;
        self.prepare()
    }

    pub fn deactivate(&mut self) {
        self.armed = false;
        self.engine.stop();
    }

    fn prepare(&mut self) -> SnipResult<()> {
        match self.mode() {
            Mode::Rotation => {
                self.engine.start(self.store.profile(ProfileKind::Rotation))?;
                Ok(())
            }
            Mode::Popup => {
                self.engine.stop();
                if has_text(self.store.profile(ProfileKind::Popup)) {
                    Ok(())
                } else {
                    Err(SnipError::EmptyProfile(ProfileKind::Popup))
                }
            }
        }
    }

    /// Switch modes, stopping whatever the old mode had running.
    ///
    /// The new mode is persisted before anything else happens. If the
    /// dispatcher is armed the new mode is prepared; an empty profile there is
    /// logged, not returned, since the switch itself succeeded.
    pub fn set_mode(&mut self, mode: Mode) -> SnipResult<()> {
        if mode == self.mode() {
            return Ok(());
        }

        let was_running = self.engine.is_running();
        self.engine.stop();
        if let Err(err) = self.store.set_mode(mode) {
            if was_running {
                if let Err(restart) = self.prepare() {
                    warn!(error = %restart, "Could not restart rotation after failed mode switch");
                }
            }
            return Err(err);
        }

        self.mode_changed(mode);
        Ok(())
    }

    fn mode_changed(&mut self, mode: Mode) {
        info!(mode = %mode, "Mode switched");
        if self.armed {
            if let Err(err) = self.prepare() {
                warn!(mode = %mode, error = %err, "Switched mode but nothing to dispatch yet");
            }
        }
    }

    /// Pick up edits made to the config file by another process.
    ///
    /// A mode change on disk goes through the same stop-then-prepare path as
    /// [`Dispatcher::set_mode`]. Returns whether anything was reloaded.
    pub fn refresh(&mut self) -> SnipResult<bool> {
        let previous_mode = self.mode();
        if !self.store.reload_if_changed()? {
            return Ok(false);
        }

        if self.mode() != previous_mode {
            self.engine.stop();
            self.mode_changed(self.mode());
        } else if self.armed && self.mode() == Mode::Rotation && !self.engine.is_running() {
            if let Err(err) = self.prepare() {
                debug!(error = %err, "Rotation still has nothing to dispatch");
            }
        }
        Ok(true)
    }

    /// Handle one trigger according to the current mode.
    pub fn on_trigger(&mut self) -> SnipResult<DispatchOutcome> {
        match self.mode() {
            Mode::Rotation => self.dispatch_rotation(),
            Mode::Popup => self.dispatch_popup(),
        }
    }

    fn dispatch_rotation(&mut self) -> SnipResult<DispatchOutcome> {
        if !self.engine.is_running() {
            return Err(SnipError::EmptyProfile(ProfileKind::Rotation));
        }
        self.engine.sync(self.store.profile(ProfileKind::Rotation));
        let text = self.engine.next()?;
        self.paste(text, Mode::Rotation)
    }

    fn dispatch_popup(&mut self) -> SnipResult<DispatchOutcome> {
        let (mut navigator, mut view) =
            PopupNavigator::open(self.store.profile(ProfileKind::Popup))?;

        loop {
            let choice = self.presenter.present(&view)?;
            match navigator.handle(choice) {
                Ok(NavStep::Show(next)) => view = next,
                Ok(NavStep::Selected(text)) => return self.paste(text, Mode::Popup),
                Ok(NavStep::Cancelled) => {
                    debug!("Popup closed without a selection");
                    return Ok(DispatchOutcome::Cancelled);
                }
                Err(err) => {
                    // Stale or impossible choice; show the same view again
                    debug!(error = %err, "Ignoring popup choice");
                }
            }
        }
    }

    fn paste(&mut self, text: String, mode: Mode) -> SnipResult<DispatchOutcome> {
        let request = PasteRequest::new(text, mode);
        self.sink.paste(&request)?;
        debug!(mode = %mode, chars = request.text.chars().count(), "Dispatched");
        Ok(DispatchOutcome::Pasted {
            mode,
            text: request.text,
        })
    }
}
