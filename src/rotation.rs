//! Rotation engine.
//!
//! Cycles through the flattened rotation profile: each `next()` returns the
//! text at the current index and advances, wrapping to the start.

use tracing::{debug, info};

use crate::error::{SnipError, SnipResult};
use crate::flatten::flatten;
use crate::snippet::{ProfileKind, SnippetNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

#[derive(Debug, Default)]
pub struct RotationEngine {
    cycle: Option<Cycle>,
}

/// Exists only while the engine runs; stopping discards the index.
#[derive(Debug)]
struct Cycle {
    flat: Vec<String>,
    index: usize,
}

impl RotationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        if self.cycle.is_some() {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.cycle.is_some()
    }

    /// Flatten `profile` and start cycling from its first text.
    ///
    /// An empty profile leaves the engine stopped. Returns the number of texts.
    pub fn start(&mut self, profile: &[SnippetNode]) -> SnipResult<usize> {
        let flat = flatten(profile);
        if flat.is_empty() {
            self.cycle = None;
            return Err(SnipError::EmptyProfile(ProfileKind::Rotation));
        }

        let count = flat.len();
        self.cycle = Some(Cycle { flat, index: 0 });
        info!(texts = count, "Rotation started");
        Ok(count)
    }

    /// Re-derive the sequence from the current profile without restarting.
    ///
    /// The index is kept; `next()` clamps it if the sequence shrank.
    pub fn sync(&mut self, profile: &[SnippetNode]) {
        if let Some(cycle) = self.cycle.as_mut() {
            let flat = flatten(profile);
            if flat != cycle.flat {
                debug!(
                    before = cycle.flat.len(),
                    after = flat.len(),
                    "Rotation profile changed while running"
                );
                cycle.flat = flat;
            }
        }
    }

    /// Return the text at the current index and advance.
    pub fn next(&mut self) -> SnipResult<String> {
        let cycle = self.cycle.as_mut().ok_or(SnipError::EngineStopped)?;
        if cycle.flat.is_empty() {
            return Err(SnipError::EmptyProfile(ProfileKind::Rotation));
        }

        if cycle.index >= cycle.flat.len() {
            cycle.index = 0;
        }
        let text = cycle.flat[cycle.index].clone();
        cycle.index = (cycle.index + 1) % cycle.flat.len();
        debug!(next_index = cycle.index, len = cycle.flat.len(), "Rotated");
        Ok(text)
    }

    pub fn stop(&mut self) {
        if self.cycle.take().is_some() {
            info!("Rotation stopped");
        }
    }

    /// Upcoming index and sequence length, while running.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.cycle.as_ref().map(|c| (c.index, c.flat.len()))
    }
}
