//! Presentation of popup views.
//!
//! A [`Presenter`] renders a navigator [`View`] and reports what the user did.
//! [`TerminalPresenter`] does this with an interactive `inquire` list.

use inquire::{InquireError, Select};
use std::fmt;
use tracing::warn;

use crate::error::{SnipError, SnipResult};
use crate::popup::{PopupChoice, View, ViewEntry};
use crate::snippet::preview;
use crate::ui::PREVIEW_CHARS;

pub trait Presenter {
    fn present(&mut self, view: &View) -> SnipResult<PopupChoice>;
}

#[derive(Debug, Clone)]
pub struct TerminalPresenter {
    page_size: usize,
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// A view entry as shown in the list
struct Row(ViewEntry);

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&row_label(&self.0))
    }
}

fn row_label(entry: &ViewEntry) -> String {
    match entry {
        ViewEntry::Folder { name, .. } => format!("📁 {}", name),
        ViewEntry::Back => "← Back to folders".to_string(),
        ViewEntry::Text(text) => preview(text, PREVIEW_CHARS),
    }
}

fn choice_for(entry: ViewEntry) -> PopupChoice {
    match entry {
        ViewEntry::Folder { position, .. } => PopupChoice::Folder(position),
        ViewEntry::Back => PopupChoice::Back,
        ViewEntry::Text(text) => PopupChoice::Text(text),
    }
}

impl Presenter for TerminalPresenter {
    fn present(&mut self, view: &View) -> SnipResult<PopupChoice> {
        if view.entries.is_empty() {
            warn!("Popup view has nothing to show, closing");
            return Ok(PopupChoice::Cancel);
        }

        let title = match &view.folder {
            Some(name) => format!("📁 {}", name),
            None => "Pick a folder".to_string(),
        };
        let rows: Vec<Row> = view.entries.iter().cloned().map(Row).collect();

        let answer = Select::new(&title, rows)
            .with_page_size(self.page_size)
            .with_help_message("↑↓ to move, Enter to choose, Esc to go back or close")
            .prompt();

        match answer {
            Ok(Row(entry)) => Ok(choice_for(entry)),
            Err(InquireError::OperationCanceled) => Ok(PopupChoice::Escape),
            Err(InquireError::OperationInterrupted) => Ok(PopupChoice::Cancel),
            Err(e) => Err(SnipError::Presentation(e.to_string())),
        }
    }
}
