//! Popup navigation over the popup profile.
//!
//! The root view lists the profile's folders (root-level texts are not shown).
//! Opening a folder shows a "back" entry followed by the folder's texts;
//! folders nested inside a folder are not listed.
//!
//! The navigator works on a snapshot taken at `open`, so edits made while a
//! popup is showing do not reach it. Sessions end on selection or cancel.

use tracing::debug;

use crate::error::{SnipError, SnipResult};
use crate::flatten::has_text;
use crate::snippet::{Folder, ProfileKind, SnippetNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEntry {
    /// A folder, addressed by its position in the current node list
    Folder { position: usize, name: String },
    Back,
    Text(String),
}

/// What the presentation layer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Name of the open folder, `None` at the root
    pub folder: Option<String>,
    pub entries: Vec<ViewEntry>,
}

impl View {
    pub fn is_root(&self) -> bool {
        self.folder.is_none()
    }
}

/// A user action reported back by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupChoice {
    Folder(usize),
    Back,
    Text(String),
    /// Escape key: back inside a folder, cancel at the root
    Escape,
    /// Focus loss, window deactivation or an explicit close
    Cancel,
}

/// Result of one navigation transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavStep {
    Show(View),
    Selected(String),
    Cancelled,
}

impl NavStep {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NavStep::Show(_))
    }
}

#[derive(Debug)]
pub struct PopupNavigator {
    root: Vec<SnippetNode>,
    /// Positions of the open folders, outermost first; empty at the root
    stack: Vec<usize>,
}

impl PopupNavigator {
    /// Start a session over `profile`, returning the navigator and its root view.
    pub fn open(profile: &[SnippetNode]) -> SnipResult<(Self, View)> {
        if !has_text(profile) {
            return Err(SnipError::EmptyProfile(ProfileKind::Popup));
        }
        let navigator = Self {
            root: profile.to_vec(),
            stack: Vec::new(),
        };
        let view = navigator.view();
        debug!(entries = view.entries.len(), "Popup opened");
        Ok((navigator, view))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn current_folder(&self) -> Option<&Folder> {
        let mut items = &self.root;
        let mut folder = None;
        for &position in &self.stack {
            match items.get(position).and_then(SnippetNode::as_folder) {
                Some(f) => {
                    items = &f.items;
                    folder = Some(f);
                }
                None => break,
            }
        }
        folder
    }

    fn current_items(&self) -> &[SnippetNode] {
        self.current_folder().map_or(&self.root, |f| &f.items)
    }

    /// The view for the current position in the tree.
    pub fn view(&self) -> View {
        match self.current_folder() {
            None => View {
                folder: None,
                entries: self
                    .root
                    .iter()
                    .enumerate()
                    .filter_map(|(position, node)| {
                        node.as_folder().map(|f| ViewEntry::Folder {
                            position,
                            name: f.name.clone(),
                        })
                    })
                    .collect(),
            },
            Some(folder) => View {
                folder: Some(folder.name.clone()),
                entries: std::iter::once(ViewEntry::Back)
                    .chain(folder.texts().map(|t| ViewEntry::Text(t.to_string())))
                    .collect(),
            },
        }
    }

    pub fn select_folder(&mut self, position: usize) -> SnipResult<View> {
        let is_folder = self
            .current_items()
            .get(position)
            .is_some_and(SnippetNode::is_folder);
        if !is_folder {
            return Err(SnipError::invalid(format!(
                "entry {} is not a folder in the current view",
                position
            )));
        }
        self.stack.push(position);
        debug!(depth = self.stack.len(), "Popup entered folder");
        Ok(self.view())
    }

    pub fn select_back(&mut self) -> SnipResult<View> {
        self.stack.pop().ok_or(SnipError::AtRoot)?;
        debug!(depth = self.stack.len(), "Popup went back");
        Ok(self.view())
    }

    /// Terminal: hand `text` to the dispatcher, whatever the depth.
    pub fn select_text(&mut self, text: String) -> NavStep {
        self.stack.clear();
        NavStep::Selected(text)
    }

    /// Terminal: close without a selection.
    pub fn cancel(&mut self) -> NavStep {
        self.stack.clear();
        NavStep::Cancelled
    }

    /// Escape goes back one level, or cancels at the root.
    pub fn escape(&mut self) -> NavStep {
        match self.select_back() {
            Ok(view) => NavStep::Show(view),
            Err(_) => self.cancel(),
        }
    }

    pub fn handle(&mut self, choice: PopupChoice) -> SnipResult<NavStep> {
        match choice {
            PopupChoice::Folder(position) => self.select_folder(position).map(NavStep::Show),
            PopupChoice::Back => self.select_back().map(NavStep::Show),
            PopupChoice::Text(text) => Ok(self.select_text(text)),
            PopupChoice::Escape => Ok(self.escape()),
            PopupChoice::Cancel => Ok(self.cancel()),
        }
    }
}
