//! Snippet data model.
//!
//! A profile is an ordered list of [`SnippetNode`]s. Texts are leaves, folders
//! hold their own ordered item list and nest without a depth limit. Sibling
//! order is the only ordering; nothing here ever sorts.
//!
//! The list mutations at the bottom of this module are shared by profile roots
//! (driven through the store) and by [`Folder`]s edited in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SnipError, SnipResult};

/// Name given to folders persisted without one.
pub const UNNAMED_FOLDER: &str = "Unnamed folder";

/// One entry of a profile: a text leaf or a folder of further entries.
///
/// On disk a text is a bare JSON string and a folder is
/// `{"type": "folder", "name": ..., "items": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NodeRepr", into = "NodeRepr")]
pub enum SnippetNode {
    Text(String),
    Folder(Folder),
}

/// A named, ordered container of snippet nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Folder {
    pub name: String,
    pub items: Vec<SnippetNode>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Text(String),
    Folder {
        #[serde(rename = "type")]
        kind: FolderTag,
        #[serde(default = "unnamed_folder")]
        name: String,
        #[serde(default)]
        items: Vec<SnippetNode>,
    },
}

#[derive(Serialize, Deserialize)]
enum FolderTag {
    #[serde(rename = "folder")]
    Folder,
}

fn unnamed_folder() -> String {
    UNNAMED_FOLDER.to_string()
}

impl From<NodeRepr> for SnippetNode {
    fn from(repr: NodeRepr) -> Self {
        match repr {
            NodeRepr::Text(text) => SnippetNode::Text(text),
            NodeRepr::Folder { name, items, .. } => SnippetNode::Folder(Folder { name, items }),
        }
    }
}

impl From<SnippetNode> for NodeRepr {
    fn from(node: SnippetNode) -> Self {
        match node {
            SnippetNode::Text(text) => NodeRepr::Text(text),
            SnippetNode::Folder(folder) => NodeRepr::Folder {
                kind: FolderTag::Folder,
                name: folder.name,
                items: folder.items,
            },
        }
    }
}

impl SnippetNode {
    pub fn text(content: impl Into<String>) -> Self {
        SnippetNode::Text(content.into())
    }

    pub fn folder(name: impl Into<String>, items: Vec<SnippetNode>) -> Self {
        SnippetNode::Folder(Folder::new(name, items))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SnippetNode::Text(text) => Some(text),
            SnippetNode::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            SnippetNode::Folder(folder) => Some(folder),
            SnippetNode::Text(_) => None,
        }
    }

    pub fn as_folder_mut(&mut self) -> Option<&mut Folder> {
        match self {
            SnippetNode::Folder(folder) => Some(folder),
            SnippetNode::Text(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, SnippetNode::Folder(_))
    }
}

/// The two independent snippet collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Rotation,
    Popup,
}

impl ProfileKind {
    pub fn all() -> [ProfileKind; 2] {
        [ProfileKind::Rotation, ProfileKind::Popup]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Rotation => "rotation",
            ProfileKind::Popup => "popup",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rotation" => Ok(ProfileKind::Rotation),
            "popup" => Ok(ProfileKind::Popup),
            _ => Err(format!("unknown profile: {} (expected rotation or popup)", s)),
        }
    }
}

/// Which neighbour an item is swapped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(format!("invalid direction: {} (expected up or down)", s)),
        }
    }
}

/// Result of a move request. Hitting the boundary is reported, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { to: usize },
    AtBoundary,
}

/// Trim user input, rejecting what is empty afterwards.
pub fn normalize_input(raw: &str, what: &str) -> SnipResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SnipError::invalid(format!("{} cannot be empty", what)));
    }
    Ok(trimmed.to_string())
}

/// Single-line preview of a text: newlines become spaces, long texts are cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn check_index(items: &[SnippetNode], index: usize) -> SnipResult<()> {
    if index >= items.len() {
        return Err(SnipError::MutationOutOfRange {
            index,
            len: items.len(),
        });
    }
    Ok(())
}

pub fn push_text(items: &mut Vec<SnippetNode>, raw: &str) -> SnipResult<()> {
    let text = normalize_input(raw, "Text")?;
    items.push(SnippetNode::Text(text));
    Ok(())
}

pub fn push_folder(items: &mut Vec<SnippetNode>, raw_name: &str) -> SnipResult<()> {
    let name = normalize_input(raw_name, "Folder name")?;
    items.push(SnippetNode::Folder(Folder::new(name, Vec::new())));
    Ok(())
}

/// Remove the item at `index`; a folder takes its whole subtree with it.
pub fn remove_at(items: &mut Vec<SnippetNode>, index: usize) -> SnipResult<SnippetNode> {
    check_index(items, index)?;
    Ok(items.remove(index))
}

pub fn move_at(
    items: &mut [SnippetNode],
    index: usize,
    direction: Direction,
) -> SnipResult<MoveOutcome> {
    check_index(items, index)?;
    let target = match direction {
        Direction::Up if index == 0 => return Ok(MoveOutcome::AtBoundary),
        Direction::Up => index - 1,
        Direction::Down if index + 1 == items.len() => return Ok(MoveOutcome::AtBoundary),
        Direction::Down => index + 1,
    };
    items.swap(index, target);
    Ok(MoveOutcome::Moved { to: target })
}

/// Replace the content of the text at `index`. Folders are rejected.
pub fn replace_text_at(items: &mut [SnippetNode], index: usize, raw: &str) -> SnipResult<()> {
    check_index(items, index)?;
    let text = normalize_input(raw, "Text")?;
    match &mut items[index] {
        SnippetNode::Text(existing) => {
            *existing = text;
            Ok(())
        }
        SnippetNode::Folder(folder) => Err(SnipError::invalid(format!(
            "item {} is the folder '{}', not a text",
            index, folder.name
        ))),
    }
}

impl Folder {
    pub fn new(name: impl Into<String>, items: Vec<SnippetNode>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    /// Texts directly inside this folder, in order. Nested folders are skipped.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(SnippetNode::as_text)
    }

    pub fn add_text(&mut self, raw: &str) -> SnipResult<()> {
        push_text(&mut self.items, raw)
    }

    pub fn delete(&mut self, index: usize) -> SnipResult<SnippetNode> {
        remove_at(&mut self.items, index)
    }

    pub fn move_item(&mut self, index: usize, direction: Direction) -> SnipResult<MoveOutcome> {
        move_at(&mut self.items, index, direction)
    }

    pub fn edit_text(&mut self, index: usize, raw: &str) -> SnipResult<()> {
        replace_text_at(&mut self.items, index, raw)
    }

    pub fn rename(&mut self, raw_name: &str) -> SnipResult<()> {
        self.name = normalize_input(raw_name, "Folder name")?;
        Ok(())
    }
}
