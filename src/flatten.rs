//! Tree flattening.
//!
//! Reduces a folder tree to the ordered sequence of its texts: pre-order,
//! left to right, folder names never contribute.

use crate::snippet::SnippetNode;

/// Collect every text reachable from `nodes`, in pre-order.
pub fn flatten(nodes: &[SnippetNode]) -> Vec<String> {
    let mut flat = Vec::new();
    collect(nodes, &mut flat);
    flat
}

fn collect(nodes: &[SnippetNode], out: &mut Vec<String>) {
    for node in nodes {
        match node {
            SnippetNode::Text(text) => out.push(text.clone()),
            SnippetNode::Folder(folder) => collect(&folder.items, out),
        }
    }
}

/// Whether any text is reachable. A profile of empty folders has nothing to dispatch.
pub fn has_text(nodes: &[SnippetNode]) -> bool {
    nodes.iter().any(|node| match node {
        SnippetNode::Text(_) => true,
        SnippetNode::Folder(folder) => has_text(&folder.items),
    })
}
