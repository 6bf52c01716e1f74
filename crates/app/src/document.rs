//! In-memory host document and a renderer that writes panels into it.
//!
//! Used by the virtual host and by tests. The tree is shared behind an
//! `Arc<Mutex<_>>`, so a host simulation can rebuild it while the engine
//! holds a clone.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::panel::PanelView;
use crate::ports::{HostDocument, PanelRenderer};

/// Tag of the element [`TreePanelRenderer`] creates.
pub const PANEL_TAG: &str = "quick-timer-panel";

/// Node handle inside an [`InMemoryDocument`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: HashMap<NodeId, NodeData>,
    root: Option<NodeId>,
    next_id: u64,
}

impl Tree {
    fn allocate(&mut self, tag: &str, parent: Option<NodeId>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            NodeData {
                tag: tag.to_ascii_lowercase(),
                parent,
                children: Vec::new(),
                properties: HashMap::new(),
            },
        );
        id
    }

    fn drop_subtree(&mut self, id: NodeId) {
        if let Some(data) = self.nodes.remove(&id) {
            for child in data.children {
                self.drop_subtree(child);
            }
        }
    }
}

/// Shared, mutable node tree.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    tree: Arc<Mutex<Tree>>,
}

impl InMemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole document with a fresh root.
    pub fn set_root(&self, tag: &str) -> NodeId {
        let mut tree = self.lock();
        if let Some(old) = tree.root.take() {
            tree.drop_subtree(old);
        }
        let root = tree.allocate(tag, None);
        tree.root = Some(root);
        root
    }

    /// Append a new element. A missing parent yields a detached node.
    pub fn append_child(&self, parent: NodeId, tag: &str) -> NodeId {
        let mut tree = self.lock();
        if !tree.nodes.contains_key(&parent) {
            return tree.allocate(tag, None);
        }
        let child = tree.allocate(tag, Some(parent));
        if let Some(data) = tree.nodes.get_mut(&parent) {
            data.children.push(child);
        }
        child
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: serde_json::Value) {
        if let Some(data) = self.lock().nodes.get_mut(&node) {
            data.properties.insert(name.to_string(), value);
        }
    }

    /// Detach and delete a node with all its descendants.
    pub fn remove(&self, node: NodeId) {
        let mut tree = self.lock();
        let parent = tree.nodes.get(&node).and_then(|data| data.parent);
        if let Some(parent) = parent.and_then(|p| tree.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != node);
        }
        if tree.root == Some(node) {
            tree.root = None;
        }
        tree.drop_subtree(node);
    }

    /// Every node with `tag`, in creation order.
    #[must_use]
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let tree = self.lock();
        let mut found: Vec<NodeId> = tree
            .nodes
            .iter()
            .filter(|(_, data)| data.tag == tag)
            .map(|(id, _)| *id)
            .collect();
        found.sort();
        found
    }

    /// Like [`find_by_tag`](Self::find_by_tag), restricted to connected nodes.
    #[must_use]
    pub fn find_connected(&self, tag: &str) -> Vec<NodeId> {
        self.find_by_tag(tag)
            .into_iter()
            .filter(|node| self.is_connected(node))
            .collect()
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&node).and_then(|data| data.parent)
    }
}

impl HostDocument for InMemoryDocument {
    type Node = NodeId;

    fn root(&self) -> Option<NodeId> {
        self.lock().root
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        self.lock().nodes.get(node).map(|data| data.tag.clone())
    }

    fn property(&self, node: &NodeId, name: &str) -> Option<serde_json::Value> {
        self.lock()
            .nodes
            .get(node)
            .and_then(|data| data.properties.get(name).cloned())
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let tree = self.lock();
        let mut current = Some(*node);
        while let Some(id) = current {
            let Some(data) = tree.nodes.get(&id) else {
                return false;
            };
            if tree.root == Some(id) {
                return true;
            }
            current = data.parent;
        }
        false
    }
}

/// Renders a panel as a [`PANEL_TAG`] child whose `view` property holds
/// the serialized [`PanelView`].
#[derive(Debug, Clone)]
pub struct TreePanelRenderer {
    document: InMemoryDocument,
}

impl TreePanelRenderer {
    #[must_use]
    pub fn new(document: InMemoryDocument) -> Self {
        Self { document }
    }

    fn write(&self, node: NodeId, view: &PanelView) {
        let value = serde_json::to_value(view).unwrap_or(serde_json::Value::Null);
        self.document.set_property(node, "view", value);
        self.document.set_property(
            node,
            "entity_id",
            serde_json::Value::String(view.entity_id.to_string()),
        );
    }
}

impl PanelRenderer for TreePanelRenderer {
    type Node = NodeId;
    type Handle = NodeId;

    fn mount(&mut self, mount_point: &NodeId, view: &PanelView) -> NodeId {
        let node = self.document.append_child(*mount_point, PANEL_TAG);
        self.write(node, view);
        node
    }

    fn update(&mut self, handle: &NodeId, view: &PanelView) {
        self.write(*handle, view);
    }

    fn unmount(&mut self, handle: NodeId) {
        self.document.remove(handle);
    }

    fn is_mounted(&self, handle: &NodeId) -> bool {
        self.document.is_connected(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_descendants_connected_until_root_is_replaced() {
        let doc = InMemoryDocument::new();
        let root = doc.set_root("home-assistant");
        let dialog = doc.append_child(root, "ha-more-info-dialog");
        let info = doc.append_child(dialog, "ha-more-info-info");
        assert!(doc.is_connected(&info));
        assert_eq!(doc.children(&root), vec![dialog]);

        doc.set_root("home-assistant");
        assert!(!doc.is_connected(&info));
        assert!(doc.tag_name(&info).is_none());
    }

    #[test]
    fn should_detach_removed_subtree() {
        let doc = InMemoryDocument::new();
        let root = doc.set_root("home-assistant");
        let dialog = doc.append_child(root, "ha-more-info-dialog");
        let info = doc.append_child(dialog, "ha-more-info-info");

        doc.remove(dialog);

        assert!(doc.children(&root).is_empty());
        assert!(!doc.is_connected(&info));
        assert!(doc.find_by_tag("ha-more-info-info").is_empty());
    }

    #[test]
    fn should_never_reuse_node_ids() {
        let doc = InMemoryDocument::new();
        let first = doc.set_root("a");
        let second = doc.set_root("a");
        assert_ne!(first, second);
    }

    #[test]
    fn should_store_properties_per_node() {
        let doc = InMemoryDocument::new();
        let root = doc.set_root("home-assistant");
        doc.set_property(root, "entityId", serde_json::json!("light.kitchen"));
        assert_eq!(
            doc.property(&root, "entityId"),
            Some(serde_json::json!("light.kitchen"))
        );
        assert_eq!(doc.property(&root, "other"), None);
    }

    #[test]
    fn should_create_detached_node_when_parent_is_gone() {
        let doc = InMemoryDocument::new();
        let root = doc.set_root("a");
        let child = doc.append_child(root, "b");
        doc.remove(child);
        let orphan = doc.append_child(child, "c");
        assert!(!doc.is_connected(&orphan));
    }
}
