//! Host document port — read-only view of a tree the host renders and
//! rebuilds on its own schedule.

use std::fmt::Debug;

/// A foreign document tree.
///
/// Nothing here is stable: any node may be replaced between two calls.
/// Implementations flatten shadow boundaries, so [`children`](Self::children)
/// includes a node's shadow-root content.
pub trait HostDocument {
    /// Opaque node handle; two handles are equal when they are the same node.
    type Node: Clone + PartialEq + Debug;

    /// Top of the observed live region, if the host has rendered one.
    fn root(&self) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Lower-case element name.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// A property the host set on the node.
    fn property(&self, node: &Self::Node, name: &str) -> Option<serde_json::Value>;

    /// Whether the node is still attached under [`root`](Self::root).
    fn is_connected(&self, node: &Self::Node) -> bool;
}
