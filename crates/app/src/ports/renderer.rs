//! Panel renderer port — attaches the control panel to a mount point.

use crate::panel::PanelView;

/// Draws a [`PanelView`] into the host document.
pub trait PanelRenderer {
    /// Mount point type; the same node type the document reports.
    type Node;
    /// The rendered panel.
    type Handle: Clone + PartialEq + std::fmt::Debug;

    fn mount(&mut self, mount_point: &Self::Node, view: &PanelView) -> Self::Handle;

    /// Redraw in place; the handle stays valid.
    fn update(&mut self, handle: &Self::Handle, view: &PanelView);

    fn unmount(&mut self, handle: Self::Handle);

    /// `false` once the host detached or replaced the panel.
    fn is_mounted(&self, handle: &Self::Handle) -> bool;
}
