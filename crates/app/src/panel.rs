//! Panel injection — attaches the quick-timer controls to the host's
//! entity-detail view and keeps them in sync.
//!
//! The host gives no "mount point ready" event, so the [`PanelManager`]
//! re-locates on every structural signal and on a bounded retry timer.

mod locator;
mod manager;
mod view;

pub use locator::{LocateStrategy, Located, locate};
pub use manager::{PanelCommand, PanelConfig, PanelManager, PanelPhase};
pub use view::{PanelAction, PanelView};
