//! # quicktimer-adapter-virtual
//!
//! Simulated host for demos and end-to-end tests.
//!
//! ## Provided pieces
//!
//! | Piece | Role |
//! |-------|------|
//! | [`VirtualHost`] | `SchedulerBackend` on tokio timers, publishing [`HostUpdate`]s |
//! | [`demo_catalog`] | Service catalog with selectors, feature filters and a reserved operation |
//! | [`demo_entities`] | A light, a switch, a cover and a fan |
//! | [`MoreInfoLayout`] | Detail-view layouts written into an `InMemoryDocument` |
//!
//! ## Dependency rule
//!
//! Depends on `quicktimer-app` (port traits) and `quicktimer-domain` only.

mod catalog;
mod devices;
mod error;
mod host;
mod layout;

pub use catalog::demo_catalog;
pub use devices::{actuate, demo_entities};
pub use error::VirtualHostError;
pub use host::{HostUpdate, VirtualHost};
pub use layout::{MoreInfoLayout, close_more_info};
