//! # quicktimer-app
//!
//! Application layer — services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SchedulerBackend` — schedule, cancel, persist preferences
//!   - `HostDocument` — read the host's live document tree
//!   - `PanelRenderer` — attach, redraw and detach the panel
//!   - `IntervalTimer` / `Clock` — ticks, retries and "now"
//! - Provide the per-surface services:
//!   - `PreferencesCache` — session copy of per-entity choices
//!   - `TaskReconciler` — bind a surface to the first matching task
//!   - `TimerCard` — the dashboard widget
//!   - `PanelManager` — locate, inject, update and remove the detail panel
//! - Provide **in-process infrastructure** (signal loop, tokio timers,
//!   in-memory document) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `quicktimer-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod document;
pub mod host;
pub mod panel;
pub mod ports;
pub mod runtime;
pub mod services;
pub mod timer;
