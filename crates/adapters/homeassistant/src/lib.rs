//! # quicktimer-adapter-homeassistant
//!
//! REST adapter for a real Home Assistant instance.
//!
//! ## Responsibilities
//! - Read `/api/services`, `/api/states` and the monitor sensor's attributes
//! - Forward them to the runtime as [`Signal`](quicktimer_app::runtime::Signal)s on a poll interval
//! - Implement [`SchedulerBackend`](quicktimer_app::ports::SchedulerBackend) by calling
//!   `quick_timer.run_action`, `quick_timer.cancel_action` and `quick_timer.set_preferences`
//!
//! ## Dependency rule
//! Same as other adapters: depends on `quicktimer-app` and `quicktimer-domain`.

mod client;
mod config;
mod error;
pub mod payload;

pub use client::HomeAssistantClient;
pub use config::HomeAssistantConfig;
pub use error::HomeAssistantError;
