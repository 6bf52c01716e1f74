//! Application services — the per-surface state the engine keeps.
//!
//! Services that talk to the backend accept a port implementation via a
//! generic parameter (constructor injection), keeping this layer decoupled
//! from concrete adapters.

pub mod control;
pub mod preferences_cache;
pub mod task_reconciler;
pub mod timer_card;
