//! # quicktimer-domain
//!
//! Pure domain model for the quicktimer scheduling panel.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, epoch timestamps
//! - Define **Entities** as the host reports them (domain, state, attributes)
//! - Define **Tasks** (scheduled start/finish actions) and the shared registry snapshot
//! - Define **Preferences** (per-entity last-used choices and recency history)
//! - Define the host **Service catalog** and resolve it into user-facing capabilities
//! - Project countdowns and progress from absolute timestamps
//! - Build and validate **Schedule** requests
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod capability;
pub mod countdown;
pub mod entity;
pub mod preferences;
pub mod schedule;
pub mod service;
pub mod snapshot;
pub mod task;
