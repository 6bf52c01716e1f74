//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the services and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod backend;
pub mod clock;
pub mod document;
pub mod renderer;
pub mod timer;

pub use backend::SchedulerBackend;
pub use clock::{Clock, SystemClock};
pub use document::HostDocument;
pub use renderer::PanelRenderer;
pub use timer::{IntervalTimer, SurfaceId};
