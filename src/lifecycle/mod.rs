//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Connect store → build router → bind listener → Serving
//!
//! Shutdown (shutdown.rs + controller.rs):
//!     SIGTERM/SIGINT ─┐
//!     POST /termination ├─▶ single-flight trigger → Draining → Stopped
//!     fatal serve error ─┘
//! ```
//!
//! # Design Decisions
//! - Exactly one shutdown sequence per process, however many sources fire
//! - The first trigger's cause decides the exit code
//! - Connect failure skips Draining: nothing is serving yet

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{Controller, FatalError, LifecycleState, GRACE_PERIOD};
pub use shutdown::{ShutdownCause, ShutdownHandle};
