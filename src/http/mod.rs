//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! Terraform HTTP backend request
//!     → auth.rs (optional basic auth gate)
//!     → handlers.rs (resolve namespace + params)
//!     → gateway / lock coordinator
//!     → JSON response or streamed state blob
//! ```

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{build_router, AppState};
