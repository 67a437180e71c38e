//! State gateway subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler (namespace from query)
//!     → keys.rs (derive state / lock / legacy key)
//!     → state.rs (chunked CRUD + legacy fallback policy)
//!     → StateStore trait
//! ```
//!
//! # Design Decisions
//! - Key derivation is the only namespace→key mapping point
//! - Legacy support is best-effort: fallback and cleanup failures are
//!   logged, never propagated
//! - Store errors are not interpreted; only "absent" gets first-class
//!   handling

pub mod keys;
pub mod state;

pub use state::StateGateway;
