//! etcd-backed Terraform remote state gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                STATE GATEWAY                  │
//!                        │                                               │
//!   Terraform HTTP       │  ┌────────┐   ┌──────────┐   ┌────────────┐  │
//!   backend requests ────┼─▶│  http  │──▶│ gateway  │──▶│   store    │──┼──▶ etcd
//!   (lock / state)       │  │ routes │   │  + lock  │   │  client    │  │    cluster
//!                        │  └────────┘   └──────────┘   └────────────┘  │
//!                        │                                               │
//!                        │  ┌─────────────────────────────────────────┐  │
//!                        │  │            Cross-Cutting Concerns        │  │
//!                        │  │  ┌────────┐ ┌───────────┐ ┌───────────┐  │  │
//!                        │  │  │ config │ │ lifecycle │ │  tracing  │  │  │
//!                        │  │  └────────┘ └───────────┘ └───────────┘  │  │
//!                        │  └─────────────────────────────────────────┘  │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! The gateway lets Terraform's HTTP backend use etcd as remote state
//! storage: mutual-exclusion locking around state mutations, chunked
//! storage for blobs larger than a single etcd record, and a read/clear
//! compatibility path for the pre-chunking layout.

// Core subsystems
pub mod config;
pub mod gateway;
pub mod lock;
pub mod store;

// Transport
pub mod http;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;

pub use config::Config;
pub use error::GatewayError;
pub use lifecycle::Controller;
