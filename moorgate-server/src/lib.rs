//! The Moorgate daemon: `moorgate-auth` wrapped in an HTTP surface.
//!
//! Everything stateful or networked lives here, behind the traits the
//! auth crate defines: [`store`] keeps nonces in SQLite, [`discovery`]
//! fetches signing keys from client domains, [`rpc`] talks to the
//! execution node, and [`http`] exposes the two challenge endpoints.
//! [`config`] loads it all from the environment and [`rate_limit`] caps
//! issuance per account.
//!
//! The binary in `main.rs` wires these together; integration tests build
//! the same router against stub endpoints.

pub mod config;
pub mod discovery;
pub mod http;
pub mod rate_limit;
pub mod rpc;
pub mod store;
