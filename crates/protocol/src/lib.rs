//! Wire types for the afk fleet supervisor.
//!
//! This crate contains the serde-serializable types exchanged between the
//! supervisor runtime, its persistent store, and the control/observer surface.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization and config merging
//! - **camelCase on the wire**: Matches what dashboards and stored records use
//! - **Stable**: Persisted records stay readable across releases (`#[serde(default)]`)
//!
//! Runtime behavior (supervision, persistence, broadcasting) lives in `afk-runtime`.

pub mod config;
pub mod event;
pub mod ids;
pub mod log;
pub mod server;
pub mod settings;
pub mod status;

pub use config::*;
pub use event::*;
pub use ids::*;
pub use log::*;
pub use server::*;
pub use settings::*;
pub use status::*;
