//! Supervision runtime for a fleet of long-lived game sessions.
//!
//! The pieces, leaves first:
//!
//! - [`LogHistory`]: bounded, persisted per-session log.
//! - [`idle`]: periodic presence actions against a live session.
//! - [`Supervisor`]: one session's lifecycle (connect, reconnect, status).
//! - [`Fleet`]: registry of supervisors and the entry point for every
//!   control operation.
//! - [`Broadcaster`]: fire-and-forget publish point for observers.
//!
//! The game protocol and the document store are collaborators behind the
//! [`GameClient`] and [`Store`] traits.

pub mod broadcast;
pub mod client;
pub mod error;
pub mod fleet;
pub mod history;
pub mod idle;
pub mod sim;
pub mod store;
pub mod supervisor;
pub mod testing;
pub mod timer;

pub use broadcast::Broadcaster;
pub use client::{ConnectOptions, Control, GameClient, GameSession, SessionEvent};
pub use error::{ClientError, FleetError, Result, StoreError};
pub use fleet::{Fleet, FleetOptions};
pub use history::LogHistory;
pub use idle::IdlePolicy;
pub use sim::{SimulatedClient, SimulationOptions};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use supervisor::{Supervisor, SupervisorContext, format_uptime};
pub use timer::{TimerHandle, Timings};
