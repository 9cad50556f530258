//! Row types and CRUD for the AVRD control plane.
//!
//! Each module owns one table: agents, providers, inbound numbers, SIP
//! phones, SIP trunks. Functions operate on a borrowed `rusqlite::Connection`
//! and contain no business logic; invariants such as the agent mode/provider
//! rules are enforced by the orchestrator before anything reaches this layer.

pub mod agents;
pub mod numbers;
pub mod phones;
pub mod providers;
pub mod trunks;

mod error;

pub use error::StoreError;

pub use agents::Agent;
pub use numbers::PhoneNumber;
pub use phones::Phone;
pub use providers::Provider;
pub use trunks::Trunk;
