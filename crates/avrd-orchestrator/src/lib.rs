//! Agent orchestration for the AVRD control plane.
//!
//! This crate is the core of the system: it derives the container topology
//! an agent needs from its mode and provider selection, compiles each
//! provider's environment, drives the runtime gateway idempotently, and
//! keeps the PBX routed at the resulting containers through the telephony
//! provisioning services.
//!
//! Everything here is exposed as service types a CRUD layer calls:
//! [`AgentService`] for agent lifecycle, [`ProviderService`] for provider
//! CRUD, and [`NumberService`]/[`PhoneService`]/[`TrunkService`] for
//! telephony entities. All of them speak the [`OrchestratorError`] taxonomy.

pub mod agents;
pub mod config;
pub mod env;
pub mod naming;
pub mod providers;
pub mod telephony;

mod error;

pub use agents::{AgentService, CreateAgentParams, UpdateAgentParams};
pub use config::{OrchestratorConfig, PortRange};
pub use env::EnvSet;
pub use error::OrchestratorError;
pub use providers::{CreateProviderParams, ProviderService, UpdateProviderParams};
pub use telephony::{NumberService, PhoneService, TrunkService};
