//! # Region Service
//!
//! Async host for the region orchestration core. A single
//! [`OrchestrationService`] task owns the [`region_core::WorldManager`] and a
//! [`PlayerDirectory`] of personal and party world views, and processes
//! [`InboundMessage`]s strictly one at a time.
//!
//! Outbound traffic leaves through channel-backed sinks ([`ChannelOutbound`],
//! [`ChannelSessions`]) so the transport side can live on any task.

pub mod config;
pub mod error;
pub mod messages;
pub mod players;
pub mod service;
pub mod shutdown;
pub mod sinks;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use messages::{InboundMessage, PartyId, ServiceRequest};
pub use players::PlayerDirectory;
pub use service::{OrchestrationService, ServiceHandle, ServiceStats};
pub use shutdown::ShutdownState;
pub use sinks::{ChannelOutbound, ChannelSessions, SessionEvent};
