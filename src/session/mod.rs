//! Session lifecycle and registry.
//!
//! The registry owns every connected participant's state:
//! - language preferences and activity tracking
//! - the bounded per-session audio queue
//! - per-session and aggregate counters
//! - registration, capacity enforcement and idempotent cleanup

mod registry;
mod session;
mod stats;

pub use registry::{ClientProfile, RegistryError, RegistryLimits, SessionRegistry};
pub use session::{
    AudioChunk, DeliveryError, Session, SessionCounters, SessionCountersSnapshot,
};
pub use stats::{ServerStats, ServerStatsSnapshot};
