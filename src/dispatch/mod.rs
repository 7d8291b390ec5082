//! Outbound dispatch: entitlement check, provider selection and send.

mod engine;
mod entitlement;

pub use engine::{DispatchEngine, DispatchStats, DispatchStatsSnapshot};
pub use entitlement::EntitlementChecker;
