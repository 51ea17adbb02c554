//! Service layer for business logic
//!
//! This module contains the services that implement brute force protection on
//! top of the repository traits and the failure counter cache.

pub mod counter;
pub mod guard;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use counter::FailureCounterService;
pub use guard::{BruteForceGuard, LoginOutcome};
pub use report::{AuditReporter, Report};
