//! Core functionality for the palisade project
//!
//! This crate contains the domain types, repository traits, failure counter
//! cache and services that make up palisade's brute force protection.
//!
//! It is designed to be used as a dependency by the storage backends and the
//! `palisade` facade; application code normally goes through the facade.
//!
//! See [`BruteForceGuard`] for the login decision logic, [`AuditReporter`] for
//! ledger-derived reports, and [`repositories::RepositoryProvider`] for what a
//! storage backend has to implement.
pub mod cache;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod user;

pub use cache::{FailureCounterCache, InMemoryFailureCache};
pub use client::ClientAddress;
pub use config::BruteForceConfig;
pub use crypto::{PasswordHasher, Sha256PasswordHasher};
pub use error::Error;
pub use services::{AuditReporter, BruteForceGuard, FailureCounterService, LoginOutcome, Report};
pub use storage::{
    FailureKey, FailureWindow, KeyKind, LastLogin, LoginAttempt, NewLoginAttempt, NewUser,
};
pub use user::{User, UserId};
