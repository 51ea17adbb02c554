//! Audit report over the attempt ledger.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, repositories::LoginAttemptRepository, storage::KeyKind};

/// Banned IP addresses and locked account logins, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub banned_ips: Vec<String>,
    pub locked_users: Vec<String>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.banned_ips.is_empty() && self.locked_users.is_empty()
    }
}

/// Recomputes bans and locks straight from the ledger.
///
/// The counter cache is never consulted, so the report is authoritative even
/// when the cache is cold or stale. Keys that never succeeded and keys that
/// failed again after a success are covered by the same derivation.
pub struct AuditReporter<L: LoginAttemptRepository> {
    ledger: Arc<L>,
    ip_ban_threshold: u32,
    user_lock_threshold: u32,
}

impl<L: LoginAttemptRepository> AuditReporter<L> {
    pub fn new(ledger: Arc<L>, ip_ban_threshold: u32, user_lock_threshold: u32) -> Self {
        Self {
            ledger,
            ip_ban_threshold,
            user_lock_threshold,
        }
    }

    pub async fn report(&self) -> Result<Report, Error> {
        let mut banned_ips: Vec<String> = self
            .ledger
            .failure_windows(KeyKind::Ip, self.ip_ban_threshold)
            .await?
            .into_iter()
            .map(|window| window.label)
            .collect();

        let mut locked_users: Vec<String> = self
            .ledger
            .failure_windows(KeyKind::User, self.user_lock_threshold)
            .await?
            .into_iter()
            .map(|window| window.label)
            .collect();

        banned_ips.sort();
        banned_ips.dedup();
        locked_users.sort();
        locked_users.dedup();

        tracing::debug!(
            banned_ips = banned_ips.len(),
            locked_users = locked_users.len(),
            "Built audit report"
        );

        Ok(Report {
            banned_ips,
            locked_users,
        })
    }
}
