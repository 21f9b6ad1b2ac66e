//! Host allow-list for certificate issuance and SNI resolution.

use std::collections::HashSet;

use crate::error::{CertError, CertResult};

/// The set of hosts certificates may be issued or served for.
///
/// Anything outside the configured application set is rejected, which
/// keeps arbitrary `Host` headers and hostile SNI values from driving
/// unbounded issuance.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    hosts: HashSet<String>,
}

impl HostPolicy {
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }

    /// Whether the host is in the allow-list.
    pub fn allows(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// Reject hosts outside the allow-list.
    pub fn check(&self, host: &str) -> CertResult<()> {
        if self.allows(host) {
            Ok(())
        } else {
            Err(CertError::HostNotAllowed(host.to_string()))
        }
    }

    /// All allowed hosts, sorted.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }
}
