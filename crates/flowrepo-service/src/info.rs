//! Service identity and uptime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name and version of the running service, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    name: String,
    version: String,
    started_at: DateTime<Utc>,
}

/// Body of the info endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoReport {
    pub name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

impl ServiceInfo {
    /// Start the uptime clock now
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            started_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Snapshot including the current uptime
    #[must_use]
    pub fn report(&self) -> InfoReport {
        InfoReport {
            name: self.name.clone(),
            version: self.version.clone(),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_identity() {
        let info = ServiceInfo::new("flowrepo", "1.2.3");
        let report = info.report();
        assert_eq!(report.name, "flowrepo");
        assert_eq!(report.version, "1.2.3");
        assert!(report.uptime_secs >= 0);
    }
}
